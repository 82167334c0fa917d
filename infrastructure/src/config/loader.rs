//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// Project-level config file names, in lookup order.
const PROJECT_CONFIG_FILES: [&str; 2] = ["concord.toml", ".concord.toml"];

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "CONCORD_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `CONCORD_`-prefixed environment variables, `__` between section
    ///    and key (`CONCORD_CONSENSUS__THRESHOLD=0.8`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./concord.toml` or `./.concord.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/concord/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(config_path).extract().map_err(Box::new)
    }

    /// The merged sources, before extraction.
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load only default configuration
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// `$XDG_CONFIG_HOME/concord/config.toml` if set, otherwise the
    /// platform config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("concord").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::ProtocolKind;
    use figment::Jail;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().ends_with("concord/config.toml"));
    }

    #[test]
    fn test_sources_merge_in_priority_order() {
        Jail::expect_with(|jail| {
            jail.set_env("XDG_CONFIG_HOME", jail.directory().join("xdg").display());
            jail.create_dir("xdg/concord")?;
            jail.create_file(
                "xdg/concord/config.toml",
                r#"
[bus]
queue_capacity = 10

[consensus]
max_rounds = 2
"#,
            )?;
            jail.create_file(
                ".concord.toml",
                r#"
[consensus]
max_rounds = 5
threshold = 0.6
"#,
            )?;
            jail.create_file("explicit.toml", "[protocols]\ndefault = \"swarm\"\n")?;
            jail.set_env("CONCORD_CONSENSUS__THRESHOLD", "0.9");

            let config = ConfigLoader::load(Some(Path::new("explicit.toml"))).map_err(|e| *e)?;

            assert_eq!(config.bus.queue_capacity, 10);
            assert_eq!(config.consensus.max_rounds, 5);
            assert_eq!(config.consensus.threshold, 0.9);
            assert_eq!(config.protocols.default_protocol(), ProtocolKind::Swarm);
            assert_eq!(config.timeouts.vote_seconds, 15);
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("concord.toml", "[bus]\nqueue_capacity = \"lots\"\n")?;
            assert!(ConfigLoader::load(None).is_err());
            Ok(())
        });
    }
}
