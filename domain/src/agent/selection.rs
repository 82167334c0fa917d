//! Capability-based agent selection and leader scoring.

use super::capability::Capability;
use super::value_objects::{AgentId, AgentProfile};
use crate::task::Task;
use std::collections::HashMap;

/// Default number of agents returned when nobody matches a task.
pub const DEFAULT_FALLBACK_COUNT: usize = 3;

/// Select the agents able to work on `task`.
///
/// - no required capabilities: every agent
/// - otherwise: every agent with at least one required capability
/// - nobody matches: the `fallback_count` agents with the highest capability
///   overlap (ties broken by lowest agent id)
///
/// The result is ordered by agent id.
pub fn select_agents(agents: &[AgentProfile], task: &Task, fallback_count: usize) -> Vec<AgentProfile> {
    let required = &task.required_capabilities;

    let mut selected: Vec<AgentProfile> = if required.is_empty() {
        agents.to_vec()
    } else {
        agents
            .iter()
            .filter(|a| a.capability_overlap(required) > 0)
            .cloned()
            .collect()
    };

    if selected.is_empty() {
        let mut ranked = agents.to_vec();
        ranked.sort_by(|a, b| {
            b.capability_overlap(required)
                .cmp(&a.capability_overlap(required))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(fallback_count);
        selected = ranked;
    }

    selected.sort_by(|a, b| a.id.cmp(&b.id));
    selected
}

/// Score an agent's fitness to lead a hierarchical collaboration.
///
/// `10 × overlap + 5 × average performance + min(memory size, 10)`, plus 20
/// for agents with the [`Capability::Leadership`] capability.
pub fn leader_score(agent: &AgentProfile, required: &[Capability]) -> f64 {
    let overlap = agent.capability_overlap(required) as f64;
    let memory = agent.memory_size.min(10) as f64;
    let leadership = if agent.has_capability(Capability::Leadership) {
        20.0
    } else {
        0.0
    };

    10.0 * overlap + 5.0 * agent.average_performance() + memory + leadership
}

/// Pick the highest-scoring leader; equal scores go to the lowest agent id.
pub fn select_leader<'a>(agents: &'a [AgentProfile], required: &[Capability]) -> Option<&'a AgentProfile> {
    agents.iter().fold(None, |best: Option<(&AgentProfile, f64)>, agent| {
        let score = leader_score(agent, required);
        match best {
            Some((current, best_score))
                if best_score > score || (best_score == score && current.id < agent.id) =>
            {
                Some((current, best_score))
            }
            _ => Some((agent, score)),
        }
    })
    .map(|(agent, _)| agent)
}

/// Pick the agent to give a subtask requiring `required`.
///
/// Highest capability overlap wins; ties go to the agent with the fewest
/// entries in `load`, then to the lowest agent id.
pub fn best_assignee<'a>(
    agents: &'a [AgentProfile],
    required: &[Capability],
    load: &HashMap<AgentId, usize>,
) -> Option<&'a AgentProfile> {
    let load_of = |agent: &AgentProfile| load.get(&agent.id).copied().unwrap_or(0);
    agents.iter().min_by(|a, b| {
        b.capability_overlap(required)
            .cmp(&a.capability_overlap(required))
            .then_with(|| load_of(a).cmp(&load_of(b)))
            .then_with(|| a.id.cmp(&b.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, capabilities: &[Capability]) -> AgentProfile {
        AgentProfile::new(id, id).with_capabilities(capabilities.iter().copied())
    }

    #[test]
    fn test_select_writer_reviewer_scenario() {
        let agents = vec![
            agent("a", &[Capability::Writing]),
            agent("b", &[Capability::Reviewing]),
            agent("c", &[Capability::Writing, Capability::Reviewing]),
        ];
        let task = Task::new("t", "article")
            .with_capabilities([Capability::Writing, Capability::Reviewing]);

        let selected = select_agents(&agents, &task, DEFAULT_FALLBACK_COUNT);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_select_filters_non_matching() {
        let agents = vec![
            agent("coder", &[Capability::Coding]),
            agent("writer", &[Capability::Writing]),
        ];
        let task = Task::new("t", "docs").with_capabilities([Capability::Writing]);

        let selected = select_agents(&agents, &task, DEFAULT_FALLBACK_COUNT);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id.as_str(), "writer");
    }

    #[test]
    fn test_select_all_when_no_requirements() {
        let agents = vec![agent("b", &[]), agent("a", &[Capability::Coding])];
        let selected = select_agents(&agents, &Task::new("t", "anything"), DEFAULT_FALLBACK_COUNT);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].id.as_str(), "a");
    }

    #[test]
    fn test_fallback_to_top_agents() {
        let agents = vec![
            agent("d", &[Capability::Coding]),
            agent("c", &[Capability::Coding]),
            agent("b", &[Capability::Testing]),
            agent("a", &[Capability::Design]),
        ];
        let task = Task::new("t", "legal review").with_capabilities([Capability::Negotiation]);

        let selected = select_agents(&agents, &task, 3);
        let ids: Vec<_> = selected.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_leader_score_formula() {
        let profile = agent("lead", &[Capability::Planning, Capability::Leadership])
            .with_performance([0.8, 0.6])
            .with_memory_size(25);

        // 10 * 1 + 5 * 0.7 + 10 + 20
        let score = leader_score(&profile, &[Capability::Planning, Capability::Coding]);
        assert!((score - 43.5).abs() < 1e-9);
    }

    #[test]
    fn test_select_leader_prefers_leadership() {
        let agents = vec![
            agent("a", &[Capability::Coding]),
            agent("b", &[Capability::Coding, Capability::Leadership]),
        ];
        let leader = select_leader(&agents, &[Capability::Coding]).unwrap();
        assert_eq!(leader.id.as_str(), "b");
    }

    #[test]
    fn test_select_leader_tie_breaks_on_lowest_id() {
        let agents = vec![
            agent("zeta", &[Capability::Coding]),
            agent("alpha", &[Capability::Coding]),
            agent("mid", &[Capability::Coding]),
        ];
        let leader = select_leader(&agents, &[Capability::Coding]).unwrap();
        assert_eq!(leader.id.as_str(), "alpha");
        assert!(select_leader(&[], &[]).is_none());
    }

    #[test]
    fn test_best_assignee_balances_load() {
        let agents = vec![
            agent("a", &[Capability::Writing]),
            agent("b", &[Capability::Writing]),
            agent("c", &[Capability::Coding]),
        ];
        let mut load = HashMap::new();

        let first = best_assignee(&agents, &[Capability::Writing], &load).unwrap();
        assert_eq!(first.id.as_str(), "a");

        load.insert(AgentId::new("a"), 1);
        let second = best_assignee(&agents, &[Capability::Writing], &load).unwrap();
        assert_eq!(second.id.as_str(), "b");

        let coder = best_assignee(&agents, &[Capability::Coding], &load).unwrap();
        assert_eq!(coder.id.as_str(), "c");
        assert!(best_assignee(&[], &[Capability::Coding], &load).is_none());
    }
}
