//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod negotiate_consensus;
