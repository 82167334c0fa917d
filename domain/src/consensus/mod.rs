//! Consensus domain
//!
//! # Core Concepts
//!
//! ## Consensus Builder
//! Stateless functions over proposals and votes: agreement detection,
//! compromise synthesis, weighted voting and pairwise agreement.
//!
//! ## Negotiation state
//! Round-by-round record of a multi-round negotiation and its final result.
//! The negotiation loop itself lives in the application layer, because it
//! talks to agents.
//!
//! ```text
//! ┌──────────────┐   proposals   ┌──────────────────┐  reached?  ┌──────────┐
//! │  propose (n) │ ────────────▶ │ check_consensus  │ ─────────▶ │   vote   │
//! └──────────────┘               └──────────────────┘            └──────────┘
//!        ▲                               │ no                          │
//!        └──────── inform + next round ──┘            accepts / participants
//! ```

pub mod builder;
pub mod state;
pub mod vote;

pub use builder::{
    AgreementMatrix, ConsensusCheck, DEFAULT_CONSENSUS_THRESHOLD, WeightedVote, check_consensus,
    find_compromise, pairwise_agreement_matrix, weighted_voting,
};
pub use state::{ConsensusResult, ConsensusState, RoundSummary};
pub use vote::{VoteChoice, VoteTally};
