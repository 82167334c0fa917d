//! Negotiate Consensus use case
//!
//! Multi-round negotiation: collect proposals, check for agreement, put a
//! winning proposal to the vote, otherwise share the round's proposals and
//! try again.
//!
//! ```text
//! round 1..=max_rounds
//!   propose ──▶ check_consensus ──reached──▶ vote ──▶ result
//!                     │
//!                     └─not reached──▶ inform participants, next round
//! ```

use crate::config::CollaborationParams;
use crate::ports::collaboration_logger::{CollaborationEvent, CollaborationLogger, NoCollaborationLogger};
use crate::protocols::messenger::Messenger;
use concord_domain::{
    AgentId, ConsensusResult, ConsensusState, MessageKind, VoteChoice, check_consensus,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input for the NegotiateConsensus use case
#[derive(Debug, Clone)]
pub struct NegotiateConsensusInput {
    pub participants: Vec<AgentId>,
    /// What is being decided; sent to participants with every proposal request.
    pub decision: Value,
    pub max_rounds: usize,
}

impl NegotiateConsensusInput {
    pub fn new(participants: Vec<AgentId>, decision: Value) -> Self {
        Self {
            participants,
            decision,
            max_rounds: CollaborationParams::default().max_rounds,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

/// Use case for running a consensus negotiation
pub struct NegotiateConsensusUseCase {
    messenger: Messenger,
    params: CollaborationParams,
    logger: Arc<dyn CollaborationLogger>,
}

impl NegotiateConsensusUseCase {
    pub fn new(messenger: Messenger, params: CollaborationParams) -> Self {
        Self {
            messenger,
            params,
            logger: Arc::new(NoCollaborationLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn CollaborationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub async fn execute(&self, input: NegotiateConsensusInput) -> ConsensusResult {
        let participants = input.participants;
        let mut state = ConsensusState::new();

        if participants.is_empty() {
            warn!("Negotiation started without participants");
            return ConsensusResult::undecided(0, state);
        }

        info!(
            "Starting negotiation with {} participants, up to {} rounds",
            participants.len(),
            input.max_rounds
        );

        for round in 1..=input.max_rounds {
            let previous = state.begin_round();
            let replies = self
                .messenger
                .broadcast_and_collect(
                    &participants,
                    MessageKind::Propose,
                    json!({
                        "action": "propose",
                        "decision": input.decision,
                        "round": round,
                        "previous_proposals": previous,
                    }),
                    self.params.round_timeout,
                )
                .await;

            for (agent, reply) in replies {
                let proposal = proposal_of(&reply.payload);
                if proposal.is_null() {
                    debug!(agent = %agent, round, "Empty proposal ignored");
                    continue;
                }
                state.record_proposal(agent, proposal);
            }

            let check = check_consensus(&state.proposals, self.params.consensus_threshold);
            state.record_check(check.clone());
            info!(
                round,
                proposals = state.proposals.len(),
                distinct = check.distinct_values,
                max_agreement = check.max_agreement,
                reached = check.consensus_reached,
                "Consensus round finished"
            );
            self.logger.log(CollaborationEvent::new(
                "consensus_round",
                json!({
                    "round": round,
                    "participants": participants,
                    "proposals": state.proposals,
                    "check": check,
                }),
            ));

            if check.consensus_reached
                && let Some(winner) = check.value.clone()
            {
                return self.vote(state, &participants, winner).await;
            }

            self.messenger.inform(
                &participants,
                MessageKind::Inform,
                json!({
                    "action": "consensus_status",
                    "round": round,
                    "proposals": state.proposals,
                    "distinct_values": check.distinct_values,
                    "max_agreement": check.max_agreement,
                }),
            );
        }

        warn!("No consensus after {} rounds", input.max_rounds);
        ConsensusResult::undecided(input.max_rounds, state)
    }

    /// Put `winner` to the vote and close the negotiation.
    async fn vote(&self, mut state: ConsensusState, participants: &[AgentId], winner: Value) -> ConsensusResult {
        let replies = self
            .messenger
            .broadcast_and_collect(
                participants,
                MessageKind::Vote,
                json!({
                    "action": "vote",
                    "round": state.round,
                    "proposal": winner,
                }),
                self.params.vote_timeout,
            )
            .await;

        for (agent, reply) in replies {
            let vote = vote_of(&reply.payload).unwrap_or_else(|| {
                debug!(agent = %agent, "Unreadable vote counted as abstain");
                VoteChoice::Abstain
            });
            state.record_vote(agent, vote);
        }

        let tally = state.tally(participants.len());
        state.set_decision(winner);
        state.set_agreement_level(tally.agreement());
        info!(
            round = state.round,
            agreement = tally.agreement(),
            "Vote closed: {}",
            tally.summary()
        );

        ConsensusResult::from_state(state)
    }
}

/// A proposal is the reply's `proposal` field, else its `result`, else the
/// whole payload.
fn proposal_of(payload: &Value) -> Value {
    payload
        .get("proposal")
        .or_else(|| payload.get("result"))
        .cloned()
        .unwrap_or_else(|| payload.clone())
}

/// A vote is the reply's `vote` field, else the whole payload.
fn vote_of(payload: &Value) -> Option<VoteChoice> {
    payload
        .get("vote")
        .and_then(VoteChoice::from_value)
        .or_else(|| VoteChoice::from_value(payload))
}
