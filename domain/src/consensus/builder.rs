//! Stateless consensus building blocks.
//!
//! Every function here is pure: proposals and votes go in as maps keyed by
//! [`AgentId`], results come out. Iteration is always in ascending agent-id
//! order, which is what every tie-break below relies on.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Default share of participants that must agree on one value.
pub const DEFAULT_CONSENSUS_THRESHOLD: f64 = 0.7;

/// Tolerance for threshold comparisons, so that e.g. `3/4 >= 0.75` holds.
const EPSILON: f64 = 1e-9;

/// Result of [`check_consensus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusCheck {
    pub consensus_reached: bool,
    /// The agreed value, when consensus was reached.
    pub value: Option<Value>,
    /// Share of proposals backing `value` (0 when not reached).
    pub agreement: f64,
    /// Number of structurally distinct proposals.
    pub distinct_values: usize,
    /// Share of proposals backing the most common value.
    pub max_agreement: f64,
}

impl ConsensusCheck {
    fn none(distinct_values: usize, max_agreement: f64) -> Self {
        Self {
            consensus_reached: false,
            value: None,
            agreement: 0.0,
            distinct_values,
            max_agreement,
        }
    }
}

/// Group equal values, keeping first-seen order. Returns `(value, count)`.
fn frequencies<'a>(values: impl IntoIterator<Item = &'a Value>) -> Vec<(&'a Value, usize)> {
    let mut groups: Vec<(&Value, usize)> = Vec::new();
    for value in values {
        match groups.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => groups.push((value, 1)),
        }
    }
    groups
}

/// Decide whether the proposals agree.
///
/// - all proposals structurally identical: consensus with agreement `1.0`
/// - otherwise the most common value wins when its share of the proposals
///   is at least `threshold`, which is the same as the dissenting share
///   being at most `1 - threshold`
///
/// The number of distinct values does not matter: with 3 × "A" and 1 × "B"
/// half the values are distinct, yet "A" holds 0.75 and wins at 0.7.
///
/// Equal counts go to the value proposed by the lowest agent id.
///
/// # Example
///
/// ```
/// use concord_domain::consensus::check_consensus;
/// use concord_domain::AgentId;
/// use serde_json::json;
/// use std::collections::BTreeMap;
///
/// let proposals: BTreeMap<AgentId, _> = [("a", "A"), ("b", "A"), ("c", "A"), ("d", "B")]
///     .into_iter()
///     .map(|(id, v)| (AgentId::new(id), json!(v)))
///     .collect();
///
/// let check = check_consensus(&proposals, 0.7);
/// assert!(check.consensus_reached);
/// assert_eq!(check.value, Some(json!("A")));
/// assert!(!check_consensus(&proposals, 0.76).consensus_reached);
/// ```
pub fn check_consensus(proposals: &BTreeMap<AgentId, Value>, threshold: f64) -> ConsensusCheck {
    if proposals.is_empty() {
        return ConsensusCheck::none(0, 0.0);
    }

    let total = proposals.len() as f64;
    let groups = frequencies(proposals.values());

    if groups.len() == 1 {
        return ConsensusCheck {
            consensus_reached: true,
            value: Some(groups[0].0.clone()),
            agreement: 1.0,
            distinct_values: 1,
            max_agreement: 1.0,
        };
    }

    // First maximum wins.
    let (top_value, top_count) = groups
        .iter()
        .copied()
        .fold(None, |best: Option<(&Value, usize)>, (value, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((value, count)),
        })
        .unwrap_or((groups[0].0, groups[0].1));

    let share = top_count as f64 / total;

    if share + EPSILON >= threshold {
        ConsensusCheck {
            consensus_reached: true,
            value: Some(top_value.clone()),
            agreement: share,
            distinct_values: groups.len(),
            max_agreement: share,
        }
    } else {
        ConsensusCheck::none(groups.len(), share)
    }
}

/// Merge a list of values with the per-type rule:
/// numbers average, strings take the mode, arrays take the set union, and
/// anything else takes the first non-null value.
fn merge_values(values: &[&Value]) -> Value {
    let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
    let Some(first) = present.first() else {
        return Value::Null;
    };

    if present.iter().all(|v| v.is_number()) {
        let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        return serde_json::Number::from_f64(mean)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }

    if present.iter().all(|v| v.is_string()) {
        let groups = frequencies(present.iter().copied());
        let mut mode = groups[0];
        for group in &groups[1..] {
            if group.1 > mode.1 {
                mode = *group;
            }
        }
        return mode.0.clone();
    }

    if present.iter().all(|v| v.is_array()) {
        let mut union: Vec<Value> = Vec::new();
        for item in present.iter().filter_map(|v| v.as_array()).flatten() {
            if !union.contains(item) {
                union.push(item.clone());
            }
        }
        return Value::Array(union);
    }

    (*first).clone()
}

/// Synthesize one proposal out of many.
///
/// Object proposals are merged key by key; non-object proposals (when no
/// proposal is an object) are merged as a whole. Numeric averages are always
/// floating point.
pub fn find_compromise(proposals: &BTreeMap<AgentId, Value>) -> Value {
    let objects: Vec<&Map<String, Value>> =
        proposals.values().filter_map(Value::as_object).collect();

    if objects.is_empty() {
        let values: Vec<&Value> = proposals.values().collect();
        return merge_values(&values);
    }

    let mut keys: Vec<&String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    let merged: Map<String, Value> = keys
        .into_iter()
        .map(|key| {
            let values: Vec<&Value> = objects.iter().filter_map(|o| o.get(key)).collect();
            (key.clone(), merge_values(&values))
        })
        .collect();

    Value::Object(merged)
}

/// Winner of a weighted vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedVote {
    pub winner: Value,
    /// Summed weight behind `winner`.
    pub weight: f64,
    /// Summed weight of every vote cast.
    pub total_weight: f64,
}

/// Sum weights per distinct vote value and return the heaviest.
///
/// Voters missing from `weights` count with `default_weight`. Equal sums go
/// to the value seen first in ascending voter-id order.
pub fn weighted_voting(
    votes: &BTreeMap<AgentId, Value>,
    weights: &HashMap<AgentId, f64>,
    default_weight: f64,
) -> Option<WeightedVote> {
    let mut sums: Vec<(&Value, f64)> = Vec::new();
    for (voter, value) in votes {
        let weight = weights.get(voter).copied().unwrap_or(default_weight);
        match sums.iter_mut().find(|(v, _)| *v == value) {
            Some((_, sum)) => *sum += weight,
            None => sums.push((value, weight)),
        }
    }

    let total_weight: f64 = sums.iter().map(|(_, w)| w).sum();
    let mut best: Option<(&Value, f64)> = None;
    for (value, sum) in sums {
        match best {
            Some((_, best_sum)) if best_sum >= sum => {}
            _ => best = Some((value, sum)),
        }
    }

    best.map(|(value, weight)| WeightedVote {
        winner: value.clone(),
        weight,
        total_weight,
    })
}

/// Pairwise agreement between voters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementMatrix {
    /// Row/column labels, ascending.
    pub agents: Vec<AgentId>,
    pub values: Vec<Vec<f64>>,
}

impl AgreementMatrix {
    pub fn get(&self, a: &AgentId, b: &AgentId) -> Option<f64> {
        let i = self.agents.iter().position(|x| x == a)?;
        let j = self.agents.iter().position(|x| x == b)?;
        Some(self.values[i][j])
    }

    /// Mean off-diagonal agreement; `1.0` for fewer than two voters.
    pub fn mean_agreement(&self) -> f64 {
        let n = self.agents.len();
        if n < 2 {
            return 1.0;
        }
        let mut sum = 0.0;
        for (i, row) in self.values.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                if i != j {
                    sum += value;
                }
            }
        }
        sum / (n * (n - 1)) as f64
    }
}

/// Symmetric matrix with 1.0 on the diagonal and 1.0 off the diagonal iff
/// the two voters' values compare equal.
pub fn pairwise_agreement_matrix(votes: &BTreeMap<AgentId, Value>) -> AgreementMatrix {
    let agents: Vec<AgentId> = votes.keys().cloned().collect();
    let entries: Vec<&Value> = votes.values().collect();

    let values = entries
        .iter()
        .enumerate()
        .map(|(i, a)| {
            entries
                .iter()
                .enumerate()
                .map(|(j, b)| if i == j || a == b { 1.0 } else { 0.0 })
                .collect()
        })
        .collect();

    AgreementMatrix { agents, values }
}
