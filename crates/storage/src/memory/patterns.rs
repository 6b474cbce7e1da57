// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern mining and guard evaluation.
//!
//! The miner runs on a schedule (and cheaply after consensus writes),
//! deriving behavioral patterns from status history, consensus edges, and
//! contradictions. Risk scores decay with time so stale patterns fade
//! instead of accumulating forever. Guards bind a small predicate
//! language over claim state to a warn/escalate action; hard blocking is
//! deliberately not offered.

use std::collections::HashMap;

use troupe_core::claim::{ClaimId, ClaimStatus, GuardAction, Pattern, PatternId, PatternKind};
use troupe_core::ConsensusPosition;

use super::state::MemoryState;

/// Window the miner looks back over.
const MINING_WINDOW_MS: u64 = 6 * 60 * 60 * 1000;
/// Risk halves every two hours without fresh evidence.
const RISK_HALF_LIFE_MS: u64 = 2 * 60 * 60 * 1000;
/// Status flips on one claim within the window that count as a loop.
const HANDOFF_LOOP_FLIPS: usize = 4;
/// Contradiction rows on one claim that form a cluster.
const CONTRADICTION_CLUSTER_SIZE: usize = 2;
/// Contested/pendingProof age that counts as a stall.
const STALL_AGE_MS: u64 = 60 * 60 * 1000;
/// Challenges by a single agent within the window that suggest a spiral.
const ESCALATION_CHALLENGES: usize = 3;

/// Exponential time decay in [0, 1].
pub fn decay(now_ms: u64, last_seen_ms: u64) -> f64 {
    let age = now_ms.saturating_sub(last_seen_ms) as f64;
    0.5_f64.powf(age / RISK_HALF_LIFE_MS as f64)
}

/// One detected pattern occurrence, before merging with known patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub kind: PatternKind,
    pub claim_id: Option<ClaimId>,
    pub frequency: u32,
    pub last_seen_ms: u64,
}

impl Detection {
    /// Merge with the previously mined pattern of the same identity.
    pub fn into_pattern(self, existing: Option<&Pattern>, now_ms: u64) -> Pattern {
        let risk = f64::from(self.frequency) * decay(now_ms, self.last_seen_ms);
        match existing {
            Some(known) => Pattern {
                pattern_id: known.pattern_id,
                kind: self.kind,
                frequency: self.frequency.max(known.frequency),
                risk_score: risk.max(known.risk_score * decay(now_ms, known.last_seen_ms)),
                claim_id: self.claim_id,
                first_seen_ms: known.first_seen_ms,
                last_seen_ms: self.last_seen_ms,
            },
            None => Pattern {
                pattern_id: PatternId::new(),
                kind: self.kind,
                frequency: self.frequency,
                risk_score: risk,
                claim_id: self.claim_id,
                first_seen_ms: self.last_seen_ms,
                last_seen_ms: self.last_seen_ms,
            },
        }
    }
}

/// Scan state for pattern occurrences inside the mining window.
pub fn detect(state: &MemoryState, now_ms: u64) -> Vec<Detection> {
    let cutoff = now_ms.saturating_sub(MINING_WINDOW_MS);
    let mut detections = Vec::new();

    // handoff_loop: a claim bouncing between contested and confirmed.
    let mut flips: HashMap<ClaimId, (usize, u64)> = HashMap::new();
    for change in &state.status_history {
        if change.changed_at_ms < cutoff {
            continue;
        }
        let is_flip = matches!(
            (change.previous, change.next),
            (ClaimStatus::Contested, ClaimStatus::Confirmed)
                | (ClaimStatus::Confirmed, ClaimStatus::Contested)
        );
        if is_flip {
            let entry = flips.entry(change.claim_id).or_insert((0, 0));
            entry.0 += 1;
            entry.1 = entry.1.max(change.changed_at_ms);
        }
    }
    for (claim_id, (count, last_seen)) in flips {
        if count >= HANDOFF_LOOP_FLIPS {
            detections.push(Detection {
                kind: PatternKind::HandoffLoop,
                claim_id: Some(claim_id),
                frequency: count as u32,
                last_seen_ms: last_seen,
            });
        }
    }

    // contradiction_cluster: repeated disagreement on one claim.
    let mut clusters: HashMap<ClaimId, (usize, u64)> = HashMap::new();
    for row in &state.contradictions {
        if row.detected_at_ms < cutoff {
            continue;
        }
        let entry = clusters.entry(row.claim_id).or_insert((0, 0));
        entry.0 += 1;
        entry.1 = entry.1.max(row.detected_at_ms);
    }
    for (claim_id, (count, last_seen)) in clusters {
        if count >= CONTRADICTION_CLUSTER_SIZE {
            detections.push(Detection {
                kind: PatternKind::ContradictionCluster,
                claim_id: Some(claim_id),
                frequency: count as u32,
                last_seen_ms: last_seen,
            });
        }
    }

    // stall: contested or proof-gated claims nobody is resolving.
    for claim in state.claims.values() {
        let gated = matches!(claim.status, ClaimStatus::Contested | ClaimStatus::PendingProof);
        if gated && now_ms.saturating_sub(claim.updated_at_ms) >= STALL_AGE_MS {
            detections.push(Detection {
                kind: PatternKind::Stall,
                claim_id: Some(claim.claim_id),
                frequency: 1,
                last_seen_ms: claim.updated_at_ms,
            });
        }
    }

    // escalation_spiral: one agent challenging broadly in a short window.
    let mut challenges: HashMap<troupe_core::Role, (usize, u64)> = HashMap::new();
    for edges in state.consensus.values() {
        for edge in edges {
            if edge.position == ConsensusPosition::Challenge && edge.recorded_at_ms >= cutoff {
                let entry = challenges.entry(edge.agent).or_insert((0, 0));
                entry.0 += 1;
                entry.1 = entry.1.max(edge.recorded_at_ms);
            }
        }
    }
    for (_agent, (count, last_seen)) in challenges {
        if count >= ESCALATION_CHALLENGES {
            detections.push(Detection {
                kind: PatternKind::EscalationSpiral,
                claim_id: None,
                frequency: count as u32,
                last_seen_ms: last_seen,
            });
        }
    }

    detections
}

/// One tripped guard.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardHit {
    pub guard_id: troupe_core::GuardId,
    pub action: GuardAction,
    pub trigger: String,
}

/// Evaluate every guard against one claim's current state.
///
/// Triggers are conjunctions of simple comparisons, e.g.
/// `status == contested && challenges >= 2`. Supported fields: `status`,
/// `challenges`, `supports`, `confidence`, `risk` (max risk of patterns
/// citing the claim). Malformed clauses evaluate false rather than
/// tripping spuriously.
pub fn evaluate_guards(state: &MemoryState, claim_id: &ClaimId, now_ms: u64) -> Vec<GuardHit> {
    let claim = match state.claims.get(claim_id) {
        Some(claim) => claim,
        None => return Vec::new(),
    };
    let (supports, challenges) = state.edge_counts(claim_id);
    let risk = state
        .patterns
        .values()
        .filter(|p| p.claim_id.as_ref() == Some(claim_id))
        .map(|p| p.risk_score * decay(now_ms, p.last_seen_ms))
        .fold(0.0_f64, f64::max);

    state
        .guards
        .values()
        .filter(|guard| {
            // A guard scoped to a source claim only fires for that claim.
            match &guard.source_claim {
                Some(source) if source != claim_id => return false,
                _ => {}
            }
            guard.trigger.split("&&").all(|clause| {
                eval_clause(clause.trim(), claim.status, supports, challenges, claim.confidence, risk)
            })
        })
        .map(|guard| GuardHit {
            guard_id: guard.guard_id,
            action: guard.action,
            trigger: guard.trigger.clone(),
        })
        .collect()
}

fn eval_clause(
    clause: &str,
    status: ClaimStatus,
    supports: usize,
    challenges: usize,
    confidence: f64,
    risk: f64,
) -> bool {
    let mut parts = clause.split_whitespace();
    let (field, op, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(f), Some(o), Some(v)) => (f, o, v),
        _ => return false,
    };
    match field {
        "status" => {
            let wanted = value.to_ascii_lowercase();
            let current = status.to_string().to_ascii_lowercase();
            match op {
                "==" => current == wanted,
                "!=" => current != wanted,
                _ => false,
            }
        }
        "challenges" => compare_count(op, challenges, value),
        "supports" => compare_count(op, supports, value),
        "confidence" => compare_float(op, confidence, value),
        "risk" => compare_float(op, risk, value),
        _ => false,
    }
}

fn compare_count(op: &str, actual: usize, value: &str) -> bool {
    let Ok(wanted) = value.parse::<usize>() else {
        return false;
    };
    match op {
        ">=" => actual >= wanted,
        ">" => actual > wanted,
        "<=" => actual <= wanted,
        "<" => actual < wanted,
        "==" => actual == wanted,
        "!=" => actual != wanted,
        _ => false,
    }
}

fn compare_float(op: &str, actual: f64, value: &str) -> bool {
    let Ok(wanted) = value.parse::<f64>() else {
        return false;
    };
    match op {
        ">=" => actual >= wanted,
        ">" => actual > wanted,
        "<=" => actual <= wanted,
        "<" => actual < wanted,
        _ => false,
    }
}

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod tests;
