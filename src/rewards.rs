// Reward rules: decides whether a completion transition earns coins

use crate::models::{RewardableUnit, UnitKind};
use crate::tracker::{CompletionState, Transition};

/// What the ledger should do for one completion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardDecision {
    pub grant: bool,
    pub amount: i64,
    pub reason: String,
    pub unit: RewardableUnit,
}

/// Human-readable ledger note for a unit.
pub fn reward_note(unit: &RewardableUnit) -> String {
    match unit.kind {
        UnitKind::Quiz => format!("Passed quiz: {}", unit.title),
        UnitKind::Chapter => format!("Completed chapter: {}", unit.title),
    }
}

/// Grant iff the unit carries coins, the new state is reached and the unit
/// had never been reached before. Once earned, a reward is never re-earned
/// and never revoked.
pub fn evaluate(transition: &Transition, unit: &RewardableUnit) -> RewardDecision {
    let first_time = transition.current == CompletionState::Reached
        && transition.prior != CompletionState::Reached;
    let grant = unit.coin_value > 0 && first_time;

    RewardDecision {
        grant,
        amount: if grant { i64::from(unit.coin_value) } else { 0 },
        reason: reward_note(unit),
        unit: unit.clone(),
    }
}
