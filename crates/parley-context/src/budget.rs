//! History budgeting.
//!
//! The budget is a message count, not a token count. Long messages can still
//! overflow a model's context window.

use crate::history::HistoryEntry;

/// Number of history turns kept by the default policy.
pub const DEFAULT_HISTORY_LIMIT: usize = 15;

/// Decides which part of the time-ordered history is sent to the model.
pub trait BudgetPolicy: Send + Sync {
    /// Trim `history` (oldest first) to the entries that fit the budget,
    /// preserving order.
    fn apply(&self, history: Vec<HistoryEntry>) -> Vec<HistoryEntry>;
}

/// Keep only the most recent `n` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastN(pub usize);

impl Default for LastN {
    fn default() -> Self {
        Self(DEFAULT_HISTORY_LIMIT)
    }
}

impl BudgetPolicy for LastN {
    fn apply(&self, mut history: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
        let excess = history.len().saturating_sub(self.0);
        history.drain(..excess);
        history
    }
}
