//! Local view state around an awaited mutation
//!
//! The caller shows a prediction while the write is in flight, then either
//! adopts the persisted value or rolls back to the last confirmed one.

use serde::{Deserialize, Serialize};

/// Where a mutation stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState {
    /// Nothing in flight since the last confirmation
    Confirmed,
    /// A write is in flight; the prediction is shown
    Pending,
    /// The last write failed and was rolled back
    Failed(String),
}

/// A confirmed value with an optional pending prediction
#[derive(Debug, Clone)]
pub struct Optimistic<T> {
    confirmed: T,
    pending: Option<T>,
    state: MutationState,
}

impl<T: Clone> Optimistic<T> {
    pub fn new(confirmed: T) -> Self {
        Self {
            confirmed,
            pending: None,
            state: MutationState::Confirmed,
        }
    }

    /// Show `predicted` until the write settles
    pub fn begin(&mut self, predicted: T) {
        self.pending = Some(predicted);
        self.state = MutationState::Pending;
    }

    /// Adopt the value the store reported
    pub fn confirm(&mut self, actual: T) {
        self.confirmed = actual;
        self.pending = None;
        self.state = MutationState::Confirmed;
    }

    /// Drop the prediction and fall back to the confirmed value
    pub fn fail(&mut self, error: impl ToString) {
        self.pending = None;
        self.state = MutationState::Failed(error.to_string());
    }

    /// Settle with the outcome of the awaited write
    pub fn settle<E: ToString>(&mut self, outcome: std::result::Result<T, E>) {
        match outcome {
            Ok(actual) => self.confirm(actual),
            Err(e) => self.fail(e),
        }
    }

    pub fn current(&self) -> &T {
        self.pending.as_ref().unwrap_or(&self.confirmed)
    }

    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    pub fn state(&self) -> &MutationState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == MutationState::Pending
    }
}

/// What a like/follow/bookmark button shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipView {
    pub is_member: bool,
    pub count: usize,
}

impl MembershipView {
    /// Predicted view after the actor toggles
    pub fn toggled(self) -> Self {
        if self.is_member {
            Self {
                is_member: false,
                count: self.count.saturating_sub(1),
            }
        } else {
            Self {
                is_member: true,
                count: self.count + 1,
            }
        }
    }
}

impl From<&crate::mutator::MembershipChange> for MembershipView {
    fn from(change: &crate::mutator::MembershipChange) -> Self {
        Self {
            is_member: change.is_member,
            count: change.count,
        }
    }
}
