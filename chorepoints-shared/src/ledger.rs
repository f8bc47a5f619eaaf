//! Points ledger arithmetic.
//!
//! A child carries two counters: `points_balance` is spendable and drops on
//! redemptions, `map_position` is cumulative and never decreases. Storage
//! wraps each operation here in a single transaction after re-reading the
//! account row.

use serde::{Deserialize, Serialize};

use crate::milestones::{MilestoneKind, MilestoneTable, ReachedMilestone};

/// Largest magnitude accepted for a single chore value, reward cost or
/// manual adjustment.
pub const MAX_ENTRY_POINTS: i32 = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsAccount {
    pub points_balance: i32,
    pub map_position: i32,
    /// Greatest static milestone ever awarded.
    pub highest_milestone: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient balance: balance={balance}, required={required}")]
pub struct InsufficientBalance {
    pub balance: i32,
    pub required: i32,
}

/// A credit or debit would take a counter outside the `i32` range. The
/// account is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("points out of range")]
pub struct PointsOverflow;

impl PointsAccount {
    /// Credits an approved chore completion and awards milestone bonuses.
    pub fn apply_chore(
        &mut self,
        table: &MilestoneTable,
        points: i32,
    ) -> Result<Vec<ReachedMilestone>, PointsOverflow> {
        debug_assert!(points >= 0, "chore points are never negative");
        self.earn(table, points.max(0))
    }

    /// Applies a manual adjustment. Positive amounts also advance the map;
    /// zero or negative ones only touch the balance, which may go negative.
    pub fn apply_adjustment(
        &mut self,
        table: &MilestoneTable,
        points: i32,
    ) -> Result<Vec<ReachedMilestone>, PointsOverflow> {
        if points > 0 {
            return self.earn(table, points);
        }
        self.points_balance = self
            .points_balance
            .checked_add(points)
            .ok_or(PointsOverflow)?;
        Ok(Vec::new())
    }

    /// Spends `cost` from the balance. The map position is untouched.
    pub fn apply_redemption(&mut self, cost: i32) -> Result<(), InsufficientBalance> {
        if self.points_balance < cost {
            return Err(InsufficientBalance {
                balance: self.points_balance,
                required: cost,
            });
        }
        // cannot underflow: balance >= cost >= 0
        self.points_balance -= cost;
        Ok(())
    }

    fn earn(
        &mut self,
        table: &MilestoneTable,
        points: i32,
    ) -> Result<Vec<ReachedMilestone>, PointsOverflow> {
        let mut next = *self;
        next.points_balance = next
            .points_balance
            .checked_add(points)
            .ok_or(PointsOverflow)?;
        next.map_position = next
            .map_position
            .checked_add(points)
            .ok_or(PointsOverflow)?;

        // Crossings come from the initial move only; positions reached via
        // bonuses are not re-scanned.
        let crossed = table.crossed(self.map_position, next.map_position);
        for m in &crossed {
            next.points_balance = next
                .points_balance
                .checked_add(m.bonus())
                .ok_or(PointsOverflow)?;
            next.map_position = next
                .map_position
                .checked_add(m.bonus())
                .ok_or(PointsOverflow)?;
            if m.kind == MilestoneKind::Static {
                next.highest_milestone = next.highest_milestone.max(m.position());
            }
        }
        *self = next;
        Ok(crossed)
    }
}

/// Result of submitting a chore completion or redemption request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission<T> {
    Created(T),
    /// A pending record for the same pair already exists; nothing was created.
    AlreadyPending(T),
}

impl<T> Submission<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Submission::Created(_))
    }

    pub fn record(&self) -> &T {
        match self {
            Submission::Created(r) | Submission::AlreadyPending(r) => r,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            Submission::Created(r) | Submission::AlreadyPending(r) => r,
        }
    }
}

/// Result of approving or rejecting a pending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved {
        account: PointsAccount,
        milestones: Vec<ReachedMilestone>,
    },
    Rejected,
    /// The record was already processed; nothing changed.
    NotPending,
    /// Redemption left pending because the balance does not cover it.
    InsufficientBalance(InsufficientBalance),
    /// No such record visible to the caller.
    NotFound,
}

impl Decision {
    /// Whether the record changed state.
    pub fn is_applied(&self) -> bool {
        matches!(self, Decision::Approved { .. } | Decision::Rejected)
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Approved { .. } => "approved",
            Decision::Rejected => "rejected",
            Decision::NotPending => "not_pending",
            Decision::InsufficientBalance(_) => "insufficient_balance",
            Decision::NotFound => "not_found",
        }
    }
}
