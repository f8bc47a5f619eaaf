//! Adventure-map milestones.
//!
//! A [`MilestoneTable`] holds the ascending list of statically defined
//! thresholds. Past the last one the table keeps going with synthetic
//! "interval" milestones at every multiple of [`MilestoneTable::interval`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_INTERVAL: i32 = 500;
pub const DEFAULT_INTERVAL_BONUS: i32 = 50;

const INTERVAL_NAME: &str = "Bonus";
const INTERVAL_ICON: &str = "🎁";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub position: i32,
    pub name: String,
    pub icon: String,
    pub bonus: i32,
}

impl Milestone {
    fn new(position: i32, name: &str, icon: &str, bonus: i32) -> Self {
        Self {
            position,
            name: name.to_string(),
            icon: icon.to_string(),
            bonus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneKind {
    /// Listed in the table.
    Static,
    /// Generated past the last static threshold.
    Interval,
}

/// A milestone together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachedMilestone {
    #[serde(flatten)]
    pub milestone: Milestone,
    pub kind: MilestoneKind,
}

impl ReachedMilestone {
    pub fn position(&self) -> i32 {
        self.milestone.position
    }

    pub fn bonus(&self) -> i32 {
        self.milestone.bonus
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MilestoneError {
    #[error("milestone table must not be empty")]
    Empty,
    #[error("milestone position must be positive: {0}")]
    NonPositive(i32),
    #[error("milestone positions must be strictly ascending ({prev} then {next})")]
    NotAscending { prev: i32, next: i32 },
    #[error("milestone bonus must not be negative at position {0}")]
    NegativeBonus(i32),
    #[error("interval must be positive: {0}")]
    BadInterval(i32),
    #[error("interval bonus must not be negative: {0}")]
    NegativeIntervalBonus(i32),
}

/// Raw form accepted from configuration; validated into a [`MilestoneTable`].
#[derive(Debug, Clone, Deserialize)]
pub struct MilestoneTableConfig {
    pub thresholds: Vec<Milestone>,
    #[serde(default = "default_interval")]
    pub interval: i32,
    #[serde(default = "default_interval_bonus")]
    pub interval_bonus: i32,
}

fn default_interval() -> i32 {
    DEFAULT_INTERVAL
}

fn default_interval_bonus() -> i32 {
    DEFAULT_INTERVAL_BONUS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MilestoneTableConfig")]
pub struct MilestoneTable {
    thresholds: Vec<Milestone>,
    interval: i32,
    interval_bonus: i32,
}

impl TryFrom<MilestoneTableConfig> for MilestoneTable {
    type Error = MilestoneError;
    fn try_from(raw: MilestoneTableConfig) -> Result<Self, Self::Error> {
        MilestoneTable::new(raw.thresholds, raw.interval, raw.interval_bonus)
    }
}

impl Default for MilestoneTable {
    fn default() -> Self {
        let thresholds = vec![
            Milestone::new(50, "Bronze Badge", "🥉", 10),
            Milestone::new(100, "Silver Badge", "🥈", 10),
            Milestone::new(200, "Gold Badge", "🥇", 15),
            Milestone::new(300, "Diamond Badge", "💎", 15),
            Milestone::new(500, "Crown Badge", "👑", 20),
            Milestone::new(750, "Star Badge", "⭐", 20),
            Milestone::new(1000, "Superstar", "🌟", 25),
            Milestone::new(1500, "Champion", "🏆", 30),
            Milestone::new(2000, "Legend", "🔥", 40),
            Milestone::new(3000, "Hero", "🚀", 50),
        ];
        Self {
            thresholds,
            interval: DEFAULT_INTERVAL,
            interval_bonus: DEFAULT_INTERVAL_BONUS,
        }
    }
}

impl MilestoneTable {
    pub fn new(
        thresholds: Vec<Milestone>,
        interval: i32,
        interval_bonus: i32,
    ) -> Result<Self, MilestoneError> {
        if thresholds.is_empty() {
            return Err(MilestoneError::Empty);
        }
        if interval <= 0 {
            return Err(MilestoneError::BadInterval(interval));
        }
        if interval_bonus < 0 {
            return Err(MilestoneError::NegativeIntervalBonus(interval_bonus));
        }
        let mut prev: Option<i32> = None;
        for m in &thresholds {
            if m.position <= 0 {
                return Err(MilestoneError::NonPositive(m.position));
            }
            if m.bonus < 0 {
                return Err(MilestoneError::NegativeBonus(m.position));
            }
            if let Some(p) = prev
                && m.position <= p
            {
                return Err(MilestoneError::NotAscending {
                    prev: p,
                    next: m.position,
                });
            }
            prev = Some(m.position);
        }
        Ok(Self {
            thresholds,
            interval,
            interval_bonus,
        })
    }

    pub fn thresholds(&self) -> &[Milestone] {
        &self.thresholds
    }

    pub fn interval(&self) -> i32 {
        self.interval
    }

    /// Position of the final statically defined milestone.
    pub fn last_position(&self) -> i32 {
        // non-empty by construction
        self.thresholds.last().map(|m| m.position).unwrap_or(0)
    }

    fn interval_milestone(&self, position: i32) -> ReachedMilestone {
        ReachedMilestone {
            milestone: Milestone::new(position, INTERVAL_NAME, INTERVAL_ICON, self.interval_bonus),
            kind: MilestoneKind::Interval,
        }
    }

    fn static_milestone(m: &Milestone) -> ReachedMilestone {
        ReachedMilestone {
            milestone: m.clone(),
            kind: MilestoneKind::Static,
        }
    }

    /// Milestones whose threshold lies in `(old, new]`, ascending.
    ///
    /// Interval milestones are every multiple of the interval strictly above
    /// the last static threshold.
    pub fn crossed(&self, old: i32, new: i32) -> Vec<ReachedMilestone> {
        if new <= old {
            return Vec::new();
        }
        let mut out: Vec<ReachedMilestone> = self
            .thresholds
            .iter()
            .filter(|m| old < m.position && m.position <= new)
            .map(Self::static_milestone)
            .collect();

        let floor = i64::from(old.max(self.last_position()));
        let step = i64::from(self.interval);
        let mut next = (floor.div_euclid(step) + 1) * step;
        while next <= i64::from(new) {
            // bounded by `new`, which is an i32
            out.push(self.interval_milestone(next as i32));
            next += step;
        }
        out
    }

    /// Highest static milestone whose threshold is `<= position`, if any.
    ///
    /// Interval milestones are never "current": past the table the progress
    /// segment runs from the last static threshold to the next interval one.
    pub fn current_at(&self, position: i32) -> Option<ReachedMilestone> {
        self.thresholds
            .iter()
            .take_while(|m| m.position <= position)
            .last()
            .map(Self::static_milestone)
    }

    /// Lowest milestone whose threshold is `> position`.
    pub fn next_after(&self, position: i32) -> ReachedMilestone {
        if let Some(m) = self.thresholds.iter().find(|m| m.position > position) {
            return Self::static_milestone(m);
        }
        let step = self.interval;
        self.interval_milestone((position.div_euclid(step) + 1) * step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(ms: &[ReachedMilestone]) -> Vec<i32> {
        ms.iter().map(ReachedMilestone::position).collect()
    }

    #[test]
    fn crossing_is_open_closed() {
        let t = MilestoneTable::default();
        assert_eq!(positions(&t.crossed(0, 50)), vec![50]);
        assert!(t.crossed(50, 99).is_empty());
        assert_eq!(positions(&t.crossed(49, 100)), vec![50, 100]);
        assert!(t.crossed(100, 100).is_empty());
    }

    #[test]
    fn large_jump_crosses_many() {
        let t = MilestoneTable::default();
        assert_eq!(
            positions(&t.crossed(0, 320)),
            vec![50, 100, 200, 300]
        );
    }

    #[test]
    fn interval_milestones_start_after_table() {
        let t = MilestoneTable::default();
        let crossed = t.crossed(2990, 3010);
        assert_eq!(positions(&crossed), vec![3000]);
        assert_eq!(crossed[0].kind, MilestoneKind::Static);

        let crossed = t.crossed(3000, 3500);
        assert_eq!(positions(&crossed), vec![3500]);
        assert_eq!(crossed[0].kind, MilestoneKind::Interval);
        assert_eq!(crossed[0].bonus(), DEFAULT_INTERVAL_BONUS);

        assert_eq!(positions(&t.crossed(3499, 5001)), vec![3500, 4000, 4500, 5000]);
    }

    #[test]
    fn jump_over_last_static_also_yields_intervals() {
        let t = MilestoneTable::default();
        let crossed = t.crossed(2900, 4100);
        assert_eq!(positions(&crossed), vec![3000, 3500, 4000]);
    }

    #[test]
    fn current_and_next() {
        let t = MilestoneTable::default();
        assert!(t.current_at(0).is_none());
        assert_eq!(t.next_after(0).position(), 50);
        assert_eq!(t.current_at(50).unwrap().position(), 50);
        assert_eq!(t.next_after(50).position(), 100);
        assert_eq!(t.current_at(3000).unwrap().position(), 3000);
        assert_eq!(t.next_after(3000).position(), 3500);
        let cur = t.current_at(3700).unwrap();
        assert_eq!(cur.position(), 3000);
        assert_eq!(cur.kind, MilestoneKind::Static);
        assert_eq!(t.next_after(3700).position(), 4000);
        assert_eq!(t.current_at(9999).unwrap().position(), 3000);
    }

    #[test]
    fn validation() {
        let m = |p, b| Milestone::new(p, "m", "*", b);
        assert_eq!(
            MilestoneTable::new(vec![], 500, 50),
            Err(MilestoneError::Empty)
        );
        assert_eq!(
            MilestoneTable::new(vec![m(10, 1), m(10, 1)], 500, 50),
            Err(MilestoneError::NotAscending { prev: 10, next: 10 })
        );
        assert_eq!(
            MilestoneTable::new(vec![m(0, 1)], 500, 50),
            Err(MilestoneError::NonPositive(0))
        );
        assert_eq!(
            MilestoneTable::new(vec![m(10, 1)], 0, 50),
            Err(MilestoneError::BadInterval(0))
        );
        assert!(MilestoneTable::new(vec![m(10, 1), m(20, 2)], 100, 5).is_ok());
    }

    #[test]
    fn table_deserializes_through_validation() {
        let raw = r#"{"thresholds":[{"position":5,"name":"a","icon":"x","bonus":1}],"interval":10}"#;
        let t: MilestoneTable = serde_json::from_str(raw).unwrap();
        assert_eq!(t.last_position(), 5);
        assert_eq!(t.interval(), 10);
        let bad = r#"{"thresholds":[]}"#;
        assert!(serde_json::from_str::<MilestoneTable>(bad).is_err());
    }
}
