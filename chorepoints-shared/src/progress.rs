//! Read-only views derived from a child's balance and map position.
//!
//! Nothing here is persisted; callers recompute on every read.

use serde::{Deserialize, Serialize};

use crate::milestones::{Milestone, MilestoneTable, ReachedMilestone};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneStatus {
    #[serde(flatten)]
    pub milestone: Milestone,
    pub achieved: bool,
    /// Points still needed; zero once achieved.
    pub points_to_go: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapProgress {
    pub current_position: i32,
    pub current_milestone: Option<ReachedMilestone>,
    pub next_milestone: ReachedMilestone,
    /// 0..=100, linear within the segment between current and next.
    pub progress_percentage: u8,
    pub points_needed: i32,
    /// Every static milestone has been reached.
    pub completed_all: bool,
    pub milestones: Vec<MilestoneStatus>,
}

pub fn map_progress(table: &MilestoneTable, position: i32) -> MapProgress {
    let current = table.current_at(position);
    let next = table.next_after(position);
    let prev = current.as_ref().map(ReachedMilestone::position).unwrap_or(0);
    let progress_percentage = percentage(position - prev, next.position() - prev);
    let milestones = table
        .thresholds()
        .iter()
        .map(|m| MilestoneStatus {
            milestone: m.clone(),
            achieved: position >= m.position,
            points_to_go: (m.position - position).max(0),
        })
        .collect();
    MapProgress {
        current_position: position,
        points_needed: next.position() - position,
        current_milestone: current,
        next_milestone: next,
        progress_percentage,
        completed_all: position >= table.last_position(),
        milestones,
    }
}

fn percentage(done: i32, total: i32) -> u8 {
    if total <= 0 || done <= 0 {
        return 0;
    }
    let pct = i64::from(done) * 100 / i64::from(total);
    pct.clamp(0, 100) as u8
}

/// Progress towards the cheapest reward the child cannot yet afford.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTarget<T> {
    pub reward: T,
    pub progress_percentage: u8,
    pub affordable: bool,
}

/// Picks the first reward (by ascending cost) costing more than `balance`.
///
/// When every reward is affordable the most expensive one is returned at
/// 100%. `rewards` must already be sorted by cost.
pub fn next_reward<T: Clone>(
    rewards: &[T],
    balance: i32,
    cost: impl Fn(&T) -> i32,
) -> Option<RewardTarget<T>> {
    if let Some(r) = rewards.iter().find(|r| cost(r) > balance) {
        return Some(RewardTarget {
            reward: r.clone(),
            progress_percentage: percentage(balance, cost(r)),
            affordable: false,
        });
    }
    rewards.last().map(|r| RewardTarget {
        reward: r.clone(),
        progress_percentage: 100,
        affordable: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milestones::MilestoneKind;

    #[test]
    fn zero_position() {
        let p = map_progress(&MilestoneTable::default(), 0);
        assert!(p.current_milestone.is_none());
        assert_eq!(p.next_milestone.position(), 50);
        assert_eq!(p.progress_percentage, 0);
        assert_eq!(p.points_needed, 50);
        assert!(!p.completed_all);
        assert_eq!(p.milestones.len(), 10);
        assert!(p.milestones.iter().all(|m| !m.achieved));
    }

    #[test]
    fn interpolates_within_segment() {
        let t = MilestoneTable::default();
        let p = map_progress(&t, 90);
        assert_eq!(p.current_milestone.unwrap().position(), 50);
        assert_eq!(p.next_milestone.position(), 100);
        assert_eq!(p.progress_percentage, 80);
        assert_eq!(p.points_needed, 10);

        let p = map_progress(&t, 25);
        assert_eq!(p.progress_percentage, 50);

        // floor, not round
        let p = map_progress(&t, 233);
        assert_eq!(p.progress_percentage, 33);
    }

    #[test]
    fn exactly_on_threshold_is_zero_percent() {
        let p = map_progress(&MilestoneTable::default(), 100);
        assert_eq!(p.current_milestone.unwrap().position(), 100);
        assert_eq!(p.next_milestone.position(), 200);
        assert_eq!(p.progress_percentage, 0);
        assert_eq!(p.milestones[1].points_to_go, 0);
        assert_eq!(p.milestones[2].points_to_go, 100);
    }

    #[test]
    fn past_the_table() {
        let t = MilestoneTable::default();
        let p = map_progress(&t, 3000);
        assert!(p.completed_all);
        assert_eq!(p.next_milestone.position(), 3500);
        assert_eq!(p.next_milestone.kind, MilestoneKind::Interval);
        assert_eq!(p.progress_percentage, 0);

        // The segment runs from the last static threshold, not from the
        // interval milestone already passed.
        let p = map_progress(&t, 3750);
        assert_eq!(p.current_milestone.as_ref().unwrap().position(), 3000);
        assert_eq!(p.next_milestone.position(), 4000);
        assert_eq!(p.progress_percentage, 75);
        assert_eq!(p.points_needed, 250);

        let p = map_progress(&t, 3700);
        assert_eq!(p.progress_percentage, 70);

        let p = map_progress(&t, 3500);
        let current = p.current_milestone.unwrap();
        assert_eq!(current.position(), 3000);
        assert_eq!(current.kind, MilestoneKind::Static);
        assert_eq!(p.next_milestone.position(), 4000);
        assert_eq!(p.progress_percentage, 50);
    }

    #[test]
    fn next_reward_choice() {
        let costs = vec![5, 10, 20];
        let t = next_reward(&costs, 7, |c| *c).unwrap();
        assert_eq!(t.reward, 10);
        assert_eq!(t.progress_percentage, 70);
        assert!(!t.affordable);

        let t = next_reward(&costs, 25, |c| *c).unwrap();
        assert_eq!(t.reward, 20);
        assert_eq!(t.progress_percentage, 100);
        assert!(t.affordable);

        let t = next_reward(&costs, -4, |c| *c).unwrap();
        assert_eq!(t.reward, 5);
        assert_eq!(t.progress_percentage, 0);

        assert!(next_reward(&Vec::<i32>::new(), 3, |c| *c).is_none());
    }
}
