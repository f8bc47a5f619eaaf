use crate::storage::schema::{
    children, chore_logs, chores, point_adjustments, redemptions, rewards, sessions,
};
use chorepoints_shared::domain::{MapTheme, RecordStatus};
use chorepoints_shared::ledger::PointsAccount;
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = children)]
pub struct Child {
    pub id: i32,
    pub parent: String,
    pub display_name: String,
    pub pin_hash: String,
    pub points_balance: i32,
    pub map_position: i32,
    pub highest_milestone: i32,
    pub active: bool,
    pub avatar_emoji: Option<String>,
    pub map_theme: String,
    pub created_at: NaiveDateTime,
}

impl Child {
    pub fn points(&self) -> PointsAccount {
        PointsAccount {
            points_balance: self.points_balance,
            map_position: self.map_position,
            highest_milestone: self.highest_milestone,
        }
    }

    pub fn theme(&self) -> MapTheme {
        self.map_theme.parse().unwrap_or_default()
    }
}

#[derive(Insertable)]
#[diesel(table_name = children)]
pub struct NewChild<'a> {
    pub parent: &'a str,
    pub display_name: &'a str,
    pub pin_hash: &'a str,
    pub avatar_emoji: Option<&'a str>,
    pub map_theme: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = chores)]
pub struct Chore {
    pub id: i32,
    pub parent: String,
    pub title: String,
    pub points: i32,
    pub active: bool,
    pub icon_emoji: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = chores)]
pub struct NewChore<'a> {
    pub parent: &'a str,
    pub title: &'a str,
    pub points: i32,
    pub icon_emoji: Option<&'a str>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = chores)]
pub struct ChoreChanges {
    pub title: Option<String>,
    pub points: Option<i32>,
    pub active: Option<bool>,
    pub icon_emoji: Option<Option<String>>,
}

impl ChoreChanges {
    pub fn is_noop(&self) -> bool {
        self.title.is_none()
            && self.points.is_none()
            && self.active.is_none()
            && self.icon_emoji.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = rewards)]
pub struct Reward {
    pub id: i32,
    pub parent: String,
    pub title: String,
    pub cost_points: i32,
    pub active: bool,
    pub icon_emoji: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = rewards)]
pub struct NewReward<'a> {
    pub parent: &'a str,
    pub title: &'a str,
    pub cost_points: i32,
    pub icon_emoji: Option<&'a str>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = rewards)]
pub struct RewardChanges {
    pub title: Option<String>,
    pub cost_points: Option<i32>,
    pub active: Option<bool>,
    pub icon_emoji: Option<Option<String>>,
}

impl RewardChanges {
    pub fn is_noop(&self) -> bool {
        self.title.is_none()
            && self.cost_points.is_none()
            && self.active.is_none()
            && self.icon_emoji.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = chore_logs)]
#[diesel(belongs_to(Child, foreign_key = child_id))]
#[diesel(belongs_to(Chore, foreign_key = chore_id))]
pub struct ChoreLog {
    pub id: i32,
    pub child_id: i32,
    pub chore_id: i32,
    pub points_awarded: i32,
    pub status: String,
    pub submitted_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
}

impl ChoreLog {
    pub fn status(&self) -> RecordStatus {
        parse_status(&self.status)
    }
}

#[derive(Insertable)]
#[diesel(table_name = chore_logs)]
pub struct NewChoreLog<'a> {
    pub child_id: i32,
    pub chore_id: i32,
    pub points_awarded: i32,
    pub status: &'a str,
    pub submitted_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = redemptions)]
#[diesel(belongs_to(Child, foreign_key = child_id))]
#[diesel(belongs_to(Reward, foreign_key = reward_id))]
pub struct Redemption {
    pub id: i32,
    pub child_id: i32,
    pub reward_id: i32,
    pub cost_points: i32,
    pub status: String,
    pub submitted_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
}

impl Redemption {
    pub fn status(&self) -> RecordStatus {
        parse_status(&self.status)
    }
}

#[derive(Insertable)]
#[diesel(table_name = redemptions)]
pub struct NewRedemption<'a> {
    pub child_id: i32,
    pub reward_id: i32,
    pub cost_points: i32,
    pub status: &'a str,
    pub submitted_at: NaiveDateTime,
}

/// Chore log joined with the names needed for display.
#[derive(Debug, Clone)]
pub struct ChoreLogView {
    pub log: ChoreLog,
    pub child_name: String,
    pub chore_title: String,
}

/// Redemption joined with the names needed for display.
#[derive(Debug, Clone)]
pub struct RedemptionView {
    pub redemption: Redemption,
    pub child_name: String,
    pub reward_title: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = point_adjustments)]
#[diesel(belongs_to(Child, foreign_key = child_id))]
pub struct PointAdjustment {
    pub id: i32,
    pub parent: String,
    pub child_id: i32,
    pub points: i32,
    pub reason: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = point_adjustments)]
pub struct NewPointAdjustment<'a> {
    pub parent: &'a str,
    pub child_id: i32,
    pub points: i32,
    pub reason: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = sessions)]
#[diesel(primary_key(jti))]
pub struct Session {
    pub jti: String,
    pub username: String,
    pub issued_at: NaiveDateTime,
    pub last_used_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub jti: &'a str,
    pub username: &'a str,
}

fn parse_status(raw: &str) -> RecordStatus {
    // Only the ledger writes this column; anything unknown is treated as
    // already processed so it can never be approved.
    raw.parse().unwrap_or(RecordStatus::Rejected)
}
