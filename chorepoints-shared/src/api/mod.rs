use serde::{Deserialize, Serialize};

use crate::domain::{MapTheme, RecordStatus};
use crate::ledger::PointsAccount;
use crate::milestones::ReachedMilestone;
use crate::progress::{MapProgress, RewardTarget};

pub mod endpoints;

pub const API_V1_PREFIX: &str = "/api/v1";

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResp {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KidLoginReq {
    pub child_id: i32,
    pub pin: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KidLoginResp {
    pub token: String,
    pub child_id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionDto {
    pub version: String,
}

// Children
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildDto {
    pub id: i32,
    pub display_name: String,
    pub display_letter: String,
    pub avatar_emoji: Option<String>,
    pub map_theme: MapTheme,
    pub points_balance: i32,
    pub map_position: i32,
    pub highest_milestone: i32,
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChildReq {
    pub display_name: String,
    pub pin: String,
    pub avatar_emoji: Option<String>,
    pub map_theme: Option<MapTheme>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePinReq {
    pub pin: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChildDetailDto {
    pub child: ChildDto,
    pub progress: MapProgress,
}

// Chore and reward definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreDto {
    pub id: i32,
    pub title: String,
    pub points: i32,
    pub active: bool,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardDto {
    pub id: i32,
    pub title: String,
    pub cost_points: i32,
    pub active: bool,
    pub icon: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChoreReq {
    pub title: String,
    pub points: i32,
    pub icon_emoji: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateChoreReq {
    pub title: Option<String>,
    pub points: Option<i32>,
    pub active: Option<bool>,
    pub icon_emoji: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRewardReq {
    pub title: String,
    pub cost_points: i32,
    pub icon_emoji: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateRewardReq {
    pub title: Option<String>,
    pub cost_points: Option<i32>,
    pub active: Option<bool>,
    pub icon_emoji: Option<String>,
}

// Ledger records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreLogDto {
    pub id: i32,
    pub child_id: i32,
    pub child_name: String,
    pub chore_id: i32,
    pub chore_title: String,
    pub points_awarded: i32,
    pub status: RecordStatus,
    pub submitted_at: String,         // RFC3339 UTC
    pub processed_at: Option<String>, // RFC3339 UTC
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionDto {
    pub id: i32,
    pub child_id: i32,
    pub child_name: String,
    pub reward_id: i32,
    pub reward_title: String,
    pub cost_points: i32,
    pub status: RecordStatus,
    pub submitted_at: String,
    pub processed_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResp<T> {
    /// False when an identical request was already pending.
    pub created: bool,
    pub record: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionResp {
    pub applied: bool,
    pub outcome: String,
    pub account: Option<PointsAccount>,
    #[serde(default)]
    pub milestones: Vec<ReachedMilestone>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Approve,
    Reject,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkReq {
    pub ids: Vec<i32>,
    pub action: BulkAction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkResp {
    pub requested: usize,
    pub applied: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingCountDto {
    pub chores: i64,
    pub redemptions: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StatusFilter {
    pub status: Option<RecordStatus>,
}

// Manual adjustments
#[derive(Debug, Serialize, Deserialize)]
pub struct AdjustmentReq {
    pub points: i32,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentDto {
    pub id: i32,
    pub child_id: i32,
    pub parent: String,
    pub points: i32,
    pub reason: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdjustmentResp {
    pub adjustment: AdjustmentDto,
    pub account: PointsAccount,
    pub milestones: Vec<ReachedMilestone>,
}

// Kid dashboard
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HomeQuery {
    /// RFC3339; approvals after this instant set `has_new_approvals`.
    pub since: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KidHomeDto {
    pub child: ChildDto,
    pub chores: Vec<ChoreDto>,
    pub rewards: Vec<RewardDto>,
    pub pending_chores: Vec<ChoreLogDto>,
    pub pending_redemptions: Vec<RedemptionDto>,
    pub pending_chore_ids: Vec<i32>,
    pub pending_reward_ids: Vec<i32>,
    pub next_reward: Option<RewardTarget<RewardDto>>,
    pub approved_chores: Vec<ChoreLogDto>,
    pub approved_redemptions: Vec<RedemptionDto>,
    pub progress: MapProgress,
    pub has_new_approvals: bool,
}
