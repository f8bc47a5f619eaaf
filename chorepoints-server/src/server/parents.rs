//! Parent-only handlers: children, chore and reward definitions, the
//! approval queue and manual adjustments.

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use chorepoints_shared::api::{
    self, AdjustmentDto, AdjustmentReq, AdjustmentResp, BulkAction, BulkReq, BulkResp,
    ChildDto, ChoreDto, ChoreLogDto, DecisionResp, PendingCountDto, RedemptionDto, RewardDto,
    StatusFilter,
};
use chorepoints_shared::domain::RecordStatus;
use chorepoints_shared::ledger::Decision;
use tracing::{debug, info, warn};

use super::auth::{self, AuthCtx};
use super::{
    AppError, AppState, chore_dto, chore_log_dto, child_dto, redemption_dto, reward_dto, rfc3339,
};
use crate::storage::RecordScope;
use crate::storage::models::{ChoreChanges, PointAdjustment, RewardChanges};

pub(super) async fn list_children(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<ChildDto>>, AppError> {
    let rows = state
        .store
        .list_children(auth.username())
        .await
        .map_err(AppError::storage)?;
    Ok(Json(rows.iter().map(child_dto).collect()))
}

pub(super) async fn create_child(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::CreateChildReq>,
) -> Result<(StatusCode, Json<ChildDto>), AppError> {
    auth::validate_pin(&body.pin)?;
    let pin_hash = auth::hash_secret(&body.pin)?;
    let child = state
        .store
        .create_child(
            auth.username(),
            &body.display_name,
            &pin_hash,
            body.avatar_emoji.as_deref().filter(|s| !s.is_empty()),
            body.map_theme.unwrap_or_default(),
        )
        .await
        .map_err(AppError::storage)?;
    info!(child_id = child.id, parent = %auth.username(), "child created");
    Ok((StatusCode::CREATED, Json(child_dto(&child))))
}

// Definitions

pub(super) async fn list_chores(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<ChoreDto>>, AppError> {
    let rows = state
        .store
        .list_chores(auth.username(), false)
        .await
        .map_err(AppError::storage)?;
    Ok(Json(rows.into_iter().map(chore_dto).collect()))
}

pub(super) async fn create_chore(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::CreateChoreReq>,
) -> Result<(StatusCode, Json<ChoreDto>), AppError> {
    let chore = state
        .store
        .create_chore(
            auth.username(),
            &body.title,
            body.points,
            body.icon_emoji.as_deref().filter(|s| !s.is_empty()),
        )
        .await
        .map_err(AppError::storage)?;
    info!(chore_id = chore.id, points = chore.points, "chore created");
    Ok((StatusCode::CREATED, Json(chore_dto(chore))))
}

pub(super) async fn update_chore(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
    Json(body): Json<api::UpdateChoreReq>,
) -> Result<Json<ChoreDto>, AppError> {
    let changes = ChoreChanges {
        title: body.title.map(|t| t.trim().to_string()),
        points: body.points,
        active: body.active,
        icon_emoji: body.icon_emoji.map(non_empty),
    };
    let chore = state
        .store
        .update_chore(auth.username(), id, changes)
        .await
        .map_err(AppError::storage)?
        .ok_or_else(|| AppError::not_found(format!("chore not found: {id}")))?;
    info!(chore_id = chore.id, points = chore.points, active = chore.active, "chore updated");
    Ok(Json(chore_dto(chore)))
}

pub(super) async fn list_rewards(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<RewardDto>>, AppError> {
    let rows = state
        .store
        .list_rewards(auth.username(), false)
        .await
        .map_err(AppError::storage)?;
    Ok(Json(rows.into_iter().map(reward_dto).collect()))
}

pub(super) async fn create_reward(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::CreateRewardReq>,
) -> Result<(StatusCode, Json<RewardDto>), AppError> {
    let reward = state
        .store
        .create_reward(
            auth.username(),
            &body.title,
            body.cost_points,
            body.icon_emoji.as_deref().filter(|s| !s.is_empty()),
        )
        .await
        .map_err(AppError::storage)?;
    info!(reward_id = reward.id, cost = reward.cost_points, "reward created");
    Ok((StatusCode::CREATED, Json(reward_dto(reward))))
}

pub(super) async fn update_reward(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
    Json(body): Json<api::UpdateRewardReq>,
) -> Result<Json<RewardDto>, AppError> {
    let changes = RewardChanges {
        title: body.title.map(|t| t.trim().to_string()),
        cost_points: body.cost_points,
        active: body.active,
        icon_emoji: body.icon_emoji.map(non_empty),
    };
    let reward = state
        .store
        .update_reward(auth.username(), id, changes)
        .await
        .map_err(AppError::storage)?
        .ok_or_else(|| AppError::not_found(format!("reward not found: {id}")))?;
    info!(
        reward_id = reward.id,
        cost = reward.cost_points,
        active = reward.active,
        "reward updated"
    );
    Ok(Json(reward_dto(reward)))
}

/// An empty icon clears it back to the default.
fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

// Approval queue

pub(super) async fn pending_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<PendingCountDto>, AppError> {
    let (chores, redemptions) = state
        .store
        .pending_counts(auth.username())
        .await
        .map_err(AppError::storage)?;
    Ok(Json(PendingCountDto {
        chores,
        redemptions,
    }))
}

pub(super) async fn list_chore_records(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<ChoreLogDto>>, AppError> {
    let status = filter.status.unwrap_or(RecordStatus::Pending);
    let rows = state
        .store
        .list_chore_logs(RecordScope::Parent(auth.username().to_string()), status, None)
        .await
        .map_err(AppError::storage)?;
    Ok(Json(rows.into_iter().map(chore_log_dto).collect()))
}

pub(super) async fn list_redemption_records(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<RedemptionDto>>, AppError> {
    let status = filter.status.unwrap_or(RecordStatus::Pending);
    let rows = state
        .store
        .list_redemptions(RecordScope::Parent(auth.username().to_string()), status, None)
        .await
        .map_err(AppError::storage)?;
    Ok(Json(rows.into_iter().map(redemption_dto).collect()))
}

fn parse_action(raw: &str) -> Result<BulkAction, AppError> {
    match raw {
        "approve" => Ok(BulkAction::Approve),
        "reject" => Ok(BulkAction::Reject),
        other => Err(AppError::bad_request(format!("unknown action: {other}"))),
    }
}

async fn apply_chore_action(
    state: &AppState,
    parent: &str,
    id: i32,
    action: BulkAction,
) -> Result<Decision, AppError> {
    let decision = match action {
        BulkAction::Approve => state.store.approve_chore_log(parent, id).await,
        BulkAction::Reject => state.store.reject_chore_log(parent, id).await,
    }
    .map_err(AppError::storage)?;
    log_decision("chore", id, &decision);
    Ok(decision)
}

async fn apply_redemption_action(
    state: &AppState,
    parent: &str,
    id: i32,
    action: BulkAction,
) -> Result<Decision, AppError> {
    let decision = match action {
        BulkAction::Approve => state.store.approve_redemption(parent, id).await,
        BulkAction::Reject => state.store.reject_redemption(parent, id).await,
    }
    .map_err(AppError::storage)?;
    log_decision("redemption", id, &decision);
    Ok(decision)
}

fn log_decision(kind: &str, record_id: i32, decision: &Decision) {
    let outcome = decision.outcome();
    match decision {
        Decision::Approved {
            account,
            milestones,
        } => {
            info!(
                kind,
                record_id,
                outcome,
                balance = account.points_balance,
                position = account.map_position,
                milestones = milestones.len(),
                "ledger: record approved"
            );
            for m in milestones {
                info!(
                    record_id,
                    position = m.position(),
                    bonus = m.bonus(),
                    name = %m.milestone.name,
                    "ledger: milestone reached"
                );
            }
        }
        Decision::Rejected => info!(kind, record_id, outcome, "ledger: record rejected"),
        Decision::InsufficientBalance(short) => warn!(
            kind,
            record_id,
            outcome,
            balance = short.balance,
            required = short.required,
            "ledger: approval refused"
        ),
        Decision::NotPending | Decision::NotFound => {
            debug!(kind, record_id, outcome, "ledger: decision had no effect")
        }
    }
}

fn decision_resp(decision: Decision, record_id: i32) -> Result<Json<DecisionResp>, AppError> {
    let applied = decision.is_applied();
    let outcome = decision.outcome().to_string();
    let resp = match decision {
        Decision::NotFound => {
            return Err(AppError::not_found(format!("record not found: {record_id}")));
        }
        Decision::Approved {
            account,
            milestones,
        } => DecisionResp {
            applied,
            outcome,
            account: Some(account),
            milestones,
            detail: None,
        },
        Decision::InsufficientBalance(short) => DecisionResp {
            applied,
            outcome,
            account: None,
            milestones: Vec::new(),
            detail: Some(short.to_string()),
        },
        Decision::Rejected | Decision::NotPending => DecisionResp {
            applied,
            outcome,
            account: None,
            milestones: Vec::new(),
            detail: None,
        },
    };
    Ok(Json(resp))
}

pub(super) async fn decide_chore(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path((id, action)): Path<(i32, String)>,
) -> Result<Json<DecisionResp>, AppError> {
    let action = parse_action(&action)?;
    let decision = apply_chore_action(&state, auth.username(), id, action).await?;
    decision_resp(decision, id)
}

pub(super) async fn decide_redemption(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path((id, action)): Path<(i32, String)>,
) -> Result<Json<DecisionResp>, AppError> {
    let action = parse_action(&action)?;
    let decision = apply_redemption_action(&state, auth.username(), id, action).await?;
    decision_resp(decision, id)
}

/// Applies one action to many records; each record is its own unit of
/// work, so a refused item does not undo the others.
pub(super) async fn bulk_chores(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<BulkReq>,
) -> Result<Json<BulkResp>, AppError> {
    let mut applied = 0;
    for &id in &body.ids {
        let decision = apply_chore_action(&state, auth.username(), id, body.action).await?;
        if decision.is_applied() {
            applied += 1;
        }
    }
    info!(requested = body.ids.len(), applied, "ledger: bulk chore action");
    Ok(Json(BulkResp {
        requested: body.ids.len(),
        applied,
    }))
}

pub(super) async fn bulk_redemptions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<BulkReq>,
) -> Result<Json<BulkResp>, AppError> {
    let mut applied = 0;
    for &id in &body.ids {
        let decision = apply_redemption_action(&state, auth.username(), id, body.action).await?;
        if decision.is_applied() {
            applied += 1;
        }
    }
    info!(requested = body.ids.len(), applied, "ledger: bulk redemption action");
    Ok(Json(BulkResp {
        requested: body.ids.len(),
        applied,
    }))
}

// Manual adjustments

fn adjustment_dto(a: PointAdjustment) -> AdjustmentDto {
    AdjustmentDto {
        id: a.id,
        child_id: a.child_id,
        parent: a.parent,
        points: a.points,
        reason: a.reason,
        created_at: rfc3339(a.created_at),
    }
}

pub(super) async fn list_adjustments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<AdjustmentDto>>, AppError> {
    let child = state.visible_child(&auth, id).await?;
    let rows = state
        .store
        .list_adjustments(child.id)
        .await
        .map_err(AppError::storage)?;
    Ok(Json(rows.into_iter().map(adjustment_dto).collect()))
}

pub(super) async fn create_adjustment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
    Json(body): Json<AdjustmentReq>,
) -> Result<(StatusCode, Json<AdjustmentResp>), AppError> {
    let (adjustment, account, milestones) = state
        .store
        .create_adjustment(auth.username(), id, body.points, &body.reason)
        .await
        .map_err(AppError::storage)?
        .ok_or_else(|| AppError::not_found(format!("child not found: {id}")))?;
    info!(
        child_id = id,
        points = body.points,
        balance = account.points_balance,
        position = account.map_position,
        milestones = milestones.len(),
        "ledger: manual adjustment applied"
    );
    Ok((
        StatusCode::CREATED,
        Json(AdjustmentResp {
            adjustment: adjustment_dto(adjustment),
            account,
            milestones,
        }),
    ))
}
