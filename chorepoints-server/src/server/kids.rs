//! Handlers reachable with a child token (and by the owning parent):
//! the account view, map progress, the dashboard and submissions.

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use chorepoints_shared::api::{
    self, ChildDetailDto, ChoreLogDto, HomeQuery, KidHomeDto, RedemptionDto, SubmissionResp,
};
use chorepoints_shared::domain::RecordStatus;
use chorepoints_shared::progress::{MapProgress, map_progress, next_reward};
use tracing::{debug, info};

use super::auth::{self, AuthCtx};
use super::{
    AppError, AppState, chore_dto, chore_log_dto, child_dto, redemption_dto, reward_dto,
};
use crate::storage::RecordScope;
use crate::storage::models::{ChoreLogView, RedemptionView};

/// How many approved records the dashboard shows.
const HISTORY_LIMIT: i64 = 10;

pub(super) async fn child_detail(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
) -> Result<Json<ChildDetailDto>, AppError> {
    let child = state.visible_child(&auth, id).await?;
    let progress = map_progress(state.store.milestones(), child.map_position);
    Ok(Json(ChildDetailDto {
        child: child_dto(&child),
        progress,
    }))
}

pub(super) async fn child_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
) -> Result<Json<MapProgress>, AppError> {
    let child = state.visible_child(&auth, id).await?;
    Ok(Json(map_progress(state.store.milestones(), child.map_position)))
}

pub(super) async fn child_home(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
    Query(q): Query<HomeQuery>,
) -> Result<Json<KidHomeDto>, AppError> {
    let since = q
        .since
        .as_deref()
        .map(chrono::DateTime::parse_from_rfc3339)
        .transpose()
        .map_err(|e| AppError::bad_request(format!("invalid since: {e}")))?;
    let child = state.visible_child(&auth, id).await?;
    let store = &state.store;

    let chores = store
        .list_chores(&child.parent, true)
        .await
        .map_err(AppError::storage)?;
    let rewards: Vec<_> = store
        .list_rewards(&child.parent, true)
        .await
        .map_err(AppError::storage)?
        .into_iter()
        .map(reward_dto)
        .collect();

    let pending_chores = store
        .list_chore_logs(RecordScope::Child(child.id), RecordStatus::Pending, None)
        .await
        .map_err(AppError::storage)?;
    let pending_redemptions = store
        .list_redemptions(RecordScope::Child(child.id), RecordStatus::Pending, None)
        .await
        .map_err(AppError::storage)?;
    let approved_chores = store
        .list_chore_logs(
            RecordScope::Child(child.id),
            RecordStatus::Approved,
            Some(HISTORY_LIMIT),
        )
        .await
        .map_err(AppError::storage)?;
    let approved_redemptions = store
        .list_redemptions(
            RecordScope::Child(child.id),
            RecordStatus::Approved,
            Some(HISTORY_LIMIT),
        )
        .await
        .map_err(AppError::storage)?;

    let has_new_approvals = match since {
        Some(ts) => store
            .approved_since(child.id, ts.naive_utc())
            .await
            .map_err(AppError::storage)?,
        None => false,
    };

    let pending_chore_ids = pending_chores.iter().map(|v| v.log.chore_id).collect();
    let pending_reward_ids = pending_redemptions
        .iter()
        .map(|v| v.redemption.reward_id)
        .collect();
    let target = next_reward(&rewards, child.points_balance, |r| r.cost_points);

    Ok(Json(KidHomeDto {
        child: child_dto(&child),
        chores: chores.into_iter().map(chore_dto).collect(),
        rewards,
        pending_chores: chore_logs(pending_chores),
        pending_redemptions: redemptions(pending_redemptions),
        pending_chore_ids,
        pending_reward_ids,
        next_reward: target,
        approved_chores: chore_logs(approved_chores),
        approved_redemptions: redemptions(approved_redemptions),
        progress: map_progress(store.milestones(), child.map_position),
        has_new_approvals,
    }))
}

fn chore_logs(rows: Vec<ChoreLogView>) -> Vec<ChoreLogDto> {
    rows.into_iter().map(chore_log_dto).collect()
}

fn redemptions(rows: Vec<RedemptionView>) -> Vec<RedemptionDto> {
    rows.into_iter().map(redemption_dto).collect()
}

pub(super) async fn change_pin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<i32>,
    Json(body): Json<api::ChangePinReq>,
) -> Result<StatusCode, AppError> {
    auth::validate_pin(&body.pin)?;
    let child = state.visible_child(&auth, id).await?;
    let hash = auth::hash_secret(&body.pin)?;
    state
        .store
        .set_pin_hash(child.id, &hash)
        .await
        .map_err(AppError::storage)?;
    info!(child_id = child.id, by = %auth.username(), "pin changed");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn complete_chore(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path((id, chore_id)): Path<(i32, i32)>,
) -> Result<(StatusCode, Json<SubmissionResp<ChoreLogDto>>), AppError> {
    let child = state.visible_child(&auth, id).await?;
    let submission = state
        .store
        .submit_chore(child.id, chore_id)
        .await
        .map_err(AppError::storage)?
        .ok_or_else(|| AppError::not_found(format!("chore not found: {chore_id}")))?;
    let created = submission.is_created();
    let view = submission.into_record();
    if created {
        info!(
            child_id = child.id,
            chore_id,
            record_id = view.log.id,
            points = view.log.points_awarded,
            "ledger: chore submitted"
        );
    } else {
        debug!(
            child_id = child.id,
            chore_id,
            record_id = view.log.id,
            "ledger: duplicate chore submission suppressed"
        );
    }
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SubmissionResp {
            created,
            record: chore_log_dto(view),
        }),
    ))
}

pub(super) async fn redeem_reward(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path((id, reward_id)): Path<(i32, i32)>,
) -> Result<(StatusCode, Json<SubmissionResp<RedemptionDto>>), AppError> {
    let child = state.visible_child(&auth, id).await?;
    let submission = state
        .store
        .submit_redemption(child.id, reward_id)
        .await
        .map_err(AppError::storage)?
        .ok_or_else(|| AppError::not_found(format!("reward not found: {reward_id}")))?;
    let created = submission.is_created();
    let view = submission.into_record();
    if created {
        info!(
            child_id = child.id,
            reward_id,
            record_id = view.redemption.id,
            cost = view.redemption.cost_points,
            "ledger: redemption requested"
        );
    } else {
        debug!(
            child_id = child.id,
            reward_id,
            record_id = view.redemption.id,
            "ledger: duplicate redemption suppressed"
        );
    }
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SubmissionResp {
            created,
            record: redemption_dto(view),
        }),
    ))
}
