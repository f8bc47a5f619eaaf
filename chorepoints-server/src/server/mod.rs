mod acl;
pub mod auth;
mod config;
mod kids;
mod parents;

use crate::server::auth::AuthCtx;
use crate::storage::models::{self, ChoreLogView, RedemptionView};
use crate::storage::{StorageError, Store};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Json, Router,
    extract::{Extension, State},
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use bcrypt::verify;
use chorepoints_shared::api::{self, ChildDto, ChoreDto, ChoreLogDto, RedemptionDto, RewardDto};
use chorepoints_shared::auth::Role;
use chorepoints_shared::domain::{DEFAULT_CHORE_ICON, DEFAULT_REWARD_ICON, display_letter};
use chorepoints_shared::jwt;
pub use config::{AppConfig, Catalog, ConfigError, UserConfig};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store) -> Self {
        Self {
            config,
            store,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Loads a child visible to the caller. Children of another parent
    /// answer 404 so their ids are not disclosed.
    async fn visible_child(&self, auth: &AuthCtx, id: i32) -> Result<models::Child, AppError> {
        let child = self
            .store
            .get_child(id)
            .await
            .map_err(AppError::storage)?
            .ok_or_else(|| AppError::not_found(format!("child not found: {id}")))?;
        let visible = match auth.role() {
            Role::Parent => child.parent == auth.username(),
            Role::Child => auth.claims.child_id == Some(child.id) && child.active,
        };
        if !visible {
            return Err(AppError::not_found(format!("child not found: {id}")));
        }
        Ok(child)
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let private = Router::new()
        .route("/api/v1/auth/logout", post(api_auth_logout))
        .route(
            "/api/v1/children",
            get(parents::list_children).post(parents::create_child),
        )
        .route("/api/v1/children/{id}", get(kids::child_detail))
        .route("/api/v1/children/{id}/progress", get(kids::child_progress))
        .route("/api/v1/children/{id}/home", get(kids::child_home))
        .route("/api/v1/children/{id}/pin", post(kids::change_pin))
        .route(
            "/api/v1/children/{id}/chores/{chore_id}/complete",
            post(kids::complete_chore),
        )
        .route(
            "/api/v1/children/{id}/rewards/{reward_id}/redeem",
            post(kids::redeem_reward),
        )
        .route(
            "/api/v1/children/{id}/adjustments",
            get(parents::list_adjustments).post(parents::create_adjustment),
        )
        .route(
            "/api/v1/chores",
            get(parents::list_chores).post(parents::create_chore),
        )
        .route("/api/v1/chores/{id}", post(parents::update_chore))
        .route(
            "/api/v1/rewards",
            get(parents::list_rewards).post(parents::create_reward),
        )
        .route("/api/v1/rewards/{id}", post(parents::update_reward))
        .route("/api/v1/approvals/count", get(parents::pending_count))
        .route("/api/v1/approvals/chores", get(parents::list_chore_records))
        .route(
            "/api/v1/approvals/redemptions",
            get(parents::list_redemption_records),
        )
        .route("/api/v1/approvals/chores/bulk", post(parents::bulk_chores))
        .route(
            "/api/v1/approvals/redemptions/bulk",
            post(parents::bulk_redemptions),
        )
        .route(
            "/api/v1/approvals/chores/{id}/{action}",
            post(parents::decide_chore),
        )
        .route(
            "/api/v1/approvals/redemptions/{id}/{action}",
            post(parents::decide_redemption),
        )
        .with_state(state.clone())
        // Outermost last: bearer check, then span fields, then ACL.
        .layer(middleware::from_fn(acl::enforce_acl))
        .layer(middleware::from_fn(set_auth_span_fields))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            username = tracing::field::Empty,
            role = tracing::field::Empty,
            child_id = tracing::field::Empty
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/version", get(api_version))
        .route("/api/v1/auth/login", post(api_auth_login))
        .route("/api/v1/auth/kid-login", post(api_auth_kid_login))
        .merge(private)
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured
    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn api_version() -> Json<api::VersionDto> {
    Json(api::VersionDto {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let path = req.uri().path().to_string();
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );

    // Balances change on every approval; never cache API answers
    if path == "/healthz" || path.starts_with("/api/") {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store"),
        );
    }

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("username", tracing::field::display(auth.username()));
        span.record("role", tracing::field::debug(auth.role()));
        if let Some(cid) = auth.claims.child_id {
            span.record("child_id", cid);
        }
    }
    Ok(next.run(req).await)
}

async fn api_auth_login(
    State(state): State<AppState>,
    Json(body): Json<api::AuthReq>,
) -> Result<Json<api::AuthResp>, AppError> {
    let user = state.config.find_user(&body.username).ok_or_else(|| {
        tracing::warn!(username=%body.username, "login: unknown username");
        AppError::unauthorized()
    })?;
    if !verify(&body.password, &user.password_hash).map_err(|e| {
        tracing::error!(username=%body.username, error=%e, "login: bcrypt verify failed");
        AppError::internal(e)
    })? {
        tracing::warn!(username=%body.username, "login: invalid password");
        return Err(AppError::unauthorized());
    }
    let token = auth::issue_jwt(&state, &user.username, Role::Parent, None).await?;
    tracing::info!(username=%user.username, "login: parent signed in");
    Ok(Json(api::AuthResp { token }))
}

async fn api_auth_kid_login(
    State(state): State<AppState>,
    Json(body): Json<api::KidLoginReq>,
) -> Result<Json<api::KidLoginResp>, AppError> {
    let child = state
        .store
        .get_child(body.child_id)
        .await
        .map_err(AppError::storage)?
        .filter(|c| c.active)
        .ok_or_else(|| {
            tracing::warn!(child_id = body.child_id, "kid-login: unknown or inactive child");
            AppError::unauthorized()
        })?;
    if !verify(&body.pin, &child.pin_hash).map_err(|e| {
        tracing::error!(child_id = child.id, error=%e, "kid-login: bcrypt verify failed");
        AppError::internal(e)
    })? {
        tracing::warn!(child_id = child.id, "kid-login: invalid pin");
        return Err(AppError::unauthorized());
    }
    let subject = jwt::child_subject(child.id);
    let token = auth::issue_jwt(&state, &subject, Role::Child, Some(child.id)).await?;
    tracing::info!(child_id = child.id, "kid-login: child signed in");
    Ok(Json(api::KidLoginResp {
        token,
        child_id: child.id,
    }))
}

async fn api_auth_logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .delete_session(&auth.claims.jti)
        .await
        .map_err(AppError::storage)?;
    Ok(StatusCode::NO_CONTENT)
}

// Row -> DTO conversions shared by parent and kid handlers

fn rfc3339(ts: chrono::NaiveDateTime) -> String {
    chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(ts, chrono::Utc).to_rfc3339()
}

fn child_dto(c: &models::Child) -> ChildDto {
    ChildDto {
        id: c.id,
        display_name: c.display_name.clone(),
        display_letter: display_letter(&c.display_name),
        avatar_emoji: c.avatar_emoji.clone(),
        map_theme: c.theme(),
        points_balance: c.points_balance,
        map_position: c.map_position,
        highest_milestone: c.highest_milestone,
        active: c.active,
    }
}

fn chore_dto(c: models::Chore) -> ChoreDto {
    ChoreDto {
        id: c.id,
        title: c.title,
        points: c.points,
        active: c.active,
        icon: c.icon_emoji.unwrap_or_else(|| DEFAULT_CHORE_ICON.to_string()),
    }
}

fn reward_dto(r: models::Reward) -> RewardDto {
    RewardDto {
        id: r.id,
        title: r.title,
        cost_points: r.cost_points,
        active: r.active,
        icon: r.icon_emoji.unwrap_or_else(|| DEFAULT_REWARD_ICON.to_string()),
    }
}

fn chore_log_dto(v: ChoreLogView) -> ChoreLogDto {
    let status = v.log.status();
    ChoreLogDto {
        id: v.log.id,
        child_id: v.log.child_id,
        child_name: v.child_name,
        chore_id: v.log.chore_id,
        chore_title: v.chore_title,
        points_awarded: v.log.points_awarded,
        status,
        submitted_at: rfc3339(v.log.submitted_at),
        processed_at: v.log.processed_at.map(rfc3339),
    }
}

fn redemption_dto(v: RedemptionView) -> RedemptionDto {
    let status = v.redemption.status();
    RedemptionDto {
        id: v.redemption.id,
        child_id: v.redemption.child_id,
        child_name: v.child_name,
        reward_id: v.redemption.reward_id,
        reward_title: v.reward_title,
        cost_points: v.redemption.cost_points,
        status,
        submitted_at: rfc3339(v.redemption.submitted_at),
        processed_at: v.redemption.processed_at.map(rfc3339),
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized
    }
    fn forbidden() -> Self {
        Self::Forbidden
    }
    fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
    /// Caller mistakes reported by storage keep their message; everything
    /// else is an internal failure.
    fn storage(e: StorageError) -> Self {
        match e {
            StorageError::InvalidInput(m) => Self::BadRequest(m),
            StorageError::Conflict(m) => Self::Conflict(m),
            other => Self::internal(other),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".into(),
                "unauthorized",
                None,
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".into(), "forbidden", None),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m, "conflict", None),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        if let Some(detail) = detail {
            tracing::error!(
                status = %status,
                kind = kind,
                message = %msg,
                detail = %detail,
                "request failed"
            );
        } else {
            tracing::warn!(status = %status, kind = kind, message = %msg, "request failed");
        }
        let body = axum::Json(ErrorBody { error: msg });
        (status, body).into_response()
    }
}
