use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use chorepoints_shared::auth::Role;
use chorepoints_shared::jwt::{self, JwtClaims};
use chrono::{Duration, Utc};
use tracing::{error, warn};

use super::{AppError, AppState};

/// How many days of inactivity before a session is considered expired.
const SESSION_IDLE_DAYS: i64 = 14;
/// How many days before mandatory re-login.
const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub claims: JwtClaims,
}

impl AuthCtx {
    pub fn username(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }
}

pub async fn require_bearer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || Err(AppError::unauthorized());
    let header_val = match req.headers().get(header::AUTHORIZATION) {
        Some(v) => v,
        None => return unauthorized(),
    };
    let header_str = header_val.to_str().map_err(|_| AppError::unauthorized())?;
    let Some(token) = header_str.strip_prefix("Bearer ") else {
        return unauthorized();
    };

    let claims = match jwt::decode_and_verify(token, state.config.jwt_secret.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error=%e, "auth: jwt decode failed");
            return unauthorized();
        }
    };

    validate_claims(&state, &claims).await.map_err(|e| {
        warn!(error=?e, username=%claims.sub, "auth: validate_claims failed");
        AppError::unauthorized()
    })?;

    let jti = claims.jti.clone();
    let cutoff = Utc::now() - Duration::days(SESSION_IDLE_DAYS);
    match state
        .store
        .touch_session_with_cutoff(&jti, cutoff.naive_utc())
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            warn!(
                jti = %jti,
                username = %claims.sub,
                cutoff = %cutoff,
                "auth: session missing or expired (last_used_at < cutoff)"
            );
            return unauthorized();
        }
        Err(e) => {
            error!(jti = %jti, error=%e, "auth: touch_session_with_cutoff failed");
            return Err(AppError::internal(e));
        }
    }
    req.extensions_mut().insert(AuthCtx { claims });
    Ok(next.run(req).await)
}

/// Issues a token for a parent account (`child_id == None`) or for a child
/// after a PIN login, and records its session.
pub async fn issue_jwt(
    state: &AppState,
    username: &str,
    role: Role,
    child_id: Option<i32>,
) -> Result<String, AppError> {
    let jti = uuid::Uuid::new_v4().to_string();
    let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp();
    let claims = JwtClaims {
        sub: username.to_string(),
        jti: jti.clone(),
        exp,
        role,
        child_id,
    };

    validate_claims(state, &claims).await?;

    state
        .store
        .create_session(&jti, username)
        .await
        .map_err(|e| {
            error!(username, error=%e, "login: create_session failed");
            AppError::internal(e)
        })?;
    let token = jwt::encode(&claims, state.config.jwt_secret.as_bytes()).map_err(|e| {
        error!(username, error=%e, "login: jwt encode failed");
        AppError::internal(e)
    })?;
    Ok(token)
}

async fn validate_claims(state: &AppState, claims: &JwtClaims) -> Result<(), AppError> {
    match claims.role {
        Role::Parent => {
            if state.config.find_user(&claims.sub).is_none() {
                warn!(username = %claims.sub, "issue_jwt: unknown user");
                return Err(AppError::forbidden());
            }
            if claims.child_id.is_some() {
                warn!(username = %claims.sub, "issue_jwt: parent token must not include child");
                return Err(AppError::forbidden());
            }
        }
        Role::Child => {
            let child_id = claims.child_id.ok_or_else(|| {
                warn!(username = %claims.sub, "issue_jwt: child token missing child_id");
                AppError::forbidden()
            })?;
            if claims.sub != jwt::child_subject(child_id) {
                warn!(username = %claims.sub, child_id, "issue_jwt: child subject mismatch");
                return Err(AppError::forbidden());
            }
            let child = state
                .store
                .get_child(child_id)
                .await
                .map_err(AppError::internal)?;
            match child {
                Some(c) if c.active => {}
                Some(_) => {
                    warn!(child_id, "issue_jwt: child deactivated");
                    return Err(AppError::forbidden());
                }
                None => {
                    warn!(child_id, "issue_jwt: child not found");
                    return Err(AppError::not_found(format!("child not found: {child_id}")));
                }
            }
        }
    }

    Ok(())
}

/// PINs are 4 to 12 ASCII digits.
pub fn validate_pin(pin: &str) -> Result<(), AppError> {
    if (4..=12).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::bad_request("pin must be 4-12 digits"))
    }
}

pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    bcrypt::hash(secret, bcrypt::DEFAULT_COST).map_err(|e| {
        error!(error=%e, "bcrypt hash failed");
        AppError::internal(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_rules() {
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("123456789012").is_ok());
        assert!(validate_pin("123").is_err());
        assert!(validate_pin("1234567890123").is_err());
        assert!(validate_pin("12a4").is_err());
        assert!(validate_pin("١٢٣٤").is_err());
    }
}
