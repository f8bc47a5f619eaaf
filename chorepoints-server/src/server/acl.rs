use super::{AppError, auth::AuthCtx};
use axum::response::Response;
use axum::{
    extract::OriginalUri,
    http::{Method, Request},
    middleware::Next,
};
use chorepoints_shared::auth::Role;
use chorepoints_shared::jwt::JwtClaims;

/// Path-based access rules. Ownership of the ids in the path is checked
/// later by the handlers; here a parent may reach any parent route and a
/// child only its own `children/{id}` routes.
pub async fn enforce_acl(req: Request<axum::body::Body>, next: Next) -> Result<Response, AppError> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|orig| orig.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let Some(auth) = req.extensions().get::<AuthCtx>() else {
        return Err(AppError::unauthorized());
    };
    let claims = &auth.claims;

    let segs = segmented(&path);
    let prefix = ["api", "v1"];
    if !segs.as_slice().starts_with(&prefix) {
        tracing::warn!(?segs, "ACL: path outside api scope");
        return Err(AppError::forbidden());
    }
    let rest = &segs[prefix.len()..];

    let decision = match claims.role {
        Role::Parent => allow_parent(&method, rest),
        Role::Child => allow_child(&method, rest, claims),
    };

    if let Err(err) = decision {
        tracing::warn!(
            method = %method,
            path = %path,
            username = %claims.sub,
            role = ?claims.role,
            token_child = ?claims.child_id,
            "ACL: no rule matched; denying"
        );
        return Err(err);
    }

    Ok(next.run(req).await)
}

fn allow_parent(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    let get = *method == Method::GET;
    let post = *method == Method::POST;
    match rest {
        ["auth", "logout"] if post => Ok(()),
        ["children"] if get || post => Ok(()),
        ["children", id] if get && is_id(id) => Ok(()),
        ["children", id, "progress" | "home"] if get && is_id(id) => Ok(()),
        ["children", id, "pin"] if post && is_id(id) => Ok(()),
        ["children", id, "adjustments"] if (get || post) && is_id(id) => Ok(()),
        ["chores" | "rewards"] if get || post => Ok(()),
        ["chores" | "rewards", id] if post && is_id(id) => Ok(()),
        ["approvals", "count"] if get => Ok(()),
        ["approvals", "chores" | "redemptions"] if get => Ok(()),
        ["approvals", "chores" | "redemptions", "bulk"] if post => Ok(()),
        ["approvals", "chores" | "redemptions", id, "approve" | "reject"]
            if post && is_id(id) =>
        {
            Ok(())
        }
        _ => Err(AppError::forbidden()),
    }
}

fn allow_child(method: &Method, rest: &[&str], claims: &JwtClaims) -> Result<(), AppError> {
    let get = *method == Method::GET;
    let post = *method == Method::POST;
    match rest {
        ["auth", "logout"] if post => Ok(()),
        ["children", child] if get => ensure_child(claims, child),
        ["children", child, "progress" | "home"] if get => ensure_child(claims, child),
        ["children", child, "pin"] if post => ensure_child(claims, child),
        ["children", child, "chores", id, "complete"] if post && is_id(id) => {
            ensure_child(claims, child)
        }
        ["children", child, "rewards", id, "redeem"] if post && is_id(id) => {
            ensure_child(claims, child)
        }
        _ => Err(AppError::forbidden()),
    }
}

fn segmented(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn is_id(seg: &str) -> bool {
    seg.parse::<i32>().is_ok()
}

fn ensure_child(claims: &JwtClaims, seg: &str) -> Result<(), AppError> {
    let expected = claims.child_id.ok_or_else(AppError::forbidden)?;
    match seg.parse::<i32>() {
        Ok(provided) if provided == expected => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}
