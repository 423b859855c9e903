//! Caller identity extraction (spec.md §6 "Authentication").
//!
//! Precedence: `X-UserId` header wins outright; otherwise the `sub` claim of
//! the bearer token; otherwise *Unauthorized*. An admin (role `admin` in
//! `X-User-Roles`) may override the resolved user with `?for_user=<uid>` to
//! act on someone else's pipelines — token verification itself is the
//! Permission service's job, not this layer's; decoding the JWT payload here
//! is only ever used to read `sub`, never to authorize anything.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::error::HttpError;

const USER_ID_HEADER: &str = "x-userid";
const ROLES_HEADER: &str = "x-user-roles";
const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Deserialize)]
struct ForUserQuery {
    for_user: Option<String>,
}

/// The resolved caller for one request: who they are, and the bearer token
/// to forward to downstream collaborators for their own authorization.
pub struct Caller {
    pub user_id: String,
    pub token: String,
}

fn decode_jwt_subject(token: &str) -> Option<String> {
    let payload_segment = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload_segment).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value.get("sub")?.as_str().map(str::to_string)
}

fn is_admin(parts: &Parts) -> bool {
    parts
        .headers
        .get(ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|roles| roles.split(',').map(str::trim).any(|r| r.eq_ignore_ascii_case(ADMIN_ROLE)))
        .unwrap_or(false)
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or_default()
            .to_string();

        let header_user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut user_id = match header_user {
            Some(user) => user,
            None => decode_jwt_subject(&token).ok_or_else(|| HttpError::unauthorized("no caller identity"))?,
        };

        if is_admin(parts) {
            if let Ok(Query(query)) = Query::<ForUserQuery>::from_request_parts(parts, state).await {
                if let Some(for_user) = query.for_user {
                    user_id = for_user;
                }
            }
        }

        Ok(Caller { user_id, token })
    }
}
