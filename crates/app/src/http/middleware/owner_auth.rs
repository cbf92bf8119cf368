use axum::body::Body;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "prompt_manager_session";

/// Owner resolved from the session token, attached as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerId(pub i64);

#[derive(Debug, Error)]
pub enum OwnerAuthError {
    #[error("session token required")]
    MissingToken,
    #[error("session token invalid")]
    InvalidToken,
    #[error("session token expired")]
    Expired,
    #[error("session token could not be encoded")]
    Encode,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    sub: i64,
    exp: i64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn require_owner(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, OwnerAuthError> {
    let token = extract_bearer_token(&request)
        .or_else(|| extract_cookie(&request, SESSION_COOKIE_NAME))
        .ok_or(OwnerAuthError::MissingToken)?;
    let owner = verify_token(&state.config.token_secret, &token, Utc::now().timestamp())?;
    request.extensions_mut().insert(owner);
    Ok(next.run(request).await)
}

pub fn issue_token(secret: &str, owner_id: i64, max_age_secs: i64) -> Result<String, OwnerAuthError> {
    let exp = Utc::now().timestamp().saturating_add(max_age_secs);
    let payload = SessionPayload { sub: owner_id, exp };
    let json = serde_json::to_vec(&payload).map_err(|_| OwnerAuthError::Encode)?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(json);
    let tag = keyed_mac(secret, &payload_b64)?.finalize().into_bytes();
    let signature = URL_SAFE_NO_PAD.encode(tag);
    Ok(format!("{payload_b64}.{signature}"))
}

fn verify_token(secret: &str, token: &str, now: i64) -> Result<OwnerId, OwnerAuthError> {
    let (payload_b64, sig) = token
        .split_once('.')
        .filter(|(payload, sig)| !payload.is_empty() && !sig.is_empty())
        .ok_or(OwnerAuthError::InvalidToken)?;
    let sig = URL_SAFE_NO_PAD
        .decode(sig.as_bytes())
        .map_err(|_| OwnerAuthError::InvalidToken)?;
    keyed_mac(secret, payload_b64)?
        .verify_slice(&sig)
        .map_err(|_| OwnerAuthError::InvalidToken)?;
    let payload = decode_payload(payload_b64).ok_or(OwnerAuthError::InvalidToken)?;
    if payload.exp <= now {
        return Err(OwnerAuthError::Expired);
    }
    Ok(OwnerId(payload.sub))
}

fn decode_payload(payload_b64: &str) -> Option<SessionPayload> {
    let bytes = URL_SAFE_NO_PAD.decode(payload_b64.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn keyed_mac(secret: &str, payload_b64: &str) -> Result<Hmac<Sha256>, OwnerAuthError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| OwnerAuthError::Encode)?;
    mac.update(payload_b64.as_bytes());
    Ok(mac)
}

fn extract_bearer_token<B>(request: &Request<B>) -> Option<String> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let value = header.trim().strip_prefix("Bearer ")?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn extract_cookie<B>(request: &Request<B>, name: &str) -> Option<String> {
    let header = request.headers().get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}

impl IntoResponse for OwnerAuthError {
    fn into_response(self) -> Response {
        warn!(error = %self, "owner auth rejected");
        let status = match self {
            OwnerAuthError::Encode => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
