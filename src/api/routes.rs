use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    authz::verify_admin_jwt,
    error::{AppError, AppResult},
    model::{Comment, Identity, NewComment, Requester},
};

use super::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let items = state.gate.list(&post_id).await?;
    Ok(Json(serde_json::json!({ "items": items })))
}

pub async fn submit_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<NewComment>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let now = OffsetDateTime::now_utc();
    let comment = state.gate.submit(&post_id, req, now).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// A valid admin bearer token wins; otherwise the identity pair from the
/// body stands in for the requester. Neither present means no requester.
fn resolve_requester(
    state: &AppState,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    identity: Option<Identity>,
) -> Option<Requester> {
    if let Some(TypedHeader(bearer)) = auth {
        if !state.cfg.admin_jwt_secret.is_empty()
            && verify_admin_jwt(bearer.token(), &state.cfg.admin_jwt_secret).is_ok()
        {
            return Some(Requester::Admin);
        }
    }
    identity.map(Requester::Identity)
}

pub async fn can_delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    body: Option<Json<Identity>>,
) -> AppResult<Json<serde_json::Value>> {
    let allowed = match resolve_requester(&state, auth, body.map(|Json(i)| i)) {
        Some(requester) => state.resolver.can_delete_by_id(id, &requester).await?,
        None => false,
    };
    Ok(Json(serde_json::json!({ "can_delete": allowed })))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    body: Option<Json<Identity>>,
) -> AppResult<Json<serde_json::Value>> {
    let requester =
        resolve_requester(&state, auth, body.map(|Json(i)| i)).ok_or(AppError::Unauthorized)?;
    state.resolver.delete(id, &requester).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
