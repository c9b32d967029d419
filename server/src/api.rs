//! HTTP API: accounts, scores, leaderboard, admin, health and sharing.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use merge_arcade_shared::api::{
    AdminUsersResponse, HealthResponse, LeaderboardEntry, LoginRequest, LoginResponse,
    MessageBody, RegisterRequest, RegisterResponse, ScoreWire, ShareInfo, SubmitScoreRequest,
    SubmitScoreResponse, UserWire,
};

use crate::auth::{require_admin, validate_registration, verify_password, ADMIN_HEADER};
use crate::error::ApiError;
use crate::qr::{render_svg, share_url, DEFAULT_QR_SIZE};
use crate::store::rfc3339;
use crate::ws::{ws_handler, AppState};

pub const MAX_LEADERBOARD_LIMIT: usize = 100;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(1);
const SHARE_TITLE: &str = "Merge Arcade";
const SHARE_TEXT: &str = "Drop, merge and climb the leaderboard!";

/// Full application router, `/ws` included.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    Router::new()
        .route("/api/users", post(register).get(list_users))
        .route("/api/auth/login", post(login))
        .route("/api/scores", post(submit_score).get(list_scores))
        .route("/api/scores/leaderboard", get(leaderboard))
        .route("/api/admin/users", get(admin_users).delete(admin_reset))
        .route("/api/health", get(health))
        .route("/api/share", get(share))
        .route("/api/qr", get(qr_code))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static(ADMIN_HEADER),
        ]);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Turn a body rejection into our 400 with a JSON error.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e.body_text())))
}

/// Same for a query string that does not deserialize.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(v)| v)
        .map_err(|e| ApiError::BadRequest(format!("invalid query string: {}", e.body_text())))
}

fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest("invalid userId".to_string()))
}

async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let req = json_body(body)?;
    let cost = state.config.password_cost;
    let new_user = tokio::task::spawn_blocking(move || validate_registration(req, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))??;
    let user = state.store.create_user(new_user).await?;
    Ok(Json(RegisterResponse {
        success: true,
        user: user.to_wire(),
    }))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserWire>>, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(users.iter().map(|u| u.to_wire()).collect()))
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let req = json_body(body)?;
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    };
    let email = email.trim().to_lowercase();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    let stored = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))?;
    if !verified {
        return Err(ApiError::Unauthorized("wrong password".to_string()));
    }

    tracing::info!("User {} logged in", user.username);
    Ok(Json(LoginResponse {
        message: "login successful".to_string(),
        user: user.to_wire(),
    }))
}

async fn submit_score(
    State(state): State<AppState>,
    body: Result<Json<SubmitScoreRequest>, JsonRejection>,
) -> Result<Json<SubmitScoreResponse>, ApiError> {
    let req = json_body(body)?;
    let (Some(user_id), Some(score)) = (req.user_id, req.score) else {
        return Err(ApiError::BadRequest(
            "userId and score are required".to_string(),
        ));
    };
    let user_id = parse_user_id(&user_id)?;
    if !score.is_finite() || score < 0.0 || score.fract() != 0.0 || score > u32::MAX as f64 {
        return Err(ApiError::BadRequest(
            "score must be a non-negative whole number".to_string(),
        ));
    }

    let submitted = state.store.submit_score(user_id, score as u32).await?;
    Ok(Json(SubmitScoreResponse {
        success: true,
        score: submitted.score,
        rank: submitted.rank,
    }))
}

async fn list_scores(State(state): State<AppState>) -> Result<Json<Vec<ScoreWire>>, ApiError> {
    Ok(Json(state.store.list_scores().await?))
}

#[derive(Debug, Default, Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

async fn leaderboard(
    State(state): State<AppState>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let query = query_params(query)?;
    let limit = query
        .limit
        .unwrap_or(state.config.leaderboard_size)
        .clamp(1, MAX_LEADERBOARD_LIMIT);
    Ok(Json(state.store.leaderboard(limit).await?))
}

async fn admin_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminUsersResponse>, ApiError> {
    require_admin(&headers, &state.config)?;
    let (users, stats) = state
        .store
        .admin_overview(state.config.admin_recent_scores)
        .await?;
    Ok(Json(AdminUsersResponse { users, stats }))
}

async fn admin_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageBody>, ApiError> {
    require_admin(&headers, &state.config)?;
    let (users, scores) = state.store.reset().await?;
    Ok(Json(MessageBody {
        message: format!("deleted {} users and {} scores", users, scores),
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    match tokio::time::timeout(HEALTH_TIMEOUT, state.store.ping()).await {
        Ok(Ok(())) => Ok(Json(HealthResponse {
            message: "server is running".to_string(),
            database: "connected".to_string(),
            timestamp: rfc3339(OffsetDateTime::now_utc()),
            status: "healthy".to_string(),
        })),
        Ok(Err(e)) => Err(ApiError::Unavailable(format!("database unreachable: {}", e))),
        Err(_) => Err(ApiError::Unavailable(
            "database did not answer in time".to_string(),
        )),
    }
}

async fn share(State(state): State<AppState>, headers: HeaderMap) -> Json<ShareInfo> {
    let url = share_url(state.config.public_url.as_deref(), &headers);
    Json(ShareInfo {
        url,
        title: SHARE_TITLE.to_string(),
        text: SHARE_TEXT.to_string(),
        qr_path: "/api/qr".to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct QrQuery {
    url: Option<String>,
    size: Option<u32>,
}

async fn qr_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<QrQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let query = query_params(query)?;
    let payload = query
        .url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| share_url(state.config.public_url.as_deref(), &headers));
    let svg = render_svg(&payload, query.size.unwrap_or(DEFAULT_QR_SIZE))
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        svg,
    ))
}
