use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{CreateUser, User};

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
    /// Returned exactly once; only its hash is stored.
    pub api_key: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CreateUser>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    if request.email.trim().is_empty() || !request.email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }

    let conn = state.db.get()?;
    let (user, api_key) = match queries::create_user(&conn, &request) {
        Ok(created) => created,
        Err(AppError::Database(rusqlite::Error::SqliteFailure(e, _)))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e),
    };

    Ok((StatusCode::CREATED, Json(RegisterResponse { user, api_key })))
}
