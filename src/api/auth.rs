use crate::errors::{AppError, AppResult};
use crate::models::User;
use crate::service::CrmService;
use axum::http::HeaderMap;

/// Header naming the acting user.
pub const USER_HEADER: &str = "x-user-id";

pub fn acting_user(service: &CrmService, headers: &HeaderMap) -> AppResult<User> {
    let user_id = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_HEADER)))?;
    service.authenticate(user_id)
}
