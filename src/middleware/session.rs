// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session identity middleware.
//!
//! Authentication happens in front of this service. The authenticating proxy
//! forwards the signed-in user as `x-user-email` / `x-user-name` headers.

use crate::error::AppError;
use crate::models::User;
use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Signed-in user for the current request.
#[derive(Debug, Clone)]
pub struct SessionUser(pub User);

/// Read the session identity from forwarded headers.
pub fn session_from_headers(headers: &HeaderMap) -> Option<User> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let email = header(USER_EMAIL_HEADER)?;
    let name = header(USER_NAME_HEADER).unwrap_or(email);
    Some(User::new(name, email))
}

/// Middleware that requires a session identity.
pub async fn require_session(mut request: Request, next: Next) -> Result<Response, AppError> {
    let user = session_from_headers(request.headers()).ok_or(AppError::Unauthorized)?;
    request.extensions_mut().insert(SessionUser(user));
    Ok(next.run(request).await)
}
