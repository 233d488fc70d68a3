//! Request identity
//!
//! Authentication happens upstream; the proxy in front of this service
//! forwards the member as headers. Carts are keyed by the session header.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::handlers::ApiError;

pub const MEMBER_ID_HEADER: &str = "x-member-id";
pub const MEMBER_EMAIL_HEADER: &str = "x-member-email";
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// The logged-in member making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub email: Option<String>,
}

/// Identifier of the session holding the cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl<S: Send + Sync> FromRequestParts<S> for Member {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(&parts.headers, MEMBER_ID_HEADER).ok_or_else(|| ApiError {
            status: StatusCode::UNAUTHORIZED,
            message: "Login required".to_string(),
            details: None,
        })?;

        Ok(Member {
            id,
            email: header(&parts.headers, MEMBER_EMAIL_HEADER),
        })
    }
}

impl SessionId {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        header(headers, SESSION_ID_HEADER)
            .map(SessionId)
            .ok_or_else(|| ApiError {
                status: StatusCode::BAD_REQUEST,
                message: format!("Missing {} header", SESSION_ID_HEADER),
                details: None,
            })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        SessionId::from_headers(&parts.headers)
    }
}
