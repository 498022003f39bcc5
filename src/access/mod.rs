//! Two-stage access gate applied to protected operations.
//!
//! Stage one authenticates the bearer token; stage two checks the
//! resolved role against the operation's statically declared allowed
//! set. The stages are independent functions composed explicitly per
//! handler, strictly sequential: an authentication failure
//! short-circuits before any service code runs.
//!
//! Authorization here is purely role-based. It knows nothing about
//! resource ownership; a request can pass the role check ("any
//! Instructor may call update-course") and still be rejected by the
//! owning service for not owning that specific course.

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use crate::auth::TokenValidator;
use crate::domain::user::Role;
use crate::error::{AppError, Result};

/// The authenticated identity making a request.
#[derive(Debug, Clone, Copy)]
pub struct Subject {
    pub id: Uuid,
    pub role: Role,
}

/// Extract the bearer token from the `Authorization` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Authenticate a request: resolve the bearer token to a subject.
pub fn authenticate(validator: &TokenValidator, headers: &HeaderMap) -> Result<Subject> {
    let token = extract_bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = validator.validate(token)?;

    Ok(Subject {
        id: claims.subject_id(),
        role: claims.role,
    })
}

/// Authorize a subject against an operation's allowed-role set.
pub fn authorize(subject: &Subject, allowed: &[Role]) -> Result<()> {
    if allowed.contains(&subject.role) {
        Ok(())
    } else {
        tracing::warn!(
            subject_id = %subject.id,
            role = %subject.role,
            "Role not in allowed set"
        );
        Err(AppError::Forbidden)
    }
}
