//! HTTP handlers: a thin shell over the services.
//!
//! Protected handlers compose the two access-control stages explicitly:
//! authenticate first, then the operation's allowed-role set, then the
//! service call (which applies any resource-specific ownership check).

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use uuid::Uuid;

use crate::access::{authenticate, authorize};
use crate::domain::course::{Course, CoursePatch};
use crate::domain::enrollment::{Enrollment, RosterEntry};
use crate::domain::user::{Role, User};
use crate::error::Result;
use crate::identity::AuthToken;
use crate::server::AppState;

use super::models::{
    CreateCourseRequest, EnrollRequest, LoginRequest, MessageResponse, RegisterRequest,
};

#[tracing::instrument(name = "http.register", skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthToken>> {
    let token = state
        .identity
        .register(&request.email, &request.password, request.role)
        .await?;
    Ok(Json(token))
}

#[tracing::instrument(name = "http.login", skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthToken>> {
    let token = state
        .identity
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(token))
}

/// Profile of the authenticated caller. Any role; the password hash is
/// skipped at serialization.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>> {
    let subject = authenticate(&state.validator, &headers)?;
    let user = state.identity.profile(subject.id).await?;
    Ok(Json(user))
}

#[tracing::instrument(name = "http.create_course", skip(state, headers, request))]
pub async fn create_course(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateCourseRequest>,
) -> Result<Json<Course>> {
    let subject = authenticate(&state.validator, &headers)?;
    authorize(&subject, &[Role::Instructor])?;

    let course = state
        .courses
        .create(request.title, request.description, subject.id)
        .await?;
    Ok(Json(course))
}

pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>> {
    Ok(Json(state.courses.find_all().await?))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Course>> {
    Ok(Json(state.courses.find_one(id).await?))
}

#[tracing::instrument(name = "http.update_course", skip(state, headers, patch))]
pub async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(patch): Json<CoursePatch>,
) -> Result<Json<Course>> {
    let subject = authenticate(&state.validator, &headers)?;
    authorize(&subject, &[Role::Instructor])?;

    let course = state.courses.update(id, patch, subject.id).await?;
    Ok(Json(course))
}

#[tracing::instrument(name = "http.delete_course", skip(state, headers))]
pub async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>> {
    let subject = authenticate(&state.validator, &headers)?;
    authorize(&subject, &[Role::Instructor, Role::Admin])?;

    state.courses.delete(id, subject.id, subject.role).await?;
    Ok(Json(MessageResponse {
        message: "Course deleted".to_string(),
    }))
}

#[tracing::instrument(name = "http.enroll", skip(state, headers, request))]
pub async fn enroll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<EnrollRequest>,
) -> Result<Json<Enrollment>> {
    let subject = authenticate(&state.validator, &headers)?;
    authorize(&subject, &[Role::Student])?;

    let enrollment = state
        .enrollments
        .enroll(request.course_id, subject.id)
        .await?;
    Ok(Json(enrollment))
}

#[tracing::instrument(name = "http.course_roster", skip(state, headers))]
pub async fn course_roster(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<RosterEntry>>> {
    let subject = authenticate(&state.validator, &headers)?;
    authorize(&subject, &[Role::Instructor])?;

    // The service validates the raw id so a malformed one is a
    // BadRequest, not a routing miss.
    let roster = state
        .enrollments
        .get_students(Some(&course_id), subject.id)
        .await?;
    Ok(Json(roster))
}

#[tracing::instrument(name = "http.full_roster", skip(state, headers))]
pub async fn full_roster(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RosterEntry>>> {
    let subject = authenticate(&state.validator, &headers)?;
    authorize(&subject, &[Role::Instructor])?;

    let roster = state.enrollments.get_students(None, subject.id).await?;
    Ok(Json(roster))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
