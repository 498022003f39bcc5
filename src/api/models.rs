use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::Role;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Defaults to Student when omitted.
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub course_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
