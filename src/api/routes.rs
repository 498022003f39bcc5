use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::handlers::{
    course_roster, create_course, delete_course, enroll, full_roster, get_course, health,
    list_courses, login, me, register, update_course,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Identity
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        // Users
        .route("/users/me", get(me))
        // Courses
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/{id}",
            get(get_course).patch(update_course).delete(delete_course),
        )
        // Enrollments
        .route("/enrollments", post(enroll))
        .route("/enrollments/students", get(full_roster))
        .route("/enrollments/{course_id}/students", get(course_roster))
}
