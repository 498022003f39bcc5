mod handlers;
mod models;
mod routes;

pub use models::{
    CreateCourseRequest, EnrollRequest, LoginRequest, MessageResponse, RegisterRequest,
};
pub use routes::api_routes;
