mod service;

pub use service::{EnrollmentService, RosterEntry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A student's membership in a course. At most one enrollment may exist
/// per (student_id, course_id) pair; the store enforces that uniqueness
/// as the backstop behind the service-level existence check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(student_id: Uuid, course_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            course_id,
            created_at: Utc::now(),
        }
    }
}
