mod service;

pub use service::{CourseService, CoursePatch, COURSES_CACHE_KEY};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A course owned by exactly one instructor. `instructor_id` is set once
/// at creation from the caller's validated identity and never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub instructor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        instructor_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            instructor_id,
            created_at: Utc::now(),
        }
    }
}
