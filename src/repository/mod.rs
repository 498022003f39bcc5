//! Repository layer: the only path to durable state.
//!
//! Each entity gets one capability trait with exactly the operations its
//! service needs; the shared CRUD surface is a generic in-memory
//! collection rather than an inheritance chain. Absence is signalled
//! with `Ok(None)` or an empty vec, never an error: the "not found"
//! policy belongs to the calling service.

mod memory;

pub use memory::{MemoryCourseStore, MemoryEnrollmentStore, MemoryUserStore};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::course::{Course, CoursePatch};
use crate::domain::enrollment::Enrollment;
use crate::domain::user::User;
use crate::error::AppError;

/// Errors surfaced by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    /// The backend failed or is unreachable.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(detail) => AppError::Conflict(detail),
            StoreError::Backend(detail) => AppError::Internal(detail),
        }
    }
}

/// A stored document with a stable, store-visible identifier.
pub trait Document: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

impl Document for User {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Document for Course {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Document for Enrollment {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user. Fails with `StoreError::Duplicate` if the
    /// email is already taken (unique, case-sensitive as stored).
    async fn create(&self, user: User) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn create(&self, course: Course) -> Result<Course, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>, StoreError>;

    async fn find_all(&self) -> Result<Vec<Course>, StoreError>;

    /// Apply a patch as an atomic read-modify-write on one document.
    /// Returns `Ok(None)` when no course has the given id.
    async fn update(&self, id: Uuid, patch: CoursePatch) -> Result<Option<Course>, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn find_by_instructor(&self, instructor_id: Uuid) -> Result<Vec<Course>, StoreError>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Insert a new enrollment. The store enforces uniqueness of
    /// (student_id, course_id) and fails with `StoreError::Duplicate`
    /// when the pair already exists, the mandatory backstop behind the
    /// service-level existence check.
    async fn insert(&self, enrollment: Enrollment) -> Result<Enrollment, StoreError>;

    async fn find_by_student_and_course(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, StoreError>;

    async fn find_by_course(&self, course_id: Uuid) -> Result<Vec<Enrollment>, StoreError>;

    async fn find_by_courses(&self, course_ids: &[Uuid]) -> Result<Vec<Enrollment>, StoreError>;
}
