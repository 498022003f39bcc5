use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::cache::Cache;
use crate::domain::user::Role;
use crate::error::{AppError, Result};
use crate::repository::CourseStore;

use super::Course;

/// Cache key under which the full course listing is stored.
pub const COURSES_CACHE_KEY: &str = "courses";

/// Partial update for a course. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Owns course lifecycle and the ownership invariant; fronts the
/// listing read with a cache.
///
/// Ownership failures and missing courses produce the same `Forbidden`:
/// the existence of another instructor's course is not disclosed via a
/// different error.
pub struct CourseService {
    courses: Arc<dyn CourseStore>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl CourseService {
    pub fn new(courses: Arc<dyn CourseStore>, cache: Arc<dyn Cache>, cache_ttl: Duration) -> Self {
        Self {
            courses,
            cache,
            cache_ttl,
        }
    }

    /// Create a course owned by the calling instructor. The owner comes
    /// from the caller's validated identity, never from a client field.
    #[tracing::instrument(name = "courses.create", skip(self, title, description))]
    pub async fn create(
        &self,
        title: String,
        description: String,
        instructor_id: Uuid,
    ) -> Result<Course> {
        let course = self
            .courses
            .create(Course::new(title, description, instructor_id))
            .await?;

        self.invalidate_listing().await?;

        tracing::info!(course_id = %course.id, instructor_id = %instructor_id, "Course created");
        Ok(course)
    }

    /// Cache-aside listing read. A hit returns the cached snapshot
    /// verbatim; staleness within the TTL window is the accepted bound.
    /// Cache trouble on this path degrades to a repository read.
    #[tracing::instrument(name = "courses.find_all", skip(self))]
    pub async fn find_all(&self) -> Result<Vec<Course>> {
        match self.cache.get(COURSES_CACHE_KEY).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(courses) => return Ok(courses),
                Err(e) => {
                    tracing::warn!(error = %e, "Corrupt course cache entry, treating as miss");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Cache read failed, falling back to repository");
            }
        }

        let courses = self.courses.find_all().await?;

        match serde_json::to_string(&courses) {
            Ok(json) => {
                if let Err(e) = self.cache.set(COURSES_CACHE_KEY, &json, self.cache_ttl).await {
                    tracing::warn!(error = %e, "Failed to populate course cache");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize courses for cache");
            }
        }

        Ok(courses)
    }

    /// Uncached direct read.
    pub async fn find_one(&self, id: Uuid) -> Result<Course> {
        self.courses
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
    }

    /// Apply a patch to a course owned by the caller.
    #[tracing::instrument(name = "courses.update", skip(self, patch))]
    pub async fn update(&self, id: Uuid, patch: CoursePatch, instructor_id: Uuid) -> Result<Course> {
        // A missing course takes the same branch as a non-owned one.
        match self.courses.find_by_id(id).await? {
            Some(course) if course.instructor_id == instructor_id => {}
            _ => return Err(AppError::Forbidden),
        }

        let updated = self
            .courses
            .update(id, patch)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

        self.invalidate_listing().await?;

        tracing::info!(course_id = %id, "Course updated");
        Ok(updated)
    }

    /// Delete a course. Allowed for any Admin, or for the instructor
    /// owning it.
    #[tracing::instrument(name = "courses.delete", skip(self))]
    pub async fn delete(&self, id: Uuid, user_id: Uuid, role: Role) -> Result<()> {
        if role != Role::Admin {
            match self.courses.find_by_id(id).await? {
                Some(course) if course.instructor_id == user_id => {}
                _ => return Err(AppError::Forbidden),
            }
        }

        self.courses.delete(id).await?;
        self.invalidate_listing().await?;

        tracing::info!(course_id = %id, user_id = %user_id, "Course deleted");
        Ok(())
    }

    /// Invalidation happens-after the mutating write commits. A failure
    /// here surfaces as an internal fault: swallowing it would let the
    /// listing serve the pre-mutation snapshot for a full TTL.
    async fn invalidate_listing(&self) -> Result<()> {
        self.cache
            .del(COURSES_CACHE_KEY)
            .await
            .map_err(|e| AppError::Internal(format!("Cache invalidation failed: {}", e)))
    }
}
