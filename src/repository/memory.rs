//! In-memory document store over DashMap.
//!
//! The bundled backend for the repository traits. Documents live in a
//! generic collection keyed by id; entity stores layer their own
//! secondary indexes on top. All per-document mutations go through
//! DashMap entries, which gives the atomic read-modify-write the
//! services rely on. Contents are lost on restart.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::course::{Course, CoursePatch};
use crate::domain::enrollment::Enrollment;
use crate::domain::user::User;

use super::{CourseStore, Document, EnrollmentStore, StoreError, UserStore};

/// Generic id-keyed collection shared by the entity stores.
struct MemoryCollection<T: Document> {
    docs: DashMap<Uuid, T>,
}

impl<T: Document> MemoryCollection<T> {
    fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    fn insert(&self, doc: T) -> T {
        self.docs.insert(doc.id(), doc.clone());
        doc
    }

    fn get(&self, id: Uuid) -> Option<T> {
        self.docs.get(&id).map(|d| d.value().clone())
    }

    /// Snapshot of all documents, ordered by id for deterministic reads.
    fn list(&self) -> Vec<T> {
        let mut docs: Vec<T> = self.docs.iter().map(|d| d.value().clone()).collect();
        docs.sort_by_key(|d| d.id());
        docs
    }

    fn list_where(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut docs: Vec<T> = self
            .docs
            .iter()
            .filter(|d| predicate(d.value()))
            .map(|d| d.value().clone())
            .collect();
        docs.sort_by_key(|d| d.id());
        docs
    }

    /// Atomic read-modify-write on one document.
    fn update_with(&self, id: Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        self.docs.get_mut(&id).map(|mut doc| {
            f(doc.value_mut());
            doc.value().clone()
        })
    }

    fn remove(&self, id: Uuid) -> Option<T> {
        self.docs.remove(&id).map(|(_, doc)| doc)
    }

    fn find_first(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        self.docs
            .iter()
            .find(|d| predicate(d.value()))
            .map(|d| d.value().clone())
    }
}

pub struct MemoryUserStore {
    users: MemoryCollection<User>,
    /// Unique index over email.
    emails: DashMap<String, Uuid>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: MemoryCollection::new(),
            emails: DashMap::new(),
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: User) -> Result<User, StoreError> {
        // Claim the email in the unique index first; the entry guard
        // makes check-and-claim atomic.
        match self.emails.entry(user.email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::Duplicate(format!(
                    "email {} already registered",
                    user.email
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }

        Ok(self.users.insert(user))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.find_first(|u| u.email == email))
    }
}

pub struct MemoryCourseStore {
    courses: MemoryCollection<Course>,
}

impl MemoryCourseStore {
    pub fn new() -> Self {
        Self {
            courses: MemoryCollection::new(),
        }
    }
}

impl Default for MemoryCourseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CourseStore for MemoryCourseStore {
    async fn create(&self, course: Course) -> Result<Course, StoreError> {
        Ok(self.courses.insert(course))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        Ok(self.courses.get(id))
    }

    async fn find_all(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.courses.list())
    }

    async fn update(&self, id: Uuid, patch: CoursePatch) -> Result<Option<Course>, StoreError> {
        Ok(self.courses.update_with(id, |course| {
            if let Some(title) = patch.title {
                course.title = title;
            }
            if let Some(description) = patch.description {
                course.description = description;
            }
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.courses.remove(id).is_some())
    }

    async fn find_by_instructor(&self, instructor_id: Uuid) -> Result<Vec<Course>, StoreError> {
        Ok(self
            .courses
            .list_where(|c| c.instructor_id == instructor_id))
    }
}

pub struct MemoryEnrollmentStore {
    enrollments: MemoryCollection<Enrollment>,
    /// Unique index over (student_id, course_id).
    pairs: DashMap<(Uuid, Uuid), Uuid>,
}

impl MemoryEnrollmentStore {
    pub fn new() -> Self {
        Self {
            enrollments: MemoryCollection::new(),
            pairs: DashMap::new(),
        }
    }
}

impl Default for MemoryEnrollmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnrollmentStore for MemoryEnrollmentStore {
    async fn insert(&self, enrollment: Enrollment) -> Result<Enrollment, StoreError> {
        let key = (enrollment.student_id, enrollment.course_id);

        // Entry guard makes the uniqueness check and the claim one
        // atomic step, so concurrent inserts for the same pair cannot
        // both commit.
        match self.pairs.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::Duplicate(format!(
                    "enrollment ({}, {}) already exists",
                    enrollment.student_id, enrollment.course_id
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(enrollment.id);
            }
        }

        Ok(self.enrollments.insert(enrollment))
    }

    async fn find_by_student_and_course(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, StoreError> {
        let id = self.pairs.get(&(student_id, course_id)).map(|e| *e);
        Ok(id.and_then(|id| self.enrollments.get(id)))
    }

    async fn find_by_course(&self, course_id: Uuid) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self.enrollments.list_where(|e| e.course_id == course_id))
    }

    async fn find_by_courses(&self, course_ids: &[Uuid]) -> Result<Vec<Enrollment>, StoreError> {
        let wanted: HashSet<Uuid> = course_ids.iter().copied().collect();
        Ok(self
            .enrollments
            .list_where(|e| wanted.contains(&e.course_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;

    #[tokio::test]
    async fn test_user_email_unique() {
        let store = MemoryUserStore::new();
        store
            .create(User::new("a@x.com", "hash", Role::Student))
            .await
            .unwrap();

        let result = store.create(User::new("a@x.com", "hash2", Role::Student)).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let store = MemoryUserStore::new();
        let user = store
            .create(User::new("b@x.com", "hash", Role::Instructor))
            .await
            .unwrap();

        let found = store.find_by_email("b@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(store.find_by_email("missing@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_course_update_applies_patch() {
        let store = MemoryCourseStore::new();
        let course = store
            .create(Course::new("Rust", "intro", Uuid::new_v4()))
            .await
            .unwrap();

        let updated = store
            .update(
                course.id,
                CoursePatch {
                    title: Some("Advanced Rust".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "Advanced Rust");
        assert_eq!(updated.description, "intro");
    }

    #[tokio::test]
    async fn test_course_update_missing_is_none() {
        let store = MemoryCourseStore::new();
        let result = store
            .update(Uuid::new_v4(), CoursePatch::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_enrollment_pair_unique() {
        let store = MemoryEnrollmentStore::new();
        let student = Uuid::new_v4();
        let course = Uuid::new_v4();

        store.insert(Enrollment::new(student, course)).await.unwrap();
        let result = store.insert(Enrollment::new(student, course)).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_enrollment_unique_under_concurrency() {
        let store = std::sync::Arc::new(MemoryEnrollmentStore::new());
        let student = Uuid::new_v4();
        let course = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(Enrollment::new(student, course)).await
            }));
        }

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                committed += 1;
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(store.find_by_course(course).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_courses_union() {
        let store = MemoryEnrollmentStore::new();
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        let c3 = Uuid::new_v4();

        store.insert(Enrollment::new(Uuid::new_v4(), c1)).await.unwrap();
        store.insert(Enrollment::new(Uuid::new_v4(), c2)).await.unwrap();
        store.insert(Enrollment::new(Uuid::new_v4(), c3)).await.unwrap();

        let union = store.find_by_courses(&[c1, c2]).await.unwrap();
        assert_eq!(union.len(), 2);
        assert!(union.iter().all(|e| e.course_id == c1 || e.course_id == c2));
    }
}
