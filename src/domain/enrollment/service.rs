use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::events::{EnrollmentCreated, EventPublisher};
use crate::repository::{CourseStore, EnrollmentStore, StoreError};

use super::Enrollment;

/// Roster projection: exactly the pair, nothing else. The repository
/// never returns credentials, but this projection is the second,
/// service-level layer keeping student fields out of instructor views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub student_id: Uuid,
    pub course_id: Uuid,
}

impl From<Enrollment> for RosterEntry {
    fn from(e: Enrollment) -> Self {
        Self {
            student_id: e.student_id,
            course_id: e.course_id,
        }
    }
}

/// Owns the enrollment uniqueness invariant and roster visibility.
pub struct EnrollmentService {
    enrollments: Arc<dyn EnrollmentStore>,
    courses: Arc<dyn CourseStore>,
    events: EventPublisher,
}

impl EnrollmentService {
    pub fn new(
        enrollments: Arc<dyn EnrollmentStore>,
        courses: Arc<dyn CourseStore>,
        events: EventPublisher,
    ) -> Self {
        Self {
            enrollments,
            courses,
            events,
        }
    }

    /// Enroll a student in a course.
    ///
    /// The existence check is the fast path; two concurrent calls can
    /// both pass it, so the store's unique (student, course) constraint
    /// is the real enforcement, and a duplicate insert maps to the same
    /// error as the fast path. The post-commit event is fire-and-forget
    /// relative to this request.
    #[tracing::instrument(name = "enrollments.enroll", skip(self))]
    pub async fn enroll(&self, course_id: Uuid, student_id: Uuid) -> Result<Enrollment> {
        if self
            .enrollments
            .find_by_student_and_course(student_id, course_id)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest("Already enrolled".to_string()));
        }

        let enrollment = match self
            .enrollments
            .insert(Enrollment::new(student_id, course_id))
            .await
        {
            Ok(enrollment) => enrollment,
            Err(StoreError::Duplicate(_)) => {
                return Err(AppError::BadRequest("Already enrolled".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            enrollment_id = %enrollment.id,
            student_id = %student_id,
            course_id = %course_id,
            "Enrollment created"
        );

        self.events.publish(EnrollmentCreated {
            student_id,
            course_id,
        });

        Ok(enrollment)
    }

    /// Roster lookup for an instructor.
    ///
    /// With a course id: the id must parse and the course must belong
    /// to the caller; a missing course takes the ownership-failure
    /// branch, same as in the course service. Without one: the union of
    /// enrollments across all owned courses; no ownership check is
    /// needed because the course set derives from ownership itself.
    #[tracing::instrument(name = "enrollments.get_students", skip(self))]
    pub async fn get_students(
        &self,
        course_id: Option<&str>,
        instructor_id: Uuid,
    ) -> Result<Vec<RosterEntry>> {
        let enrollments = match course_id {
            Some(raw) => {
                let course_id = Uuid::parse_str(raw)
                    .map_err(|_| AppError::BadRequest("Invalid course id".to_string()))?;

                match self.courses.find_by_id(course_id).await? {
                    Some(course) if course.instructor_id == instructor_id => {}
                    _ => return Err(AppError::Forbidden),
                }

                self.enrollments.find_by_course(course_id).await?
            }
            None => {
                let courses = self.courses.find_by_instructor(instructor_id).await?;
                let course_ids: Vec<Uuid> = courses.iter().map(|c| c.id).collect();
                self.enrollments.find_by_courses(&course_ids).await?
            }
        };

        Ok(enrollments.into_iter().map(RosterEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    use crate::domain::course::Course;
    use crate::events::EventDispatcher;
    use crate::jobs::{JobQueue, MemoryJobQueue, SEND_EMAIL_JOB};
    use crate::repository::{MemoryCourseStore, MemoryEnrollmentStore};

    struct Fixture {
        service: EnrollmentService,
        courses: Arc<MemoryCourseStore>,
        queue: Arc<MemoryJobQueue>,
        _shutdown_tx: broadcast::Sender<()>,
    }

    /// Enrollment service wired to a live dispatcher and job queue.
    fn fixture() -> Fixture {
        let courses = Arc::new(MemoryCourseStore::new());
        let queue = Arc::new(MemoryJobQueue::new(16));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (publisher, dispatcher) =
            EventDispatcher::new(16, queue.clone() as Arc<dyn JobQueue>, shutdown_rx);
        tokio::spawn(dispatcher.run());

        Fixture {
            service: EnrollmentService::new(
                Arc::new(MemoryEnrollmentStore::new()),
                courses.clone(),
                publisher,
            ),
            courses,
            queue,
            _shutdown_tx: shutdown_tx,
        }
    }

    async fn add_course(fixture: &Fixture, instructor_id: Uuid) -> Course {
        fixture
            .courses
            .create(Course::new("Rust", "intro", instructor_id))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_enroll_once_then_already_enrolled() {
        let fixture = fixture();
        let course = add_course(&fixture, Uuid::new_v4()).await;
        let student = Uuid::new_v4();

        fixture.service.enroll(course.id, student).await.unwrap();

        let result = fixture.service.enroll(course.id, student).await;
        match result {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Already enrolled"),
            other => panic!("expected BadRequest, got {:?}", other.map(|e| e.id)),
        }
    }

    #[tokio::test]
    async fn test_enroll_emits_send_email_job() {
        let fixture = fixture();
        let course = add_course(&fixture, Uuid::new_v4()).await;
        let student = Uuid::new_v4();

        fixture.service.enroll(course.id, student).await.unwrap();

        let job = fixture.queue.dequeue().await.unwrap();
        assert_eq!(job.name, SEND_EMAIL_JOB);
        let event: EnrollmentCreated = serde_json::from_value(job.payload).unwrap();
        assert_eq!(event.student_id, student);
        assert_eq!(event.course_id, course.id);
    }

    #[tokio::test]
    async fn test_enroll_succeeds_when_event_channel_is_dead() {
        // Fire-and-forget: a dead dispatch path must not fail the
        // committed enrollment.
        let queue = Arc::new(MemoryJobQueue::new(1));
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (publisher, dispatcher) =
            EventDispatcher::new(1, queue as Arc<dyn JobQueue>, shutdown_rx);
        drop(dispatcher);

        let service = EnrollmentService::new(
            Arc::new(MemoryEnrollmentStore::new()),
            Arc::new(MemoryCourseStore::new()),
            publisher,
        );

        service.enroll(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_students_malformed_id() {
        let fixture = fixture();
        let result = fixture
            .service
            .get_students(Some("not-a-uuid"), Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_get_students_requires_ownership() {
        let fixture = fixture();
        let owner = Uuid::new_v4();
        let course = add_course(&fixture, owner).await;

        let other = Uuid::new_v4();
        let result = fixture
            .service
            .get_students(Some(&course.id.to_string()), other)
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_get_students_missing_course_is_forbidden() {
        let fixture = fixture();
        let result = fixture
            .service
            .get_students(Some(&Uuid::new_v4().to_string()), Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_get_students_for_owned_course() {
        let fixture = fixture();
        let owner = Uuid::new_v4();
        let course = add_course(&fixture, owner).await;
        let student = Uuid::new_v4();
        fixture.service.enroll(course.id, student).await.unwrap();

        let roster = fixture
            .service
            .get_students(Some(&course.id.to_string()), owner)
            .await
            .unwrap();
        assert_eq!(
            roster,
            vec![RosterEntry {
                student_id: student,
                course_id: course.id
            }]
        );
    }

    #[tokio::test]
    async fn test_get_students_union_across_owned_courses() {
        let fixture = fixture();
        let owner = Uuid::new_v4();
        let c1 = add_course(&fixture, owner).await;
        let c2 = add_course(&fixture, owner).await;
        let foreign = add_course(&fixture, Uuid::new_v4()).await;

        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        fixture.service.enroll(c1.id, s1).await.unwrap();
        fixture.service.enroll(c2.id, s2).await.unwrap();
        fixture.service.enroll(foreign.id, s1).await.unwrap();

        let roster = fixture.service.get_students(None, owner).await.unwrap();
        assert_eq!(roster.len(), 2);
        assert!(roster.iter().all(|e| e.course_id != foreign.id));
    }

    #[tokio::test]
    async fn test_roster_projection_shape() {
        let fixture = fixture();
        let owner = Uuid::new_v4();
        let course = add_course(&fixture, owner).await;
        fixture.service.enroll(course.id, Uuid::new_v4()).await.unwrap();

        let roster = fixture
            .service
            .get_students(Some(&course.id.to_string()), owner)
            .await
            .unwrap();

        let json = serde_json::to_value(&roster).unwrap();
        let entry = json.as_array().unwrap()[0].as_object().unwrap();
        let mut keys: Vec<&str> = entry.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["course_id", "student_id"]);
    }
}
