use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::auth::{TokenIssuer, TokenValidator};
use crate::cache::create_cache;
use crate::config::Settings;
use crate::domain::course::CourseService;
use crate::domain::enrollment::EnrollmentService;
use crate::error::Result;
use crate::events::EventDispatcher;
use crate::identity::IdentityService;
use crate::jobs::{EmailWorker, JobQueue, MemoryJobQueue};
use crate::repository::{MemoryCourseStore, MemoryEnrollmentStore, MemoryUserStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub validator: Arc<TokenValidator>,
    pub identity: Arc<IdentityService>,
    pub courses: Arc<CourseService>,
    pub enrollments: Arc<EnrollmentService>,
}

impl AppState {
    /// Wire up services and their background tasks. The caller spawns
    /// the returned dispatcher and worker and owns the shutdown signal.
    pub fn new(
        settings: Settings,
        shutdown: &broadcast::Sender<()>,
    ) -> Result<(Self, EventDispatcher, EmailWorker)> {
        let validator = Arc::new(TokenValidator::new(&settings.jwt));

        let user_store = Arc::new(MemoryUserStore::new());
        let course_store = Arc::new(MemoryCourseStore::new());
        let enrollment_store = Arc::new(MemoryEnrollmentStore::new());

        let cache = create_cache(&settings.cache);

        let queue: Arc<dyn JobQueue> = Arc::new(MemoryJobQueue::new(settings.queue.capacity));
        let (publisher, dispatcher) = EventDispatcher::new(
            settings.queue.event_capacity,
            queue.clone(),
            shutdown.subscribe(),
        );
        let worker = EmailWorker::new(queue, shutdown.subscribe());

        let identity = Arc::new(IdentityService::new(
            user_store,
            TokenIssuer::new(&settings.jwt),
            validator.clone(),
            settings.auth.clone(),
        )?);

        let courses = Arc::new(CourseService::new(
            course_store.clone(),
            cache,
            Duration::from_secs(settings.cache.courses_ttl_seconds),
        ));

        let enrollments = Arc::new(EnrollmentService::new(
            enrollment_store,
            course_store,
            publisher,
        ));

        Ok((
            Self {
                settings: Arc::new(settings),
                validator,
                identity,
                courses,
                enrollments,
            },
            dispatcher,
            worker,
        ))
    }
}
