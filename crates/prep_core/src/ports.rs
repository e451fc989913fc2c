//! crates/prep_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete data store behind them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Achievement, ClassCategory, ClassEnrollment, Course, CourseModule, CourseProgress,
    EnrolledCourse, Enrollment, LiveClass, PracticeTest, Profile, ProfileUpdate,
    ScheduledTest, StudyLogEntry, TestResult, TestSection, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Typed access to the relational store. Implementations validate raw rows
/// before handing them to the core.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth & Profiles ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: Option<&str>,
    ) -> PortResult<Profile>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<Profile>;

    // --- Progress Facts ---
    async fn fetch_completed_test_results(&self, user_id: Uuid) -> PortResult<Vec<TestResult>>;

    async fn fetch_study_log(&self, user_id: Uuid) -> PortResult<Vec<StudyLogEntry>>;

    async fn fetch_unlocked_achievements(&self, user_id: Uuid) -> PortResult<Vec<Achievement>>;

    async fn find_unlocked_achievement(
        &self,
        user_id: Uuid,
        achievement_id: i32,
    ) -> PortResult<Option<Achievement>>;

    async fn insert_unlocked_achievement(
        &self,
        user_id: Uuid,
        achievement_id: i32,
        unlocked_at: DateTime<Utc>,
    ) -> PortResult<Achievement>;

    // --- Courses ---
    async fn list_courses(&self) -> PortResult<Vec<Course>>;

    async fn fetch_course(&self, course_id: Uuid) -> PortResult<Course>;

    /// Modules of a course, ordered by position.
    async fn fetch_course_modules(&self, course_id: Uuid) -> PortResult<Vec<CourseModule>>;

    async fn fetch_module(&self, module_id: i32) -> PortResult<CourseModule>;

    /// Stores a module's completion flag and returns the updated module,
    /// including the course it belongs to.
    async fn write_module_completion(
        &self,
        module_id: i32,
        completed: bool,
    ) -> PortResult<CourseModule>;

    async fn write_course_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: CourseProgress,
        last_accessed: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn fetch_enrollment(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Enrollment>;

    async fn fetch_enrolled_courses(&self, user_id: Uuid) -> PortResult<Vec<EnrolledCourse>>;

    async fn insert_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<Enrollment>;

    // --- Practice Tests ---
    async fn list_tests(&self) -> PortResult<Vec<PracticeTest>>;

    async fn fetch_test(&self, test_id: Uuid) -> PortResult<PracticeTest>;

    /// Sections of a test, ordered by position.
    async fn fetch_test_sections(&self, test_id: Uuid) -> PortResult<Vec<TestSection>>;

    /// Scheduled tests the user has not completed yet, soonest first.
    async fn fetch_pending_scheduled_tests(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<ScheduledTest>>;

    async fn fetch_tests_excluding(
        &self,
        excluded: &[Uuid],
        limit: usize,
    ) -> PortResult<Vec<PracticeTest>>;

    async fn insert_scheduled_test(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> PortResult<ScheduledTest>;

    /// Completes the user's soonest pending attempt at the test. Completed
    /// attempts are never rewritten; with no pending attempt this is `NotFound`.
    async fn write_test_completion(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        score: f64,
        completed_at: DateTime<Utc>,
    ) -> PortResult<ScheduledTest>;

    // --- Live Classes ---
    /// Classes ordered by start time, optionally restricted to one category.
    async fn list_classes(&self, category: Option<ClassCategory>) -> PortResult<Vec<LiveClass>>;

    async fn fetch_class(&self, class_id: Uuid) -> PortResult<LiveClass>;

    async fn fetch_class_enrollments(&self, user_id: Uuid) -> PortResult<Vec<ClassEnrollment>>;

    async fn count_class_enrollments(&self, class_id: Uuid) -> PortResult<u32>;

    async fn insert_class_enrollment(
        &self,
        user_id: Uuid,
        class_id: Uuid,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<ClassEnrollment>;

    async fn write_class_attendance(
        &self,
        user_id: Uuid,
        class_id: Uuid,
        attended: bool,
    ) -> PortResult<ClassEnrollment>;

    /// Classes starting after `after`, soonest first, skipping `excluded` ids.
    async fn fetch_future_classes_excluding(
        &self,
        after: DateTime<Utc>,
        excluded: &[Uuid],
        limit: usize,
    ) -> PortResult<Vec<LiveClass>>;
}
