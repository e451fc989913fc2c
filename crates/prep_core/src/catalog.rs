//! crates/prep_core/src/catalog.rs
//!
//! Course, test and class browsing plus the enrollment and scheduling
//! workflows built on top of them.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{
    Achievement, ClassCategory, ClassEnrollment, Course, CourseDetail, EnrolledCourse,
    Enrollment, LiveClass, PracticeTest, Profile, ProfileUpdate, ScheduledTest, TestDetail,
};
use crate::error::{require_user, ServiceError, ServiceResult};
use crate::ports::DatabaseService;

/// Highest score a test can be completed with.
pub const MAX_TEST_SCORE: f64 = 10.0;

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<dyn DatabaseService>,
    clock: Clock,
}

impl CatalogService {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Clock) -> Self {
        Self { db, clock }
    }

    // --- Profiles ---

    pub async fn profile(&self, user_id: Uuid) -> ServiceResult<Profile> {
        require_user(user_id)?;
        self.db
            .fetch_profile(user_id)
            .await
            .map_err(ServiceError::fetch("profile"))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> ServiceResult<Profile> {
        require_user(user_id)?;
        self.db
            .update_profile(user_id, update)
            .await
            .map_err(ServiceError::write("profile"))
    }

    // --- Courses ---

    pub async fn list_courses(&self) -> ServiceResult<Vec<Course>> {
        self.db
            .list_courses()
            .await
            .map_err(ServiceError::fetch("courses"))
    }

    pub async fn course_detail(&self, course_id: Uuid) -> ServiceResult<CourseDetail> {
        let (course, modules) = futures::try_join!(
            async {
                self.db
                    .fetch_course(course_id)
                    .await
                    .map_err(ServiceError::fetch("course"))
            },
            async {
                self.db
                    .fetch_course_modules(course_id)
                    .await
                    .map_err(ServiceError::fetch("course modules"))
            },
        )?;
        Ok(CourseDetail { course, modules })
    }

    pub async fn enrolled_courses(&self, user_id: Uuid) -> ServiceResult<Vec<EnrolledCourse>> {
        require_user(user_id)?;
        self.db
            .fetch_enrolled_courses(user_id)
            .await
            .map_err(ServiceError::fetch("enrolled courses"))
    }

    /// Enrolls the user with zero progress.
    pub async fn enroll_in_course(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> ServiceResult<Enrollment> {
        require_user(user_id)?;
        self.db
            .fetch_course(course_id)
            .await
            .map_err(ServiceError::fetch("course"))?;
        let enrollment = self
            .db
            .insert_enrollment(user_id, course_id, self.clock.now())
            .await
            .map_err(ServiceError::write("enrollment"))?;
        debug!(%user_id, %course_id, "Enrolled in course");
        Ok(enrollment)
    }

    // --- Practice Tests ---

    pub async fn list_tests(&self) -> ServiceResult<Vec<PracticeTest>> {
        self.db
            .list_tests()
            .await
            .map_err(ServiceError::fetch("tests"))
    }

    pub async fn test_detail(&self, test_id: Uuid) -> ServiceResult<TestDetail> {
        let (test, sections) = futures::try_join!(
            async {
                self.db
                    .fetch_test(test_id)
                    .await
                    .map_err(ServiceError::fetch("test"))
            },
            async {
                self.db
                    .fetch_test_sections(test_id)
                    .await
                    .map_err(ServiceError::fetch("test sections"))
            },
        )?;
        Ok(TestDetail { test, sections })
    }

    pub async fn schedule_test(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> ServiceResult<ScheduledTest> {
        require_user(user_id)?;
        self.db
            .insert_scheduled_test(user_id, test_id, scheduled_for)
            .await
            .map_err(ServiceError::write("scheduled test"))
    }

    /// Records a finished attempt. Scores use the 0-10 band scale.
    pub async fn complete_test(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        score: f64,
    ) -> ServiceResult<ScheduledTest> {
        require_user(user_id)?;
        if !score.is_finite() || !(0.0..=MAX_TEST_SCORE).contains(&score) {
            return Err(ServiceError::InvalidInput(format!(
                "score {score} is outside 0-{MAX_TEST_SCORE}"
            )));
        }
        self.db
            .write_test_completion(user_id, test_id, score, self.clock.now())
            .await
            .map_err(ServiceError::write("test completion"))
    }

    /// The user's pending scheduled tests, soonest first, topped up to
    /// `limit` with catalog tests they have not scheduled.
    pub async fn upcoming_tests(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> ServiceResult<Vec<PracticeTest>> {
        require_user(user_id)?;
        let scheduled = self
            .db
            .fetch_pending_scheduled_tests(user_id, limit)
            .await
            .map_err(ServiceError::fetch("scheduled tests"))?;

        let mut upcoming: Vec<PracticeTest> =
            scheduled.into_iter().take(limit).map(|s| s.test).collect();
        if upcoming.len() < limit {
            let excluded: Vec<Uuid> = upcoming.iter().map(|t| t.id).collect();
            let recommended = self
                .db
                .fetch_tests_excluding(&excluded, limit - upcoming.len())
                .await
                .map_err(ServiceError::fetch("recommended tests"))?;
            upcoming.extend(recommended);
        }
        upcoming.truncate(limit);
        Ok(upcoming)
    }

    // --- Live Classes ---

    pub async fn list_classes(
        &self,
        category: Option<ClassCategory>,
    ) -> ServiceResult<Vec<LiveClass>> {
        self.db
            .list_classes(category)
            .await
            .map_err(ServiceError::fetch("classes"))
    }

    pub async fn class_detail(&self, class_id: Uuid) -> ServiceResult<LiveClass> {
        self.db
            .fetch_class(class_id)
            .await
            .map_err(ServiceError::fetch("class"))
    }

    pub async fn class_enrollment_count(&self, class_id: Uuid) -> ServiceResult<u32> {
        self.db
            .count_class_enrollments(class_id)
            .await
            .map_err(ServiceError::fetch("class enrollment count"))
    }

    pub async fn enrolled_classes(&self, user_id: Uuid) -> ServiceResult<Vec<ClassEnrollment>> {
        require_user(user_id)?;
        self.db
            .fetch_class_enrollments(user_id)
            .await
            .map_err(ServiceError::fetch("class enrollments"))
    }

    /// Enrolls the user in a class that still has free seats.
    pub async fn enroll_in_class(
        &self,
        user_id: Uuid,
        class_id: Uuid,
    ) -> ServiceResult<ClassEnrollment> {
        require_user(user_id)?;
        let class = self.class_detail(class_id).await?;
        let taken = self.class_enrollment_count(class_id).await?;
        if i64::from(taken) >= i64::from(class.max_capacity) {
            return Err(ServiceError::InvalidInput(format!(
                "class {class_id} is full"
            )));
        }
        self.db
            .insert_class_enrollment(user_id, class_id, self.clock.now())
            .await
            .map_err(ServiceError::write("class enrollment"))
    }

    pub async fn mark_class_attendance(
        &self,
        user_id: Uuid,
        class_id: Uuid,
        attended: bool,
    ) -> ServiceResult<ClassEnrollment> {
        require_user(user_id)?;
        self.db
            .write_class_attendance(user_id, class_id, attended)
            .await
            .map_err(ServiceError::write("class attendance"))
    }

    /// The user's unattended classes that have not started yet, soonest
    /// first, topped up to `limit` with future classes they are not
    /// enrolled in.
    pub async fn upcoming_classes(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> ServiceResult<Vec<LiveClass>> {
        require_user(user_id)?;
        let now = self.clock.now();
        let enrolled = self.enrolled_classes(user_id).await?;

        let excluded: Vec<Uuid> = enrolled.iter().map(|e| e.class.id).collect();

        let mut upcoming: Vec<LiveClass> = enrolled
            .into_iter()
            .filter(|e| !e.attended && e.class.starts_at > now)
            .map(|e| e.class)
            .collect();
        upcoming.sort_by_key(|c| c.starts_at);
        upcoming.truncate(limit);

        if upcoming.len() < limit {
            let recommended = self
                .db
                .fetch_future_classes_excluding(now, &excluded, limit - upcoming.len())
                .await
                .map_err(ServiceError::fetch("recommended classes"))?;
            upcoming.extend(recommended);
        }
        upcoming.truncate(limit);
        Ok(upcoming)
    }

    // --- Achievements ---

    pub async fn achievements(&self, user_id: Uuid) -> ServiceResult<Vec<Achievement>> {
        require_user(user_id)?;
        self.db
            .fetch_unlocked_achievements(user_id)
            .await
            .map_err(ServiceError::fetch("achievements"))
    }

    /// Unlocks an achievement. Unlocking twice returns the first unlock.
    pub async fn unlock_achievement(
        &self,
        user_id: Uuid,
        achievement_id: i32,
    ) -> ServiceResult<Achievement> {
        require_user(user_id)?;
        let existing = self
            .db
            .find_unlocked_achievement(user_id, achievement_id)
            .await
            .map_err(ServiceError::fetch("achievement"))?;
        if let Some(achievement) = existing {
            return Ok(achievement);
        }
        self.db
            .insert_unlocked_achievement(user_id, achievement_id, self.clock.now())
            .await
            .map_err(ServiceError::write("achievement"))
    }
}
