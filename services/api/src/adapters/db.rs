//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `prep_core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use prep_core::domain::{
    Achievement, ClassCategory, ClassEnrollment, Course, CourseModule, CourseProgress,
    EnrolledCourse, Enrollment, Level, LiveClass, PracticeTest, Profile, ProfileUpdate,
    ScheduledTest, SkillType, StudyLogEntry, TestKind, TestResult, TestSection,
    UserCredentials,
};
use prep_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::fmt::Display;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps a single-row lookup failure, turning a missing row into `NotFound`.
fn lookup_error(what: &'static str, id: impl Display) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        _ => unexpected(e),
    }
}

/// Maps a failed insert or update. Constraint violations keep their meaning.
fn write_error(what: &'static str) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return PortError::Conflict(format!("{} already exists", what));
            }
            if db_err.is_foreign_key_violation() {
                return PortError::NotFound(format!("{} refers to a missing row", what));
            }
        }
        unexpected(e)
    }
}

fn invalid(column: &str, value: impl Display) -> PortError {
    PortError::Unexpected(format!("invalid {} value in database: '{}'", column, value))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const PROFILE_COLUMNS: &str = "id, email, full_name, avatar_url, created_at";

const COURSE_COLUMNS: &str =
    "c.id, c.title, c.description, c.image, c.instructor, c.duration, c.level";

const MODULE_COLUMNS: &str = "id, course_id, title, duration, position, completed";

const TEST_COLUMNS: &str =
    "t.id, t.title, t.kind, t.duration, t.questions, t.description, t.instructions";

const SCHEDULED_COLUMNS: &str =
    "ut.id AS user_test_id, ut.user_id, ut.scheduled_date, ut.completed, ut.score";

const CLASS_COLUMNS: &str = "cl.id, cl.title, cl.instructor, cl.instructor_role, cl.starts_at, \
     cl.duration, cl.level, cl.category, cl.description, cl.topics, cl.max_capacity";

const CLASS_ENROLLMENT_COLUMNS: &str =
    "uc.id AS enrollment_id, uc.user_id, uc.enrolled_date, uc.attended";

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    email: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            avatar_url: self.avatar_url,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct TestResultRecord {
    id: Uuid,
    test_id: Uuid,
    test_type: String,
    score: Option<f64>,
    completed_at: DateTime<Utc>,
}
impl TestResultRecord {
    fn to_domain(self) -> TestResult {
        TestResult {
            id: self.id,
            test_id: self.test_id,
            skill: SkillType::from_test_type(&self.test_type),
            score: self.score,
            completed_at: self.completed_at,
        }
    }
}

#[derive(FromRow)]
struct StudyLogRecord {
    date: NaiveDate,
    duration: i32,
}
impl StudyLogRecord {
    fn to_domain(self) -> PortResult<StudyLogEntry> {
        let duration_minutes =
            u32::try_from(self.duration).map_err(|_| invalid("study_logs.duration", self.duration))?;
        Ok(StudyLogEntry {
            date: self.date,
            duration_minutes,
        })
    }
}

#[derive(FromRow)]
struct AchievementRecord {
    id: i32,
    name: String,
    description: String,
    icon: String,
    unlocked_at: DateTime<Utc>,
}
impl AchievementRecord {
    fn to_domain(self) -> Achievement {
        Achievement {
            id: self.id,
            name: self.name,
            description: self.description,
            icon: self.icon,
            unlocked_at: self.unlocked_at,
        }
    }
}

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    title: String,
    description: String,
    image: String,
    instructor: String,
    duration: String,
    level: String,
}
impl CourseRecord {
    fn to_domain(self) -> PortResult<Course> {
        let level = Level::parse(&self.level).ok_or_else(|| invalid("courses.level", &self.level))?;
        Ok(Course {
            id: self.id,
            title: self.title,
            description: self.description,
            image: self.image,
            instructor: self.instructor,
            duration: self.duration,
            level,
        })
    }
}

#[derive(FromRow)]
struct ModuleRecord {
    id: i32,
    course_id: Uuid,
    title: String,
    duration: String,
    position: i32,
    completed: bool,
}
impl ModuleRecord {
    fn to_domain(self) -> CourseModule {
        CourseModule {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            duration: self.duration,
            position: self.position,
            completed: self.completed,
        }
    }
}

#[derive(FromRow)]
struct EnrollmentRecord {
    enrollment_id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    progress: i32,
    enrolled_date: DateTime<Utc>,
    last_accessed: Option<DateTime<Utc>>,
}
impl EnrollmentRecord {
    fn to_domain(self) -> PortResult<Enrollment> {
        let progress = CourseProgress::from_percent(self.progress)
            .ok_or_else(|| invalid("user_courses.progress", self.progress))?;
        Ok(Enrollment {
            id: self.enrollment_id,
            user_id: self.user_id,
            course_id: self.course_id,
            progress,
            enrolled_at: self.enrolled_date,
            last_accessed: self.last_accessed,
        })
    }
}

#[derive(FromRow)]
struct EnrolledCourseRecord {
    #[sqlx(flatten)]
    enrollment: EnrollmentRecord,
    #[sqlx(flatten)]
    course: CourseRecord,
}
impl EnrolledCourseRecord {
    fn to_domain(self) -> PortResult<EnrolledCourse> {
        Ok(EnrolledCourse {
            enrollment: self.enrollment.to_domain()?,
            course: self.course.to_domain()?,
        })
    }
}

#[derive(FromRow)]
struct TestRecord {
    id: Uuid,
    title: String,
    kind: String,
    duration: String,
    questions: i32,
    description: String,
    instructions: Vec<String>,
}
impl TestRecord {
    fn to_domain(self) -> PortResult<PracticeTest> {
        let kind = TestKind::parse(&self.kind).ok_or_else(|| invalid("tests.kind", &self.kind))?;
        Ok(PracticeTest {
            id: self.id,
            title: self.title,
            kind,
            duration: self.duration,
            questions: self.questions,
            description: self.description,
            instructions: self.instructions,
        })
    }
}

#[derive(FromRow)]
struct SectionRecord {
    id: i32,
    test_id: Uuid,
    title: String,
    questions: i32,
    duration: String,
    description: String,
    position: i32,
}
impl SectionRecord {
    fn to_domain(self) -> TestSection {
        TestSection {
            id: self.id,
            test_id: self.test_id,
            title: self.title,
            questions: self.questions,
            duration: self.duration,
            description: self.description,
            position: self.position,
        }
    }
}

#[derive(FromRow)]
struct ScheduledTestRecord {
    user_test_id: Uuid,
    user_id: Uuid,
    scheduled_date: Option<DateTime<Utc>>,
    completed: bool,
    score: Option<f64>,
    #[sqlx(flatten)]
    test: TestRecord,
}
impl ScheduledTestRecord {
    fn to_domain(self) -> PortResult<ScheduledTest> {
        Ok(ScheduledTest {
            id: self.user_test_id,
            user_id: self.user_id,
            test: self.test.to_domain()?,
            scheduled_for: self.scheduled_date,
            completed: self.completed,
            score: self.score,
        })
    }
}

#[derive(FromRow)]
struct ClassRecord {
    id: Uuid,
    title: String,
    instructor: String,
    instructor_role: Option<String>,
    starts_at: DateTime<Utc>,
    duration: String,
    level: String,
    category: String,
    description: String,
    topics: Vec<String>,
    max_capacity: i32,
}
impl ClassRecord {
    fn to_domain(self) -> PortResult<LiveClass> {
        let level = Level::parse(&self.level).ok_or_else(|| invalid("classes.level", &self.level))?;
        let category = ClassCategory::parse(&self.category)
            .ok_or_else(|| invalid("classes.category", &self.category))?;
        Ok(LiveClass {
            id: self.id,
            title: self.title,
            instructor: self.instructor,
            instructor_role: self.instructor_role,
            starts_at: self.starts_at,
            duration: self.duration,
            level,
            category,
            description: self.description,
            topics: self.topics,
            max_capacity: self.max_capacity,
        })
    }
}

#[derive(FromRow)]
struct ClassEnrollmentRecord {
    enrollment_id: Uuid,
    user_id: Uuid,
    enrolled_date: DateTime<Utc>,
    attended: bool,
    #[sqlx(flatten)]
    class: ClassRecord,
}
impl ClassEnrollmentRecord {
    fn to_domain(self) -> PortResult<ClassEnrollment> {
        Ok(ClassEnrollment {
            id: self.enrollment_id,
            user_id: self.user_id,
            class: self.class.to_domain()?,
            enrolled_at: self.enrolled_date,
            attended: self.attended,
        })
    }
}

/// Converts a batch of records, failing on the first invalid row.
fn convert_all<R, T>(records: Vec<R>, convert: impl Fn(R) -> PortResult<T>) -> PortResult<Vec<T>> {
    records.into_iter().map(convert).collect()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Auth & Profiles ---

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: Option<&str>,
    ) -> PortResult<Profile> {
        let sql = format!(
            "INSERT INTO profiles (email, hashed_password, full_name) VALUES ($1, $2, $3) RETURNING {}",
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(email)
            .bind(hashed_password)
            .bind(full_name)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error("user"))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM profiles WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error("User", email))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(write_error("auth session"))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_error("Profile", user_id))?;
        Ok(record.to_domain())
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<Profile> {
        let sql = format!(
            "UPDATE profiles SET full_name = COALESCE($2, full_name), avatar_url = COALESCE($3, avatar_url) \
             WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .bind(update.full_name)
            .bind(update.avatar_url)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_error("Profile", user_id))?;
        Ok(record.to_domain())
    }

    // --- Progress Facts ---

    async fn fetch_completed_test_results(&self, user_id: Uuid) -> PortResult<Vec<TestResult>> {
        let records = sqlx::query_as::<_, TestResultRecord>(
            "SELECT ut.id, ut.test_id, t.test_type, ut.score, \
                    COALESCE(ut.completed_at, ut.created_at) AS completed_at \
             FROM user_tests ut JOIN tests t ON t.id = ut.test_id \
             WHERE ut.user_id = $1 AND ut.completed \
             ORDER BY completed_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn fetch_study_log(&self, user_id: Uuid) -> PortResult<Vec<StudyLogEntry>> {
        let records = sqlx::query_as::<_, StudyLogRecord>(
            "SELECT date, duration FROM study_logs WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        convert_all(records, StudyLogRecord::to_domain)
    }

    async fn fetch_unlocked_achievements(&self, user_id: Uuid) -> PortResult<Vec<Achievement>> {
        let records = sqlx::query_as::<_, AchievementRecord>(
            "SELECT a.id, a.name, a.description, a.icon, ua.unlocked_at \
             FROM user_achievements ua JOIN achievements a ON a.id = ua.achievement_id \
             WHERE ua.user_id = $1 ORDER BY ua.unlocked_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn find_unlocked_achievement(
        &self,
        user_id: Uuid,
        achievement_id: i32,
    ) -> PortResult<Option<Achievement>> {
        let record = sqlx::query_as::<_, AchievementRecord>(
            "SELECT a.id, a.name, a.description, a.icon, ua.unlocked_at \
             FROM user_achievements ua JOIN achievements a ON a.id = ua.achievement_id \
             WHERE ua.user_id = $1 AND ua.achievement_id = $2",
        )
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn insert_unlocked_achievement(
        &self,
        user_id: Uuid,
        achievement_id: i32,
        unlocked_at: DateTime<Utc>,
    ) -> PortResult<Achievement> {
        // A concurrent unlock keeps the original timestamp.
        let record = sqlx::query_as::<_, AchievementRecord>(
            "WITH unlocked AS ( \
                 INSERT INTO user_achievements (user_id, achievement_id, unlocked_at) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, achievement_id) \
                 DO UPDATE SET unlocked_at = user_achievements.unlocked_at \
                 RETURNING achievement_id, unlocked_at \
             ) \
             SELECT a.id, a.name, a.description, a.icon, u.unlocked_at \
             FROM unlocked u JOIN achievements a ON a.id = u.achievement_id",
        )
        .bind(user_id)
        .bind(achievement_id)
        .bind(unlocked_at)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("achievement unlock"))?;
        Ok(record.to_domain())
    }

    // --- Courses ---

    async fn list_courses(&self) -> PortResult<Vec<Course>> {
        let sql = format!("SELECT {} FROM courses c ORDER BY c.created_at DESC", COURSE_COLUMNS);
        let records = sqlx::query_as::<_, CourseRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        convert_all(records, CourseRecord::to_domain)
    }

    async fn fetch_course(&self, course_id: Uuid) -> PortResult<Course> {
        let sql = format!("SELECT {} FROM courses c WHERE c.id = $1", COURSE_COLUMNS);
        let record = sqlx::query_as::<_, CourseRecord>(&sql)
            .bind(course_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_error("Course", course_id))?;
        record.to_domain()
    }

    async fn fetch_course_modules(&self, course_id: Uuid) -> PortResult<Vec<CourseModule>> {
        let sql = format!(
            "SELECT {} FROM course_modules WHERE course_id = $1 ORDER BY position ASC",
            MODULE_COLUMNS
        );
        let records = sqlx::query_as::<_, ModuleRecord>(&sql)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn fetch_module(&self, module_id: i32) -> PortResult<CourseModule> {
        let sql = format!("SELECT {} FROM course_modules WHERE id = $1", MODULE_COLUMNS);
        let record = sqlx::query_as::<_, ModuleRecord>(&sql)
            .bind(module_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_error("Module", module_id))?;
        Ok(record.to_domain())
    }

    async fn write_module_completion(
        &self,
        module_id: i32,
        completed: bool,
    ) -> PortResult<CourseModule> {
        let sql = format!(
            "UPDATE course_modules SET completed = $2 WHERE id = $1 RETURNING {}",
            MODULE_COLUMNS
        );
        let record = sqlx::query_as::<_, ModuleRecord>(&sql)
            .bind(module_id)
            .bind(completed)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_error("Module", module_id))?;
        Ok(record.to_domain())
    }

    async fn write_course_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: CourseProgress,
        last_accessed: DateTime<Utc>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE user_courses SET progress = $3, last_accessed = $4 \
             WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(i32::from(progress.percent()))
        .bind(last_accessed)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Enrollment of user {} in course {} not found",
                user_id, course_id
            )));
        }
        Ok(())
    }

    async fn fetch_enrollment(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Enrollment> {
        let record = sqlx::query_as::<_, EnrollmentRecord>(
            "SELECT id AS enrollment_id, user_id, course_id, progress, enrolled_date, last_accessed \
             FROM user_courses WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup_error("Enrollment in course", course_id))?;
        record.to_domain()
    }

    async fn fetch_enrolled_courses(&self, user_id: Uuid) -> PortResult<Vec<EnrolledCourse>> {
        let sql = format!(
            "SELECT uc.id AS enrollment_id, uc.user_id, uc.course_id, uc.progress, \
                    uc.enrolled_date, uc.last_accessed, {} \
             FROM user_courses uc JOIN courses c ON c.id = uc.course_id \
             WHERE uc.user_id = $1 ORDER BY uc.enrolled_date DESC",
            COURSE_COLUMNS
        );
        let records = sqlx::query_as::<_, EnrolledCourseRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        convert_all(records, EnrolledCourseRecord::to_domain)
    }

    async fn insert_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<Enrollment> {
        let record = sqlx::query_as::<_, EnrollmentRecord>(
            "INSERT INTO user_courses (user_id, course_id, progress, enrolled_date) \
             VALUES ($1, $2, 0, $3) \
             RETURNING id AS enrollment_id, user_id, course_id, progress, enrolled_date, last_accessed",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(enrolled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("course enrollment"))?;
        record.to_domain()
    }

    // --- Practice Tests ---

    async fn list_tests(&self) -> PortResult<Vec<PracticeTest>> {
        let sql = format!("SELECT {} FROM tests t ORDER BY t.created_at DESC", TEST_COLUMNS);
        let records = sqlx::query_as::<_, TestRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        convert_all(records, TestRecord::to_domain)
    }

    async fn fetch_test(&self, test_id: Uuid) -> PortResult<PracticeTest> {
        let sql = format!("SELECT {} FROM tests t WHERE t.id = $1", TEST_COLUMNS);
        let record = sqlx::query_as::<_, TestRecord>(&sql)
            .bind(test_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_error("Test", test_id))?;
        record.to_domain()
    }

    async fn fetch_test_sections(&self, test_id: Uuid) -> PortResult<Vec<TestSection>> {
        let records = sqlx::query_as::<_, SectionRecord>(
            "SELECT id, test_id, title, questions, duration, description, position \
             FROM test_sections WHERE test_id = $1 ORDER BY position ASC",
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn fetch_pending_scheduled_tests(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<ScheduledTest>> {
        let sql = format!(
            "SELECT {}, {} FROM user_tests ut JOIN tests t ON t.id = ut.test_id \
             WHERE ut.user_id = $1 AND NOT ut.completed AND ut.scheduled_date IS NOT NULL \
             ORDER BY ut.scheduled_date ASC LIMIT $2",
            SCHEDULED_COLUMNS, TEST_COLUMNS
        );
        let records = sqlx::query_as::<_, ScheduledTestRecord>(&sql)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        convert_all(records, ScheduledTestRecord::to_domain)
    }

    async fn fetch_tests_excluding(
        &self,
        excluded: &[Uuid],
        limit: usize,
    ) -> PortResult<Vec<PracticeTest>> {
        let sql = format!(
            "SELECT {} FROM tests t WHERE NOT (t.id = ANY($1)) ORDER BY t.created_at DESC LIMIT $2",
            TEST_COLUMNS
        );
        let records = sqlx::query_as::<_, TestRecord>(&sql)
            .bind(excluded)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        convert_all(records, TestRecord::to_domain)
    }

    async fn insert_scheduled_test(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> PortResult<ScheduledTest> {
        let sql = format!(
            "WITH ut AS ( \
                 INSERT INTO user_tests (user_id, test_id, scheduled_date, completed) \
                 VALUES ($1, $2, $3, FALSE) RETURNING * \
             ) \
             SELECT {}, {} FROM ut JOIN tests t ON t.id = ut.test_id",
            SCHEDULED_COLUMNS, TEST_COLUMNS
        );
        let record = sqlx::query_as::<_, ScheduledTestRecord>(&sql)
            .bind(user_id)
            .bind(test_id)
            .bind(scheduled_for)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error("scheduled test"))?;
        record.to_domain()
    }

    async fn write_test_completion(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        score: f64,
        completed_at: DateTime<Utc>,
    ) -> PortResult<ScheduledTest> {
        let sql = format!(
            "WITH ut AS ( \
                 UPDATE user_tests SET completed = TRUE, score = $3, completed_at = $4 \
                 WHERE id = ( \
                     SELECT id FROM user_tests \
                     WHERE user_id = $1 AND test_id = $2 AND NOT completed \
                     ORDER BY scheduled_date ASC NULLS LAST \
                     LIMIT 1 FOR UPDATE SKIP LOCKED \
                 ) RETURNING * \
             ) \
             SELECT {}, {} FROM ut JOIN tests t ON t.id = ut.test_id",
            SCHEDULED_COLUMNS, TEST_COLUMNS
        );
        let record = sqlx::query_as::<_, ScheduledTestRecord>(&sql)
            .bind(user_id)
            .bind(test_id)
            .bind(score)
            .bind(completed_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| {
                PortError::NotFound(format!(
                    "No pending attempt at test {} for user {}",
                    test_id, user_id
                ))
            })?;
        record.to_domain()
    }

    // --- Live Classes ---

    async fn list_classes(&self, category: Option<ClassCategory>) -> PortResult<Vec<LiveClass>> {
        let sql = format!(
            "SELECT {} FROM classes cl WHERE ($1::TEXT IS NULL OR cl.category = $1) \
             ORDER BY cl.starts_at ASC",
            CLASS_COLUMNS
        );
        let records = sqlx::query_as::<_, ClassRecord>(&sql)
            .bind(category.map(|c| c.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        convert_all(records, ClassRecord::to_domain)
    }

    async fn fetch_class(&self, class_id: Uuid) -> PortResult<LiveClass> {
        let sql = format!("SELECT {} FROM classes cl WHERE cl.id = $1", CLASS_COLUMNS);
        let record = sqlx::query_as::<_, ClassRecord>(&sql)
            .bind(class_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_error("Class", class_id))?;
        record.to_domain()
    }

    async fn fetch_class_enrollments(&self, user_id: Uuid) -> PortResult<Vec<ClassEnrollment>> {
        let sql = format!(
            "SELECT {}, {} FROM user_classes uc JOIN classes cl ON cl.id = uc.class_id \
             WHERE uc.user_id = $1 ORDER BY cl.starts_at ASC",
            CLASS_ENROLLMENT_COLUMNS, CLASS_COLUMNS
        );
        let records = sqlx::query_as::<_, ClassEnrollmentRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        convert_all(records, ClassEnrollmentRecord::to_domain)
    }

    async fn count_class_enrollments(&self, class_id: Uuid) -> PortResult<u32> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_classes WHERE class_id = $1",
        )
        .bind(class_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        u32::try_from(count).map_err(|_| invalid("user_classes count", count))
    }

    async fn insert_class_enrollment(
        &self,
        user_id: Uuid,
        class_id: Uuid,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<ClassEnrollment> {
        let sql = format!(
            "WITH uc AS ( \
                 INSERT INTO user_classes (user_id, class_id, enrolled_date, attended) \
                 VALUES ($1, $2, $3, FALSE) RETURNING * \
             ) \
             SELECT {}, {} FROM uc JOIN classes cl ON cl.id = uc.class_id",
            CLASS_ENROLLMENT_COLUMNS, CLASS_COLUMNS
        );
        let record = sqlx::query_as::<_, ClassEnrollmentRecord>(&sql)
            .bind(user_id)
            .bind(class_id)
            .bind(enrolled_at)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error("class enrollment"))?;
        record.to_domain()
    }

    async fn write_class_attendance(
        &self,
        user_id: Uuid,
        class_id: Uuid,
        attended: bool,
    ) -> PortResult<ClassEnrollment> {
        let sql = format!(
            "WITH uc AS ( \
                 UPDATE user_classes SET attended = $3 \
                 WHERE user_id = $1 AND class_id = $2 RETURNING * \
             ) \
             SELECT {}, {} FROM uc JOIN classes cl ON cl.id = uc.class_id",
            CLASS_ENROLLMENT_COLUMNS, CLASS_COLUMNS
        );
        let record = sqlx::query_as::<_, ClassEnrollmentRecord>(&sql)
            .bind(user_id)
            .bind(class_id)
            .bind(attended)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup_error("Class enrollment", class_id))?;
        record.to_domain()
    }

    async fn fetch_future_classes_excluding(
        &self,
        after: DateTime<Utc>,
        excluded: &[Uuid],
        limit: usize,
    ) -> PortResult<Vec<LiveClass>> {
        let sql = format!(
            "SELECT {} FROM classes cl WHERE cl.starts_at > $1 AND NOT (cl.id = ANY($2)) \
             ORDER BY cl.starts_at ASC LIMIT $3",
            CLASS_COLUMNS
        );
        let records = sqlx::query_as::<_, ClassRecord>(&sql)
            .bind(after)
            .bind(excluded)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        convert_all(records, ClassRecord::to_domain)
    }
}
