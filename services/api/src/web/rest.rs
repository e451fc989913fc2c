//! services/api/src/web/rest.rs
//!
//! Contains the JSON payloads shared by the REST handlers, the mapping from
//! core errors to HTTP responses, and the master definition for the OpenAPI
//! specification.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use prep_core::{
    Achievement, ClassEnrollment, Course, CourseModule, EnrolledCourse, Enrollment, LiveClass,
    PracticeTest, Profile, ScheduledTest, ServiceError, SkillProgress, TestSection, UserStats,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::{auth, classes, courses, practice, progress};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        progress::get_profile_handler,
        progress::update_profile_handler,
        progress::get_stats_handler,
        progress::get_dashboard_handler,
        progress::list_achievements_handler,
        progress::unlock_achievement_handler,
        courses::list_courses_handler,
        courses::get_course_handler,
        courses::enroll_course_handler,
        courses::list_enrolled_courses_handler,
        courses::toggle_module_handler,
        practice::list_tests_handler,
        practice::get_test_handler,
        practice::schedule_test_handler,
        practice::complete_test_handler,
        practice::upcoming_tests_handler,
        classes::list_classes_handler,
        classes::get_class_handler,
        classes::enroll_class_handler,
        classes::mark_attendance_handler,
        classes::list_enrolled_classes_handler,
        classes::upcoming_classes_handler,
    ),
    components(schemas(
        auth::SignupRequest,
        auth::LoginRequest,
        auth::AuthResponse,
        ProfileResponse,
        UpdateProfileRequest,
        SkillProgressResponse,
        StatsResponse,
        DashboardResponse,
        AchievementResponse,
        CourseResponse,
        ModuleResponse,
        CourseDetailResponse,
        EnrollmentResponse,
        EnrolledCourseResponse,
        ModuleCompletionRequest,
        ModuleCompletionResponse,
        TestResponse,
        SectionResponse,
        TestDetailResponse,
        ScheduleTestRequest,
        CompleteTestRequest,
        ScheduledTestResponse,
        ClassResponse,
        ClassDetailResponse,
        ClassEnrollmentResponse,
        AttendanceRequest,
    )),
    tags(
        (name = "auth", description = "Signup, login and logout."),
        (name = "progress", description = "Profile, statistics, dashboard and achievements."),
        (name = "courses", description = "Course catalog, enrollment and module progress."),
        (name = "tests", description = "Practice tests, scheduling and results."),
        (name = "classes", description = "Live classes, enrollment and attendance.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a core service failure onto an HTTP status and message.
///
/// Fetch and write failures become 503 so clients know the request can be
/// retried as a whole.
pub fn service_error_response(err: ServiceError) -> (StatusCode, String) {
    match err {
        ServiceError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        ServiceError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        ServiceError::DataIntegrity(msg) => {
            error!("Data integrity violation: {}", msg);
            (StatusCode::CONFLICT, msg)
        }
        err @ (ServiceError::Fetch { .. } | ServiceError::Write { .. }) => {
            error!("Backend failure: {:?}", err);
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        err => {
            error!("Unhandled service error: {:?}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

//=========================================================================================
// Query Parameters
//=========================================================================================

pub const DEFAULT_UPCOMING_LIMIT: usize = 3;
pub const MAX_UPCOMING_LIMIT: usize = 50;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    /// Number of items to return (default 3, at most 50).
    pub limit: Option<usize>,
}

impl LimitQuery {
    pub fn resolve(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_UPCOMING_LIMIT)
            .min(MAX_UPCOMING_LIMIT)
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClassQuery {
    /// One of Speaking, Writing, Reading, Listening or General.
    pub category: Option<String>,
}

//=========================================================================================
// Users & Progress Payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            avatar_url: p.avatar_url,
            created_at: p.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SkillProgressResponse {
    pub current: f64,
    pub target: f64,
    pub history: Vec<f64>,
}

impl From<SkillProgress> for SkillProgressResponse {
    fn from(p: SkillProgress) -> Self {
        Self {
            current: p.current,
            target: p.target,
            history: p.history,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AchievementResponse {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
}

impl From<Achievement> for AchievementResponse {
    fn from(a: Achievement) -> Self {
        Self {
            id: a.id,
            name: a.name,
            description: a.description,
            icon: a.icon,
            unlocked_at: a.unlocked_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    /// Mean score on the 0-10 scale, null until a scored test exists.
    pub overall_score: Option<f64>,
    pub study_streak_days: u32,
    pub hours_studied: f64,
    pub tests_completed: u32,
    /// Keyed by reading, writing, listening and speaking.
    pub skill_progress: BTreeMap<String, SkillProgressResponse>,
    /// Seven entries, oldest day first, today last.
    pub weekly_study_minutes: Vec<u32>,
    pub achievements: Vec<AchievementResponse>,
}

impl From<UserStats> for StatsResponse {
    fn from(s: UserStats) -> Self {
        Self {
            overall_score: s.overall_score,
            study_streak_days: s.study_streak_days,
            hours_studied: s.hours_studied,
            tests_completed: s.tests_completed,
            skill_progress: s
                .skill_progress
                .into_iter()
                .map(|(skill, progress)| (skill.as_str().to_string(), progress.into()))
                .collect(),
            weekly_study_minutes: s.weekly_study_minutes.to_vec(),
            achievements: s.achievements.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub profile: ProfileResponse,
    pub stats: StatsResponse,
    pub courses: Vec<EnrolledCourseResponse>,
    pub upcoming_tests: Vec<TestResponse>,
    pub upcoming_classes: Vec<ClassResponse>,
}

//=========================================================================================
// Course Payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct CourseResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub instructor: String,
    pub duration: String,
    pub level: String,
}

impl From<Course> for CourseResponse {
    fn from(c: Course) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            image: c.image,
            instructor: c.instructor,
            duration: c.duration,
            level: c.level.as_str().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ModuleResponse {
    pub id: i32,
    pub title: String,
    pub duration: String,
    pub position: i32,
    pub completed: bool,
}

impl From<CourseModule> for ModuleResponse {
    fn from(m: CourseModule) -> Self {
        Self {
            id: m.id,
            title: m.title,
            duration: m.duration,
            position: m.position,
            completed: m.completed,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CourseDetailResponse {
    pub course: CourseResponse,
    pub modules: Vec<ModuleResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct EnrollmentResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub progress: u8,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            id: e.id,
            course_id: e.course_id,
            progress: e.progress.percent(),
            enrolled_at: e.enrolled_at,
            last_accessed: e.last_accessed,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EnrolledCourseResponse {
    pub enrollment: EnrollmentResponse,
    pub course: CourseResponse,
}

impl From<EnrolledCourse> for EnrolledCourseResponse {
    fn from(e: EnrolledCourse) -> Self {
        Self {
            enrollment: e.enrollment.into(),
            course: e.course.into(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ModuleCompletionRequest {
    pub completed: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ModuleCompletionResponse {
    pub module_id: i32,
    pub completed: bool,
    /// The course's recomputed completion percentage.
    pub course_progress: u8,
}

//=========================================================================================
// Practice Test Payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct TestResponse {
    pub id: Uuid,
    pub title: String,
    pub kind: String,
    pub duration: String,
    pub questions: i32,
    pub description: String,
    pub instructions: Vec<String>,
}

impl From<PracticeTest> for TestResponse {
    fn from(t: PracticeTest) -> Self {
        Self {
            id: t.id,
            title: t.title,
            kind: t.kind.as_str().to_string(),
            duration: t.duration,
            questions: t.questions,
            description: t.description,
            instructions: t.instructions,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SectionResponse {
    pub id: i32,
    pub title: String,
    pub questions: i32,
    pub duration: String,
    pub description: String,
    pub position: i32,
}

impl From<TestSection> for SectionResponse {
    fn from(s: TestSection) -> Self {
        Self {
            id: s.id,
            title: s.title,
            questions: s.questions,
            duration: s.duration,
            description: s.description,
            position: s.position,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TestDetailResponse {
    pub test: TestResponse,
    pub sections: Vec<SectionResponse>,
}

#[derive(Deserialize, ToSchema)]
pub struct ScheduleTestRequest {
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct CompleteTestRequest {
    /// Band score between 0 and 10.
    pub score: f64,
}

#[derive(Serialize, ToSchema)]
pub struct ScheduledTestResponse {
    pub id: Uuid,
    pub test: TestResponse,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub completed: bool,
    pub score: Option<f64>,
}

impl From<ScheduledTest> for ScheduledTestResponse {
    fn from(s: ScheduledTest) -> Self {
        Self {
            id: s.id,
            test: s.test.into(),
            scheduled_for: s.scheduled_for,
            completed: s.completed,
            score: s.score,
        }
    }
}

//=========================================================================================
// Live Class Payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ClassResponse {
    pub id: Uuid,
    pub title: String,
    pub instructor: String,
    pub instructor_role: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub duration: String,
    pub level: String,
    pub category: String,
    pub description: String,
    pub topics: Vec<String>,
    pub max_capacity: i32,
}

impl From<LiveClass> for ClassResponse {
    fn from(c: LiveClass) -> Self {
        Self {
            id: c.id,
            title: c.title,
            instructor: c.instructor,
            instructor_role: c.instructor_role,
            starts_at: c.starts_at,
            duration: c.duration,
            level: c.level.as_str().to_string(),
            category: c.category.as_str().to_string(),
            description: c.description,
            topics: c.topics,
            max_capacity: c.max_capacity,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ClassDetailResponse {
    pub class: ClassResponse,
    pub enrolled_count: u32,
}

#[derive(Serialize, ToSchema)]
pub struct ClassEnrollmentResponse {
    pub id: Uuid,
    pub class: ClassResponse,
    pub enrolled_at: DateTime<Utc>,
    pub attended: bool,
}

impl From<ClassEnrollment> for ClassEnrollmentResponse {
    fn from(e: ClassEnrollment) -> Self {
        Self {
            id: e.id,
            class: e.class.into(),
            enrolled_at: e.enrolled_at,
            attended: e.attended,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AttendanceRequest {
    pub attended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::{PortError, SkillType};

    #[test]
    fn service_errors_map_to_statuses() {
        let status = |e| service_error_response(e).0;
        assert_eq!(status(ServiceError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(ServiceError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(ServiceError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status(ServiceError::DataIntegrity("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status(ServiceError::fetch("stats")(PortError::Unexpected("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(ServiceError::write("module")(PortError::Unexpected("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(LimitQuery { limit: None }.resolve(), DEFAULT_UPCOMING_LIMIT);
        assert_eq!(LimitQuery { limit: Some(7) }.resolve(), 7);
        assert_eq!(LimitQuery { limit: Some(10_000) }.resolve(), MAX_UPCOMING_LIMIT);
    }

    #[test]
    fn stats_serialize_with_lowercase_skill_keys_and_null_score() {
        let mut skill_progress = BTreeMap::new();
        for skill in SkillType::TRACKED {
            skill_progress.insert(skill, SkillProgress::default());
        }
        let stats = UserStats {
            overall_score: None,
            study_streak_days: 0,
            hours_studied: 0.0,
            tests_completed: 0,
            skill_progress,
            weekly_study_minutes: [0; 7],
            achievements: Vec::new(),
        };
        let json = serde_json::to_value(StatsResponse::from(stats)).unwrap();
        assert!(json["overall_score"].is_null());
        assert_eq!(json["weekly_study_minutes"].as_array().map(Vec::len), Some(7));
        for key in ["reading", "writing", "listening", "speaking"] {
            assert_eq!(json["skill_progress"][key]["current"], 0.0);
        }
    }

    #[test]
    fn openapi_document_lists_the_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/me/stats"));
        assert!(doc.paths.paths.contains_key("/me/modules/{id}/completion"));
    }
}
