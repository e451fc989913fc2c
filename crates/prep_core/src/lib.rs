pub mod catalog;
pub mod clock;
pub mod course_progress;
pub mod domain;
pub mod error;
pub mod ports;
pub mod stats;

pub use catalog::CatalogService;
pub use clock::Clock;
pub use course_progress::CourseProgressService;
pub use domain::{
    Achievement, ClassCategory, ClassEnrollment, Course, CourseDetail, CourseModule,
    CourseProgress, EnrolledCourse, Enrollment, Level, LiveClass, PracticeTest, Profile,
    ProfileUpdate, ScheduledTest, SkillProgress, SkillType, StudyLogEntry, TestDetail,
    TestKind, TestResult, TestSection, UserCredentials, UserStats,
};
pub use error::{ServiceError, ServiceResult};
pub use ports::{DatabaseService, PortError, PortResult};
pub use stats::StatsService;
