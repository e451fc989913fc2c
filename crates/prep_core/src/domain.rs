//! crates/prep_core/src/domain.rs
//!
//! Defines the pure, core data structures for the study platform.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

//=========================================================================================
// Users
//=========================================================================================

/// Represents a user's public profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields a user may change on their own profile. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

//=========================================================================================
// Progress Facts
//=========================================================================================

/// One study session, as recorded by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyLogEntry {
    pub date: NaiveDate,
    pub duration_minutes: u32,
}

/// The exam skill a test result counts toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkillType {
    Reading,
    Writing,
    Listening,
    Speaking,
    Other,
}

impl SkillType {
    /// The four skills that get their own progress bucket.
    pub const TRACKED: [SkillType; 4] = [
        SkillType::Reading,
        SkillType::Writing,
        SkillType::Listening,
        SkillType::Speaking,
    ];

    /// Classifies a free-form test type such as `"IELTS Reading - Academic"`.
    ///
    /// Matching is a case-insensitive substring check, tried in the order
    /// reading, writing, listening, speaking. Anything else is `Other`.
    /// Lower-case labels such as `"pte listening"` are classified too, so
    /// more rows land in a skill bucket than a case-sensitive match would put there.
    pub fn from_test_type(test_type: &str) -> Self {
        let lowered = test_type.to_lowercase();
        Self::TRACKED
            .into_iter()
            .find(|skill| lowered.contains(skill.as_str()))
            .unwrap_or(SkillType::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillType::Reading => "reading",
            SkillType::Writing => "writing",
            SkillType::Listening => "listening",
            SkillType::Speaking => "speaking",
            SkillType::Other => "other",
        }
    }
}

/// A completed test attempt. Completed attempts may have no score recorded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub id: Uuid,
    pub test_id: Uuid,
    pub skill: SkillType,
    pub score: Option<f64>,
    pub completed_at: DateTime<Utc>,
}

/// An achievement the user has unlocked. Passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
}

//=========================================================================================
// Derived Progress Values
//=========================================================================================

/// Progress for a single skill, on a 0-100 scale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillProgress {
    pub current: f64,
    pub target: f64,
    /// Raw 0-10 scores, oldest first.
    pub history: Vec<f64>,
}

/// A snapshot of a user's progress. Always recomputed, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    /// Mean score on the 0-10 scale, `None` until the user has a scored test.
    pub overall_score: Option<f64>,
    pub study_streak_days: u32,
    pub hours_studied: f64,
    pub tests_completed: u32,
    pub skill_progress: BTreeMap<SkillType, SkillProgress>,
    /// Minutes studied on each of the last seven days, oldest first, today last.
    pub weekly_study_minutes: [u32; 7],
    pub achievements: Vec<Achievement>,
}

//=========================================================================================
// Courses
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Beginner" => Some(Level::Beginner),
            "Intermediate" => Some(Level::Intermediate),
            "Advanced" => Some(Level::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub instructor: String,
    pub duration: String,
    pub level: Level,
}

/// A module within a course, carrying the completion flag the user toggles.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseModule {
    pub id: i32,
    pub course_id: Uuid,
    pub title: String,
    pub duration: String,
    pub position: i32,
    pub completed: bool,
}

/// A user's enrollment in a course.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub progress: CourseProgress,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrolledCourse {
    pub enrollment: Enrollment,
    pub course: Course,
}

/// A course together with its ordered modules.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDetail {
    pub course: Course,
    pub modules: Vec<CourseModule>,
}

/// Course completion as a whole percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct CourseProgress(u8);

impl CourseProgress {
    /// Computes `round(100 * completed / total)` with half-up rounding.
    ///
    /// Returns `None` when `total` is zero or `completed` exceeds `total`.
    pub fn from_counts(completed: usize, total: usize) -> Option<Self> {
        if total == 0 || completed > total {
            return None;
        }
        let percent = (200 * completed + total) / (2 * total);
        Some(Self(percent as u8))
    }

    /// Wraps a stored percentage, rejecting values above 100.
    pub fn from_percent(percent: i32) -> Option<Self> {
        u8::try_from(percent)
            .ok()
            .filter(|p| *p <= 100)
            .map(Self)
    }

    pub fn percent(&self) -> u8 {
        self.0
    }
}

//=========================================================================================
// Practice Tests
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Mock,
    Practice,
    Section,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Mock => "Mock Test",
            TestKind::Practice => "Practice Test",
            TestKind::Section => "Section Test",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Mock Test" => Some(TestKind::Mock),
            "Practice Test" => Some(TestKind::Practice),
            "Section Test" => Some(TestKind::Section),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeTest {
    pub id: Uuid,
    pub title: String,
    pub kind: TestKind,
    pub duration: String,
    pub questions: i32,
    pub description: String,
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestSection {
    pub id: i32,
    pub test_id: Uuid,
    pub title: String,
    pub questions: i32,
    pub duration: String,
    pub description: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestDetail {
    pub test: PracticeTest,
    pub sections: Vec<TestSection>,
}

/// A test on a user's calendar. Becomes a `TestResult` once completed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test: PracticeTest,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub completed: bool,
    pub score: Option<f64>,
}

//=========================================================================================
// Live Classes
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassCategory {
    Speaking,
    Writing,
    Reading,
    Listening,
    General,
}

impl ClassCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassCategory::Speaking => "Speaking",
            ClassCategory::Writing => "Writing",
            ClassCategory::Reading => "Reading",
            ClassCategory::Listening => "Listening",
            ClassCategory::General => "General",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Speaking" => Some(ClassCategory::Speaking),
            "Writing" => Some(ClassCategory::Writing),
            "Reading" => Some(ClassCategory::Reading),
            "Listening" => Some(ClassCategory::Listening),
            "General" => Some(ClassCategory::General),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveClass {
    pub id: Uuid,
    pub title: String,
    pub instructor: String,
    pub instructor_role: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub duration: String,
    pub level: Level,
    pub category: ClassCategory,
    pub description: String,
    pub topics: Vec<String>,
    pub max_capacity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassEnrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub class: LiveClass,
    pub enrolled_at: DateTime<Utc>,
    pub attended: bool,
}
