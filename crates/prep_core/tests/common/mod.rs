#![allow(dead_code)]

//! In-memory `DatabaseService` used by the integration tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use prep_core::domain::{
    Achievement, ClassCategory, ClassEnrollment, Course, CourseModule, CourseProgress,
    EnrolledCourse, Enrollment, Level, LiveClass, PracticeTest, Profile, ProfileUpdate,
    ScheduledTest, StudyLogEntry, TestKind, TestResult, TestSection, UserCredentials,
};
use prep_core::ports::{DatabaseService, PortError, PortResult};
use prep_core::Clock;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 18, 30, 0).unwrap()
}

pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[derive(Default)]
pub struct State {
    pub profiles: HashMap<Uuid, Profile>,
    pub credentials: HashMap<String, UserCredentials>,
    pub auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    pub results: Vec<(Uuid, TestResult)>,
    pub study_log: Vec<(Uuid, StudyLogEntry)>,
    pub achievements: Vec<(Uuid, Achievement)>,
    pub courses: Vec<Course>,
    pub modules: Vec<CourseModule>,
    pub enrollments: Vec<Enrollment>,
    pub tests: Vec<PracticeTest>,
    pub sections: Vec<TestSection>,
    pub scheduled: Vec<ScheduledTest>,
    pub classes: Vec<LiveClass>,
    pub class_enrollments: Vec<ClassEnrollment>,
}

/// Thread-safe fake store. Operations named in `failing` return
/// `PortError::Unexpected`. In stale mode, module listings come from a
/// snapshot taken before the latest completion write.
#[derive(Default)]
pub struct InMemoryDb {
    pub state: Mutex<State>,
    pub failing: Mutex<HashSet<&'static str>>,
    pub stale_module_reads: Mutex<Option<Vec<CourseModule>>>,
    pub stale_mode: Mutex<bool>,
    pub empty_module_listings: Mutex<bool>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn serve_stale_module_reads(&self) {
        *self.stale_mode.lock().unwrap() = true;
    }

    /// Makes every module listing come back empty.
    pub fn hide_module_listings(&self) {
        *self.empty_module_listings.lock().unwrap() = true;
    }

    fn check(&self, op: &'static str) -> PortResult<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(PortError::Unexpected(format!("{op} unavailable")));
        }
        Ok(())
    }

    pub fn add_result(&self, user_id: Uuid, result: TestResult) {
        self.state.lock().unwrap().results.push((user_id, result));
    }

    pub fn add_study(&self, user_id: Uuid, entry: StudyLogEntry) {
        self.state.lock().unwrap().study_log.push((user_id, entry));
    }

    pub fn add_course(&self, modules: &[bool]) -> (Course, Vec<CourseModule>) {
        let mut state = self.state.lock().unwrap();
        let course = course_fixture(&format!("Course {}", state.courses.len() + 1));
        let first_id = state.modules.len() as i32 + 1;
        let created: Vec<CourseModule> = modules
            .iter()
            .enumerate()
            .map(|(i, completed)| CourseModule {
                id: first_id + i as i32,
                course_id: course.id,
                title: format!("Module {}", i + 1),
                duration: "45 min".to_string(),
                position: i as i32 + 1,
                completed: *completed,
            })
            .collect();
        state.courses.push(course.clone());
        state.modules.extend(created.iter().cloned());
        (course, created)
    }

    pub fn enroll(&self, user_id: Uuid, course_id: Uuid) {
        self.state.lock().unwrap().enrollments.push(Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            progress: CourseProgress::default(),
            enrolled_at: fixed_now(),
            last_accessed: None,
        });
    }

    pub fn module(&self, module_id: i32) -> Option<CourseModule> {
        self.state
            .lock()
            .unwrap()
            .modules
            .iter()
            .find(|m| m.id == module_id)
            .cloned()
    }

    pub fn enrollment(&self, user_id: Uuid, course_id: Uuid) -> Option<Enrollment> {
        self.state
            .lock()
            .unwrap()
            .enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned()
    }

    pub fn add_test(&self, title: &str) -> PracticeTest {
        let test = PracticeTest {
            id: Uuid::new_v4(),
            title: title.to_string(),
            kind: TestKind::Practice,
            duration: "60 min".to_string(),
            questions: 40,
            description: format!("{title} description"),
            instructions: Vec::new(),
        };
        self.state.lock().unwrap().tests.push(test.clone());
        test
    }

    pub fn add_class(&self, title: &str, starts_at: DateTime<Utc>, max_capacity: i32) -> LiveClass {
        let class = LiveClass {
            id: Uuid::new_v4(),
            title: title.to_string(),
            instructor: "Dr. Lee".to_string(),
            instructor_role: None,
            starts_at,
            duration: "90 min".to_string(),
            level: Level::Intermediate,
            category: ClassCategory::Speaking,
            description: String::new(),
            topics: Vec::new(),
            max_capacity,
        };
        self.state.lock().unwrap().classes.push(class.clone());
        class
    }
}

pub fn course_fixture(title: &str) -> Course {
    Course {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: String::new(),
        image: String::new(),
        instructor: "A. Instructor".to_string(),
        duration: "6 weeks".to_string(),
        level: Level::Beginner,
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{what} {id} not found"))
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: Option<&str>,
    ) -> PortResult<Profile> {
        self.check("create_user_with_email")?;
        let mut state = self.state.lock().unwrap();
        if state.credentials.contains_key(email) {
            return Err(PortError::Unexpected(format!("{email} already registered")));
        }
        let profile = Profile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.map(str::to_string),
            avatar_url: None,
            created_at: fixed_now(),
        };
        state.credentials.insert(
            email.to_string(),
            UserCredentials {
                user_id: profile.id,
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        state.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.check("get_user_by_email")?;
        self.state
            .lock()
            .unwrap()
            .credentials
            .get(email)
            .cloned()
            .ok_or_else(|| not_found("user", email))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.check("create_auth_session")?;
        self.state
            .lock()
            .unwrap()
            .auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        self.check("validate_auth_session")?;
        match self.state.lock().unwrap().auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > fixed_now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.check("delete_auth_session")?;
        self.state.lock().unwrap().auth_sessions.remove(session_id);
        Ok(())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        self.check("fetch_profile")?;
        self.state
            .lock()
            .unwrap()
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| not_found("profile", user_id))
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<Profile> {
        self.check("update_profile")?;
        let mut state = self.state.lock().unwrap();
        let profile = state
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| not_found("profile", user_id))?;
        if let Some(name) = update.full_name {
            profile.full_name = Some(name);
        }
        if let Some(url) = update.avatar_url {
            profile.avatar_url = Some(url);
        }
        Ok(profile.clone())
    }

    async fn fetch_completed_test_results(&self, user_id: Uuid) -> PortResult<Vec<TestResult>> {
        self.check("fetch_completed_test_results")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .results
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn fetch_study_log(&self, user_id: Uuid) -> PortResult<Vec<StudyLogEntry>> {
        self.check("fetch_study_log")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .study_log
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn fetch_unlocked_achievements(&self, user_id: Uuid) -> PortResult<Vec<Achievement>> {
        self.check("fetch_unlocked_achievements")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .achievements
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn find_unlocked_achievement(
        &self,
        user_id: Uuid,
        achievement_id: i32,
    ) -> PortResult<Option<Achievement>> {
        self.check("find_unlocked_achievement")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .achievements
            .iter()
            .find(|(owner, a)| *owner == user_id && a.id == achievement_id)
            .map(|(_, a)| a.clone()))
    }

    async fn insert_unlocked_achievement(
        &self,
        user_id: Uuid,
        achievement_id: i32,
        unlocked_at: DateTime<Utc>,
    ) -> PortResult<Achievement> {
        self.check("insert_unlocked_achievement")?;
        let achievement = Achievement {
            id: achievement_id,
            name: format!("Achievement {achievement_id}"),
            description: String::new(),
            icon: "award".to_string(),
            unlocked_at,
        };
        self.state
            .lock()
            .unwrap()
            .achievements
            .push((user_id, achievement.clone()));
        Ok(achievement)
    }

    async fn list_courses(&self) -> PortResult<Vec<Course>> {
        self.check("list_courses")?;
        Ok(self.state.lock().unwrap().courses.clone())
    }

    async fn fetch_course(&self, course_id: Uuid) -> PortResult<Course> {
        self.check("fetch_course")?;
        self.state
            .lock()
            .unwrap()
            .courses
            .iter()
            .find(|c| c.id == course_id)
            .cloned()
            .ok_or_else(|| not_found("course", course_id))
    }

    async fn fetch_course_modules(&self, course_id: Uuid) -> PortResult<Vec<CourseModule>> {
        self.check("fetch_course_modules")?;
        if *self.empty_module_listings.lock().unwrap() {
            return Ok(Vec::new());
        }
        if let Some(snapshot) = self.stale_module_reads.lock().unwrap().clone() {
            return Ok(snapshot
                .into_iter()
                .filter(|m| m.course_id == course_id)
                .collect());
        }
        let mut modules: Vec<CourseModule> = self
            .state
            .lock()
            .unwrap()
            .modules
            .iter()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.position);
        Ok(modules)
    }

    async fn fetch_module(&self, module_id: i32) -> PortResult<CourseModule> {
        self.check("fetch_module")?;
        self.module(module_id)
            .ok_or_else(|| not_found("module", module_id))
    }

    async fn write_module_completion(
        &self,
        module_id: i32,
        completed: bool,
    ) -> PortResult<CourseModule> {
        self.check("write_module_completion")?;
        let mut state = self.state.lock().unwrap();
        if *self.stale_mode.lock().unwrap() {
            *self.stale_module_reads.lock().unwrap() = Some(state.modules.clone());
        }
        let module = state
            .modules
            .iter_mut()
            .find(|m| m.id == module_id)
            .ok_or_else(|| not_found("module", module_id))?;
        module.completed = completed;
        Ok(module.clone())
    }

    async fn write_course_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: CourseProgress,
        last_accessed: DateTime<Utc>,
    ) -> PortResult<()> {
        self.check("write_course_progress")?;
        let mut state = self.state.lock().unwrap();
        let enrollment = state
            .enrollments
            .iter_mut()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .ok_or_else(|| not_found("enrollment", course_id))?;
        enrollment.progress = progress;
        enrollment.last_accessed = Some(last_accessed);
        Ok(())
    }

    async fn fetch_enrollment(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Enrollment> {
        self.check("fetch_enrollment")?;
        self.enrollment(user_id, course_id)
            .ok_or_else(|| not_found("enrollment", course_id))
    }

    async fn fetch_enrolled_courses(&self, user_id: Uuid) -> PortResult<Vec<EnrolledCourse>> {
        self.check("fetch_enrolled_courses")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| {
                let course = state.courses.iter().find(|c| c.id == e.course_id)?;
                Some(EnrolledCourse {
                    enrollment: e.clone(),
                    course: course.clone(),
                })
            })
            .collect())
    }

    async fn insert_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<Enrollment> {
        self.check("insert_enrollment")?;
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            progress: CourseProgress::default(),
            enrolled_at,
            last_accessed: None,
        };
        self.state
            .lock()
            .unwrap()
            .enrollments
            .push(enrollment.clone());
        Ok(enrollment)
    }

    async fn list_tests(&self) -> PortResult<Vec<PracticeTest>> {
        self.check("list_tests")?;
        Ok(self.state.lock().unwrap().tests.clone())
    }

    async fn fetch_test(&self, test_id: Uuid) -> PortResult<PracticeTest> {
        self.check("fetch_test")?;
        self.state
            .lock()
            .unwrap()
            .tests
            .iter()
            .find(|t| t.id == test_id)
            .cloned()
            .ok_or_else(|| not_found("test", test_id))
    }

    async fn fetch_test_sections(&self, test_id: Uuid) -> PortResult<Vec<TestSection>> {
        self.check("fetch_test_sections")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .sections
            .iter()
            .filter(|s| s.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn fetch_pending_scheduled_tests(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<ScheduledTest>> {
        self.check("fetch_pending_scheduled_tests")?;
        let mut pending: Vec<ScheduledTest> = self
            .state
            .lock()
            .unwrap()
            .scheduled
            .iter()
            .filter(|s| s.user_id == user_id && !s.completed && s.scheduled_for.is_some())
            .cloned()
            .collect();
        pending.sort_by_key(|s| s.scheduled_for);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn fetch_tests_excluding(
        &self,
        excluded: &[Uuid],
        limit: usize,
    ) -> PortResult<Vec<PracticeTest>> {
        self.check("fetch_tests_excluding")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .tests
            .iter()
            .filter(|t| !excluded.contains(&t.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_scheduled_test(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> PortResult<ScheduledTest> {
        self.check("insert_scheduled_test")?;
        let test = self.fetch_test(test_id).await?;
        let scheduled = ScheduledTest {
            id: Uuid::new_v4(),
            user_id,
            test,
            scheduled_for: Some(scheduled_for),
            completed: false,
            score: None,
        };
        self.state
            .lock()
            .unwrap()
            .scheduled
            .push(scheduled.clone());
        Ok(scheduled)
    }

    async fn write_test_completion(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        score: f64,
        _completed_at: DateTime<Utc>,
    ) -> PortResult<ScheduledTest> {
        self.check("write_test_completion")?;
        let mut state = self.state.lock().unwrap();
        let scheduled = state
            .scheduled
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.test.id == test_id && !s.completed)
            .min_by_key(|s| (s.scheduled_for.is_none(), s.scheduled_for))
            .ok_or_else(|| not_found("pending test", test_id))?;
        scheduled.completed = true;
        scheduled.score = Some(score);
        Ok(scheduled.clone())
    }

    async fn list_classes(&self, category: Option<ClassCategory>) -> PortResult<Vec<LiveClass>> {
        self.check("list_classes")?;
        let mut classes: Vec<LiveClass> = self
            .state
            .lock()
            .unwrap()
            .classes
            .iter()
            .filter(|c| category.map_or(true, |cat| c.category == cat))
            .cloned()
            .collect();
        classes.sort_by_key(|c| c.starts_at);
        Ok(classes)
    }

    async fn fetch_class(&self, class_id: Uuid) -> PortResult<LiveClass> {
        self.check("fetch_class")?;
        self.state
            .lock()
            .unwrap()
            .classes
            .iter()
            .find(|c| c.id == class_id)
            .cloned()
            .ok_or_else(|| not_found("class", class_id))
    }

    async fn fetch_class_enrollments(&self, user_id: Uuid) -> PortResult<Vec<ClassEnrollment>> {
        self.check("fetch_class_enrollments")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .class_enrollments
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_class_enrollments(&self, class_id: Uuid) -> PortResult<u32> {
        self.check("count_class_enrollments")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .class_enrollments
            .iter()
            .filter(|e| e.class.id == class_id)
            .count() as u32)
    }

    async fn insert_class_enrollment(
        &self,
        user_id: Uuid,
        class_id: Uuid,
        enrolled_at: DateTime<Utc>,
    ) -> PortResult<ClassEnrollment> {
        self.check("insert_class_enrollment")?;
        let class = self.fetch_class(class_id).await?;
        let enrollment = ClassEnrollment {
            id: Uuid::new_v4(),
            user_id,
            class,
            enrolled_at,
            attended: false,
        };
        self.state
            .lock()
            .unwrap()
            .class_enrollments
            .push(enrollment.clone());
        Ok(enrollment)
    }

    async fn write_class_attendance(
        &self,
        user_id: Uuid,
        class_id: Uuid,
        attended: bool,
    ) -> PortResult<ClassEnrollment> {
        self.check("write_class_attendance")?;
        let mut state = self.state.lock().unwrap();
        let enrollment = state
            .class_enrollments
            .iter_mut()
            .find(|e| e.user_id == user_id && e.class.id == class_id)
            .ok_or_else(|| not_found("class enrollment", class_id))?;
        enrollment.attended = attended;
        Ok(enrollment.clone())
    }

    async fn fetch_future_classes_excluding(
        &self,
        after: DateTime<Utc>,
        excluded: &[Uuid],
        limit: usize,
    ) -> PortResult<Vec<LiveClass>> {
        self.check("fetch_future_classes_excluding")?;
        let mut classes: Vec<LiveClass> = self
            .state
            .lock()
            .unwrap()
            .classes
            .iter()
            .filter(|c| c.starts_at > after && !excluded.contains(&c.id))
            .cloned()
            .collect();
        classes.sort_by_key(|c| c.starts_at);
        classes.truncate(limit);
        Ok(classes)
    }
}
