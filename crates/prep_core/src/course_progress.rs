//! crates/prep_core/src/course_progress.rs
//!
//! Keeps a user's course percentage in step with the completion flags of the
//! course's modules.

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{CourseModule, CourseProgress};
use crate::error::{require_user, ServiceError, ServiceResult};
use crate::ports::DatabaseService;

#[derive(Clone)]
pub struct CourseProgressService {
    db: Arc<dyn DatabaseService>,
    clock: Clock,
}

impl CourseProgressService {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Clock) -> Self {
        Self { db, clock }
    }

    /// Marks a module done or not done, then recomputes and stores the
    /// user's progress on the module's course.
    ///
    /// The enrollment is checked before anything is written. If the
    /// listing read back does not show the write, or the progress cannot be
    /// stored, the module flag is restored to its previous value.
    ///
    /// Two toggles racing on the same course both write a percentage; the
    /// last write wins.
    pub async fn toggle_module_completion(
        &self,
        user_id: Uuid,
        module_id: i32,
        completed: bool,
    ) -> ServiceResult<CourseProgress> {
        require_user(user_id)?;

        let before = self
            .db
            .fetch_module(module_id)
            .await
            .map_err(ServiceError::fetch("module"))?;
        let course_id = before.course_id;
        self.db
            .fetch_enrollment(user_id, course_id)
            .await
            .map_err(ServiceError::fetch("enrollment"))?;

        self.db
            .write_module_completion(module_id, completed)
            .await
            .map_err(ServiceError::write("module completion"))?;

        let stored = async {
            let modules = self
                .db
                .fetch_course_modules(course_id)
                .await
                .map_err(ServiceError::fetch("course modules"))?;
            let progress = progress_after_write(&modules, module_id, completed)?;
            self.db
                .write_course_progress(user_id, course_id, progress, self.clock.now())
                .await
                .map_err(ServiceError::write("course progress"))?;
            Ok::<_, ServiceError>(progress)
        }
        .await;

        let progress = match stored {
            Ok(progress) => progress,
            Err(err) => {
                self.restore_module(&before).await;
                return Err(err);
            }
        };

        debug!(
            %user_id,
            %course_id,
            module_id,
            completed,
            progress = progress.percent(),
            "Recalculated course progress"
        );
        Ok(progress)
    }

    /// Puts a module's completion flag back after a failed toggle.
    async fn restore_module(&self, before: &CourseModule) {
        if let Err(e) = self
            .db
            .write_module_completion(before.id, before.completed)
            .await
        {
            warn!(
                module_id = before.id,
                "Failed to restore module completion: {}", e
            );
        }
    }
}

/// Computes the course percentage from a module listing that must already
/// reflect the write of `module_id`.
fn progress_after_write(
    modules: &[CourseModule],
    module_id: i32,
    completed: bool,
) -> ServiceResult<CourseProgress> {
    if modules.is_empty() {
        return Err(ServiceError::DataIntegrity(
            "course has no modules".to_string(),
        ));
    }

    match modules.iter().find(|m| m.id == module_id) {
        Some(m) if m.completed == completed => {}
        Some(_) => {
            return Err(ServiceError::DataIntegrity(format!(
                "module {module_id} listing does not reflect the completion just written"
            )))
        }
        None => {
            return Err(ServiceError::DataIntegrity(format!(
                "module {module_id} missing from its own course"
            )))
        }
    }

    let done = modules.iter().filter(|m| m.completed).count();
    CourseProgress::from_counts(done, modules.len())
        .ok_or_else(|| ServiceError::DataIntegrity("invalid module counts".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: i32, completed: bool) -> CourseModule {
        CourseModule {
            id,
            course_id: Uuid::nil(),
            title: format!("Module {id}"),
            duration: "30 min".to_string(),
            position: id,
            completed,
        }
    }

    #[test]
    fn two_of_four_is_half() {
        let modules = [module(1, true), module(2, true), module(3, false), module(4, false)];
        let progress = progress_after_write(&modules, 2, true).unwrap();
        assert_eq!(progress.percent(), 50);
    }

    #[test]
    fn empty_course_is_an_integrity_error() {
        let err = progress_after_write(&[], 1, true).unwrap_err();
        assert!(matches!(err, ServiceError::DataIntegrity(_)));
    }

    #[test]
    fn stale_listing_is_rejected() {
        let modules = [module(1, false), module(2, false)];
        let err = progress_after_write(&modules, 1, true).unwrap_err();
        assert!(matches!(err, ServiceError::DataIntegrity(_)));
    }
}
