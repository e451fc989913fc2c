mod common;

use std::sync::Arc;

use common::{fixed_clock, fixed_now, InMemoryDb};
use prep_core::{CourseProgressService, ServiceError};
use uuid::Uuid;

fn service(db: &Arc<InMemoryDb>) -> CourseProgressService {
    CourseProgressService::new(db.clone(), fixed_clock())
}

#[tokio::test]
async fn completing_second_of_four_modules_yields_fifty_percent() {
    let db = Arc::new(InMemoryDb::new());
    let user = Uuid::new_v4();
    let (course, modules) = db.add_course(&[true, false, false, false]);
    db.enroll(user, course.id);

    let progress = service(&db)
        .toggle_module_completion(user, modules[1].id, true)
        .await
        .expect("toggle module");
    assert_eq!(progress.percent(), 50);

    let enrollment = db.enrollment(user, course.id).expect("enrollment");
    assert_eq!(enrollment.progress.percent(), 50);
    assert_eq!(enrollment.last_accessed, Some(fixed_now()));
}

#[tokio::test]
async fn toggle_reflects_the_write_immediately() {
    let db = Arc::new(InMemoryDb::new());
    let user = Uuid::new_v4();
    let (course, modules) = db.add_course(&[false, false, false]);
    db.enroll(user, course.id);
    let service = service(&db);

    let done = service
        .toggle_module_completion(user, modules[0].id, true)
        .await
        .expect("mark done");
    assert_eq!(done.percent(), 33);

    let undone = service
        .toggle_module_completion(user, modules[0].id, false)
        .await
        .expect("mark undone");
    assert_eq!(undone.percent(), 0);
    assert_eq!(db.enrollment(user, course.id).unwrap().progress.percent(), 0);
}

#[tokio::test]
async fn stale_module_listing_is_an_integrity_error() {
    let db = Arc::new(InMemoryDb::new());
    let user = Uuid::new_v4();
    let (course, modules) = db.add_course(&[false, false]);
    db.enroll(user, course.id);
    db.serve_stale_module_reads();

    let err = service(&db)
        .toggle_module_completion(user, modules[0].id, true)
        .await
        .expect_err("stale read must not be accepted");
    assert!(matches!(err, ServiceError::DataIntegrity(_)), "{err:?}");
    assert_eq!(db.enrollment(user, course.id).unwrap().progress.percent(), 0);
    assert!(!db.module(modules[0].id).unwrap().completed, "flag restored");
}

#[tokio::test]
async fn course_without_modules_is_rejected() {
    let db = Arc::new(InMemoryDb::new());
    let user = Uuid::new_v4();
    let (course, modules) = db.add_course(&[false]);
    db.enroll(user, course.id);
    db.hide_module_listings();

    let err = service(&db)
        .toggle_module_completion(user, modules[0].id, true)
        .await
        .expect_err("empty course");
    assert!(matches!(err, ServiceError::DataIntegrity(_)), "{err:?}");
    assert_eq!(db.enrollment(user, course.id).unwrap().progress.percent(), 0);
}

#[tokio::test]
async fn unknown_module_is_not_found() {
    let db = Arc::new(InMemoryDb::new());
    let err = service(&db)
        .toggle_module_completion(Uuid::new_v4(), 42, true)
        .await
        .expect_err("unknown module");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn write_failures_propagate() {
    for op in [
        "fetch_module",
        "fetch_enrollment",
        "write_module_completion",
        "fetch_course_modules",
        "write_course_progress",
    ] {
        let db = Arc::new(InMemoryDb::new());
        let user = Uuid::new_v4();
        let (course, modules) = db.add_course(&[false, false]);
        db.enroll(user, course.id);
        db.fail_on(op);

        let err = service(&db)
            .toggle_module_completion(user, modules[0].id, true)
            .await
            .expect_err("failure must surface");
        assert!(err.is_retryable(), "{op}: {err:?}");
        assert!(!db.module(modules[0].id).unwrap().completed, "{op}: flag left written");
    }
}

#[tokio::test]
async fn progress_without_enrollment_is_not_found() {
    let db = Arc::new(InMemoryDb::new());
    let (_, modules) = db.add_course(&[false]);

    let err = service(&db)
        .toggle_module_completion(Uuid::new_v4(), modules[0].id, true)
        .await
        .expect_err("not enrolled");
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(!db.module(modules[0].id).unwrap().completed);
}

#[tokio::test]
async fn outsider_cannot_change_an_enrolled_users_course() {
    let db = Arc::new(InMemoryDb::new());
    let member = Uuid::new_v4();
    let (course, modules) = db.add_course(&[false, false]);
    db.enroll(member, course.id);

    service(&db)
        .toggle_module_completion(Uuid::new_v4(), modules[0].id, true)
        .await
        .expect_err("not enrolled");

    let progress = service(&db)
        .toggle_module_completion(member, modules[1].id, true)
        .await
        .expect("member toggle");
    assert_eq!(progress.percent(), 50);
}
