//! Complementary-credit accounting integration tests
//!
//! Verifies the credited-hour tallies over real attendance rows: only
//! full-credit attendances count, the threshold comparison is inclusive,
//! and the per-event summary covers every credited student.
//!
//! These tests need PostgreSQL: either Docker for testcontainers or a
//! server named by TEST_DATABASE_URL. Run with `cargo test -- --ignored`.

mod helpers;

use assert_matches::assert_matches;
use chrono::Duration;
use helpers::*;
use serial_test::serial;

use sigea::models::attendance::MarkPresentRequest;
use sigea::SigeaError;

fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

#[tokio::test]
#[serial]
#[ignore = "needs Docker or TEST_DATABASE_URL"]
async fn only_full_credit_hours_count() {
    let db = TestDatabase::new().await.expect("test database");
    db.cleanup().await.expect("cleanup");
    let services = db.services();

    let event = seed_event(&services).await;
    let student = seed_student(&services).await;

    // Two activities credited in full, worth two hours each.
    for offset in [Duration::hours(1), Duration::hours(4)] {
        let activity = TestActivity::curso(event.id)
            .starting_in(offset)
            .create(&services)
            .await;
        services
            .registrations
            .register(student.id, activity.id)
            .await
            .expect("register");
        services
            .attendances
            .mark_present(student.id, activity.id, MarkPresentRequest::default())
            .await
            .expect("mark present");
    }

    // A partial attendance contributes nothing.
    let partial = TestActivity::magistral(event.id)
        .starting_in(Duration::hours(-4))
        .running_for(Duration::hours(4))
        .expecting_hours(2.0)
        .create(&services)
        .await;
    services
        .attendances
        .mark_present(
            student.id,
            partial.id,
            MarkPresentRequest {
                check_in: Some(partial.start_dt),
                check_out: Some(partial.start_dt + Duration::hours(1)),
            },
        )
        .await
        .expect("partial credit");

    // Neither does an absence.
    let missed = TestActivity::curso(event.id)
        .starting_in(Duration::hours(7))
        .create(&services)
        .await;
    services
        .attendances
        .mark_absent(student.id, missed.id)
        .await
        .expect("mark absent");

    let status = services
        .credits
        .credit_status(student.id, event.id)
        .await
        .expect("credit status");
    assert!(approx(status.credited_hours, 4.0));
    assert!(approx(status.required_hours, 10.0));
    assert!(!status.earned);
}

#[tokio::test]
#[serial]
#[ignore = "needs Docker or TEST_DATABASE_URL"]
async fn threshold_is_configurable_and_inclusive() {
    let db = TestDatabase::new().await.expect("test database");
    db.cleanup().await.expect("cleanup");
    let services = db.services();

    let event = seed_event(&services).await;
    let student = seed_student(&services).await;

    for offset in [Duration::hours(1), Duration::hours(4)] {
        let activity = TestActivity::curso(event.id)
            .starting_in(offset)
            .create(&services)
            .await;
        services
            .attendances
            .mark_present(student.id, activity.id, MarkPresentRequest::default())
            .await
            .expect("mark present");
    }

    let status = services
        .credits
        .credit_status(student.id, event.id)
        .await
        .expect("credit status");
    assert!(approx(status.credited_hours, 4.0));
    assert!(!status.earned);

    let mut settings = test_settings();
    settings.policy.credit_threshold_hours = 4.0;
    let lenient = db.services_with(settings);

    let status = lenient
        .credits
        .credit_status(student.id, event.id)
        .await
        .expect("credit status");
    assert!(approx(status.required_hours, 4.0));
    assert!(status.earned);
}

#[tokio::test]
#[serial]
#[ignore = "needs Docker or TEST_DATABASE_URL"]
async fn event_summary_covers_every_credited_student() {
    let db = TestDatabase::new().await.expect("test database");
    db.cleanup().await.expect("cleanup");
    let services = db.services();

    let event = seed_event(&services).await;
    let regular = seed_student(&services).await;
    let casual = seed_student(&services).await;
    let bystander = seed_student(&services).await;

    let first = TestActivity::curso(event.id).create(&services).await;
    let second = TestActivity::curso(event.id)
        .starting_in(Duration::hours(4))
        .create(&services)
        .await;

    for activity_id in [first.id, second.id] {
        services
            .attendances
            .mark_present(regular.id, activity_id, MarkPresentRequest::default())
            .await
            .expect("mark present");
    }
    services
        .attendances
        .mark_present(casual.id, first.id, MarkPresentRequest::default())
        .await
        .expect("mark present");
    services
        .registrations
        .register(bystander.id, first.id)
        .await
        .expect("register");

    let summary = services
        .credits
        .event_summary(event.id)
        .await
        .expect("event summary");
    assert_eq!(summary.len(), 2);

    let hours_of = |student_id: i64| {
        summary
            .iter()
            .find(|status| status.student_id == student_id)
            .map(|status| status.credited_hours)
    };
    assert!(approx(hours_of(regular.id).expect("regular tallied"), 4.0));
    assert!(approx(hours_of(casual.id).expect("casual tallied"), 2.0));
    assert!(hours_of(bystander.id).is_none());
}

#[tokio::test]
#[serial]
#[ignore = "needs Docker or TEST_DATABASE_URL"]
async fn unknown_ids_are_rejected() {
    let db = TestDatabase::new().await.expect("test database");
    db.cleanup().await.expect("cleanup");
    let services = db.services();

    let event = seed_event(&services).await;
    let student = seed_student(&services).await;

    let err = services
        .credits
        .credit_status(student.id, 999_999)
        .await
        .expect_err("missing event must fail");
    assert_matches!(err, SigeaError::EventNotFound { .. });

    let err = services
        .credits
        .credit_status(999_999, event.id)
        .await
        .expect_err("missing student must fail");
    assert_matches!(err, SigeaError::StudentNotFound { .. });
}
