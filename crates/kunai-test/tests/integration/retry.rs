#![allow(clippy::expect_used)]
//! Tests for transient storage failures and notification failures.

use std::time::Duration;

use diesel_async::scoped_futures::ScopedFutureExt;
use kunai_db::db::memory::MemoryStore;
use kunai_db::db::port::EventStorage;
use kunai_db::db::{RetryPolicy, UnitOfWork};
use kunai_service::calendar::{CreateRequest, DeleteRequest};
use kunai_service::error::ServiceError;
use kunai_test::*;

fn create_request(calendar: &TestCalendar, summary: &str) -> CreateRequest {
    CreateRequest {
        folder_id: calendar.calendar(ORGANIZER),
        event: single_event(summary, at(22, 9)),
        alarms: vec![reminder("retry")],
    }
}

/// ## Summary
/// Failed commits are retried with a fresh transaction, so the event is stored
/// and published exactly once.
#[test_log::test(tokio::test(start_paused = true))]
async fn transient_commit_failures_are_retried() {
    let calendar = TestCalendar::new();
    calendar.store.fail_commits(2);

    let result = calendar
        .service
        .create_event(&session(ORGANIZER), &create_request(&calendar, "Flaky"))
        .await
        .expect("third attempt commits");

    let events = calendar.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, result.plain()[0].event_id());
    assert_eq!(calendar.store.alarms(events[0].id, ORGANIZER).len(), 1);
    assert_eq!(calendar.sink.results(), vec![result]);
}

/// ## Summary
/// Once the retries are used up the caller gets a resubmittable error and
/// nothing is stored or published.
#[test_log::test(tokio::test(start_paused = true))]
async fn exhausted_retries_surface_transient_error() {
    let calendar = TestCalendar::new();
    calendar.store.fail_commits(10);

    let err = calendar
        .service
        .create_event(&session(ORGANIZER), &create_request(&calendar, "Doomed"))
        .await
        .expect_err("every commit fails");

    assert!(matches!(err, ServiceError::StorageTransient(_)));
    assert!(err.is_resubmittable());
    assert!(err.to_string().contains("please retry"));
    assert!(calendar.store.events().is_empty());
    assert!(calendar.sink.results().is_empty());
}

/// ## Summary
/// A retried delete leaves exactly one tombstone behind.
#[test_log::test(tokio::test(start_paused = true))]
async fn retried_delete_writes_one_tombstone() {
    let calendar = TestCalendar::new();
    let event = calendar
        .create(ORGANIZER, single_event("Cancelled", at(23, 9)), Vec::new())
        .await;
    calendar.store.fail_commits(1);

    let request = DeleteRequest {
        folder_id: calendar.calendar(ORGANIZER),
        event_id: event.id,
        recurrence_id: None,
        client_timestamp: event.timestamp,
    };
    calendar
        .service
        .delete_event(&session(ORGANIZER), &request)
        .await
        .expect("second attempt commits");

    assert!(calendar.store.event(event.id).is_none());
    let tombstones = calendar.store.event_tombstones();
    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0].id, event.id);
}

/// ## Summary
/// A failing notification sink does not undo or fail a committed mutation.
#[test_log::test(tokio::test)]
async fn notification_failure_keeps_mutation() {
    let calendar = TestCalendar::new();
    calendar.sink.fail(true);

    let result = calendar
        .service
        .create_event(&session(ORGANIZER), &create_request(&calendar, "Quiet"))
        .await
        .expect("mutation succeeds without notification");

    assert!(calendar.store.event(result.plain()[0].event_id()).is_some());
    assert!(calendar.sink.results().is_empty());
}

/// ## Summary
/// Engine errors flow through the unit of work: transient ones are retried with
/// growing delays, others end the unit of work at once.
#[test_log::test(tokio::test(start_paused = true))]
async fn unit_of_work_retries_engine_errors() {
    let store = MemoryStore::new();
    store.fail_commits(2);
    let base = Duration::from_millis(20);
    let mut uow = UnitOfWork::new(&store, RetryPolicy::new(3, base));
    let event = {
        let mut event = single_event("Direct", at(24, 9));
        event.id = uuid::Uuid::now_v7();
        event.uid = "direct@example.com".to_string();
        event
    };

    let stored: Result<uuid::Uuid, ServiceError> = uow
        .execute_write(|storage| {
            let event = event.clone();
            async move {
                storage.insert_event(&event).await?;
                Ok(event.id)
            }
            .scope_boxed()
        })
        .await;

    assert_eq!(stored.expect("committed after two retries"), event.id);
    let stats = uow.stats();
    assert_eq!(stats.retries, 2);
    assert!(stats.delays[0] >= base);
    assert!(stats.delays[0] < stats.delays[1]);
    assert_eq!(store.events().len(), 1);

    let mut uow = UnitOfWork::new(&store, RetryPolicy::new(3, base));
    let rejected: Result<(), ServiceError> = uow
        .execute_write(|_storage| {
            async move { Err(ServiceError::ValidationFailed("bad input".to_string())) }
                .scope_boxed()
        })
        .await;
    assert!(matches!(rejected, Err(ServiceError::ValidationFailed(_))));
    assert_eq!(uow.stats().retries, 0);
}
