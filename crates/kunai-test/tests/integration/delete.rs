#![allow(clippy::expect_used)]
//! Tests for deleting events, series, exceptions and occurrences.
//!
//! Covers both roles: organizers delete the event itself, attendees only remove
//! their own participation.

use kunai_core::model::{Classification, EventUpdate, RecurrenceId};
use kunai_service::calendar::{AlarmUpdateRequest, DeleteRequest, UpdateRequest};
use kunai_service::collaborator::FolderPermission;
use kunai_service::error::ServiceError;
use kunai_service::result::CalendarResult;
use kunai_test::*;
use uuid::Uuid;

fn request(
    folder_id: Uuid,
    event_id: Uuid,
    recurrence_id: Option<RecurrenceId>,
    client_timestamp: i64,
) -> DeleteRequest {
    DeleteRequest {
        folder_id,
        event_id,
        recurrence_id,
        client_timestamp,
    }
}

async fn delete(
    calendar: &TestCalendar,
    user: i32,
    request: DeleteRequest,
) -> Result<CalendarResult, ServiceError> {
    calendar.service.delete_event(&session(user), &request).await
}

// ============================================================================
// Organizer
// ============================================================================

/// ## Summary
/// Deleting a single event as its only attendee and organizer removes the event,
/// its attendees and its alarms and reports exactly one deletion.
#[test_log::test(tokio::test)]
async fn organizer_deletes_single_event() {
    let calendar = TestCalendar::new();
    let event = invite(single_event("Review", at(1, 9)), &[ORGANIZER]);
    let event = calendar
        .create(ORGANIZER, event, vec![reminder("review-alarm")])
        .await;
    assert_eq!(event.attendees.len(), 1);
    assert_eq!(calendar.store.alarms(event.id, ORGANIZER).len(), 1);

    let folder = calendar.calendar(ORGANIZER);
    let result = delete(&calendar, ORGANIZER, request(folder, event.id, None, event.timestamp))
        .await
        .expect("delete succeeds");

    assert!(calendar.store.event(event.id).is_none());
    assert!(calendar.store.alarms(event.id, ORGANIZER).is_empty());
    assert_eq!(result.plain().len(), 1);
    let deletion = &result.plain()[0];
    assert!(deletion.is_deletion());
    assert_eq!(deletion.event_id(), event.id);
    assert!(deletion.nested.is_empty());

    let tombstones = calendar.store.event_tombstones();
    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0].id, event.id);
    assert_eq!(calendar.store.attendee_tombstones(event.id).len(), 1);
}

/// ## Summary
/// Deleting one occurrence of a series as organizer only adds a delete exception
/// to the master and reports an update of the master.
#[test_log::test(tokio::test)]
async fn organizer_deletes_occurrence() {
    let calendar = TestCalendar::new();
    let first = at(1, 9);
    let series = invite(daily_series("Standup", first, 5), &[ATTENDEE]);
    let master = calendar.create(ORGANIZER, series, Vec::new()).await;
    let recurrence_id = occurrence(first, 2);

    let folder = calendar.calendar(ORGANIZER);
    let result = delete(
        &calendar,
        ORGANIZER,
        request(folder, master.id, Some(recurrence_id), master.timestamp),
    )
    .await
    .expect("delete succeeds");

    let stored = calendar.stored(master.id);
    assert!(stored.delete_exception_dates.contains(&recurrence_id));
    assert_eq!(stored.change_exception_dates, master.change_exception_dates);
    assert!(calendar.exceptions(&stored).is_empty());

    assert_eq!(result.plain().len(), 1);
    assert!(result.plain()[0].is_update());
    assert_eq!(result.plain()[0].event_id(), master.id);
}

/// ## Summary
/// Deleting a change exception as organizer reports its deletion with the master's
/// update nested below, and moves the recurrence id from the change to the delete
/// exceptions of the master.
#[test_log::test(tokio::test)]
async fn organizer_deletes_change_exception() {
    let calendar = TestCalendar::new();
    let first = at(1, 9);
    let folder = calendar.calendar(ORGANIZER);
    let master = calendar
        .create(ORGANIZER, daily_series("Standup", first, 5), Vec::new())
        .await;
    let recurrence_id = occurrence(first, 1);

    let mut update = UpdateRequest::new(
        folder,
        master.id,
        master.timestamp,
        EventUpdate {
            summary: Some(Some("Standup (moved room)".to_string())),
            ..EventUpdate::default()
        },
    );
    update.recurrence_id = Some(recurrence_id);
    calendar
        .service
        .update_event(&session(ORGANIZER), &update)
        .await
        .expect("occurrence updated");
    let exception = calendar
        .exception(&master, recurrence_id)
        .expect("exception materialized");
    assert!(
        calendar
            .stored(master.id)
            .change_exception_dates
            .contains(&recurrence_id)
    );

    let result = delete(
        &calendar,
        ORGANIZER,
        request(folder, exception.id, None, exception.timestamp),
    )
    .await
    .expect("delete succeeds");

    assert!(calendar.store.event(exception.id).is_none());
    let stored = calendar.stored(master.id);
    assert!(!stored.change_exception_dates.contains(&recurrence_id));
    assert!(stored.delete_exception_dates.contains(&recurrence_id));

    assert_eq!(result.plain().len(), 1);
    let deletion = &result.plain()[0];
    assert!(deletion.is_deletion());
    assert_eq!(deletion.event_id(), exception.id);
    assert_eq!(deletion.nested.len(), 1);
    assert!(deletion.nested[0].is_update());
    assert_eq!(deletion.nested[0].event_id(), master.id);
}

/// ## Summary
/// Deleting a whole series removes its change exceptions too, reported as
/// deletions nested below the master's deletion.
#[test_log::test(tokio::test)]
async fn organizer_deletes_series_with_exceptions() {
    let calendar = TestCalendar::new();
    let first = at(3, 14);
    let folder = calendar.calendar(ORGANIZER);
    let master = calendar
        .create(ORGANIZER, daily_series("Retro", first, 3), Vec::new())
        .await;

    let mut update = UpdateRequest::new(
        folder,
        master.id,
        master.timestamp,
        EventUpdate {
            location: Some(Some("Room 4".to_string())),
            ..EventUpdate::default()
        },
    );
    update.recurrence_id = Some(occurrence(first, 2));
    calendar
        .service
        .update_event(&session(ORGANIZER), &update)
        .await
        .expect("occurrence updated");
    let master = calendar.stored(master.id);
    assert_eq!(calendar.exceptions(&master).len(), 1);

    let result = delete(&calendar, ORGANIZER, request(folder, master.id, None, master.timestamp))
        .await
        .expect("delete succeeds");

    assert!(calendar.store.events().is_empty());
    assert_eq!(calendar.store.event_tombstones().len(), 2);
    assert_eq!(result.plain().len(), 1);
    let deletion = &result.plain()[0];
    assert!(deletion.is_deletion());
    assert_eq!(deletion.event_id(), master.id);
    assert_eq!(deletion.nested.len(), 1);
    assert!(deletion.nested[0].is_deletion());
}

// ============================================================================
// Attendee
// ============================================================================

/// ## Summary
/// An attendee deleting an occurrence gets a change exception without themselves.
/// Everybody else and their alarms are carried over unchanged.
#[test_log::test(tokio::test)]
async fn attendee_leaves_single_occurrence() {
    let calendar = TestCalendar::new();
    let first = at(8, 10);
    let series = invite(daily_series("Planning", first, 4), &[ATTENDEE, OUTSIDER]);
    let master = calendar
        .create(ORGANIZER, series, vec![reminder("organizer-alarm")])
        .await;

    let attendee_folder = calendar.calendar(ATTENDEE);
    let alarms = AlarmUpdateRequest {
        folder_id: attendee_folder,
        event_id: master.id,
        recurrence_id: None,
        client_timestamp: master.timestamp,
        alarms: vec![reminder("attendee-alarm")],
    };
    calendar
        .service
        .update_alarms(&session(ATTENDEE), &alarms)
        .await
        .expect("alarms set");
    let master = calendar.stored(master.id);
    let recurrence_id = occurrence(first, 1);

    let result = delete(
        &calendar,
        ATTENDEE,
        request(attendee_folder, master.id, Some(recurrence_id), master.timestamp),
    )
    .await
    .expect("delete succeeds");

    let exception = calendar
        .exception(&master, recurrence_id)
        .expect("exception created");
    assert!(exception.find_attendee(ATTENDEE).is_none());
    assert_eq!(exception.attendees.len(), master.attendees.len() - 1);
    for attendee in &exception.attendees {
        assert!(master.attendees.contains(attendee));
    }
    let copied: Vec<String> = calendar
        .store
        .alarms(exception.id, ORGANIZER)
        .into_iter()
        .map(|alarm| alarm.uid)
        .collect();
    assert_eq!(copied, vec!["organizer-alarm".to_string()]);
    assert!(calendar.store.alarms(exception.id, ATTENDEE).is_empty());

    let stored = calendar.stored(master.id);
    assert!(stored.change_exception_dates.contains(&recurrence_id));
    assert!(stored.find_attendee(ATTENDEE).is_some());
    assert!(result.plain()[0].is_creation());
}

/// ## Summary
/// An attendee deleting a single event only removes themselves. The organizer's
/// copy is updated while the attendee's view loses the event.
#[test_log::test(tokio::test)]
async fn attendee_removes_themselves_from_event() {
    let calendar = TestCalendar::new();
    let event = invite(single_event("Lunch", at(2, 12)), &[ATTENDEE]);
    let event = calendar.create(ORGANIZER, event, Vec::new()).await;
    let attendee_folder = calendar.calendar(ATTENDEE);

    let result = delete(
        &calendar,
        ATTENDEE,
        request(attendee_folder, event.id, None, event.timestamp),
    )
    .await
    .expect("delete succeeds");

    let stored = calendar.stored(event.id);
    assert!(stored.find_attendee(ATTENDEE).is_none());
    assert!(stored.find_attendee(ORGANIZER).is_some());
    assert_eq!(calendar.store.attendee_tombstones(event.id).len(), 1);
    assert!(result.plain()[0].is_update());
    assert_eq!(result.userized().len(), 1);
    assert!(result.userized()[0].is_deletion());
    assert_eq!(result.userized()[0].folder_id, attendee_folder);
}

/// ## Summary
/// The last internal attendee deletes the whole event even if they do not
/// organize it.
#[test_log::test(tokio::test)]
async fn last_internal_attendee_deletes_event() {
    let calendar = TestCalendar::new();
    let mut event = single_event("External meeting", at(4, 16));
    event.organizer = Some(kunai_core::model::CalendarUser::external(
        "mailto:host@elsewhere.example",
    ));
    let event = invite(event, &[ORGANIZER]);
    let event = calendar.create(ORGANIZER, event, Vec::new()).await;
    assert!(!event.is_organizer(ORGANIZER));

    let folder = calendar.calendar(ORGANIZER);
    let result = delete(&calendar, ORGANIZER, request(folder, event.id, None, event.timestamp))
        .await
        .expect("delete succeeds");

    assert!(calendar.store.event(event.id).is_none());
    assert!(result.plain()[0].is_deletion());
}

// ============================================================================
// Guards
// ============================================================================

/// ## Summary
/// A client timestamp older than the stored one is rejected before anything is
/// written.
#[test_log::test(tokio::test)]
async fn stale_timestamp_writes_nothing() {
    let calendar = TestCalendar::new();
    let event = calendar
        .create(ORGANIZER, single_event("Sync", at(5, 9)), Vec::new())
        .await;
    let writes = calendar.store.write_count();
    let notifications = calendar.sink.results().len();

    let folder = calendar.calendar(ORGANIZER);
    let err = delete(
        &calendar,
        ORGANIZER,
        request(folder, event.id, None, event.timestamp - 1),
    )
    .await
    .expect_err("stale delete fails");

    assert!(matches!(
        err,
        ServiceError::ConcurrentModification {
            event_id,
            client_timestamp,
            actual_timestamp,
            ..
        } if event_id == event.id
            && client_timestamp == event.timestamp - 1
            && actual_timestamp == event.timestamp
    ));
    assert!(err.is_resubmittable());
    assert_eq!(calendar.store.write_count(), writes);
    assert_eq!(calendar.sink.results().len(), notifications);
    assert!(calendar.store.event(event.id).is_some());
}

/// ## Summary
/// Read access to somebody else's calendar does not allow deleting from it.
#[test_log::test(tokio::test)]
async fn read_only_share_rejects_delete() {
    let calendar = TestCalendar::new();
    let event = calendar
        .create(ORGANIZER, single_event("Offsite", at(6, 9)), Vec::new())
        .await;
    let folder = calendar.calendar(ORGANIZER);
    calendar
        .folders
        .grant(folder, OUTSIDER, FolderPermission::read_only());
    let writes = calendar.store.write_count();

    let err = delete(&calendar, OUTSIDER, request(folder, event.id, None, event.timestamp))
        .await
        .expect_err("delete denied");

    assert!(matches!(err, ServiceError::PermissionDenied(_)));
    assert_eq!(calendar.store.write_count(), writes);
}

/// ## Summary
/// Private events in shared folders look missing to users not taking part.
#[test_log::test(tokio::test)]
async fn private_event_is_hidden_in_shared_folder() {
    let calendar = TestCalendar::new();
    let mut event = single_event("Doctor", at(6, 15));
    event.classification = Classification::Private;
    let event = calendar.create(ORGANIZER, event, Vec::new()).await;
    let folder = calendar.calendar(ORGANIZER);
    calendar
        .folders
        .grant(folder, OUTSIDER, FolderPermission::all());

    let err = delete(&calendar, OUTSIDER, request(folder, event.id, None, event.timestamp))
        .await
        .expect_err("event hidden");

    assert!(matches!(err, ServiceError::NotFound(_)));
}

/// ## Summary
/// Events are only found through folders they appear in.
#[test_log::test(tokio::test)]
async fn event_outside_folder_is_not_found() {
    let calendar = TestCalendar::new();
    let event = calendar
        .create(ORGANIZER, single_event("Focus time", at(7, 8)), Vec::new())
        .await;

    let own = calendar.calendar(OUTSIDER);
    let err = delete(&calendar, OUTSIDER, request(own, event.id, None, event.timestamp))
        .await
        .expect_err("not in folder");
    assert!(matches!(err, ServiceError::NotFound(_)));

    let folder = calendar.calendar(ORGANIZER);
    let err = delete(&calendar, ORGANIZER, request(folder, Uuid::now_v7(), None, 0))
        .await
        .expect_err("unknown event");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

/// ## Summary
/// Recurrence ids must name a live occurrence of the series.
#[test_log::test(tokio::test)]
async fn invalid_recurrence_ids_are_rejected() {
    let calendar = TestCalendar::new();
    let first = at(10, 9);
    let folder = calendar.calendar(ORGANIZER);
    let master = calendar
        .create(ORGANIZER, daily_series("Check-in", first, 3), Vec::new())
        .await;

    let off_rule = RecurrenceId::new(first + chrono::TimeDelta::hours(3));
    let err = delete(
        &calendar,
        ORGANIZER,
        request(folder, master.id, Some(off_rule), master.timestamp),
    )
    .await
    .expect_err("not an occurrence");
    assert!(matches!(err, ServiceError::InvalidRecurrenceId(_)));

    let after_end = occurrence(first, 3);
    let err = delete(
        &calendar,
        ORGANIZER,
        request(folder, master.id, Some(after_end), master.timestamp),
    )
    .await
    .expect_err("past the end of the series");
    assert!(matches!(err, ServiceError::InvalidRecurrenceId(_)));

    let deleted = occurrence(first, 1);
    delete(
        &calendar,
        ORGANIZER,
        request(folder, master.id, Some(deleted), master.timestamp),
    )
    .await
    .expect("first delete succeeds");
    let master = calendar.stored(master.id);
    let err = delete(
        &calendar,
        ORGANIZER,
        request(folder, master.id, Some(deleted), master.timestamp),
    )
    .await
    .expect_err("already deleted");
    assert!(matches!(err, ServiceError::InvalidRecurrenceId(_)));

    let single = calendar
        .create(ORGANIZER, single_event("One-off", first), Vec::new())
        .await;
    let err = delete(
        &calendar,
        ORGANIZER,
        request(folder, single.id, Some(RecurrenceId::new(first)), single.timestamp),
    )
    .await
    .expect_err("not a series");
    assert!(matches!(err, ServiceError::InvalidRecurrenceId(_)));
}
