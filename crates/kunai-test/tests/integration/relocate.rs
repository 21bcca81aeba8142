#![allow(clippy::expect_used)]
//! Tests for moving events between folders.

use kunai_core::model::{Classification, Event, EventUpdate};
use kunai_service::calendar::{MoveRequest, UpdateRequest};
use kunai_service::collaborator::FolderPermission;
use kunai_service::error::ServiceError;
use kunai_service::result::CalendarResult;
use kunai_test::*;
use uuid::Uuid;

fn request(folder_id: Uuid, event: &Event, target_folder_id: Uuid) -> MoveRequest {
    MoveRequest {
        folder_id,
        event_id: event.id,
        client_timestamp: event.timestamp,
        target_folder_id,
    }
}

async fn relocate(
    calendar: &TestCalendar,
    user: i32,
    request: &MoveRequest,
) -> Result<CalendarResult, ServiceError> {
    calendar.service.move_event(&session(user), request).await
}

// ============================================================================
// Successful moves
// ============================================================================

/// ## Summary
/// Moving between two own calendars changes the storage folder. The calendar
/// user sees the event vanish from the source and appear in the target.
#[test_log::test(tokio::test)]
async fn event_moves_between_own_calendars() {
    let calendar = TestCalendar::new();
    let source = calendar.calendar(ORGANIZER);
    let target = calendar.add_calendar(ORGANIZER);
    let event = calendar
        .create(ORGANIZER, single_event("Haircut", at(13, 10)), vec![reminder("cut")])
        .await;

    let result = relocate(&calendar, ORGANIZER, &request(source, &event, target))
        .await
        .expect("event moved");

    let moved = calendar.stored(event.id);
    assert_eq!(moved.folder_id, target);
    assert_eq!(moved.timestamp, result.timestamp());
    assert_eq!(calendar.store.alarms(event.id, ORGANIZER).len(), 1);

    assert_eq!(result.plain().len(), 1);
    let update = result.plain()[0].as_update().expect("plain update");
    assert_eq!(update.original().folder_id, source);
    assert_eq!(update.updated().folder_id, target);

    assert_eq!(result.userized().len(), 2);
    let deletion = result
        .userized()
        .iter()
        .find(|entry| entry.is_deletion())
        .expect("deletion in source");
    assert_eq!(deletion.folder_id, source);
    let creation = result
        .userized()
        .iter()
        .find(|entry| entry.is_creation())
        .expect("creation in target");
    assert_eq!(creation.folder_id, target);

    let err = calendar
        .service
        .get_event(&session(ORGANIZER), source, event.id)
        .await
        .expect_err("gone from the source");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

/// ## Summary
/// A series takes its change exceptions along.
#[test_log::test(tokio::test)]
async fn series_moves_with_exceptions() {
    let calendar = TestCalendar::new();
    let source = calendar.calendar(ORGANIZER);
    let target = calendar.add_calendar(ORGANIZER);
    let first = at(14, 8);
    let master = calendar
        .create(ORGANIZER, daily_series("Swim", first, 4), Vec::new())
        .await;

    let mut change = UpdateRequest::new(
        source,
        master.id,
        master.timestamp,
        EventUpdate {
            location: Some(Some("Outdoor pool".to_string())),
            ..EventUpdate::default()
        },
    );
    change.recurrence_id = Some(occurrence(first, 1));
    calendar
        .service
        .update_event(&session(ORGANIZER), &change)
        .await
        .expect("exception created");
    let master = calendar.stored(master.id);
    let exception = calendar
        .exception(&master, occurrence(first, 1))
        .expect("stored exception");

    let result = relocate(&calendar, ORGANIZER, &request(source, &master, target))
        .await
        .expect("series moved");

    assert_eq!(calendar.stored(master.id).folder_id, target);
    assert_eq!(calendar.stored(exception.id).folder_id, target);
    assert!(result.find_plain(exception.id).is_some());
    assert_eq!(result.plain().len(), 1);
}

/// ## Summary
/// For a group-scheduled event the organizer's attendee folder follows the move,
/// while the other attendees keep theirs.
#[test_log::test(tokio::test)]
async fn attendee_folder_follows_move() {
    let calendar = TestCalendar::new();
    let source = calendar.calendar(ORGANIZER);
    let target = calendar.add_calendar(ORGANIZER);
    let event = invite(single_event("Offsite", at(16, 9)), &[ATTENDEE]);
    let event = calendar.create(ORGANIZER, event, Vec::new()).await;

    relocate(&calendar, ORGANIZER, &request(source, &event, target))
        .await
        .expect("event moved");

    let moved = calendar.stored(event.id);
    let own = moved.find_attendee(ORGANIZER).expect("organizer attends");
    assert_eq!(own.folder_id, Some(target));
    let other = moved.find_attendee(ATTENDEE).expect("attendee invited");
    assert_eq!(other.folder_id, Some(calendar.calendar(ATTENDEE)));
}

/// ## Summary
/// Moving into the folder the event is already in changes nothing.
#[test_log::test(tokio::test)]
async fn move_into_same_folder_is_a_no_op() {
    let calendar = TestCalendar::new();
    let folder = calendar.calendar(ORGANIZER);
    let event = calendar
        .create(ORGANIZER, single_event("Yoga", at(17, 7)), Vec::new())
        .await;
    let writes = calendar.store.write_count();

    let result = relocate(&calendar, ORGANIZER, &request(folder, &event, folder))
        .await
        .expect("no-op move");

    assert!(result.is_empty());
    assert_eq!(calendar.store.write_count(), writes);
}

// ============================================================================
// Rejected moves
// ============================================================================

/// ## Summary
/// Public folders only take public events without attendees.
#[test_log::test(tokio::test)]
async fn public_folder_rejects_private_and_scheduled_events() {
    let calendar = TestCalendar::new();
    let source = calendar.calendar(ORGANIZER);
    let public = calendar.add_public_folder();

    let mut private = single_event("Therapy", at(18, 10));
    private.classification = Classification::Private;
    let private = calendar.create(ORGANIZER, private, Vec::new()).await;
    let err = relocate(&calendar, ORGANIZER, &request(source, &private, public))
        .await
        .expect_err("private event into public folder");
    assert!(matches!(err, ServiceError::ValidationFailed(_)));

    let meeting = invite(single_event("Sync", at(18, 14)), &[ATTENDEE]);
    let meeting = calendar.create(ORGANIZER, meeting, Vec::new()).await;
    let err = relocate(&calendar, ORGANIZER, &request(source, &meeting, public))
        .await
        .expect_err("scheduled event into public folder");
    assert!(matches!(err, ServiceError::ValidationFailed(_)));

    assert_eq!(calendar.stored(private.id).folder_id, source);
    assert_eq!(calendar.stored(meeting.id).folder_id, source);
}

/// ## Summary
/// Events cannot be moved into another user's calendar, even with full access.
#[test_log::test(tokio::test)]
async fn move_to_other_calendar_user_is_rejected() {
    let calendar = TestCalendar::new();
    let source = calendar.calendar(ORGANIZER);
    let foreign = calendar.calendar(OUTSIDER);
    let event = calendar
        .create(ORGANIZER, single_event("Handover", at(19, 11)), Vec::new())
        .await;

    let err = relocate(&calendar, ORGANIZER, &request(source, &event, foreign))
        .await
        .expect_err("target not visible");
    assert!(matches!(err, ServiceError::NotFound(_)));

    calendar
        .folders
        .grant(foreign, ORGANIZER, FolderPermission::all());
    let err = relocate(&calendar, ORGANIZER, &request(source, &event, foreign))
        .await
        .expect_err("different calendar user");
    assert!(matches!(err, ServiceError::ValidationFailed(_)));
}

/// ## Summary
/// Stale moves and moves of single change exceptions are rejected without
/// writing anything.
#[test_log::test(tokio::test)]
async fn stale_and_exception_moves_are_rejected() {
    let calendar = TestCalendar::new();
    let source = calendar.calendar(ORGANIZER);
    let target = calendar.add_calendar(ORGANIZER);
    let first = at(21, 18);
    let master = calendar
        .create(ORGANIZER, daily_series("Choir", first, 3), Vec::new())
        .await;

    let mut stale = request(source, &master, target);
    stale.client_timestamp = master.timestamp - 1;
    let err = relocate(&calendar, ORGANIZER, &stale)
        .await
        .expect_err("stale move");
    assert!(matches!(err, ServiceError::ConcurrentModification { .. }));

    let mut change = UpdateRequest::new(
        source,
        master.id,
        master.timestamp,
        EventUpdate {
            summary: Some(Some("Choir rehearsal".to_string())),
            ..EventUpdate::default()
        },
    );
    change.recurrence_id = Some(occurrence(first, 2));
    calendar
        .service
        .update_event(&session(ORGANIZER), &change)
        .await
        .expect("exception created");
    let master = calendar.stored(master.id);
    let exception = calendar
        .exception(&master, occurrence(first, 2))
        .expect("stored exception");
    let writes = calendar.store.write_count();

    let err = relocate(&calendar, ORGANIZER, &request(source, &exception, target))
        .await
        .expect_err("exception alone");
    assert!(matches!(err, ServiceError::ValidationFailed(_)));
    assert_eq!(calendar.store.write_count(), writes);
    assert_eq!(calendar.stored(exception.id).folder_id, source);
}
