#![allow(clippy::expect_used)]
//! Tests for per-user alarm changes.

use chrono::TimeDelta;
use kunai_core::model::{Alarm, AlarmTrigger, Event};
use kunai_service::calendar::AlarmUpdateRequest;
use kunai_service::collaborator::FolderPermission;
use kunai_service::error::ServiceError;
use kunai_service::result::CalendarResult;
use kunai_test::*;

fn alarms(folder_id: uuid::Uuid, event: &Event, alarms: Vec<Alarm>) -> AlarmUpdateRequest {
    AlarmUpdateRequest {
        folder_id,
        event_id: event.id,
        recurrence_id: None,
        client_timestamp: event.timestamp,
        alarms,
    }
}

async fn send(
    calendar: &TestCalendar,
    user: i32,
    request: &AlarmUpdateRequest,
) -> Result<CalendarResult, ServiceError> {
    calendar.service.update_alarms(&session(user), request).await
}

fn uids(alarms: &[Alarm]) -> Vec<&str> {
    let mut uids: Vec<&str> = alarms.iter().map(|alarm| alarm.uid.as_str()).collect();
    uids.sort_unstable();
    uids
}

// ============================================================================
// Alarm sets
// ============================================================================

/// ## Summary
/// Alarms are matched by uid: new ones are added, known ones updated and missing
/// ones removed. The event itself is touched.
#[test_log::test(tokio::test)]
async fn alarm_set_is_replaced_by_uid() {
    let calendar = TestCalendar::new();
    let folder = calendar.calendar(ORGANIZER);
    let event = calendar
        .create(
            ORGANIZER,
            single_event("Dentist", at(8, 14)),
            vec![reminder("keep"), reminder("drop")],
        )
        .await;

    let mut changed = Alarm {
        trigger: Some(AlarmTrigger::Relative(-3600)),
        ..reminder("keep")
    };
    changed.description = Some("Leave now".to_string());
    let request = alarms(folder, &event, vec![changed, reminder("new")]);
    let result = send(&calendar, ORGANIZER, &request)
        .await
        .expect("alarms replaced");

    let stored = calendar.store.alarms(event.id, ORGANIZER);
    assert_eq!(uids(&stored), vec!["keep", "new"]);
    let kept = stored
        .iter()
        .find(|alarm| alarm.uid == "keep")
        .expect("kept alarm");
    assert_eq!(kept.trigger, Some(AlarmTrigger::Relative(-3600)));
    assert_eq!(kept.description.as_deref(), Some("Leave now"));

    let touched = calendar.stored(event.id);
    assert_eq!(touched.timestamp, result.timestamp());
    assert!(touched.timestamp >= event.timestamp);
    assert_eq!(result.plain().len(), 1);
    assert!(result.plain()[0].is_update());
}

/// ## Summary
/// Properties left out of a requested alarm keep their stored value.
#[test_log::test(tokio::test)]
async fn unset_alarm_properties_are_kept() {
    let calendar = TestCalendar::new();
    let folder = calendar.calendar(ORGANIZER);
    let event = calendar
        .create(ORGANIZER, single_event("Lunch", at(8, 12)), vec![reminder("lunch")])
        .await;

    let partial = Alarm {
        description: Some("Bring voucher".to_string()),
        action: None,
        trigger: None,
        ..reminder("lunch")
    };
    send(&calendar, ORGANIZER, &alarms(folder, &event, vec![partial]))
        .await
        .expect("alarm updated");

    let stored = calendar.store.alarms(event.id, ORGANIZER);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].trigger, reminder("lunch").trigger);
    assert_eq!(stored[0].action, reminder("lunch").action);
    assert_eq!(stored[0].description.as_deref(), Some("Bring voucher"));
}

/// ## Summary
/// Requesting the stored alarms again writes nothing and reports nothing.
#[test_log::test(tokio::test)]
async fn unchanged_alarms_are_a_no_op() {
    let calendar = TestCalendar::new();
    let folder = calendar.calendar(ORGANIZER);
    let event = calendar
        .create(ORGANIZER, single_event("Gym", at(9, 18)), vec![reminder("gym")])
        .await;
    let writes = calendar.store.write_count();
    let notifications = calendar.sink.results().len();

    let result = send(&calendar, ORGANIZER, &alarms(folder, &event, vec![reminder("gym")]))
        .await
        .expect("no-op update");

    assert!(result.is_empty());
    assert_eq!(calendar.store.write_count(), writes);
    assert_eq!(calendar.sink.results().len(), notifications);
    assert_eq!(calendar.stored(event.id), event);
}

/// ## Summary
/// An empty alarm set removes every alarm of the calendar user only.
#[test_log::test(tokio::test)]
async fn alarms_are_personal() {
    let calendar = TestCalendar::new();
    let event = invite(single_event("Retro", at(10, 15)), &[ATTENDEE]);
    let event = calendar
        .create(ORGANIZER, event, vec![reminder("organizer")])
        .await;

    let own = alarms(calendar.calendar(ATTENDEE), &event, vec![reminder("attendee")]);
    send(&calendar, ATTENDEE, &own)
        .await
        .expect("attendee sets alarms");
    assert_eq!(uids(&calendar.store.alarms(event.id, ATTENDEE)), vec!["attendee"]);

    let event = calendar.stored(event.id);
    let cleared = alarms(calendar.calendar(ORGANIZER), &event, Vec::new());
    send(&calendar, ORGANIZER, &cleared)
        .await
        .expect("organizer clears alarms");

    assert!(calendar.store.alarms(event.id, ORGANIZER).is_empty());
    assert_eq!(uids(&calendar.store.alarms(event.id, ATTENDEE)), vec!["attendee"]);
}

// ============================================================================
// Occurrences and access
// ============================================================================

/// ## Summary
/// Changing alarms of one occurrence materializes a change exception that takes
/// the new alarms, while the series keeps its own.
#[test_log::test(tokio::test)]
async fn occurrence_alarms_create_exception() {
    let calendar = TestCalendar::new();
    let first = at(20, 7);
    let master = calendar
        .create(
            ORGANIZER,
            daily_series("Commute", first, 5),
            vec![reminder("daily")],
        )
        .await;
    let recurrence_id = occurrence(first, 2);

    let early = Alarm::display("early", TimeDelta::hours(1));
    let mut request = alarms(calendar.calendar(ORGANIZER), &master, vec![early]);
    request.recurrence_id = Some(recurrence_id);
    let result = send(&calendar, ORGANIZER, &request)
        .await
        .expect("occurrence alarms set");

    let exception = calendar
        .exception(&master, recurrence_id)
        .expect("exception created");
    assert_eq!(uids(&calendar.store.alarms(exception.id, ORGANIZER)), vec!["early"]);
    assert_eq!(uids(&calendar.store.alarms(master.id, ORGANIZER)), vec!["daily"]);
    assert!(calendar
        .stored(master.id)
        .change_exception_dates
        .contains(&recurrence_id));

    let creation = result.find_plain(exception.id).expect("exception reported");
    assert!(creation.is_creation());
    assert!(result.find_plain(master.id).is_some());
}

/// ## Summary
/// A delegate with read access manages the alarms of the calendar owner.
#[test_log::test(tokio::test)]
async fn delegate_sets_owner_alarms() {
    let calendar = TestCalendar::new();
    let folder = calendar.calendar(ORGANIZER);
    calendar
        .folders
        .grant(folder, OUTSIDER, FolderPermission::read_only());
    let event = calendar
        .create(ORGANIZER, single_event("Keynote", at(11, 16)), Vec::new())
        .await;

    send(&calendar, OUTSIDER, &alarms(folder, &event, vec![reminder("stage")]))
        .await
        .expect("delegate may set alarms");

    assert_eq!(uids(&calendar.store.alarms(event.id, ORGANIZER)), vec!["stage"]);
    assert!(calendar.store.alarms(event.id, OUTSIDER).is_empty());
}

/// ## Summary
/// Events outside the addressed folder cannot be given alarms, and stale
/// timestamps are rejected.
#[test_log::test(tokio::test)]
async fn foreign_and_stale_alarm_updates_are_rejected() {
    let calendar = TestCalendar::new();
    let event = calendar
        .create(ORGANIZER, single_event("Private", at(12, 9)), Vec::new())
        .await;

    let foreign = alarms(calendar.calendar(ATTENDEE), &event, vec![reminder("peek")]);
    let err = send(&calendar, ATTENDEE, &foreign)
        .await
        .expect_err("not in the attendee's calendar");
    assert!(matches!(err, ServiceError::NotFound(_)));

    let mut stale = alarms(calendar.calendar(ORGANIZER), &event, vec![reminder("late")]);
    stale.client_timestamp = event.timestamp - 1;
    let err = send(&calendar, ORGANIZER, &stale)
        .await
        .expect_err("stale timestamp");
    assert!(matches!(err, ServiceError::ConcurrentModification { .. }));
    assert!(calendar.store.alarms(event.id, ORGANIZER).is_empty());
}
