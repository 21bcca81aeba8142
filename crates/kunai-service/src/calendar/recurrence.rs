//! Recurrence rule expansion for series masters.
//!
//! Rules are expanded on the wall clock of the master's start date, so a series in
//! a named zone keeps its local time across DST transitions. Recurrence ids are the
//! UTC instants of the resulting occurrence starts.

use chrono::TimeDelta;
use kunai_core::model::{CalendarDateTime, Event, RecurrenceId};
use rrule::{RRule, RRuleSet, Tz, Unvalidated};

use crate::error::{ServiceError, ServiceResult};

fn invalid_rule(err: impl std::fmt::Display) -> ServiceError {
    ServiceError::ValidationFailed(format!("invalid recurrence rule: {err}"))
}

fn rule_set(rule: &str, start: &CalendarDateTime) -> ServiceResult<RRuleSet> {
    let rrule = rule.parse::<RRule<Unvalidated>>().map_err(invalid_rule)?;
    let dt_start = start.local().and_utc().with_timezone(&Tz::UTC);
    rrule.build(dt_start).map_err(invalid_rule)
}

fn series_rule(master: &Event) -> ServiceResult<&str> {
    match (&master.recurrence_rule, master.is_series_master()) {
        (Some(rule), true) => Ok(rule),
        _ => Err(ServiceError::InvalidRecurrenceId(format!(
            "event {} is not a series master",
            master.id
        ))),
    }
}

/// ## Summary
/// Checks that `rule` is a valid recurrence rule for a series starting at `start`.
///
/// ## Errors
/// Returns [`ServiceError::ValidationFailed`] if the rule does not parse or build.
pub fn validate_rule(rule: &str, start: &CalendarDateTime) -> ServiceResult<()> {
    rule_set(rule, start).map(|_| ())
}

/// Start of the occurrence `recurrence_id`, in the form of the master's start.
#[must_use]
pub fn occurrence_start(master: &Event, recurrence_id: RecurrenceId) -> CalendarDateTime {
    master.start_date.with_instant(recurrence_id.instant())
}

/// End of the occurrence `recurrence_id`, keeping the master's duration.
#[must_use]
pub fn occurrence_end(master: &Event, recurrence_id: RecurrenceId) -> CalendarDateTime {
    let duration = master.start_date.duration_until(&master.end_date);
    occurrence_start(master, recurrence_id).shifted(duration)
}

/// Expands up to `limit` occurrences of a series master.
#[cfg(test)]
fn occurrences(master: &Event, limit: u16) -> ServiceResult<Vec<RecurrenceId>> {
    let set = rule_set(series_rule(master)?, &master.start_date)?;
    Ok(set
        .all(limit)
        .dates
        .into_iter()
        .map(|date| RecurrenceId::new(master.start_date.with_local(date.naive_utc()).to_utc()))
        .collect())
}

/// ## Summary
/// Returns whether `recurrence_id` is produced by the master's recurrence rule.
///
/// ## Errors
/// Returns [`ServiceError::InvalidRecurrenceId`] if `master` is not a series master,
/// or [`ServiceError::ValidationFailed`] if its rule is invalid.
pub fn is_occurrence(master: &Event, recurrence_id: RecurrenceId) -> ServiceResult<bool> {
    let rule = series_rule(master)?;
    let local = occurrence_start(master, recurrence_id).local();
    let anchor = local.and_utc().with_timezone(&Tz::UTC);
    let window = rule_set(rule, &master.start_date)?
        .after(anchor - TimeDelta::seconds(1))
        .before(anchor + TimeDelta::seconds(1));
    Ok(window
        .all(2)
        .dates
        .iter()
        .any(|date| date.naive_utc() == local))
}

/// ## Summary
/// Checks that `recurrence_id` names a live occurrence of `master`.
///
/// ## Errors
/// Returns [`ServiceError::InvalidRecurrenceId`] if the id is not produced by the
/// rule or was already deleted from the series.
pub fn check_recurrence_id(master: &Event, recurrence_id: RecurrenceId) -> ServiceResult<()> {
    if master.delete_exception_dates.contains(&recurrence_id) {
        return Err(ServiceError::InvalidRecurrenceId(format!(
            "occurrence {recurrence_id} of series {} was deleted",
            master.id
        )));
    }
    if !is_occurrence(master, recurrence_id)? {
        tracing::debug!(series_id = %master.id, %recurrence_id, "Recurrence id not in series");
        return Err(ServiceError::InvalidRecurrenceId(format!(
            "{recurrence_id} is not an occurrence of series {}",
            master.id
        )));
    }
    Ok(())
}
