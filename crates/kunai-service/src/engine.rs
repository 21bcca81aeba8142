//! Entry points of the calendar engine.
//!
//! Every mutation resolves its folder, then runs completely inside one retrying
//! unit of work. The finished [`CalendarResult`] is handed to the notification
//! sink after commit.

use diesel_async::scoped_futures::ScopedFutureExt;
use kunai_core::config::RetryConfig;
use kunai_core::model::{Alarm, Event};
use kunai_db::db::{AlarmStorage, CalendarStorage, RetryPolicy, SessionProvider, UnitOfWork};
use uuid::Uuid;

use crate::calendar::performer::Performer;
use crate::calendar::permission::{Operation, require_permission};
use crate::calendar::{
    AlarmUpdateRequest, AttendeeUpdateRequest, CreateRequest, DeleteRequest, MoveRequest,
    UpdateRequest,
};
use crate::collaborator::{CalendarSession, Collaborators};
use crate::error::{ServiceError, ServiceResult};
use crate::result::CalendarResult;

/// An event as seen by the calendar user, with their alarms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedEvent {
    pub event: Event,
    pub alarms: Vec<Alarm>,
}

#[derive(Debug, Clone, Copy)]
enum Mutation<'q> {
    Create(&'q CreateRequest),
    Update(&'q UpdateRequest),
    Delete(&'q DeleteRequest),
    Attendee(&'q AttendeeUpdateRequest),
    Alarms(&'q AlarmUpdateRequest),
    Move(&'q MoveRequest),
}

impl Mutation<'_> {
    const fn folder_id(self) -> Uuid {
        match self {
            Self::Create(request) => request.folder_id,
            Self::Update(request) => request.folder_id,
            Self::Delete(request) => request.folder_id,
            Self::Attendee(request) => request.folder_id,
            Self::Alarms(request) => request.folder_id,
            Self::Move(request) => request.folder_id,
        }
    }

    async fn perform<S: CalendarStorage>(
        self,
        performer: &mut Performer<'_, S>,
    ) -> ServiceResult<()> {
        match self {
            Self::Create(request) => performer.create(request).await.map(|_| ()),
            Self::Update(request) => performer.update(request).await,
            Self::Delete(request) => performer.delete(request).await,
            Self::Attendee(request) => performer.update_attendee(request).await,
            Self::Alarms(request) => performer.update_alarms(request).await,
            Self::Move(request) => performer.move_event(request).await,
        }
    }
}

/// ## Summary
/// The calendar event mutation engine.
///
/// Generic over the storage backend: any [`SessionProvider`] whose sessions
/// expose the calendar storage ports.
pub struct CalendarService<P> {
    provider: P,
    policy: RetryPolicy,
    collaborators: Collaborators,
}

impl<P> CalendarService<P>
where
    P: SessionProvider,
    P::Session: CalendarStorage,
{
    #[must_use]
    pub fn new(provider: P, retry: &RetryConfig, collaborators: Collaborators) -> Self {
        Self {
            provider,
            policy: RetryPolicy::from(retry),
            collaborators,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// ## Summary
    /// Loads an event from a folder with the calendar user's alarms.
    ///
    /// ## Errors
    /// Returns [`crate::error::ServiceError::NotFound`] for missing or hidden
    /// events and [`crate::error::ServiceError::PermissionDenied`] without read
    /// permission.
    #[tracing::instrument(skip(self, session), fields(user = session.user_id))]
    pub async fn get_event(
        &self,
        session: &CalendarSession,
        folder_id: Uuid,
        event_id: Uuid,
    ) -> ServiceResult<LoadedEvent> {
        let folder = self.collaborators.folders.resolve(folder_id, session)?;
        let uow = UnitOfWork::new(&self.provider, self.policy);
        let collaborators = &self.collaborators;
        let session = *session;
        uow.execute_read(move |storage| {
            async move {
                let mut performer = Performer::new(storage, collaborators, folder, &session);
                let event = performer.load_in_folder(event_id).await?;
                require_permission(
                    &performer.folder,
                    Operation::Read,
                    Some(&event),
                    session.user_id,
                )?;
                let alarms = performer
                    .storage
                    .load_alarms(event.id, performer.calendar_user)
                    .await?;
                Ok(LoadedEvent { event, alarms })
            }
            .scope_boxed()
        })
        .await
    }

    /// ## Summary
    /// Creates an event or series.
    ///
    /// The created event is the only top-level creation of the result.
    ///
    /// ## Errors
    /// See [`CreateRequest`].
    #[tracing::instrument(skip(self, session, request), fields(user = session.user_id))]
    pub async fn create_event(
        &self,
        session: &CalendarSession,
        request: &CreateRequest,
    ) -> ServiceResult<CalendarResult> {
        self.mutate(session, Mutation::Create(request)).await
    }

    /// ## Summary
    /// Moves an event, changes its properties and replaces the calendar user's
    /// alarms, in that order.
    ///
    /// ## Errors
    /// See [`UpdateRequest`].
    #[tracing::instrument(
        skip(self, session, request),
        fields(user = session.user_id, event_id = %request.event_id)
    )]
    pub async fn update_event(
        &self,
        session: &CalendarSession,
        request: &UpdateRequest,
    ) -> ServiceResult<CalendarResult> {
        self.mutate(session, Mutation::Update(request)).await
    }

    /// ## Summary
    /// Deletes an event, a series or one occurrence, or removes the calendar user
    /// from it when they only attend.
    ///
    /// ## Errors
    /// See [`DeleteRequest`].
    #[tracing::instrument(
        skip(self, session, request),
        fields(user = session.user_id, event_id = %request.event_id)
    )]
    pub async fn delete_event(
        &self,
        session: &CalendarSession,
        request: &DeleteRequest,
    ) -> ServiceResult<CalendarResult> {
        self.mutate(session, Mutation::Delete(request)).await
    }

    /// Changes one attendee's participation.
    ///
    /// ## Errors
    /// See [`AttendeeUpdateRequest`].
    #[tracing::instrument(
        skip(self, session, request),
        fields(user = session.user_id, event_id = %request.event_id)
    )]
    pub async fn update_attendee(
        &self,
        session: &CalendarSession,
        request: &AttendeeUpdateRequest,
    ) -> ServiceResult<CalendarResult> {
        self.mutate(session, Mutation::Attendee(request)).await
    }

    /// Replaces the calendar user's alarms.
    ///
    /// ## Errors
    /// See [`AlarmUpdateRequest`].
    #[tracing::instrument(
        skip(self, session, request),
        fields(user = session.user_id, event_id = %request.event_id)
    )]
    pub async fn update_alarms(
        &self,
        session: &CalendarSession,
        request: &AlarmUpdateRequest,
    ) -> ServiceResult<CalendarResult> {
        self.mutate(session, Mutation::Alarms(request)).await
    }

    /// Moves an event and its exceptions to another folder.
    ///
    /// ## Errors
    /// See [`MoveRequest`].
    #[tracing::instrument(
        skip(self, session, request),
        fields(user = session.user_id, event_id = %request.event_id)
    )]
    pub async fn move_event(
        &self,
        session: &CalendarSession,
        request: &MoveRequest,
    ) -> ServiceResult<CalendarResult> {
        self.mutate(session, Mutation::Move(request)).await
    }

    async fn mutate(
        &self,
        session: &CalendarSession,
        mutation: Mutation<'_>,
    ) -> ServiceResult<CalendarResult> {
        let folder = self
            .collaborators
            .folders
            .resolve(mutation.folder_id(), session)?;
        let mut uow = UnitOfWork::new(&self.provider, self.policy);
        let collaborators = &self.collaborators;
        let folder = &folder;
        let session = *session;

        let result = uow
            .execute_write(|storage| {
                async move {
                    let mut performer =
                        Performer::new(storage, collaborators, folder.clone(), &session);
                    mutation.perform(&mut performer).await?;
                    Ok::<_, ServiceError>(performer.finish())
                }
                .scope_boxed()
            })
            .await?;

        if uow.stats().retries > 0 {
            tracing::debug!(retries = uow.stats().retries, "Mutation committed after retries");
        }
        self.publish(&result);
        Ok(result)
    }

    /// Hands a committed result to the notification sink. Failures are only logged.
    fn publish(&self, result: &CalendarResult) {
        if result.is_empty() {
            return;
        }
        if let Err(err) = self.collaborators.notifications.notify(result) {
            tracing::warn!(error = %err, "Failed to publish calendar changes");
        }
    }
}
