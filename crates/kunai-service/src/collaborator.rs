//! Contracts of the services the engine consumes but does not implement.
//!
//! Collaborators are injected into [`crate::CalendarService`] and called
//! synchronously from inside a unit of work.

use std::sync::Arc;

use kunai_core::model::CalendarUserType;
use kunai_core::types::FolderType;
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::result::CalendarResult;

/// The user on whose behalf a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarSession {
    pub user_id: i32,
}

impl CalendarSession {
    #[must_use]
    pub const fn new(user_id: i32) -> Self {
        Self { user_id }
    }
}

/// Permission on the objects of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ObjectPermission {
    #[default]
    None,
    /// Only objects created by the acting user.
    Own,
    All,
}

/// Effective permission bits of the acting user on a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FolderPermission {
    pub create: bool,
    pub read: ObjectPermission,
    pub write: ObjectPermission,
    pub delete: ObjectPermission,
}

impl FolderPermission {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            create: true,
            read: ObjectPermission::All,
            write: ObjectPermission::All,
            delete: ObjectPermission::All,
        }
    }

    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            create: false,
            read: ObjectPermission::All,
            write: ObjectPermission::None,
            delete: ObjectPermission::None,
        }
    }

    /// Create, and read/write/delete of own objects only.
    #[must_use]
    pub const fn own_objects() -> Self {
        Self {
            create: true,
            read: ObjectPermission::Own,
            write: ObjectPermission::Own,
            delete: ObjectPermission::Own,
        }
    }
}

/// A calendar folder as seen by the acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarFolder {
    pub id: Uuid,
    pub folder_type: FolderType,
    /// Owning user, the calendar user of private and shared folders.
    pub owner: i32,
    pub permission: FolderPermission,
}

impl CalendarFolder {
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.folder_type == FolderType::Public
    }

    /// ## Summary
    /// Returns the user whose calendar the folder represents.
    ///
    /// Public folders belong to nobody, so the acting user acts for themselves.
    #[must_use]
    pub fn calendar_user(&self, acting_user: i32) -> i32 {
        if self.is_public() {
            acting_user
        } else {
            self.owner
        }
    }
}

/// Resolves folders and the acting user's permissions on them.
pub trait FolderResolver: Send + Sync {
    /// ## Errors
    /// Returns [`crate::error::ServiceError::NotFound`] for unknown or invisible folders.
    fn resolve(&self, folder_id: Uuid, session: &CalendarSession) -> ServiceResult<CalendarFolder>;
}

/// Directory entry of an internal calendar user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    pub entity: i32,
    pub uri: String,
    pub cn: Option<String>,
    /// Folder new events of the user land in.
    pub default_folder: Option<Uuid>,
}

/// User, group and resource lookup.
pub trait Directory: Send + Sync {
    /// ## Errors
    /// Returns [`crate::error::ServiceError::InvalidCalendarUser`] if the entity is unknown.
    fn resolve(&self, entity: i32, cu_type: CalendarUserType) -> ServiceResult<ResolvedUser>;
}

/// Downstream fan-out of committed mutations.
///
/// Called once per successful request, after commit. Failures are logged and
/// never fail the mutation.
pub trait NotificationSink: Send + Sync {
    /// ## Errors
    /// Any error is reported by the engine and otherwise ignored.
    fn notify(&self, result: &CalendarResult) -> anyhow::Result<()>;
}

/// Everything the engine needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub folders: Arc<dyn FolderResolver>,
    pub directory: Arc<dyn Directory>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
