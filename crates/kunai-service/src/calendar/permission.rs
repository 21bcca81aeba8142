//! Folder permission checks.

use std::fmt;

use kunai_core::model::Event;

use crate::collaborator::{CalendarFolder, ObjectPermission};
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Write,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// ## Summary
/// Fails unless the acting user may perform `operation` in `folder`.
///
/// Operations on an existing event need the "own objects" level if the acting user
/// created the event and the "all objects" level otherwise.
///
/// ## Errors
/// Returns [`ServiceError::PermissionDenied`] if the permission is insufficient.
pub fn require_permission(
    folder: &CalendarFolder,
    operation: Operation,
    event: Option<&Event>,
    acting_user: i32,
) -> ServiceResult<()> {
    let granted = match operation {
        Operation::Create if folder.permission.create => return Ok(()),
        Operation::Create => ObjectPermission::None,
        Operation::Read => folder.permission.read,
        Operation::Write => folder.permission.write,
        Operation::Delete => folder.permission.delete,
    };
    let required = match event {
        Some(event) if event.created_by == acting_user => ObjectPermission::Own,
        _ => ObjectPermission::All,
    };
    if operation != Operation::Create && granted >= required {
        return Ok(());
    }

    tracing::debug!(
        folder_id = %folder.id,
        %operation,
        ?granted,
        ?required,
        "Folder permission insufficient"
    );
    Err(ServiceError::PermissionDenied(format!(
        "no {operation} permission in folder {}",
        folder.id
    )))
}
