//! Field table of [`Attendee`].

use crate::model::Attendee;

use super::{FieldMapping, Mapped};

/// Diffable attendee properties. Identity (`entity`) is not part of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttendeeField {
    Uri,
    Cn,
    CuType,
    Partstat,
    Role,
    Rsvp,
    Comment,
    Folder,
}

impl AttendeeField {
    /// Fields an attendee may change on their own participation.
    pub const SELF_SERVICE: &'static [Self] = &[Self::Partstat, Self::Comment, Self::Folder];
}

macro_rules! attendee_field {
    ($field:expr, $name:ident) => {
        FieldMapping {
            field: $field,
            is_set: |attendee: &Attendee| attendee.$name.is_some(),
            equals: |a: &Attendee, b: &Attendee| a.$name == b.$name,
            copy: |from: &Attendee, to: &mut Attendee| to.$name.clone_from(&from.$name),
        }
    };
}

static ATTENDEE_MAPPINGS: [FieldMapping<Attendee, AttendeeField>; 8] = [
    attendee_field!(AttendeeField::Uri, uri),
    attendee_field!(AttendeeField::Cn, cn),
    attendee_field!(AttendeeField::CuType, cu_type),
    attendee_field!(AttendeeField::Partstat, partstat),
    attendee_field!(AttendeeField::Role, role),
    attendee_field!(AttendeeField::Rsvp, rsvp),
    attendee_field!(AttendeeField::Comment, comment),
    attendee_field!(AttendeeField::Folder, folder_id),
];

impl Mapped for Attendee {
    type Field = AttendeeField;

    fn mappings() -> &'static [FieldMapping<Self, Self::Field>] {
        &ATTENDEE_MAPPINGS
    }
}
