//! Field table of [`Alarm`].

use crate::model::Alarm;

use super::{FieldMapping, Mapped};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlarmField {
    Action,
    Trigger,
    Description,
    Acknowledged,
}

macro_rules! alarm_field {
    ($field:expr, $name:ident) => {
        FieldMapping {
            field: $field,
            is_set: |alarm: &Alarm| alarm.$name.is_some(),
            equals: |a: &Alarm, b: &Alarm| a.$name == b.$name,
            copy: |from: &Alarm, to: &mut Alarm| to.$name.clone_from(&from.$name),
        }
    };
}

static ALARM_MAPPINGS: [FieldMapping<Alarm, AlarmField>; 4] = [
    alarm_field!(AlarmField::Action, action),
    alarm_field!(AlarmField::Trigger, trigger),
    alarm_field!(AlarmField::Description, description),
    alarm_field!(AlarmField::Acknowledged, acknowledged),
];

impl Mapped for Alarm {
    type Field = AlarmField;

    fn mappings() -> &'static [FieldMapping<Self, Self::Field>] {
        &ALARM_MAPPINGS
    }
}
