//! Field-level and collection-level comparison of calendar entities.
//!
//! Each entity type describes its properties through a closed table of
//! [`FieldMapping`] rows. The generic functions in this module walk those tables
//! instead of relying on per-type comparison code:
//!
//! - [`diff`]: the fields an updated instance explicitly sets to a different value
//! - [`collection_diff`]: added, removed and changed items between two collections
//! - [`merge_set_fields`]: copy only the explicitly set fields of a sparse item

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;

pub mod alarm;
pub mod attendee;
pub mod event;

pub use alarm::AlarmField;
pub use attendee::AttendeeField;
pub use event::EventField;

/// One row of an entity's field table.
pub struct FieldMapping<O: 'static, F> {
    pub field: F,
    /// Whether the instance carries an explicit value for the field.
    pub is_set: fn(&O) -> bool,
    pub equals: fn(&O, &O) -> bool,
    /// Copies the field's value from the first instance onto the second.
    pub copy: fn(&O, &mut O),
}

/// Entity types that expose a field table.
pub trait Mapped: Sized + 'static {
    type Field: Copy + Ord + Hash + fmt::Debug + 'static;

    fn mappings() -> &'static [FieldMapping<Self, Self::Field>];
}

/// ## Summary
/// Returns the fields where `updated` carries an explicitly set value that differs
/// from `original`.
///
/// With only one side present, every field set on that side is reported.
#[must_use]
pub fn diff<O: Mapped>(original: Option<&O>, updated: Option<&O>) -> BTreeSet<O::Field> {
    let mappings = O::mappings().iter();
    match (original, updated) {
        (None, None) => BTreeSet::new(),
        (Some(only), None) | (None, Some(only)) => mappings
            .filter(|mapping| (mapping.is_set)(only))
            .map(|mapping| mapping.field)
            .collect(),
        (Some(original), Some(updated)) => mappings
            .filter(|mapping| (mapping.is_set)(updated) && !(mapping.equals)(original, updated))
            .map(|mapping| mapping.field)
            .collect(),
    }
}

/// Copies every field explicitly set on `from` onto `into`.
pub fn merge_set_fields<O: Mapped>(from: &O, into: &mut O) {
    for mapping in O::mappings() {
        if (mapping.is_set)(from) {
            (mapping.copy)(from, into);
        }
    }
}

/// An original/updated pair of one entity together with the fields that differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate<O: Mapped> {
    original: O,
    updated: O,
    updated_fields: BTreeSet<O::Field>,
}

impl<O: Mapped> ItemUpdate<O> {
    /// Pairs `original` with `updated` and computes the differing fields.
    #[must_use]
    pub fn new(original: O, updated: O) -> Self {
        let updated_fields = diff(Some(&original), Some(&updated));
        Self {
            original,
            updated,
            updated_fields,
        }
    }

    #[must_use]
    pub const fn original(&self) -> &O {
        &self.original
    }

    #[must_use]
    pub const fn updated(&self) -> &O {
        &self.updated
    }

    #[must_use]
    pub const fn updated_fields(&self) -> &BTreeSet<O::Field> {
        &self.updated_fields
    }

    #[must_use]
    pub fn contains_any(&self, fields: &[O::Field]) -> bool {
        fields.iter().any(|field| self.updated_fields.contains(field))
    }

    #[must_use]
    pub fn into_parts(self) -> (O, O, BTreeSet<O::Field>) {
        (self.original, self.updated, self.updated_fields)
    }
}

/// Added, removed and changed items between an original and a requested collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionUpdate<O: Mapped> {
    added: Vec<O>,
    removed: Vec<O>,
    updated: Vec<ItemUpdate<O>>,
}

impl<O: Mapped> CollectionUpdate<O> {
    #[must_use]
    pub fn added(&self) -> &[O] {
        &self.added
    }

    #[must_use]
    pub fn removed(&self) -> &[O] {
        &self.removed
    }

    #[must_use]
    pub fn updated(&self) -> &[ItemUpdate<O>] {
        &self.updated
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

impl<O: Mapped> Default for CollectionUpdate<O> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            updated: Vec::new(),
        }
    }
}

/// ## Summary
/// Compares two collections of the same entity type.
///
/// Items are paired through `matches`, which must be reflexive and symmetric.
/// Unmatched requested items are added, unmatched original items are removed, and
/// matched pairs with at least one differing field become item updates. Output
/// keeps the order of the inputs.
#[must_use]
pub fn collection_diff<O, M>(originals: &[O], updateds: &[O], matches: M) -> CollectionUpdate<O>
where
    O: Mapped + Clone,
    M: Fn(&O, &O) -> bool,
{
    if originals.is_empty() {
        return CollectionUpdate {
            added: updateds.to_vec(),
            ..CollectionUpdate::default()
        };
    }
    if updateds.is_empty() {
        return CollectionUpdate {
            removed: originals.to_vec(),
            ..CollectionUpdate::default()
        };
    }

    let mut result = CollectionUpdate::default();
    for updated in updateds {
        match originals.iter().find(|original| matches(original, updated)) {
            None => result.added.push(updated.clone()),
            Some(original) => {
                let update = ItemUpdate::new(original.clone(), updated.clone());
                if !update.updated_fields.is_empty() {
                    result.updated.push(update);
                }
            }
        }
    }
    for original in originals {
        if !updateds.iter().any(|updated| matches(original, updated)) {
            result.removed.push(original.clone());
        }
    }
    result
}
