//! Accumulation and merging of results while a request runs.

use kunai_core::diff::ItemUpdate;
use kunai_core::model::Event;
use uuid::Uuid;

use super::{CalendarResult, Change, MutationResult, ResultKey};

type EntryId = usize;

#[derive(Debug)]
struct Entry {
    key: ResultKey,
    folder_id: Uuid,
    parent: Option<EntryId>,
    /// `None` once the entry cancelled out.
    change: Option<Change>,
}

enum Merge {
    Into(Change),
    Cancel,
    Separate(Change, Change),
}

/// ## Summary
/// Combines a pending change with a later change of the same entity.
///
/// - creation, then update: creation of the final state
/// - creation, then deletion: nothing
/// - update, then update: update from the first original to the last state
/// - update, then deletion: deletion of the pre-update original
/// - deletion, then creation: update from the deleted to the created state
fn merge(existing: Change, incoming: Change) -> Merge {
    match (existing, incoming) {
        (Change::Creation(_), Change::Creation(created)) => Merge::Into(Change::Creation(created)),
        (Change::Creation(_), Change::Update(update)) => {
            let (_, updated, _) = update.into_parts();
            Merge::Into(Change::Creation(updated))
        }
        (Change::Creation(_), Change::Deletion { .. }) => Merge::Cancel,
        (Change::Update(first), Change::Update(second)) => {
            let (original, _, _) = first.into_parts();
            let (_, updated, _) = second.into_parts();
            Merge::Into(Change::Update(ItemUpdate::new(original, updated)))
        }
        (Change::Update(first), Change::Deletion { timestamp, .. }) => {
            let (original, _, _) = first.into_parts();
            Merge::Into(Change::Deletion {
                timestamp,
                original,
            })
        }
        (Change::Deletion { original, .. }, Change::Creation(created)) => {
            Merge::Into(Change::Update(ItemUpdate::new(original, created)))
        }
        (deletion @ Change::Deletion { .. }, Change::Deletion { .. }) => Merge::Into(deletion),
        (existing, incoming) => Merge::Separate(existing, incoming),
    }
}

/// One view of the results.
#[derive(Debug, Default)]
struct ResultTrack {
    entries: Vec<Entry>,
}

impl ResultTrack {
    fn find(&self, key: &ResultKey) -> Option<EntryId> {
        self.entries
            .iter()
            .rposition(|entry| entry.change.is_some() && entry.key == *key)
    }

    fn push(&mut self, folder_id: Uuid, change: Change, parent: Option<EntryId>) -> EntryId {
        let parent = parent.filter(|id| self.entries[*id].change.is_some());
        self.entries.push(Entry {
            key: ResultKey::of(folder_id, change.event()),
            folder_id,
            parent,
            change: Some(change),
        });
        self.entries.len() - 1
    }

    /// Records `change` in `folder_id`, merging it into a pending result found
    /// under `lookup`. Returns the entry to nest further results under.
    fn record(
        &mut self,
        lookup: ResultKey,
        folder_id: Uuid,
        change: Change,
        parent: Option<EntryId>,
    ) -> Option<EntryId> {
        let Some(id) = self.find(&lookup) else {
            return Some(self.push(folder_id, change, parent));
        };
        let Some(existing) = self.entries[id].change.take() else {
            return Some(self.push(folder_id, change, parent));
        };
        match merge(existing, change) {
            Merge::Into(merged) => {
                let entry = &mut self.entries[id];
                entry.key = ResultKey::of(folder_id, merged.event());
                entry.folder_id = folder_id;
                entry.change = Some(merged);
                Some(id)
            }
            Merge::Cancel => {
                self.cancel_descendants(id);
                None
            }
            Merge::Separate(existing, incoming) => {
                self.entries[id].change = Some(existing);
                Some(self.push(folder_id, incoming, parent))
            }
        }
    }

    fn cancel_descendants(&mut self, id: EntryId) {
        // Children are always recorded after their parent.
        for index in id + 1..self.entries.len() {
            if let Some(parent) = self.entries[index].parent
                && self.entries[parent].change.is_none()
            {
                self.entries[index].change = None;
            }
        }
    }

    fn into_results(self) -> Vec<MutationResult> {
        let mut children: Vec<Vec<EntryId>> = vec![Vec::new(); self.entries.len()];
        let mut roots = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.change.is_none() {
                continue;
            }
            match entry.parent {
                Some(parent) if self.entries[parent].change.is_some() => {
                    children[parent].push(index);
                }
                _ => roots.push(index),
            }
        }

        let mut slots: Vec<Option<Entry>> = self.entries.into_iter().map(Some).collect();
        roots
            .into_iter()
            .filter_map(|id| build(id, &mut slots, &children))
            .collect()
    }
}

fn build(
    id: EntryId,
    slots: &mut [Option<Entry>],
    children: &[Vec<EntryId>],
) -> Option<MutationResult> {
    let entry = slots[id].take()?;
    let change = entry.change?;
    let nested = children[id]
        .iter()
        .filter_map(|child| build(*child, slots, children))
        .collect();
    Some(MutationResult {
        folder_id: entry.folder_id,
        change,
        nested,
    })
}

/// Where the calendar user sees events.
#[derive(Debug, Clone, Copy)]
struct UserView {
    calendar_user: i32,
    public: bool,
}

impl UserView {
    /// ## Summary
    /// Returns the folder the calendar user sees `event` in, if any.
    ///
    /// Public folders show every event in place. Otherwise the calendar user's
    /// attendee folder wins, and events they do not attend are only visible in
    /// their storage folder when not group scheduled or organized by them.
    fn folder_of(self, event: &Event) -> Option<Uuid> {
        if self.public {
            return Some(event.folder_id);
        }
        if let Some(attendee) = event.find_attendee(self.calendar_user) {
            return Some(attendee.folder_id.unwrap_or(event.folder_id));
        }
        (!event.is_group_scheduled() || event.is_organizer(self.calendar_user))
            .then_some(event.folder_id)
    }
}

/// Handle of a recorded result in both views, used to nest follow-up results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tracked {
    plain: Option<EntryId>,
    userized: Option<EntryId>,
}

impl Tracked {
    /// Records results at the top level.
    pub const TOP: Self = Self {
        plain: None,
        userized: None,
    };
}

/// ## Summary
/// Accumulates the results of one request in the plain and the userized view.
///
/// The plain view keys every result by the folder the event is stored in. The
/// userized view keys it by the folder the calendar user sees the event in, so an
/// attendee leaving an event is an update in the plain view but a deletion in
/// theirs, and a change of folder becomes a deletion plus a creation.
#[derive(Debug)]
pub struct ResultTracker {
    view: UserView,
    plain: ResultTrack,
    userized: ResultTrack,
}

impl ResultTracker {
    #[must_use]
    pub fn new(calendar_user: i32, public: bool) -> Self {
        Self {
            view: UserView {
                calendar_user,
                public,
            },
            plain: ResultTrack::default(),
            userized: ResultTrack::default(),
        }
    }

    pub fn creation(&mut self, created: &Event, parent: Tracked) -> Tracked {
        let plain = self.plain.record(
            ResultKey::of(created.folder_id, created),
            created.folder_id,
            Change::Creation(created.clone()),
            parent.plain,
        );
        let userized = self.view.folder_of(created).and_then(|folder| {
            self.userized.record(
                ResultKey::of(folder, created),
                folder,
                Change::Creation(created.clone()),
                parent.userized,
            )
        });
        Tracked { plain, userized }
    }

    pub fn update(&mut self, original: &Event, updated: &Event, parent: Tracked) -> Tracked {
        let plain = self.plain.record(
            ResultKey::of(original.folder_id, original),
            updated.folder_id,
            Change::Update(ItemUpdate::new(original.clone(), updated.clone())),
            parent.plain,
        );
        let userized = match (self.view.folder_of(original), self.view.folder_of(updated)) {
            (Some(before), Some(after)) if before == after => self.userized.record(
                ResultKey::of(before, original),
                after,
                Change::Update(ItemUpdate::new(original.clone(), updated.clone())),
                parent.userized,
            ),
            (before, after) => {
                let removed = before.and_then(|folder| {
                    self.userized.record(
                        ResultKey::of(folder, original),
                        folder,
                        Change::Deletion {
                            timestamp: updated.timestamp,
                            original: original.clone(),
                        },
                        parent.userized,
                    )
                });
                let added = after.and_then(|folder| {
                    self.userized.record(
                        ResultKey::of(folder, updated),
                        folder,
                        Change::Creation(updated.clone()),
                        parent.userized,
                    )
                });
                added.or(removed)
            }
        };
        Tracked { plain, userized }
    }

    pub fn deletion(&mut self, timestamp: i64, original: &Event, parent: Tracked) -> Tracked {
        let change = || Change::Deletion {
            timestamp,
            original: original.clone(),
        };
        let plain = self.plain.record(
            ResultKey::of(original.folder_id, original),
            original.folder_id,
            change(),
            parent.plain,
        );
        let userized = self.view.folder_of(original).and_then(|folder| {
            self.userized
                .record(ResultKey::of(folder, original), folder, change(), parent.userized)
        });
        Tracked { plain, userized }
    }

    #[must_use]
    pub fn finish(self, timestamp: i64) -> CalendarResult {
        CalendarResult::new(
            timestamp,
            self.plain.into_results(),
            self.userized.into_results(),
        )
    }
}
