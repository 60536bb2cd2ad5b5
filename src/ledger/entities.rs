use chrono::DateTime;
use chrono::Utc;

use serde::Deserialize;
use serde::Serialize;

use std::fmt;
use std::sync::Arc;

/// Fixed closed set of activity categories. The declaration order is
/// meaningful: it is the wire spelling, the display order, and the
/// tie-break order when a summary picks the top category.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Clone, Copy)]
pub enum Category {
    Work,
    Study,
    Sleep,
    Entertainment,
    Exercise,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Work,
        Category::Study,
        Category::Sleep,
        Category::Entertainment,
        Category::Exercise,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Work => "Work",
            Category::Study => "Study",
            Category::Sleep => "Sleep",
            Category::Entertainment => "Entertainment",
            Category::Exercise => "Exercise",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable opaque identifier produced by the authentication collaborator.
/// The ledger core never inspects it beyond equality and path rendering.
#[derive(PartialEq, Eq, Hash, Debug, Serialize, Deserialize, Clone)]
#[serde(transparent)]
pub struct UserId(Arc<str>);

impl UserId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier assigned to an activity at creation time. It is the
/// sole stable identity for deletion and is never reused or mutated.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Clone)]
#[serde(transparent)]
pub struct ActivityId(Arc<str>);

impl ActivityId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mints activity identifiers from the creation instant plus a sequence
/// number, so that rapid additions within one millisecond stay distinct.
#[derive(Debug, Default)]
pub struct IdSource {
    sequence: u64,
}

impl IdSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, at: DateTime<Utc>) -> ActivityId {
        self.sequence += 1;
        ActivityId::new(format!("{}-{}", at.timestamp_millis(), self.sequence))
    }
}

/// A single named activity recorded for one day.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct Activity {
    pub id: ActivityId,
    pub name: Arc<str>,
    pub category: Category,
    /// Whole minutes. Always within `1..=1440` once admitted through
    /// validation; peers are trusted to have done the same.
    pub duration: u32,
}

/// Not-yet-validated input for an add operation. The wide signed duration
/// field is what lets zero, negative, and oversized requests reach
/// validation and get a precise rejection instead of being unrepresentable.
#[derive(Debug, Clone)]
pub struct ActivityDraft {
    pub name: String,
    pub category: Category,
    pub duration_minutes: i64,
}

/// The complete record of one user's one day: the ordered activity list
/// (insertion order is display order) plus the derived total. The total is
/// recomputed from the list on construction and before every write, so it
/// can never drift from the list it summarizes.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DayLedger {
    pub activities: Vec<Activity>,
    pub total_minutes: u32,
    /// Store-assigned write timestamp. Absent until the document has been
    /// persisted at least once.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DayLedger {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_activities(activities: Vec<Activity>) -> Self {
        let total_minutes = activities.iter().map(|a| a.duration).sum();
        Self {
            activities,
            total_minutes,
            updated_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub(crate) fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }
}
