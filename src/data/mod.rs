pub mod reorder;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of temporary ids. Counts down from -1 so placeholders never collide
/// with each other or with server ids (which are positive).
static NEXT_TEMPORARY_ID: AtomicI64 = AtomicI64::new(-1);

/// Identifier of a to-do item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(pub i64);

impl TodoId {
    /// Allocate a fresh placeholder id for an item the server hasn't acknowledged yet.
    pub fn temporary() -> Self {
        Self(NEXT_TEMPORARY_ID.fetch_sub(1, Ordering::Relaxed))
    }

    pub fn is_temporary(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a category.
///
/// Two pseudo-categories exist client-side only: "All" and "Bookmarked".
/// They occupy the first two slots of every category list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl CategoryId {
    pub const ALL: CategoryId = CategoryId(-1);
    pub const BOOKMARK: CategoryId = CategoryId(0);

    pub fn is_pinned(&self) -> bool {
        *self == Self::ALL || *self == Self::BOOKMARK
    }

    /// The filter value sent to the server, `None` for the pseudo-categories
    /// that don't exist server-side.
    pub fn as_filter(&self) -> Option<CategoryId> {
        if self.is_pinned() {
            None
        } else {
            Some(*self)
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which list an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListDomain {
    Backlog,
    Today,
    Yesterday,
}

impl ListDomain {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
        }
    }
}

impl fmt::Display for ListDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TodoStatus {
    #[default]
    Incomplete,
    Completed,
}

impl TodoStatus {
    pub fn toggled(&self) -> Self {
        match self {
            Self::Incomplete => Self::Completed,
            Self::Completed => Self::Incomplete,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Day of week for per-weekday routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    /// Picker index used by the routine sheet: 0 = Monday .. 6 = Sunday.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::all().nth(index)
    }

    /// Name the server uses for this day.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Mon => "월",
            Self::Tue => "화",
            Self::Wed => "수",
            Self::Thu => "목",
            Self::Fri => "금",
            Self::Sat => "토",
            Self::Sun => "일",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::all().find(|d| d.wire_name() == name)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::Mon,
            Self::Tue,
            Self::Wed,
            Self::Thu,
            Self::Fri,
            Self::Sat,
            Self::Sun,
        ]
        .into_iter()
    }
}

/// Category as shown on an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
    pub emoji_url: Option<String>,
}

/// An entry in the category strip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub emoji_url: Option<String>,
}

impl Category {
    pub fn all() -> Self {
        Self {
            id: CategoryId::ALL,
            name: "All".to_string(),
            emoji_url: None,
        }
    }

    pub fn bookmarked() -> Self {
        Self {
            id: CategoryId::BOOKMARK,
            name: "Bookmarked".to_string(),
            emoji_url: None,
        }
    }

    pub fn as_ref(&self) -> CategoryRef {
        CategoryRef {
            id: self.id,
            name: self.name.clone(),
            emoji_url: self.emoji_url.clone(),
        }
    }
}

/// A backlog or today item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: TodoId,
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default)]
    pub is_bookmark: bool,
    #[serde(default)]
    pub is_repeat: bool,
    /// Per-weekday routine. Mutually exclusive with `is_repeat`.
    #[serde(default)]
    pub routine_days: Vec<Weekday>,
    pub deadline: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub category: Option<CategoryRef>,
}

impl TodoItem {
    pub fn new(id: TodoId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            status: TodoStatus::Incomplete,
            is_bookmark: false,
            is_repeat: false,
            routine_days: Vec::new(),
            deadline: None,
            time: None,
            category: None,
        }
    }

    /// Days remaining until the deadline (negative once it has passed).
    pub fn d_day(&self, today: NaiveDate) -> Option<i64> {
        self.deadline
            .map(|deadline| deadline.signed_duration_since(today).num_days())
    }

    pub fn has_routine(&self) -> bool {
        !self.routine_days.is_empty()
    }
}

/// An item on the "what did you finish yesterday" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YesterdayItem {
    pub id: TodoId,
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
}

/// Access + refresh token pair issued at login and replaced on reissue.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Keep tokens out of logs.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_ids_are_negative_and_unique() {
        let a = TodoId::temporary();
        let b = TodoId::temporary();
        assert!(a.is_temporary());
        assert!(b.is_temporary());
        assert_ne!(a, b);
        assert!(!TodoId(42).is_temporary());
    }

    #[test]
    fn test_pinned_categories_have_no_filter() {
        assert_eq!(CategoryId::ALL.as_filter(), None);
        assert_eq!(CategoryId::BOOKMARK.as_filter(), None);
        assert_eq!(CategoryId(7).as_filter(), Some(CategoryId(7)));
    }

    #[test]
    fn test_weekday_index_and_wire_name() {
        assert_eq!(Weekday::from_index(0), Some(Weekday::Mon));
        assert_eq!(Weekday::from_index(6), Some(Weekday::Sun));
        assert_eq!(Weekday::from_index(7), None);
        assert_eq!(Weekday::from_wire_name("수"), Some(Weekday::Wed));
        assert_eq!(Weekday::from_wire_name("x"), None);
    }

    #[test]
    fn test_d_day() {
        let mut item = TodoItem::new(TodoId(1), "report");
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(item.d_day(today), None);

        item.deadline = NaiveDate::from_ymd_opt(2024, 3, 13);
        assert_eq!(item.d_day(today), Some(3));

        item.deadline = NaiveDate::from_ymd_opt(2024, 3, 8);
        assert_eq!(item.d_day(today), Some(-2));
    }

    #[test]
    fn test_token_pair_debug_is_redacted() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("secret"));
    }
}
