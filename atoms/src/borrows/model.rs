use serde::{Deserialize, Serialize};

/// A single loan, embedded in the owning user's profile.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BorrowEntry {
    pub entry_id: String,
    pub book_name: String,
    pub category: String,
    pub photo_url: String,
    pub borrowed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<String>,
}

impl BorrowEntry {
    /// New active entry stamped with the current time. The id is derived from
    /// the creation timestamp with a short random suffix.
    pub fn new(book_name: &str, category: &str, photo_url: &str) -> Self {
        let now = chrono::Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            entry_id: format!("{}-{}", now.timestamp_millis(), &suffix[..8]),
            book_name: book_name.trim().to_string(),
            category: category.trim().to_string(),
            photo_url: photo_url.to_string(),
            borrowed_at: now.to_rfc3339(),
            returned_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn matches(&self, key: &EntryKey) -> bool {
        match key {
            EntryKey::Id(id) => &self.entry_id == id,
            EntryKey::NameAndDate { book_name, borrowed_at } => {
                &self.book_name == book_name && &self.borrowed_at == borrowed_at
            }
        }
    }
}

/// How a return identifies the entry to remove.
///
/// `Id` is the stable key. `NameAndDate` is the older name + timestamp match,
/// kept for clients that never stored the entry id.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum EntryKey {
    Id(String),
    NameAndDate { book_name: String, borrowed_at: String },
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKey::Id(id) => write!(f, "entry {}", id),
            EntryKey::NameAndDate { book_name, borrowed_at } => {
                write!(f, "entry '{}' borrowed at {}", book_name, borrowed_at)
            }
        }
    }
}

/// Index of the first entry matching `key`.
pub fn position_of(entries: &[BorrowEntry], key: &EntryKey) -> Option<usize> {
    entries.iter().position(|e| e.matches(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, at: &str) -> BorrowEntry {
        BorrowEntry {
            entry_id: id.to_string(),
            book_name: name.to_string(),
            category: "500".to_string(),
            photo_url: "https://photos/x.png".to_string(),
            borrowed_at: at.to_string(),
            returned_at: None,
        }
    }

    #[test]
    fn new_entry_is_active_and_trimmed() {
        let e = BorrowEntry::new("  Intro Physics ", "500", "url");
        assert!(e.is_active());
        assert_eq!(e.book_name, "Intro Physics");
        assert!(e.entry_id.contains('-'));
    }

    #[test]
    fn entry_ids_do_not_collide_within_the_same_millisecond() {
        let a = BorrowEntry::new("a", "500", "u");
        let b = BorrowEntry::new("a", "500", "u");
        assert_ne!(a.entry_id, b.entry_id);
    }

    #[test]
    fn position_prefers_first_match_for_legacy_key() {
        let entries = vec![
            entry("1", "Same", "T"),
            entry("2", "Same", "T"),
            entry("3", "Other", "T"),
        ];
        let legacy = EntryKey::NameAndDate {
            book_name: "Same".into(),
            borrowed_at: "T".into(),
        };
        assert_eq!(position_of(&entries, &legacy), Some(0));
        assert_eq!(position_of(&entries, &EntryKey::Id("2".into())), Some(1));
        assert_eq!(position_of(&entries, &EntryKey::Id("9".into())), None);
    }

    #[test]
    fn entry_key_deserializes_from_either_shape() {
        let by_id: EntryKey = serde_json::from_str("\"171-abc\"").unwrap();
        assert_eq!(by_id, EntryKey::Id("171-abc".into()));
        let legacy: EntryKey =
            serde_json::from_str(r#"{"book_name":"Intro Physics","borrowed_at":"T"}"#).unwrap();
        assert!(matches!(legacy, EntryKey::NameAndDate { .. }));
    }
}
