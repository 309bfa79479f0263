use libris_atoms::borrows::{BorrowEntry, EntryKey};
use serde::{Deserialize, Serialize};

/// Server-side stages of a borrow. Photo capture happens on the client
/// before the request arrives at `Confirm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowPhase {
    Confirm,
    InventoryCheck,
    Commit,
    OutOfStock,
}

/// POST /borrows body.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BorrowRequest {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub book_name: String,
    /// Captured photo as a data URL.
    #[serde(default)]
    pub photo: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct BorrowReceipt {
    pub book_id: String,
    pub entry: BorrowEntry,
}

/// Out of stock is an expected answer, not an error.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BorrowOutcome {
    Committed(BorrowReceipt),
    OutOfStock { category: String },
}

impl BorrowOutcome {
    pub fn phase(&self) -> BorrowPhase {
        match self {
            BorrowOutcome::Committed(_) => BorrowPhase::Commit,
            BorrowOutcome::OutOfStock { .. } => BorrowPhase::OutOfStock,
        }
    }
}

/// POST /borrows/{entry_id}/return body.
#[derive(Debug, Deserialize, Default)]
pub struct ReturnPayload {
    #[serde(default)]
    pub photo: String,
}

/// POST /borrows/return body, for clients that address entries by name and date.
#[derive(Debug, Deserialize)]
pub struct LegacyReturnPayload {
    pub book_name: String,
    pub borrowed_at: String,
    #[serde(default)]
    pub photo: String,
}

#[derive(Debug, Clone)]
pub struct ReturnRequest {
    pub key: EntryKey,
    pub photo: String,
}

impl From<LegacyReturnPayload> for ReturnRequest {
    fn from(p: LegacyReturnPayload) -> Self {
        Self {
            key: EntryKey::NameAndDate {
                book_name: p.book_name,
                borrowed_at: p.borrowed_at,
            },
            photo: p.photo,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ReturnReceipt {
    pub entry: BorrowEntry,
    /// The record that got the copy back; `None` when the category had no records.
    pub book_id: Option<String>,
    pub return_photo_url: String,
}
