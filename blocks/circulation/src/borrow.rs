use std::collections::HashSet;

use lambda_http::{http::StatusCode, Body, Error, Response};
use libris_atoms::books::{find_available, Category};
use libris_atoms::borrows::BorrowEntry;
use libris_atoms::http::{error_response, json_response, parse_body};
use libris_atoms::media::{decode_photo, photo_key, PhotoArtifact, PhotoPurpose};
use libris_atoms::store::{BlobStore, CommitStatus, LedgerStore};
use libris_atoms::{AtomError, AtomResult};

use crate::types::{BorrowOutcome, BorrowPhase, BorrowReceipt, BorrowRequest};

/// A borrow that passed the confirm gate.
#[derive(Debug)]
pub struct ConfirmedBorrow {
    pub category: Category,
    pub book_name: String,
    pub photo: PhotoArtifact,
}

/// Confirm gate. Pure: touches neither store.
pub fn confirm_borrow(req: &BorrowRequest) -> AtomResult<ConfirmedBorrow> {
    if req.photo.trim().is_empty() {
        return Err(AtomError::validation("Please take a photo of the book first"));
    }
    let book_name = req.book_name.trim();
    if book_name.is_empty() {
        return Err(AtomError::validation("Please enter the book name"));
    }
    if req.category.trim().is_empty() {
        return Err(AtomError::validation("Please choose a category"));
    }
    let category = Category::lookup(&req.category)
        .ok_or_else(|| AtomError::validation(format!("Unknown category '{}'", req.category.trim())))?;
    let photo = decode_photo(&req.photo)?;

    Ok(ConfirmedBorrow {
        category,
        book_name: book_name.to_string(),
        photo,
    })
}

/// Borrow one copy from the category pool for `user_id`.
///
/// The photo is uploaded before the commit. The commit itself decrements
/// the chosen record and appends the entry as one transaction; if that
/// record ran dry in the meantime the next record with stock is tried.
/// Whenever nothing gets committed the uploaded photo is deleted again.
pub async fn borrow_book<L, B>(
    ledger: &L,
    blobs: &B,
    user_id: &str,
    req: &BorrowRequest,
) -> AtomResult<BorrowOutcome>
where
    L: LedgerStore + ?Sized,
    B: BlobStore + ?Sized,
{
    tracing::debug!(user_id, phase = ?BorrowPhase::Confirm, "📷 borrow requested");
    let confirmed = confirm_borrow(req)?;
    let category = confirmed.category.code;

    tracing::debug!(user_id, category, phase = ?BorrowPhase::InventoryCheck, "🔍 checking stock");
    let Some(first) = find_available(ledger, category).await? else {
        tracing::info!(user_id, category, "📭 out of stock");
        return Ok(BorrowOutcome::OutOfStock {
            category: category.to_string(),
        });
    };

    let key = photo_key(PhotoPurpose::Borrow, user_id, &confirmed.photo);
    let photo_url = blobs
        .put_object(&key, confirmed.photo.bytes, confirmed.photo.content_type)
        .await?;
    let entry = BorrowEntry::new(&confirmed.book_name, category, &photo_url);

    match commit_first_available(ledger, first.book_id, user_id, &entry).await {
        Ok(Some(book_id)) => {
            tracing::info!(
                user_id,
                book_id = %book_id,
                entry_id = %entry.entry_id,
                category,
                "✅ borrow committed"
            );
            Ok(BorrowOutcome::Committed(BorrowReceipt { book_id, entry }))
        }
        Ok(None) => {
            discard_photo(blobs, &key).await;
            tracing::info!(user_id, category, "📭 out of stock after losing the race");
            Ok(BorrowOutcome::OutOfStock {
                category: category.to_string(),
            })
        }
        Err(e) => {
            discard_photo(blobs, &key).await;
            tracing::error!(user_id, category, "❌ borrow commit failed: {}", e);
            Err(e)
        }
    }
}

/// Commit against `book_id`, moving on to the next record with stock each
/// time the chosen one is exhausted. Returns the record that committed.
async fn commit_first_available<L>(
    ledger: &L,
    mut book_id: String,
    user_id: &str,
    entry: &BorrowEntry,
) -> AtomResult<Option<String>>
where
    L: LedgerStore + ?Sized,
{
    let mut tried = HashSet::new();
    loop {
        tracing::debug!(user_id, book_id = %book_id, phase = ?BorrowPhase::Commit, "💾 committing borrow");
        match ledger.commit_borrow(&book_id, user_id, entry).await? {
            CommitStatus::Committed => return Ok(Some(book_id)),
            CommitStatus::StockExhausted => {
                tracing::debug!(book_id = %book_id, "🔁 record exhausted, trying next");
                tried.insert(book_id);
            }
        }

        let next = ledger
            .books_in_category(&entry.category)
            .await?
            .into_iter()
            .find(|b| b.stock > 0 && !tried.contains(&b.book_id));
        match next {
            Some(book) => book_id = book.book_id,
            None => return Ok(None),
        }
    }
}

/// Compensating delete for a photo whose commit never happened. A failure
/// here is logged and swallowed so the caller still sees the real outcome.
pub(crate) async fn discard_photo<B>(blobs: &B, key: &str)
where
    B: BlobStore + ?Sized,
{
    if let Err(e) = blobs.delete_object(key).await {
        tracing::error!(key, "❌ failed to remove orphaned photo: {}", e);
    } else {
        tracing::debug!(key, "🗑️ orphaned photo removed");
    }
}

/// HTTP Handler: POST /borrows
pub async fn borrow_handler<L, B>(
    ledger: &L,
    blobs: &B,
    user_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error>
where
    L: LedgerStore + ?Sized,
    B: BlobStore + ?Sized,
{
    let req: BorrowRequest = match parse_body(body) {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    match borrow_book(ledger, blobs, user_id, &req).await {
        Ok(outcome) => {
            let phase = outcome.phase();
            tracing::debug!(user_id, ?phase, "borrow finished");
            let status = match phase {
                BorrowPhase::Commit => StatusCode::CREATED,
                _ => StatusCode::CONFLICT,
            };
            json_response(status, &outcome)
        }
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn request(category: &str, name: &str, photo: &str) -> BorrowRequest {
        BorrowRequest {
            category: category.into(),
            book_name: name.into(),
            photo: photo.into(),
        }
    }

    #[test]
    fn confirm_rejects_each_missing_field() {
        for req in [
            request("500", "Intro Physics", ""),
            request("500", "   ", PNG),
            request("", "Intro Physics", PNG),
            request("501", "Intro Physics", PNG),
            request("500", "Intro Physics", "data:image/png;base64,aGVsbG8="),
        ] {
            assert!(matches!(confirm_borrow(&req), Err(AtomError::Validation(_))), "{:?}", req);
        }
    }

    #[test]
    fn confirm_trims_the_label() {
        let ok = confirm_borrow(&request(" 500 ", "  Intro Physics ", PNG)).unwrap();
        assert_eq!(ok.category.code, "500");
        assert_eq!(ok.book_name, "Intro Physics");
        assert_eq!(ok.photo.extension, "png");
    }
}
