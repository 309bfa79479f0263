use lambda_http::{http::StatusCode, Body, Error, Response};
use libris_atoms::borrows::{position_of, EntryKey};
use libris_atoms::http::{error_response, json_response, parse_body};
use libris_atoms::media::{decode_photo, photo_key, PhotoPurpose};
use libris_atoms::store::{BlobStore, LedgerStore};
use libris_atoms::{AtomError, AtomResult};

use crate::borrow::discard_photo;
use crate::types::{LegacyReturnPayload, ReturnPayload, ReturnReceipt, ReturnRequest};

const MAX_ATTEMPTS: usize = 5;

/// Return a borrowed book.
///
/// The copy goes back to the first record of the entry's category, which is
/// not necessarily the record it was taken from. Stock increment and entry
/// removal commit together. An unknown key changes nothing.
///
/// Once the entry is gone nothing in the table points at the return photo,
/// so its object key goes into the commit log line.
pub async fn return_book<L, B>(
    ledger: &L,
    blobs: &B,
    user_id: &str,
    req: &ReturnRequest,
) -> AtomResult<ReturnReceipt>
where
    L: LedgerStore + ?Sized,
    B: BlobStore + ?Sized,
{
    if req.photo.trim().is_empty() {
        return Err(AtomError::validation("Please take a photo of the returned book"));
    }
    let photo = decode_photo(&req.photo)?;

    let profile = ledger
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AtomError::NotFound(format!("User {}", user_id)))?;
    let Some(idx) = position_of(&profile.borrows, &req.key) else {
        tracing::info!(user_id, "no borrow matched {}", req.key);
        return Err(AtomError::NotFound(capitalise(&req.key)));
    };
    let category = profile.borrows[idx].category.clone();

    let key = photo_key(PhotoPurpose::Return, user_id, &photo);
    let photo_url = blobs.put_object(&key, photo.bytes, photo.content_type).await?;

    match commit(ledger, user_id, &category, &req.key).await {
        Ok(Some((entry, book_id))) => {
            tracing::info!(
                user_id,
                entry_id = %entry.entry_id,
                category = %category,
                book_id = ?book_id,
                return_photo = %key,
                "↩️ return committed"
            );
            Ok(ReturnReceipt {
                entry,
                book_id,
                return_photo_url: photo_url,
            })
        }
        Ok(None) => {
            discard_photo(blobs, &key).await;
            Err(AtomError::NotFound(capitalise(&req.key)))
        }
        Err(e) => {
            discard_photo(blobs, &key).await;
            tracing::error!(user_id, "❌ return commit failed: {}", e);
            Err(e)
        }
    }
}

async fn commit<L>(
    ledger: &L,
    user_id: &str,
    category: &str,
    key: &EntryKey,
) -> AtomResult<Option<(libris_atoms::borrows::BorrowEntry, Option<String>)>>
where
    L: LedgerStore + ?Sized,
{
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        let target = ledger.books_in_category(category).await?.into_iter().next();
        if target.is_none() {
            tracing::warn!(user_id, category, "⚠️ no book record to return stock to, removing entry only");
        }
        let book_id = target.map(|b| b.book_id);

        match ledger.commit_return(book_id.as_deref(), user_id, key).await {
            Ok(removed) => return Ok(removed.map(|entry| (entry, book_id))),
            // The target record was deleted between lookup and commit.
            Err(e @ AtomError::Conflict(_)) => {
                tracing::warn!(user_id, attempt, "🔁 return target changed, retrying: {}", e);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| AtomError::Conflict("return could not be committed".into())))
}

fn capitalise(key: &EntryKey) -> String {
    let text = key.to_string();
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => text,
    }
}

/// HTTP Handler: POST /borrows/{entry_id}/return
pub async fn return_handler<L, B>(
    ledger: &L,
    blobs: &B,
    user_id: &str,
    entry_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error>
where
    L: LedgerStore + ?Sized,
    B: BlobStore + ?Sized,
{
    let payload: ReturnPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let req = ReturnRequest {
        key: EntryKey::Id(entry_id.to_string()),
        photo: payload.photo,
    };
    respond(return_book(ledger, blobs, user_id, &req).await)
}

/// HTTP Handler: POST /borrows/return
pub async fn legacy_return_handler<L, B>(
    ledger: &L,
    blobs: &B,
    user_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error>
where
    L: LedgerStore + ?Sized,
    B: BlobStore + ?Sized,
{
    let payload: LegacyReturnPayload = match parse_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    respond(return_book(ledger, blobs, user_id, &payload.into()).await)
}

fn respond(result: AtomResult<ReturnReceipt>) -> Result<Response<Body>, Error> {
    match result {
        Ok(receipt) => json_response(StatusCode::OK, &receipt),
        Err(e) => error_response(&e),
    }
}
