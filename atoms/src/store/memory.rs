//! In-process stores for tests and local runs.
//!
//! A single mutex guards all records, so every method (and each ledger
//! commit) is one critical section, matching the atomicity the DynamoDB
//! store gets from conditional writes and transactions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{BlobStore, BookStore, CommitStatus, LedgerStore, ProfileStore};
use crate::books::Book;
use crate::borrows::{position_of, BorrowEntry, EntryKey};
use crate::error::{AtomError, AtomResult};
use crate::users::{UpdateUserPayload, UserProfile};

#[derive(Default)]
struct MemoryState {
    // Vec keeps insertion order, which is the stable iteration order.
    books: Vec<Book>,
    profiles: Vec<UserProfile>,
}

impl MemoryState {
    fn book_mut(&mut self, book_id: &str) -> AtomResult<&mut Book> {
        self.books
            .iter_mut()
            .find(|b| b.book_id == book_id)
            .ok_or_else(|| AtomError::NotFound(format!("Book {}", book_id)))
    }

    fn profile_mut(&mut self, user_id: &str) -> AtomResult<&mut UserProfile> {
        self.profiles
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| AtomError::NotFound(format!("User {}", user_id)))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> AtomResult<MutexGuard<'_, MemoryState>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .map_err(|_| AtomError::Store("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list_books(&self) -> AtomResult<Vec<Book>> {
        Ok(self.lock()?.books.clone())
    }

    async fn books_in_category(&self, category: &str) -> AtomResult<Vec<Book>> {
        Ok(self
            .lock()?
            .books
            .iter()
            .filter(|b| b.category == category)
            .cloned()
            .collect())
    }

    async fn get_book(&self, book_id: &str) -> AtomResult<Option<Book>> {
        Ok(self.lock()?.books.iter().find(|b| b.book_id == book_id).cloned())
    }

    async fn put_book(&self, book: &Book) -> AtomResult<()> {
        let mut state = self.lock()?;
        match state.books.iter_mut().find(|b| b.book_id == book.book_id) {
            Some(existing) => *existing = book.clone(),
            None => state.books.push(book.clone()),
        }
        Ok(())
    }

    async fn delete_book(&self, book_id: &str) -> AtomResult<bool> {
        let mut state = self.lock()?;
        let before = state.books.len();
        state.books.retain(|b| b.book_id != book_id);
        Ok(state.books.len() != before)
    }

    async fn decrement_if_positive(&self, book_id: &str) -> AtomResult<bool> {
        let mut state = self.lock()?;
        let book = state.book_mut(book_id)?;
        if book.stock == 0 {
            return Ok(false);
        }
        book.stock -= 1;
        Ok(true)
    }

    async fn increment(&self, book_id: &str) -> AtomResult<u32> {
        let mut state = self.lock()?;
        let book = state.book_mut(book_id)?;
        book.stock = book.stock.saturating_add(1);
        Ok(book.stock)
    }

    async fn adjust_stock(&self, book_id: &str, delta: i64) -> AtomResult<u32> {
        let mut state = self.lock()?;
        let book = state.book_mut(book_id)?;
        book.stock = super::attrs::adjusted_stock(book.stock, delta);
        Ok(book.stock)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> AtomResult<Option<UserProfile>> {
        Ok(self.lock()?.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn create_profile(&self, profile: &UserProfile) -> AtomResult<bool> {
        let mut state = self.lock()?;
        if state.profiles.iter().any(|p| p.user_id == profile.user_id) {
            return Ok(false);
        }
        state.profiles.push(profile.clone());
        Ok(true)
    }

    async fn update_profile(&self, user_id: &str, payload: &UpdateUserPayload) -> AtomResult<()> {
        let mut state = self.lock()?;
        let profile = state.profile_mut(user_id)?;
        if let Some(name) = &payload.user_name {
            profile.user_name = name.clone();
        }
        if let Some(student_id) = &payload.student_id {
            profile.student_id = Some(student_id.clone());
        }
        if let Some(level) = &payload.level {
            profile.level = Some(level.clone());
        }
        if let Some(department) = &payload.department {
            profile.department = Some(department.clone());
        }
        Ok(())
    }

    async fn set_role(&self, user_id: &str, role: &str) -> AtomResult<()> {
        let mut state = self.lock()?;
        state.profile_mut(user_id)?.user_role = role.to_string();
        Ok(())
    }

    async fn list_profiles(&self) -> AtomResult<Vec<UserProfile>> {
        Ok(self.lock()?.profiles.clone())
    }

    async fn append_borrow(&self, user_id: &str, entry: &BorrowEntry) -> AtomResult<()> {
        let mut state = self.lock()?;
        state.profile_mut(user_id)?.borrows.push(entry.clone());
        Ok(())
    }

    async fn remove_borrow(&self, user_id: &str, key: &EntryKey) -> AtomResult<Option<BorrowEntry>> {
        let mut state = self.lock()?;
        let profile = state.profile_mut(user_id)?;
        Ok(position_of(&profile.borrows, key).map(|idx| profile.borrows.remove(idx)))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn commit_borrow(
        &self,
        book_id: &str,
        user_id: &str,
        entry: &BorrowEntry,
    ) -> AtomResult<CommitStatus> {
        let mut state = self.lock()?;
        // Check both records before touching either.
        state.profile_mut(user_id)?;
        let book = match state.book_mut(book_id) {
            Ok(book) => book,
            Err(_) => return Ok(CommitStatus::StockExhausted),
        };
        if book.stock == 0 {
            return Ok(CommitStatus::StockExhausted);
        }
        book.stock -= 1;
        state.profile_mut(user_id)?.borrows.push(entry.clone());
        Ok(CommitStatus::Committed)
    }

    async fn commit_return(
        &self,
        book_id: Option<&str>,
        user_id: &str,
        key: &EntryKey,
    ) -> AtomResult<Option<BorrowEntry>> {
        let mut state = self.lock()?;
        let Some(idx) = position_of(&state.profile_mut(user_id)?.borrows, key) else {
            return Ok(None);
        };
        if let Some(book_id) = book_id {
            let book = state
                .book_mut(book_id)
                .map_err(|_| AtomError::Conflict(format!("book {} was removed during the return", book_id)))?;
            book.stock = book.stock.saturating_add(1);
        }
        Ok(Some(state.profile_mut(user_id)?.borrows.remove(idx)))
    }
}

/// Blob store that keeps objects in a map and hands out `memory://` URLs.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    calls: AtomicUsize,
    fail_puts: std::sync::atomic::AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().map(|o| o.contains_key(key)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent upload fail, to exercise error paths.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AtomResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(AtomError::Store("upload rejected".to_string()));
        }
        self.objects
            .lock()
            .map_err(|_| AtomError::Store("memory blob store lock poisoned".to_string()))?
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(format!("memory://{}", key))
    }

    async fn delete_object(&self, key: &str) -> AtomResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .map_err(|_| AtomError::Store("memory blob store lock poisoned".to_string()))?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn book(id: &str, category: &str, stock: u32) -> Book {
        Book {
            book_id: id.to_string(),
            name: category.to_string(),
            category: category.to_string(),
            stock,
            cover_url: format!("/{}.jpg", category),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn profile(id: &str) -> UserProfile {
        crate::users::UserProfile::first_sign_in(id, &format!("{}@college.ac.th", id), crate::users::Role::User)
    }

    #[tokio::test]
    async fn decrement_stops_at_zero() {
        let store = MemoryStore::new();
        store.put_book(&book("b1", "500", 1)).await.unwrap();
        assert!(store.decrement_if_positive("b1").await.unwrap());
        assert!(!store.decrement_if_positive("b1").await.unwrap());
        assert_eq!(store.get_book("b1").await.unwrap().unwrap().stock, 0);
        assert!(matches!(
            store.decrement_if_positive("missing").await,
            Err(AtomError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn adjust_clamps_at_zero() {
        let store = MemoryStore::new();
        store.put_book(&book("b1", "500", 2)).await.unwrap();
        assert_eq!(store.adjust_stock("b1", -5).await.unwrap(), 0);
        assert_eq!(store.adjust_stock("b1", 3).await.unwrap(), 3);
        assert_eq!(store.adjust_stock("b1", 5_000_000_000).await.unwrap(), u32::MAX);
    }

    #[tokio::test]
    async fn commit_borrow_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.put_book(&book("b1", "500", 0)).await.unwrap();
        store.create_profile(&profile("u1")).await.unwrap();
        let entry = BorrowEntry::new("Intro Physics", "500", "memory://p");

        let status = store.commit_borrow("b1", "u1", &entry).await.unwrap();
        assert_eq!(status, CommitStatus::StockExhausted);
        assert!(store.get_profile("u1").await.unwrap().unwrap().borrows.is_empty());

        store.adjust_stock("b1", 1).await.unwrap();
        let missing_user = store.commit_borrow("b1", "ghost", &entry).await;
        assert!(matches!(missing_user, Err(AtomError::NotFound(_))));
        assert_eq!(store.get_book("b1").await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commits_never_oversell() {
        let store = Arc::new(MemoryStore::new());
        store.put_book(&book("b1", "500", 3)).await.unwrap();
        for i in 0..20 {
            store.create_profile(&profile(&format!("u{}", i))).await.unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let entry = BorrowEntry::new("Any", "500", "memory://p");
                store.commit_borrow("b1", &format!("u{}", i), &entry).await.unwrap()
            }));
        }

        let mut committed = 0;
        for h in handles {
            if h.await.unwrap() == CommitStatus::Committed {
                committed += 1;
            }
        }
        assert_eq!(committed, 3);
        assert_eq!(store.get_book("b1").await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn blob_store_round_trip_and_failure_switch() {
        let blobs = MemoryBlobStore::new();
        let url = blobs.put_object("borrows/u1/1.png", vec![1, 2], "image/png").await.unwrap();
        assert_eq!(url, "memory://borrows/u1/1.png");
        assert!(blobs.contains("borrows/u1/1.png"));
        blobs.delete_object("borrows/u1/1.png").await.unwrap();
        assert!(blobs.is_empty());

        blobs.fail_uploads(true);
        assert!(blobs.put_object("k", vec![], "image/png").await.is_err());
        assert_eq!(blobs.calls(), 3);
    }
}
