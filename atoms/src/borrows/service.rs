use super::model::{BorrowEntry, EntryKey};
use crate::error::{AtomError, AtomResult};
use crate::store::ProfileStore;

/// Append `entry` to the end of the user's borrow sequence.
pub async fn append_borrow<S>(store: &S, user_id: &str, entry: &BorrowEntry) -> AtomResult<()>
where
    S: ProfileStore + ?Sized,
{
    store.append_borrow(user_id, entry).await?;
    tracing::info!(user_id, entry_id = %entry.entry_id, category = %entry.category, "📝 borrow recorded");
    Ok(())
}

/// Remove the first entry matching `key`. A key that matches nothing leaves
/// the sequence untouched and yields `None`.
pub async fn remove_borrow<S>(store: &S, user_id: &str, key: &EntryKey) -> AtomResult<Option<BorrowEntry>>
where
    S: ProfileStore + ?Sized,
{
    let removed = store.remove_borrow(user_id, key).await?;
    match &removed {
        Some(entry) => tracing::info!(user_id, entry_id = %entry.entry_id, "🧾 borrow removed"),
        None => tracing::info!(user_id, "no borrow matched {}", key),
    }
    Ok(removed)
}

/// Fresh read of the user's borrow sequence, in borrow order.
pub async fn list_borrows<S>(store: &S, user_id: &str) -> AtomResult<Vec<BorrowEntry>>
where
    S: ProfileStore + ?Sized,
{
    store
        .get_profile(user_id)
        .await?
        .map(|p| p.borrows)
        .ok_or_else(|| AtomError::NotFound(format!("User {}", user_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::users::{Role, UserProfile};

    async fn store_with_user() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_profile(&UserProfile::first_sign_in("u1", "u1@college.ac.th", Role::User))
            .await
            .unwrap();
        store
    }

    fn entry(id: &str, name: &str, at: &str) -> BorrowEntry {
        BorrowEntry {
            entry_id: id.to_string(),
            book_name: name.to_string(),
            category: "500".to_string(),
            photo_url: format!("memory://borrows/u1/{}.png", id),
            borrowed_at: at.to_string(),
            returned_at: None,
        }
    }

    #[tokio::test]
    async fn appended_entry_is_listed_last() {
        let store = store_with_user().await;
        append_borrow(&store, "u1", &entry("1", "A", "T1")).await.unwrap();
        let e2 = entry("2", "B", "T2");
        append_borrow(&store, "u1", &e2).await.unwrap();

        let listed = list_borrows(&store, "u1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed.last(), Some(&e2));
    }

    #[tokio::test]
    async fn removal_keeps_other_entries_in_order() {
        let store = store_with_user().await;
        for (id, name, at) in [("1", "A", "T1"), ("2", "B", "T2"), ("3", "C", "T3")] {
            append_borrow(&store, "u1", &entry(id, name, at)).await.unwrap();
        }

        let key = EntryKey::NameAndDate {
            book_name: "B".into(),
            borrowed_at: "T2".into(),
        };
        let removed = remove_borrow(&store, "u1", &key).await.unwrap().unwrap();
        assert_eq!(removed.entry_id, "2");

        let ids: Vec<String> = list_borrows(&store, "u1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.entry_id)
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn unmatched_key_is_a_no_op() {
        let store = store_with_user().await;
        append_borrow(&store, "u1", &entry("1", "A", "T1")).await.unwrap();
        let before = list_borrows(&store, "u1").await.unwrap();

        let key = EntryKey::NameAndDate {
            book_name: "A".into(),
            borrowed_at: "other".into(),
        };
        assert!(remove_borrow(&store, "u1", &key).await.unwrap().is_none());
        assert_eq!(list_borrows(&store, "u1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn listing_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            list_borrows(&store, "ghost").await,
            Err(AtomError::NotFound(_))
        ));
    }
}
