//! Staff views joining profiles, borrow entries and inventory.

use std::collections::BTreeMap;

use lambda_http::{http::StatusCode, Body, Error, Response};
use libris_atoms::books::{Book, Category};
use libris_atoms::http::{error_response, json_response};
use libris_atoms::store::{BookStore, ProfileStore};
use libris_atoms::users::{list_users, AdminAllowList};
use libris_atoms::{AtomError, AtomResult};
use serde::Serialize;

const MISSING: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Borrowed,
    Returned,
}

impl StatusFilter {
    pub fn parse(raw: &str) -> AtomResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "borrowed" => Ok(StatusFilter::Borrowed),
            "returned" => Ok(StatusFilter::Returned),
            other => Err(AtomError::validation(format!("Unknown status filter '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BorrowFilter {
    /// Matches the user name or student id.
    pub search: Option<String>,
    pub level: Option<String>,
    pub status: StatusFilter,
}

impl BorrowFilter {
    /// Build from raw query parameters; blank values mean "no filter".
    pub fn from_query(search: Option<&str>, level: Option<&str>, status: Option<&str>) -> AtomResult<Self> {
        let non_blank = |v: Option<&str>| {
            v.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
        };
        Ok(Self {
            search: non_blank(search),
            level: non_blank(level),
            status: status.map(StatusFilter::parse).transpose()?.unwrap_or_default(),
        })
    }

    fn accepts(&self, record: &BorrowRecordView) -> bool {
        if let Some(term) = &self.search {
            let in_name = record.user_name.to_lowercase().contains(term.as_str());
            let in_student_id = record.student_id.to_lowercase().contains(term.as_str());
            if !in_name && !in_student_id {
                return false;
            }
        }
        if let Some(level) = &self.level {
            if !record.level.to_lowercase().contains(level.as_str()) {
                return false;
            }
        }
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Borrowed => record.status == "borrowed",
            StatusFilter::Returned => record.status == "returned",
        }
    }
}

/// One borrow entry with its owner's details.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct BorrowRecordView {
    pub entry_id: String,
    pub book_name: String,
    pub category: String,
    pub photo_url: String,
    pub borrowed_at: String,
    pub returned_at: Option<String>,
    pub status: &'static str,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub student_id: String,
    pub level: String,
}

pub async fn list_all_borrows<S>(store: &S, filter: &BorrowFilter) -> AtomResult<Vec<BorrowRecordView>>
where
    S: ProfileStore + ?Sized,
{
    let profiles = store.list_profiles().await?;
    let records: Vec<BorrowRecordView> = profiles
        .into_iter()
        .flat_map(|p| {
            let student_id = p.student_id.clone().unwrap_or_else(|| MISSING.to_string());
            let level = p.level.clone().unwrap_or_else(|| MISSING.to_string());
            p.borrows.into_iter().map(move |e| BorrowRecordView {
                status: if e.is_active() { "borrowed" } else { "returned" },
                entry_id: e.entry_id,
                book_name: e.book_name,
                category: e.category,
                photo_url: e.photo_url,
                borrowed_at: e.borrowed_at,
                returned_at: e.returned_at,
                user_id: p.user_id.clone(),
                user_name: p.user_name.clone(),
                user_email: p.user_email.clone(),
                student_id: student_id.clone(),
                level: level.clone(),
            })
        })
        .filter(|r| filter.accepts(r))
        .collect();
    tracing::debug!(count = records.len(), "📋 borrow records listed");
    Ok(records)
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CategoryStock {
    pub code: String,
    pub name: String,
    pub total_stock: u64,
    pub books: Vec<Book>,
}

/// Books grouped per category, ordered by code.
pub async fn inventory_summary<S>(store: &S) -> AtomResult<Vec<CategoryStock>>
where
    S: BookStore + ?Sized,
{
    let mut grouped: BTreeMap<String, Vec<Book>> = BTreeMap::new();
    for book in store.list_books().await? {
        grouped.entry(book.category.clone()).or_default().push(book);
    }

    Ok(grouped
        .into_iter()
        .map(|(code, books)| CategoryStock {
            name: Category::lookup(&code)
                .map(|c| c.name.to_string())
                .unwrap_or_else(|| code.clone()),
            total_stock: books.iter().map(|b| u64::from(b.stock)).sum(),
            code,
            books,
        })
        .collect())
}

/// HTTP Handler: GET /staff/users
pub async fn list_users_handler<S>(store: &S, allow_list: &AdminAllowList) -> Result<Response<Body>, Error>
where
    S: ProfileStore + ?Sized,
{
    match list_users(store, allow_list).await {
        Ok(users) => json_response(StatusCode::OK, &users),
        Err(e) => error_response(&e),
    }
}

/// HTTP Handler: GET /staff/borrows?search=&level=&status=
pub async fn list_all_borrows_handler<S>(
    store: &S,
    search: Option<&str>,
    level: Option<&str>,
    status: Option<&str>,
) -> Result<Response<Body>, Error>
where
    S: ProfileStore + ?Sized,
{
    let filter = match BorrowFilter::from_query(search, level, status) {
        Ok(f) => f,
        Err(e) => return error_response(&e),
    };
    match list_all_borrows(store, &filter).await {
        Ok(records) => json_response(StatusCode::OK, &records),
        Err(e) => {
            tracing::error!("❌ list_all_borrows_handler failed: {}", e);
            error_response(&e)
        }
    }
}

/// HTTP Handler: GET /staff/inventory
pub async fn inventory_handler<S>(store: &S) -> Result<Response<Body>, Error>
where
    S: BookStore + ?Sized,
{
    match inventory_summary(store).await {
        Ok(summary) => json_response(StatusCode::OK, &summary),
        Err(e) => error_response(&e),
    }
}
