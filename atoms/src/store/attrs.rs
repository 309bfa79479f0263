//! DynamoDB item <-> model conversions for the single-table layout.
//!
//! Books:  PK = "BOOK", SK = "BOOK#{book_id}"
//! Users:  PK = SK = "USER#{user_id}", borrows stored as a list of maps

use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

use crate::books::Book;
use crate::borrows::BorrowEntry;
use crate::users::UserProfile;

pub type Item = HashMap<String, AttributeValue>;

pub const BOOK_PK: &str = "BOOK";

pub fn book_sk(book_id: &str) -> String {
    format!("BOOK#{}", book_id)
}

pub fn user_key(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

pub fn get_s(item: &Item, name: &str) -> String {
    get_opt_s(item, name).unwrap_or_default()
}

pub fn get_opt_s(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

pub fn get_n(item: &Item, name: &str) -> u32 {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<i64>().ok())
        .map(clamp_stock)
        .unwrap_or(0)
}

/// Stock is stored as a number but held as `u32`; out-of-range values saturate.
pub fn clamp_stock(n: i64) -> u32 {
    n.clamp(0, u32::MAX as i64) as u32
}

/// `stock + delta`, saturating at both ends of the `u32` range.
pub fn adjusted_stock(stock: u32, delta: i64) -> u32 {
    clamp_stock((stock as i64).saturating_add(delta))
}

pub fn book_to_item(book: &Book) -> Item {
    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(BOOK_PK.to_string()));
    item.insert("SK".to_string(), AttributeValue::S(book_sk(&book.book_id)));
    item.insert("name".to_string(), AttributeValue::S(book.name.clone()));
    item.insert("category".to_string(), AttributeValue::S(book.category.clone()));
    item.insert("stock".to_string(), AttributeValue::N(book.stock.to_string()));
    item.insert("cover_url".to_string(), AttributeValue::S(book.cover_url.clone()));
    item.insert("created_at".to_string(), AttributeValue::S(book.created_at.clone()));
    item
}

pub fn book_from_item(item: &Item) -> Option<Book> {
    let sk = item.get("SK").and_then(|v| v.as_s().ok())?;
    let book_id = sk.strip_prefix("BOOK#")?;
    Some(Book {
        book_id: book_id.to_string(),
        name: get_s(item, "name"),
        category: get_s(item, "category"),
        stock: get_n(item, "stock"),
        cover_url: get_s(item, "cover_url"),
        created_at: get_s(item, "created_at"),
    })
}

pub fn entry_to_attr(entry: &BorrowEntry) -> AttributeValue {
    let mut m = HashMap::new();
    m.insert("entry_id".to_string(), AttributeValue::S(entry.entry_id.clone()));
    m.insert("book_name".to_string(), AttributeValue::S(entry.book_name.clone()));
    m.insert("category".to_string(), AttributeValue::S(entry.category.clone()));
    m.insert("photo_url".to_string(), AttributeValue::S(entry.photo_url.clone()));
    m.insert("borrowed_at".to_string(), AttributeValue::S(entry.borrowed_at.clone()));
    if let Some(returned_at) = &entry.returned_at {
        m.insert("returned_at".to_string(), AttributeValue::S(returned_at.clone()));
    }
    AttributeValue::M(m)
}

pub fn entry_from_attr(value: &AttributeValue) -> Option<BorrowEntry> {
    let m = value.as_m().ok()?;
    Some(BorrowEntry {
        entry_id: get_s(m, "entry_id"),
        book_name: get_s(m, "book_name"),
        category: get_s(m, "category"),
        photo_url: get_s(m, "photo_url"),
        borrowed_at: get_s(m, "borrowed_at"),
        returned_at: get_opt_s(m, "returned_at"),
    })
}

pub fn entries_from_item(item: &Item) -> Vec<BorrowEntry> {
    item.get("borrows")
        .and_then(|v| v.as_l().ok())
        .map(|list| list.iter().filter_map(entry_from_attr).collect())
        .unwrap_or_default()
}

pub fn profile_to_item(profile: &UserProfile) -> Item {
    let key = user_key(&profile.user_id);
    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(key.clone()));
    item.insert("SK".to_string(), AttributeValue::S(key));
    item.insert("user_name".to_string(), AttributeValue::S(profile.user_name.clone()));
    item.insert("email".to_string(), AttributeValue::S(profile.user_email.clone()));
    item.insert("role".to_string(), AttributeValue::S(profile.user_role.clone()));
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(profile.user_created_at.clone()),
    );
    item.insert(
        "borrows".to_string(),
        AttributeValue::L(profile.borrows.iter().map(entry_to_attr).collect()),
    );
    if let Some(student_id) = &profile.student_id {
        item.insert("student_id".to_string(), AttributeValue::S(student_id.clone()));
    }
    if let Some(level) = &profile.level {
        item.insert("level".to_string(), AttributeValue::S(level.clone()));
    }
    if let Some(department) = &profile.department {
        item.insert("department".to_string(), AttributeValue::S(department.clone()));
    }
    item
}

pub fn profile_from_item(item: &Item) -> Option<UserProfile> {
    let pk = item.get("PK").and_then(|v| v.as_s().ok())?;
    let user_id = pk.strip_prefix("USER#")?;
    let user_email = get_s(item, "email");
    let mut user_name = get_s(item, "user_name");
    if user_name.trim().is_empty() {
        user_name = crate::users::model::default_name(&user_email);
    }
    Some(UserProfile {
        user_id: user_id.to_string(),
        user_name,
        user_email,
        user_role: get_opt_s(item, "role").unwrap_or_else(|| "user".to_string()),
        student_id: get_opt_s(item, "student_id"),
        level: get_opt_s(item, "level"),
        department: get_opt_s(item, "department"),
        borrows: entries_from_item(item),
        user_created_at: get_s(item, "created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_item_keys_follow_single_table_layout() {
        let book = Book {
            book_id: "b1".into(),
            name: "Science".into(),
            category: "500".into(),
            stock: 3,
            cover_url: "/500.jpg".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        let item = book_to_item(&book);
        assert_eq!(get_s(&item, "PK"), "BOOK");
        assert_eq!(get_s(&item, "SK"), "BOOK#b1");
        assert_eq!(book_from_item(&item), Some(book));
    }

    #[test]
    fn negative_or_garbled_stock_reads_as_zero() {
        let mut item = HashMap::new();
        item.insert("stock".to_string(), AttributeValue::N("-2".into()));
        assert_eq!(get_n(&item, "stock"), 0);
        item.insert("stock".to_string(), AttributeValue::S("many".into()));
        assert_eq!(get_n(&item, "stock"), 0);
        item.insert("stock".to_string(), AttributeValue::N("5000000000".into()));
        assert_eq!(get_n(&item, "stock"), u32::MAX);
    }

    #[test]
    fn stock_adjustment_saturates_instead_of_wrapping() {
        assert_eq!(adjusted_stock(0, 5_000_000_000), u32::MAX);
        assert_eq!(adjusted_stock(3, -10), 0);
        assert_eq!(adjusted_stock(3, 2), 5);
        assert_eq!(adjusted_stock(u32::MAX, 1), u32::MAX);
    }

    #[test]
    fn profile_item_uses_table_attribute_names() {
        let mut profile = UserProfile::first_sign_in("u1", "nid@college.ac.th", crate::users::Role::Staff);
        profile.user_created_at = "2026-01-01T00:00:00Z".into();
        let item = profile_to_item(&profile);
        assert_eq!(get_s(&item, "PK"), "USER#u1");
        assert_eq!(get_s(&item, "SK"), "USER#u1");
        assert_eq!(get_s(&item, "email"), "nid@college.ac.th");
        assert_eq!(get_s(&item, "role"), "staff");
        assert_eq!(get_s(&item, "created_at"), "2026-01-01T00:00:00Z");
        assert!(!item.contains_key("user_email"));
        assert_eq!(profile_from_item(&item), Some(profile));
    }

    #[test]
    fn profile_without_name_or_role_gets_defaults() {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S("USER#u1".into()));
        item.insert("email".to_string(), AttributeValue::S("nid@college.ac.th".into()));
        let profile = profile_from_item(&item).expect("profile");
        assert_eq!(profile.user_id, "u1");
        assert_eq!(profile.user_name, "nid");
        assert_eq!(profile.user_role, "user");
        assert!(profile.borrows.is_empty());
    }
}
