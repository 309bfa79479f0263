use async_trait::async_trait;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;

use super::attrs::{
    adjusted_stock, book_from_item, book_sk, book_to_item, entry_to_attr, get_n, profile_from_item,
    profile_to_item, user_key, Item, BOOK_PK,
};
use super::{BookStore, CommitStatus, LedgerStore, ProfileStore};
use crate::books::Book;
use crate::borrows::{position_of, BorrowEntry, EntryKey};
use crate::error::{AtomError, AtomResult};
use crate::users::{UpdateUserPayload, UserProfile};

/// Optimistic read-check-write loops give up after this many lost races.
const MAX_ATTEMPTS: usize = 5;

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

/// DynamoDB single-table store for books and user profiles.
#[derive(Clone, Debug)]
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn query_books(&self, category: Option<&str>) -> AtomResult<Vec<Book>> {
        let mut books = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut builder = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(BOOK_PK.to_string()))
                .expression_attribute_values(":sk_prefix", AttributeValue::S("BOOK#".to_string()))
                .set_exclusive_start_key(start_key.take());

            if let Some(category) = category {
                builder = builder
                    .filter_expression("#category = :category")
                    .expression_attribute_names("#category", "category")
                    .expression_attribute_values(":category", AttributeValue::S(category.to_string()));
            }

            let result = builder
                .send()
                .await
                .map_err(|e| AtomError::store("DynamoDB query error", e))?;

            books.extend(result.items().iter().filter_map(book_from_item));

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(books)
    }

    fn book_update(&self, book_id: &str) -> aws_sdk_dynamodb::types::builders::UpdateBuilder {
        Update::builder()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(BOOK_PK.to_string()))
            .key("SK", AttributeValue::S(book_sk(book_id)))
            .expression_attribute_names("#stock", "stock")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
    }

    fn user_update(&self, user_id: &str) -> aws_sdk_dynamodb::types::builders::UpdateBuilder {
        let key = user_key(user_id);
        Update::builder()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(key.clone()))
            .key("SK", AttributeValue::S(key))
    }

    /// Condition that pins the entry at `idx` to the one we read, so a
    /// concurrent edit of the list makes the write fail instead of removing
    /// the wrong entry.
    fn entry_guard(idx: usize, entry: &BorrowEntry) -> (String, Vec<(String, AttributeValue)>) {
        if entry.entry_id.is_empty() {
            (
                format!("borrows[{idx}].book_name = :book_name AND borrows[{idx}].borrowed_at = :borrowed_at"),
                vec![
                    (":book_name".to_string(), AttributeValue::S(entry.book_name.clone())),
                    (":borrowed_at".to_string(), AttributeValue::S(entry.borrowed_at.clone())),
                ],
            )
        } else {
            (
                format!("borrows[{idx}].entry_id = :entry_id"),
                vec![(":entry_id".to_string(), AttributeValue::S(entry.entry_id.clone()))],
            )
        }
    }
}

/// Per-item cancellation codes of a cancelled transaction, or `None` for any other failure.
fn cancellation_codes(err: &TransactWriteItemsError) -> Option<Vec<Option<String>>> {
    match err {
        TransactWriteItemsError::TransactionCanceledException(ex) => Some(
            ex.cancellation_reasons()
                .iter()
                .map(|r| r.code().map(|c| c.to_string()))
                .collect(),
        ),
        _ => None,
    }
}

fn check_failed(codes: &[Option<String>], idx: usize) -> bool {
    codes
        .get(idx)
        .and_then(|c| c.as_deref())
        .map(|c| c == CONDITIONAL_CHECK_FAILED)
        .unwrap_or(false)
}

#[async_trait]
impl BookStore for DynamoStore {
    async fn list_books(&self) -> AtomResult<Vec<Book>> {
        self.query_books(None).await
    }

    async fn books_in_category(&self, category: &str) -> AtomResult<Vec<Book>> {
        self.query_books(Some(category)).await
    }

    async fn get_book(&self, book_id: &str) -> AtomResult<Option<Book>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(BOOK_PK.to_string()))
            .key("SK", AttributeValue::S(book_sk(book_id)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| AtomError::store("DynamoDB get_item error", e))?;

        Ok(result.item().and_then(book_from_item))
    }

    async fn put_book(&self, book: &Book) -> AtomResult<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(book_to_item(book)))
            .send()
            .await
            .map_err(|e| AtomError::store("DynamoDB put_item error", e))?;
        Ok(())
    }

    async fn delete_book(&self, book_id: &str) -> AtomResult<bool> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(BOOK_PK.to_string()))
            .key("SK", AttributeValue::S(book_sk(book_id)))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| AtomError::store("DynamoDB delete_item error", e))?;

        Ok(result.attributes().map(|a| !a.is_empty()).unwrap_or(false))
    }

    async fn decrement_if_positive(&self, book_id: &str) -> AtomResult<bool> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(BOOK_PK.to_string()))
            .key("SK", AttributeValue::S(book_sk(book_id)))
            .update_expression("SET #stock = #stock - :one")
            .condition_expression("attribute_exists(SK) AND #stock > :zero")
            .expression_attribute_names("#stock", "stock")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .expression_attribute_values(":zero", AttributeValue::N("0".to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    match self.get_book(book_id).await? {
                        Some(_) => Ok(false),
                        None => Err(AtomError::NotFound(format!("Book {}", book_id))),
                    }
                } else {
                    Err(AtomError::store("DynamoDB update_item error", err))
                }
            }
        }
    }

    async fn increment(&self, book_id: &str) -> AtomResult<u32> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(BOOK_PK.to_string()))
            .key("SK", AttributeValue::S(book_sk(book_id)))
            .update_expression("SET #stock = #stock + :one")
            .condition_expression("attribute_exists(SK)")
            .expression_attribute_names("#stock", "stock")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.attributes().map(|a| get_n(a, "stock")).unwrap_or(0)),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    Err(AtomError::NotFound(format!("Book {}", book_id)))
                } else {
                    Err(AtomError::store("DynamoDB update_item error", err))
                }
            }
        }
    }

    async fn adjust_stock(&self, book_id: &str, delta: i64) -> AtomResult<u32> {
        for attempt in 1..=MAX_ATTEMPTS {
            let book = self
                .get_book(book_id)
                .await?
                .ok_or_else(|| AtomError::NotFound(format!("Book {}", book_id)))?;
            let next = adjusted_stock(book.stock, delta);

            let result = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .key("PK", AttributeValue::S(BOOK_PK.to_string()))
                .key("SK", AttributeValue::S(book_sk(book_id)))
                .update_expression("SET #stock = :next")
                .condition_expression("#stock = :observed")
                .expression_attribute_names("#stock", "stock")
                .expression_attribute_values(":next", AttributeValue::N(next.to_string()))
                .expression_attribute_values(":observed", AttributeValue::N(book.stock.to_string()))
                .send()
                .await;

            match result {
                Ok(_) => return Ok(next),
                Err(e) => {
                    let err = e.into_service_error();
                    if !err.is_conditional_check_failed_exception() {
                        return Err(AtomError::store("DynamoDB update_item error", err));
                    }
                    tracing::warn!(book_id, attempt, "stock changed during adjustment, retrying");
                }
            }
        }

        Err(AtomError::Conflict(format!("stock of book {} kept changing", book_id)))
    }
}

#[async_trait]
impl ProfileStore for DynamoStore {
    async fn get_profile(&self, user_id: &str) -> AtomResult<Option<UserProfile>> {
        let key = user_key(user_id);
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(key.clone()))
            .key("SK", AttributeValue::S(key))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| AtomError::store("DynamoDB get_item error", e))?;

        Ok(result.item().and_then(profile_from_item))
    }

    async fn create_profile(&self, profile: &UserProfile) -> AtomResult<bool> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(profile_to_item(profile)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    Ok(false)
                } else {
                    Err(AtomError::store("DynamoDB put_item error", err))
                }
            }
        }
    }

    async fn update_profile(&self, user_id: &str, payload: &UpdateUserPayload) -> AtomResult<()> {
        let mut update_expr = vec![];
        let mut expr_names = HashMap::new();
        let mut expr_values = HashMap::new();

        if let Some(name) = &payload.user_name {
            update_expr.push("#user_name = :user_name");
            expr_names.insert("#user_name".to_string(), "user_name".to_string());
            expr_values.insert(":user_name".to_string(), AttributeValue::S(name.clone()));
        }

        if let Some(student_id) = &payload.student_id {
            update_expr.push("student_id = :student_id");
            expr_values.insert(":student_id".to_string(), AttributeValue::S(student_id.clone()));
        }

        if let Some(level) = &payload.level {
            update_expr.push("#level = :level");
            expr_names.insert("#level".to_string(), "level".to_string());
            expr_values.insert(":level".to_string(), AttributeValue::S(level.clone()));
        }

        if let Some(department) = &payload.department {
            update_expr.push("department = :department");
            expr_values.insert(":department".to_string(), AttributeValue::S(department.clone()));
        }

        if update_expr.is_empty() {
            return Ok(());
        }

        let key = user_key(user_id);
        let mut builder = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(key.clone()))
            .key("SK", AttributeValue::S(key))
            .update_expression(format!("SET {}", update_expr.join(", ")))
            .condition_expression("attribute_exists(PK)");

        for (k, v) in expr_names {
            builder = builder.expression_attribute_names(k, v);
        }

        for (k, v) in expr_values {
            builder = builder.expression_attribute_values(k, v);
        }

        match builder.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    Err(AtomError::NotFound(format!("User {}", user_id)))
                } else {
                    Err(AtomError::store("DynamoDB update_item error", err))
                }
            }
        }
    }

    async fn set_role(&self, user_id: &str, role: &str) -> AtomResult<()> {
        let key = user_key(user_id);
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(key.clone()))
            .key("SK", AttributeValue::S(key))
            .update_expression("SET #role = :role")
            .condition_expression("attribute_exists(PK)")
            .expression_attribute_names("#role", "role")
            .expression_attribute_values(":role", AttributeValue::S(role.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    Err(AtomError::NotFound(format!("User {}", user_id)))
                } else {
                    Err(AtomError::store("DynamoDB update_item error", err))
                }
            }
        }
    }

    async fn list_profiles(&self) -> AtomResult<Vec<UserProfile>> {
        let mut profiles = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("begins_with(PK, :prefix) AND PK = SK")
                .expression_attribute_values(":prefix", AttributeValue::S("USER#".to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| AtomError::store("DynamoDB scan error", e))?;

            profiles.extend(result.items().iter().filter_map(profile_from_item));

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        profiles.sort_by(|a, b| a.user_created_at.cmp(&b.user_created_at));
        Ok(profiles)
    }

    async fn append_borrow(&self, user_id: &str, entry: &BorrowEntry) -> AtomResult<()> {
        let key = user_key(user_id);
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(key.clone()))
            .key("SK", AttributeValue::S(key))
            .update_expression("SET borrows = list_append(if_not_exists(borrows, :empty), :entry)")
            .condition_expression("attribute_exists(PK)")
            .expression_attribute_values(":empty", AttributeValue::L(vec![]))
            .expression_attribute_values(":entry", AttributeValue::L(vec![entry_to_attr(entry)]))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    Err(AtomError::NotFound(format!("User {}", user_id)))
                } else {
                    Err(AtomError::store("DynamoDB update_item error", err))
                }
            }
        }
    }

    async fn remove_borrow(&self, user_id: &str, key: &EntryKey) -> AtomResult<Option<BorrowEntry>> {
        for attempt in 1..=MAX_ATTEMPTS {
            let profile = self
                .get_profile(user_id)
                .await?
                .ok_or_else(|| AtomError::NotFound(format!("User {}", user_id)))?;
            let Some(idx) = position_of(&profile.borrows, key) else {
                return Ok(None);
            };
            let entry = profile.borrows[idx].clone();
            let (condition, values) = Self::entry_guard(idx, &entry);

            let pk = user_key(user_id);
            let mut builder = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .key("PK", AttributeValue::S(pk.clone()))
                .key("SK", AttributeValue::S(pk))
                .update_expression(format!("REMOVE borrows[{}]", idx))
                .condition_expression(condition);
            for (k, v) in values {
                builder = builder.expression_attribute_values(k, v);
            }

            match builder.send().await {
                Ok(_) => return Ok(Some(entry)),
                Err(e) => {
                    let err = e.into_service_error();
                    if !err.is_conditional_check_failed_exception() {
                        return Err(AtomError::store("DynamoDB update_item error", err));
                    }
                    tracing::warn!(user_id, attempt, "borrow list changed during removal, retrying");
                }
            }
        }

        Err(AtomError::Conflict(format!("borrow list of user {} kept changing", user_id)))
    }
}

#[async_trait]
impl LedgerStore for DynamoStore {
    async fn commit_borrow(
        &self,
        book_id: &str,
        user_id: &str,
        entry: &BorrowEntry,
    ) -> AtomResult<CommitStatus> {
        let decrement = self
            .book_update(book_id)
            .update_expression("SET #stock = #stock - :one")
            .condition_expression("attribute_exists(SK) AND #stock > :zero")
            .expression_attribute_values(":zero", AttributeValue::N("0".to_string()))
            .build()
            .map_err(|e| AtomError::store("DynamoDB transaction build error", e))?;

        let append = self
            .user_update(user_id)
            .update_expression("SET borrows = list_append(if_not_exists(borrows, :empty), :entry)")
            .condition_expression("attribute_exists(PK)")
            .expression_attribute_values(":empty", AttributeValue::L(vec![]))
            .expression_attribute_values(":entry", AttributeValue::L(vec![entry_to_attr(entry)]))
            .build()
            .map_err(|e| AtomError::store("DynamoDB transaction build error", e))?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().update(decrement).build())
            .transact_items(TransactWriteItem::builder().update(append).build())
            .send()
            .await;

        match result {
            Ok(_) => Ok(CommitStatus::Committed),
            Err(e) => {
                let err = e.into_service_error();
                match cancellation_codes(&err) {
                    Some(codes) if check_failed(&codes, 1) => {
                        Err(AtomError::NotFound(format!("User {}", user_id)))
                    }
                    Some(codes) if check_failed(&codes, 0) => Ok(CommitStatus::StockExhausted),
                    _ => Err(AtomError::store("DynamoDB transact_write_items error", err)),
                }
            }
        }
    }

    async fn commit_return(
        &self,
        book_id: Option<&str>,
        user_id: &str,
        key: &EntryKey,
    ) -> AtomResult<Option<BorrowEntry>> {
        for attempt in 1..=MAX_ATTEMPTS {
            let profile = self
                .get_profile(user_id)
                .await?
                .ok_or_else(|| AtomError::NotFound(format!("User {}", user_id)))?;
            let Some(idx) = position_of(&profile.borrows, key) else {
                return Ok(None);
            };
            let entry = profile.borrows[idx].clone();
            let (condition, values) = Self::entry_guard(idx, &entry);

            let mut remove = self
                .user_update(user_id)
                .update_expression(format!("REMOVE borrows[{}]", idx))
                .condition_expression(condition);
            for (k, v) in values {
                remove = remove.expression_attribute_values(k, v);
            }
            let remove = remove
                .build()
                .map_err(|e| AtomError::store("DynamoDB transaction build error", e))?;

            let mut request = self
                .client
                .transact_write_items()
                .transact_items(TransactWriteItem::builder().update(remove).build());

            if let Some(book_id) = book_id {
                let increment = self
                    .book_update(book_id)
                    .update_expression("SET #stock = #stock + :one")
                    .condition_expression("attribute_exists(SK)")
                    .build()
                    .map_err(|e| AtomError::store("DynamoDB transaction build error", e))?;
                request = request.transact_items(TransactWriteItem::builder().update(increment).build());
            }

            match request.send().await {
                Ok(_) => return Ok(Some(entry)),
                Err(e) => {
                    let err = e.into_service_error();
                    match cancellation_codes(&err) {
                        Some(codes) if check_failed(&codes, 1) => {
                            return Err(AtomError::Conflict(format!(
                                "book {} was removed during the return",
                                book_id.unwrap_or_default()
                            )));
                        }
                        Some(codes) if check_failed(&codes, 0) => {
                            tracing::warn!(user_id, attempt, "borrow list changed during return, retrying");
                        }
                        _ => return Err(AtomError::store("DynamoDB transact_write_items error", err)),
                    }
                }
            }
        }

        Err(AtomError::Conflict(format!("borrow list of user {} kept changing", user_id)))
    }
}
