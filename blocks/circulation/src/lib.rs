//! Circulation: the borrow/return workflow over the inventory and borrow
//! record atoms, plus the staff dashboard views.

pub mod borrow;
pub mod dashboard;
pub mod returns;
pub mod types;

pub use borrow::{borrow_book, borrow_handler, confirm_borrow, ConfirmedBorrow};
pub use dashboard::{
    inventory_handler, inventory_summary, list_all_borrows, list_all_borrows_handler, list_users_handler,
    BorrowFilter, BorrowRecordView, CategoryStock, StatusFilter,
};
pub use returns::{legacy_return_handler, return_book, return_handler};
pub use types::*;
