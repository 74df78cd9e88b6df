//! Data models for Spendsync

mod category;
mod expense;
mod identity;

pub use category::{Category, Page};
pub use expense::{Expense, ExpenseDraft, LocalId, PendingExpense, RecordedExpense};
pub use identity::{AuthToken, Identity};
