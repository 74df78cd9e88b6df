pub mod add;
pub mod auth_cmd;
pub mod categories;
pub mod common;
pub mod offline;
pub mod pending;
pub mod status;
pub mod sync;
