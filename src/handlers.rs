pub mod ai;
pub mod auth;
pub mod categories;
pub mod health;
pub mod imports;
pub mod receipts;
pub mod stats;
pub mod transactions;
pub mod upload;
pub mod users;
