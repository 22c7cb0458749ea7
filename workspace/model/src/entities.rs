//! SeaORM entities for the finance tracker: users, their categories and
//! their income/expense transactions.

pub mod category;
pub mod transaction;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::category::Entity as Category;
    pub use super::transaction::Entity as Transaction;
    pub use super::user::Entity as User;
}
