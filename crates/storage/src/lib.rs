pub mod db;
pub mod memory;
pub mod sqlite;

pub use db::{
    create_db, get_learning_pattern, get_transactions_by_batch, get_user_categories,
    insert_transaction, insert_user_category, seed_default_categories, upsert_learning_pattern,
    DbPool,
};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
