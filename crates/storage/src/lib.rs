pub mod db;
pub mod error;
pub mod journal;

pub use db::{
    create_db, delete_rule, get_rule, insert_rule, list_rules, update_rule, DbPool,
    RULES_DB_FILE_NAME,
};
pub use error::StorageError;
pub use journal::append_transaction;
