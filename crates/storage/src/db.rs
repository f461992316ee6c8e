use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tally_core::{Captures, TransactionRegex};

use crate::error::StorageError;

pub type DbPool = Pool<Sqlite>;

/// File name of the rule database inside the data directory.
pub const RULES_DB_FILE_NAME: &str = "rules.db";

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transaction_regexes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            pattern TEXT NOT NULL,
            captures TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

type RuleRow = (i64, String, String, String);

fn rule_from_row(r: RuleRow) -> Result<TransactionRegex, StorageError> {
    let captures: Captures = serde_json::from_str(&r.3)?;
    Ok(TransactionRegex {
        id: r.0,
        name: r.1,
        pattern: r.2,
        captures,
    })
}

/// Stores `rule` under a fresh id (its own `id` is ignored) and returns the id.
pub async fn insert_rule(pool: &DbPool, rule: &TransactionRegex) -> Result<i64, StorageError> {
    let captures = serde_json::to_string(&rule.captures)?;
    let result = sqlx::query(
        "INSERT INTO transaction_regexes (name, pattern, captures) VALUES (?, ?, ?)",
    )
    .bind(&rule.name)
    .bind(&rule.pattern)
    .bind(captures)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// All rules in the order they are tried.
pub async fn list_rules(pool: &DbPool) -> Result<Vec<TransactionRegex>, StorageError> {
    let rows = sqlx::query_as::<_, RuleRow>(
        "SELECT id, name, pattern, captures FROM transaction_regexes ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(rule_from_row).collect()
}

pub async fn get_rule(pool: &DbPool, id: i64) -> Result<Option<TransactionRegex>, StorageError> {
    let row = sqlx::query_as::<_, RuleRow>(
        "SELECT id, name, pattern, captures FROM transaction_regexes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(rule_from_row).transpose()
}

/// Overwrites the rule with `rule.id`. Returns `false` if there is no such rule.
pub async fn update_rule(pool: &DbPool, rule: &TransactionRegex) -> Result<bool, StorageError> {
    let captures = serde_json::to_string(&rule.captures)?;
    let result = sqlx::query(
        "UPDATE transaction_regexes SET name = ?, pattern = ?, captures = ? WHERE id = ?",
    )
    .bind(&rule.name)
    .bind(&rule.pattern)
    .bind(captures)
    .bind(rule.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Removes a rule, returning it if it existed.
pub async fn delete_rule(pool: &DbPool, id: i64) -> Result<Option<TransactionRegex>, StorageError> {
    let Some(rule) = get_rule(pool, id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM transaction_regexes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Some(rule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn pool(dir: &TempDir) -> DbPool {
        create_db(&dir.path().join(RULES_DB_FILE_NAME)).await.unwrap()
    }

    fn coffee() -> TransactionRegex {
        TransactionRegex::new(
            "coffee",
            "STARBUCKS (\\d+\\.\\d+)",
            Captures {
                payee: Some("Starbucks".to_string()),
                amount: Some("$1".to_string()),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn insert_then_get() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir).await;

        let id = insert_rule(&pool, &coffee()).await.unwrap();
        let stored = get_rule(&pool, id).await.unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.name, "coffee");
        assert_eq!(stored.captures, coffee().captures);
        assert!(get_rule(&pool, id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir).await;

        insert_rule(&pool, &coffee()).await.unwrap();
        insert_rule(&pool, &TransactionRegex::new("any", ".*", Captures::default()))
            .await
            .unwrap();

        let names: Vec<String> = list_rules(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["coffee", "any"]);
    }

    #[tokio::test]
    async fn update_existing_and_missing() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir).await;
        let id = insert_rule(&pool, &coffee()).await.unwrap();

        let mut rule = coffee();
        rule.id = id;
        rule.name = "cafe".to_string();
        assert!(update_rule(&pool, &rule).await.unwrap());
        assert_eq!(get_rule(&pool, id).await.unwrap().unwrap().name, "cafe");

        rule.id = 999;
        assert!(!update_rule(&pool, &rule).await.unwrap());
    }

    #[tokio::test]
    async fn delete_returns_removed_rule() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir).await;
        let id = insert_rule(&pool, &coffee()).await.unwrap();

        let removed = delete_rule(&pool, id).await.unwrap().unwrap();
        assert_eq!(removed.name, "coffee");
        assert!(delete_rule(&pool, id).await.unwrap().is_none());
        assert!(list_rules(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_keeps_rules() {
        let dir = TempDir::new().unwrap();
        let id = insert_rule(&pool(&dir).await, &coffee()).await.unwrap();
        let reopened = pool(&dir).await;
        assert!(get_rule(&reopened, id).await.unwrap().is_some());
    }
}
