use chrono::{DateTime, Utc};
use passbook_core::{
    Category, CategoryKind, LearningRecord, Money, NewTransaction, TxnType, DEFAULT_CATEGORIES,
};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
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
    // user_id NULL marks a category shared by every user.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_learning (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            pattern TEXT NOT NULL,
            category_id TEXT NOT NULL,
            hits INTEGER NOT NULL DEFAULT 1,
            last_used TEXT NOT NULL,
            UNIQUE (user_id, pattern)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            account TEXT,
            title TEXT NOT NULL,
            narration TEXT NOT NULL,
            date TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            txn_type TEXT NOT NULL,
            category_id TEXT,
            confidence REAL NOT NULL,
            source TEXT NOT NULL,
            import_batch TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions (user_id, date)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn seed_default_categories(pool: &DbPool) -> Result<(), sqlx::Error> {
    for (id, name, kind) in DEFAULT_CATEGORIES {
        sqlx::query("INSERT OR IGNORE INTO categories (id, user_id, name, kind) VALUES (?, NULL, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(kind.to_string())
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Add a category visible only to `user_id`.
pub async fn insert_user_category(
    pool: &DbPool,
    user_id: &str,
    category: &Category,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO categories (id, user_id, name, kind) VALUES (?, ?, ?, ?)")
        .bind(&category.id)
        .bind(user_id)
        .bind(&category.name)
        .bind(category.kind.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Shared categories first, then the user's own, each in insertion order.
pub async fn get_user_categories(pool: &DbPool, user_id: &str) -> Result<Vec<Category>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String, String)>(
        "SELECT id, name, kind FROM categories WHERE user_id IS NULL OR user_id = ? ORDER BY user_id IS NOT NULL, rowid",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, kind)| {
            let kind = kind.parse().unwrap_or(CategoryKind::Expense);
            Category { id, name, kind }
        })
        .collect())
}

type LearningRow = (String, String, String, i64, String);

fn learning_from_row(r: LearningRow) -> LearningRecord {
    LearningRecord {
        user_id: r.0,
        pattern: r.1,
        category_id: r.2,
        hits: u32::try_from(r.3).unwrap_or(0),
        last_used: DateTime::parse_from_rfc3339(&r.4)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_default(),
    }
}

pub async fn get_learning_pattern(
    pool: &DbPool,
    user_id: &str,
    pattern: &str,
) -> Result<Option<LearningRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, LearningRow>(
        "SELECT user_id, pattern, category_id, hits, last_used FROM category_learning WHERE user_id = ? AND pattern = ?",
    )
    .bind(user_id)
    .bind(pattern)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(learning_from_row))
}

/// Insert with one hit, or repoint the pattern and add a hit in one statement
/// so concurrent corrections for the same key both count.
pub async fn upsert_learning_pattern(
    pool: &DbPool,
    user_id: &str,
    pattern: &str,
    category_id: &str,
) -> Result<LearningRecord, sqlx::Error> {
    let row = sqlx::query_as::<_, LearningRow>(
        r#"
        INSERT INTO category_learning (user_id, pattern, category_id, hits, last_used)
        VALUES (?, ?, ?, 1, ?)
        ON CONFLICT (user_id, pattern) DO UPDATE SET
            category_id = excluded.category_id,
            hits = category_learning.hits + 1,
            last_used = excluded.last_used
        RETURNING user_id, pattern, category_id, hits, last_used
        "#,
    )
    .bind(user_id)
    .bind(pattern)
    .bind(category_id)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(pool)
    .await?;

    Ok(learning_from_row(row))
}

pub async fn insert_transaction(pool: &DbPool, record: &NewTransaction) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO transactions
            (user_id, account, title, narration, date, amount_cents, txn_type, category_id, confidence, source, import_batch)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.user_id)
    .bind(&record.account)
    .bind(&record.title)
    .bind(&record.narration)
    .bind(&record.date)
    .bind(record.amount.to_cents())
    .bind(record.txn_type.category_kind().to_string())
    .bind(&record.category_id)
    .bind(record.confidence)
    .bind(&record.source)
    .bind(&record.import_batch)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

type TransactionRow = (
    String,
    Option<String>,
    String,
    String,
    String,
    i64,
    String,
    Option<String>,
    f32,
    String,
    String,
);

pub async fn get_transactions_by_batch(
    pool: &DbPool,
    import_batch: &str,
) -> Result<Vec<NewTransaction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT user_id, account, title, narration, date, amount_cents, txn_type, category_id, confidence, source, import_batch
        FROM transactions WHERE import_batch = ? ORDER BY id
        "#,
    )
    .bind(import_batch)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| NewTransaction {
            user_id: r.0,
            account: r.1,
            title: r.2,
            narration: r.3,
            date: r.4,
            amount: Money::from_cents(r.5),
            txn_type: r.6.parse().unwrap_or(TxnType::Debit),
            category_id: r.7,
            confidence: r.8,
            source: r.9,
            import_batch: r.10,
        })
        .collect())
}
