//! Database connection pool and migrations

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Embedded migrations, applied in order at startup.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("migrations/001_initial.sql"),
)];

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
}

/// Split SQL into statements, keeping $$ delimited blocks (PL/pgSQL bodies) whole
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_dollar_block = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if c == '$' && chars.peek() == Some(&'$') {
            current.push('$');
            chars.next();
            in_dollar_block = !in_dollar_block;
        } else if c == ';' && !in_dollar_block {
            if has_sql_content(&current) {
                statements.push(current.trim().to_string());
            }
            current.clear();
        }
    }

    if has_sql_content(&current) {
        statements.push(current.trim().to_string());
    }

    statements
}

/// Check if a string has actual SQL content (not just comments)
fn has_sql_content(s: &str) -> bool {
    s.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with("--")
    })
}

/// Run database migrations
///
/// Every statement is idempotent, so the whole set is replayed on each start.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for (name, sql) in MIGRATIONS {
        let statements = split_sql_statements(sql);
        tracing::info!("Applying migration {} ({} statements)", name, statements.len());

        for statement in statements {
            sqlx::query(&statement).execute(pool).await.map_err(|e| {
                tracing::error!("Migration {} failed: {}", name, e);
                e
            })?;
        }
    }

    tracing::info!("Database migrations completed");
    Ok(())
}
