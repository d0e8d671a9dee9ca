//! Database access: pool, embedded migrations and housekeeping

mod pool;

pub use pool::{create_pool, run_migrations};

use sqlx::PgPool;

/// Drop expired admin sessions and login attempts older than a day.
pub async fn purge_stale_rows(pool: &PgPool) -> Result<(), sqlx::Error> {
    let sessions = sqlx::query("DELETE FROM admin_sessions WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    let attempts = sqlx::query(
        "DELETE FROM rate_limit_attempts WHERE attempted_at < NOW() - INTERVAL '1 day'",
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Purged {} expired session(s) and {} old login attempt(s)",
        sessions.rows_affected(),
        attempts.rows_affected()
    );
    Ok(())
}
