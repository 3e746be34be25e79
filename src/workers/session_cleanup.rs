use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::db::DatabaseProxy;

pub async fn purge_expired_sessions(db: Arc<DatabaseProxy>) -> Result<(), super::WorkerError> {
    let start = Instant::now();
    debug!("Starting session cleanup cycle");

    let purged = delete_expired_sessions(db.pool()).await?;

    if purged > 0 {
        info!(
            purged = purged,
            duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
            "Session cleanup completed"
        );
    }

    Ok(())
}

async fn delete_expired_sessions(pool: &PgPool) -> Result<i64, super::WorkerError> {
    let result = sqlx::query(r#"DELETE FROM "sessions" WHERE "expiresAt" < $1"#)
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() as i64)
}
