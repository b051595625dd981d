//! # Sequence Repository
//!
//! Monthly counters behind order and invoice numbers.
//!
//! ## Minting
//! ```text
//! INSERT INTO sequences (scope, period, last_value) VALUES ('order', '202610', 1)
//! ON CONFLICT (scope, period) DO UPDATE SET last_value = last_value + 1
//! RETURNING last_value
//! ```
//! One statement: the increment and the read cannot interleave with another
//! writer. A committed value is never handed out again. A mint whose
//! transaction rolls back disappears together with the row that used it.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kosh_core::sequence::{format_identifier, Period, SequenceScope};

/// Repository for the sequence counters.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Mints the next identifier outside any other transaction.
    pub async fn next(&self, scope: SequenceScope, period: Period) -> DbResult<String> {
        let mut conn = self.pool.acquire().await?;
        next_in(&mut conn, scope, period).await
    }

    /// Last ordinal handed out for a scope and month, if any.
    pub async fn current(&self, scope: SequenceScope, period: Period) -> DbResult<Option<i64>> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM sequences WHERE scope = ?1 AND period = ?2")
                .bind(scope.as_str())
                .bind(period.key())
                .fetch_optional(&self.pool)
                .await?;

        Ok(value)
    }
}

/// Mints the next identifier on the given connection (usually a transaction).
///
/// As the first statement of a transaction this is a write, so it also
/// takes SQLite's write lock for the rest of the transaction.
pub(crate) async fn next_in(
    conn: &mut SqliteConnection,
    scope: SequenceScope,
    period: Period,
) -> DbResult<String> {
    let ordinal: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sequences (scope, period, last_value) VALUES (?1, ?2, 1)
        ON CONFLICT (scope, period) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(scope.as_str())
    .bind(period.key())
    .fetch_one(&mut *conn)
    .await?;

    let identifier = format_identifier(scope, period, ordinal as u64);
    debug!(%scope, %period, ordinal, identifier = %identifier, "Minted sequence number");
    Ok(identifier)
}
