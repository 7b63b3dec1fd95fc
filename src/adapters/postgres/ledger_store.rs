use crate::domain::{BookId, Ledger, LedgerKey, LedgerTransition, OperationId, Revision};
use crate::ports::ledger_store::{LedgerStore as LedgerStoreTrait, Result, WriteOutcome};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{PgPool, Row};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// NOTIFY channel carrying the key of every committed ledger.
pub const LEDGER_CHANNEL: &str = "ledger_changes";

/// Convert a `ledgers` row into a validated Ledger
///
/// Rejects rows that break the ledger invariants instead of passing them on.
fn map_row_to_ledger(row: &PgRow) -> Result<Ledger> {
    let borrowed_ids: serde_json::Value = row.get("borrowed_ids");
    let borrowed_ids: Vec<BookId> = serde_json::from_value(borrowed_ids)?;

    let revision: i64 = row.get("revision");
    let revision = u64::try_from(revision).map_err(|_| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("revision out of range: {}", revision),
        )) as BoxError
    })?;

    Ok(Ledger::restore(borrowed_ids, Revision::from_u64(revision))?)
}

/// Read a ledger, creating the empty record on first access
///
/// The insert uses ON CONFLICT DO NOTHING, so concurrent first readers agree on one row.
async fn fetch_or_create(pool: &PgPool, key: &LedgerKey) -> Result<Ledger> {
    const SELECT: &str = r#"
        SELECT borrowed_ids, revision
        FROM ledgers
        WHERE ledger_key = $1
    "#;

    if let Some(row) = sqlx::query(SELECT)
        .bind(key.as_str())
        .fetch_optional(pool)
        .await?
    {
        return map_row_to_ledger(&row);
    }

    sqlx::query(
        r#"
        INSERT INTO ledgers (ledger_key, borrowed_ids, revision)
        VALUES ($1, '[]'::jsonb, 0)
        ON CONFLICT (ledger_key) DO NOTHING
        "#,
    )
    .bind(key.as_str())
    .execute(pool)
    .await?;

    let row = sqlx::query(SELECT)
        .bind(key.as_str())
        .fetch_one(pool)
        .await?;

    map_row_to_ledger(&row)
}

/// PostgreSQL implementation of LedgerStore
///
/// One row per ledger in `ledgers`. The conditional write is an UPDATE guarded by
/// `revision = expected`; the commit record is appended to `ledger_events` and a
/// NOTIFY is issued inside the same transaction, so all three land together or not at all.
pub struct LedgerStore {
    pool: PgPool,
}

impl LedgerStore {
    /// Create a new LedgerStore with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStoreTrait for LedgerStore {
    async fn load_or_init(&self, key: &LedgerKey) -> Result<Ledger> {
        fetch_or_create(&self.pool, key).await
    }

    /// Conditionally write the transition
    ///
    /// Under READ COMMITTED a concurrent UPDATE on the same row waits for the row lock
    /// and then re-checks the WHERE clause against the committed revision, so exactly
    /// one writer per revision sees `rows_affected() == 1`.
    async fn compare_and_swap(
        &self,
        key: &LedgerKey,
        transition: &LedgerTransition,
    ) -> Result<WriteOutcome> {
        let next = &transition.next;
        let expected = i64::try_from(transition.expected.value())?;
        let next_revision = i64::try_from(next.revision().value())?;
        let borrowed_ids = serde_json::to_value(next.borrowed_ids())?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE ledgers
            SET borrowed_ids = $2,
                revision = $3,
                updated_at = NOW()
            WHERE ledger_key = $1
              AND revision = $4
            "#,
        )
        .bind(key.as_str())
        .bind(&borrowed_ids)
        .bind(next_revision)
        .bind(expected)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT revision FROM ledgers WHERE ledger_key = $1")
                    .bind(key.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return match current {
                Some(current) => Ok(WriteOutcome::Conflict {
                    current: Revision::from_u64(u64::try_from(current)?),
                }),
                None => Err(format!("ledger {} has not been initialized", key).into()),
            };
        }

        let event = &transition.event;
        sqlx::query(
            r#"
            INSERT INTO ledger_events (
                ledger_key,
                revision,
                operation_id,
                event_type,
                book_id,
                event_data,
                occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(key.as_str())
        .bind(next_revision)
        .bind(event.operation_id().value())
        .bind(event.event_type())
        .bind(event.book_id().as_str())
        .bind(serde_json::to_value(event)?)
        .bind(event.occurred_at())
        .execute(&mut *tx)
        .await?;

        // Delivered to listeners only once the transaction commits.
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(LEDGER_CHANNEL)
            .bind(key.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(WriteOutcome::Committed(next.clone()))
    }

    async fn find_commit(
        &self,
        key: &LedgerKey,
        operation_id: OperationId,
    ) -> Result<Option<Revision>> {
        let revision: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT revision
            FROM ledger_events
            WHERE ledger_key = $1
              AND operation_id = $2
            "#,
        )
        .bind(key.as_str())
        .bind(operation_id.value())
        .fetch_optional(&self.pool)
        .await?;

        match revision {
            Some(revision) => Ok(Some(Revision::from_u64(u64::try_from(revision)?))),
            None => Ok(None),
        }
    }

    /// Subscribe through LISTEN/NOTIFY
    ///
    /// Each notification for this key triggers a re-read, so bursts of commits may be
    /// coalesced into one snapshot. When the listener connection drops, the ledger is
    /// re-read after reconnecting because notifications sent in between are lost.
    fn subscribe(&self, key: &LedgerKey) -> BoxStream<'static, Result<Ledger>> {
        let pool = self.pool.clone();
        let key = key.clone();

        stream::unfold(Phase::Connect, move |phase| {
            let pool = pool.clone();
            let key = key.clone();
            async move { next_snapshot(phase, &pool, &key).await }
        })
        .boxed()
    }
}

enum Phase {
    Connect,
    Listening(PgListener),
    Done,
}

fn terminal(error: impl Into<BoxError>) -> Option<(Result<Ledger>, Phase)> {
    Some((Err(error.into()), Phase::Done))
}

async fn next_snapshot(
    phase: Phase,
    pool: &PgPool,
    key: &LedgerKey,
) -> Option<(Result<Ledger>, Phase)> {
    match phase {
        Phase::Done => None,
        Phase::Connect => {
            let mut listener = match PgListener::connect_with(pool).await {
                Ok(listener) => listener,
                Err(e) => return terminal(e),
            };
            if let Err(e) = listener.listen(LEDGER_CHANNEL).await {
                return terminal(e);
            }
            match fetch_or_create(pool, key).await {
                Ok(ledger) => Some((Ok(ledger), Phase::Listening(listener))),
                Err(e) => terminal(e),
            }
        }
        Phase::Listening(mut listener) => loop {
            match listener.try_recv().await {
                Ok(Some(notification)) if notification.payload() != key.as_str() => continue,
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::debug!(ledger = %key, "listener connection lost, resyncing");
                }
                Err(e) => return terminal(e),
            }

            return match fetch_or_create(pool, key).await {
                Ok(ledger) => Some((Ok(ledger), Phase::Listening(listener))),
                Err(e) => terminal(e),
            };
        },
    }
}
