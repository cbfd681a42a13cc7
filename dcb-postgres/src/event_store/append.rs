//! Batch-inserts new events into `dcb_events`.
//!
//! Grounded on the teacher's `InsertEventsBuilder<E, S>`, which used
//! `sqlx::QueryBuilder::push_values` to build one multi-row `INSERT`;
//! reused here verbatim in technique, with one `tags TEXT[]` column
//! standing in for the teacher's per-identifier columns.
use dcb_core::{AppendEvent, Cursor};
use sqlx::{PgConnection, QueryBuilder};

use crate::error::Error;

/// Inserts `events` and returns the cursor of the last row written. The
/// transaction id is whatever `pg_current_xact_id()` resolves to for the
/// caller's open transaction, so every event in this batch shares one
/// transaction id regardless of how many rows were inserted.
pub async fn insert_events(
    conn: &mut PgConnection,
    events: Vec<AppendEvent>,
) -> Result<Cursor, Error> {
    if events.is_empty() {
        return current_cursor(conn).await;
    }

    let mut builder: QueryBuilder<sqlx::Postgres> =
        QueryBuilder::new("INSERT INTO dcb_events (event_type, tags, payload) ");
    builder.push_values(events.iter(), |mut row, event| {
        let tags: Vec<String> = event.tags().iter().map(ToString::to_string).collect();
        row.push_bind(event.event_type())
            .push_bind(tags)
            .push_bind(event.payload().to_vec());
    });
    builder.push(" RETURNING position, transaction_id");

    let rows: Vec<(i64, i64)> = builder
        .build_query_as()
        .fetch_all(&mut *conn)
        .await?;

    let (position, transaction_id) = rows
        .into_iter()
        .max_by_key(|(position, _)| *position)
        .expect("insert_events only reaches here with at least one row inserted");

    Ok(Cursor::new(position as u64, transaction_id as u64))
}

async fn current_cursor(conn: &mut PgConnection) -> Result<Cursor, Error> {
    let row: (Option<i64>, i64) = sqlx::query_as(
        "SELECT (SELECT MAX(position) FROM dcb_events), pg_current_xact_id()::text::bigint",
    )
    .fetch_one(conn)
    .await?;
    Ok(Cursor::new(row.0.unwrap_or(0) as u64, row.1 as u64))
}
