//! Schema bootstrap.
//!
//! Grounded on the teacher's `Migrator<E, S>` (`init_event_store`/
//! `init_listener`), which loads each step's SQL via `include_str!` against
//! files this retrieval did not carry over; the statements below are
//! written inline instead; the division into named constants and ordered
//! `migrate` steps follows the same shape.
use sqlx::PgPool;

use crate::error::Error;

const CREATE_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS dcb_events (
    position        BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    transaction_id  BIGINT NOT NULL DEFAULT pg_current_xact_id()::text::bigint,
    event_type      TEXT NOT NULL,
    tags            TEXT[] NOT NULL DEFAULT '{}',
    payload         BYTEA NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_EVENTS_TYPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS dcb_events_event_type_idx ON dcb_events (event_type)
"#;

const CREATE_EVENTS_TAGS_GIN_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS dcb_events_tags_gin_idx ON dcb_events USING GIN (tags)
"#;

const CREATE_COMMANDS: &str = r#"
CREATE TABLE IF NOT EXISTS dcb_commands (
    id              BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    command_type    TEXT NOT NULL,
    payload         BYTEA NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_PROCESSOR_PROGRESS: &str = r#"
CREATE TABLE IF NOT EXISTS dcb_processor_progress (
    processor_id        TEXT PRIMARY KEY,
    position             BIGINT NOT NULL DEFAULT 0,
    status               TEXT NOT NULL DEFAULT 'active',
    consecutive_errors   INT NOT NULL DEFAULT 0,
    instance_id          TEXT,
    last_error           TEXT,
    last_error_at        TIMESTAMPTZ,
    updated_at           TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Creates every table and index this crate needs, if they do not already
/// exist. Idempotent, so it is safe to run on every process start the way
/// the teacher's `init_event_store`/`init_listener` are meant to be called.
pub struct Migrator<'a> {
    pool: &'a PgPool,
}

impl<'a> Migrator<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_event_store(&self) -> Result<(), Error> {
        sqlx::query(CREATE_EVENTS).execute(self.pool).await?;
        sqlx::query(CREATE_EVENTS_TYPE_INDEX).execute(self.pool).await?;
        sqlx::query(CREATE_EVENTS_TAGS_GIN_INDEX).execute(self.pool).await?;
        sqlx::query(CREATE_COMMANDS).execute(self.pool).await?;
        Ok(())
    }

    pub async fn init_processor_runtime(&self) -> Result<(), Error> {
        sqlx::query(CREATE_PROCESSOR_PROGRESS).execute(self.pool).await?;
        Ok(())
    }

    /// Runs both steps; the common case for a fresh application boot.
    pub async fn run(&self) -> Result<(), Error> {
        self.init_event_store().await?;
        self.init_processor_runtime().await?;
        Ok(())
    }
}
