use crate::postgres::PostgresClient;
use anyhow::{Context, Result};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    entry_uuid   TEXT     PRIMARY KEY,
    device_id    TEXT     NOT NULL,
    status       SMALLINT NOT NULL,
    created_date BIGINT   NOT NULL,
    accl_x       NUMERIC,
    accl_y       NUMERIC,
    accl_z       NUMERIC,
    gyro_x       NUMERIC,
    gyro_y       NUMERIC,
    gyro_z       NUMERIC,
    roll         INTEGER,
    pitch        INTEGER,
    rain         NUMERIC,
    soil         NUMERIC
);

CREATE INDEX IF NOT EXISTS entries_device_status_idx ON entries (device_id, status);

CREATE TABLE IF NOT EXISTS devices (
    device_id    TEXT    PRIMARY KEY,
    risk_factor  NUMERIC NOT NULL DEFAULT 0,
    last_updated BIGINT  NOT NULL
);
"#;

/// Create the entries and devices tables if they do not exist yet.
///
/// Idempotent; safe to run on every startup.
pub async fn ensure_schema(client: &PostgresClient) -> Result<()> {
    let conn = client.get_connection().await?;
    conn.batch_execute(SCHEMA)
        .await
        .context("failed to create schema")?;
    info!("postgres schema ready");
    Ok(())
}
