//! Database schema initialization
//!
//! The schema carries a user-visible version counter (`PRAGMA user_version`).
//! Version 0 marks a database created before the current highlight columns
//! existed; the migration for it is destructive (drop and recreate), so any
//! highlights stored at version 0 are lost. The operator is warned when this
//! happens.

use sqlx::SqlitePool;

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    let (version,): (i64,) = sqlx::query_as("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    if version == 0 {
        tracing::warn!(
            from_version = version,
            to_version = SCHEMA_VERSION,
            "migrating highlight schema by dropping the table; all previously \
             stored highlights are deleted"
        );
        sqlx::query("DROP TABLE IF EXISTS highlights")
            .execute(pool)
            .await?;
        // PRAGMA does not support bind parameters
        sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
            .execute(pool)
            .await?;
    }

    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Highlights table
CREATE TABLE IF NOT EXISTS highlights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    publication_id TEXT NOT NULL DEFAULT '',
    resource_index INTEGER NOT NULL DEFAULT 0,
    resource_href TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    resource_title TEXT NOT NULL DEFAULT '',
    -- Serialized location JSON, owned by the Locations value type
    locations TEXT NOT NULL DEFAULT '',
    -- Serialized captured-text JSON, owned by the LocatorText value type
    locator_text TEXT NOT NULL DEFAULT '',
    creation_date TEXT NOT NULL,
    annotation TEXT NOT NULL DEFAULT '',
    color TEXT NOT NULL DEFAULT '',
    style TEXT NOT NULL DEFAULT '',
    annotation_mark_style TEXT NOT NULL DEFAULT '',
    selection_info TEXT NOT NULL DEFAULT '',
    frame_id TEXT NOT NULL DEFAULT '',
    annotation_id TEXT NOT NULL DEFAULT ''
);

-- Compound identity: at most one row per highlight as reported by the
-- rendering surface. Backstops the pre-insert duplicate check.
CREATE UNIQUE INDEX IF NOT EXISTS idx_highlights_identity
    ON highlights(publication_id, resource_href, resource_index,
                  locations, selection_info, frame_id);

CREATE INDEX IF NOT EXISTS idx_highlights_publication ON highlights(publication_id);
CREATE INDEX IF NOT EXISTS idx_highlights_resource ON highlights(publication_id, resource_href);
CREATE INDEX IF NOT EXISTS idx_highlights_frame ON highlights(frame_id);
"#;
