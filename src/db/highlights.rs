//! Highlights database operations

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::error::{HighlightError, Result};
use crate::highlight::Highlight;
use crate::locator::{Locations, Locator, LocatorText};

/// Flattened database row for a highlight
#[derive(Debug, sqlx::FromRow)]
struct HighlightRow {
    id: i64,
    publication_id: String,
    resource_index: i64,
    resource_href: String,
    resource_type: String,
    resource_title: String,
    locations: String,
    locator_text: String,
    creation_date: String,
    annotation: String,
    color: String,
    style: String,
    annotation_mark_style: String,
    selection_info: String,
    frame_id: String,
    annotation_id: String,
}

const SELECT_COLUMNS: &str = "id, publication_id, resource_index, resource_href, \
     resource_type, resource_title, locations, locator_text, creation_date, \
     annotation, color, style, annotation_mark_style, selection_info, frame_id, \
     annotation_id";

impl TryFrom<HighlightRow> for Highlight {
    type Error = HighlightError;

    fn try_from(row: HighlightRow) -> Result<Self> {
        let creation_date: DateTime<Utc> =
            DateTime::parse_from_rfc3339(&row.creation_date)?.with_timezone(&Utc);

        Ok(Highlight {
            id: Some(row.id),
            publication_id: row.publication_id,
            resource_index: row.resource_index,
            locator: Locator {
                href: row.resource_href,
                media_type: row.resource_type,
                title: if row.resource_title.is_empty() {
                    None
                } else {
                    Some(row.resource_title)
                },
                locations: Locations::from_json(&row.locations)?,
                text: LocatorText::from_json(&row.locator_text)?,
            },
            creation_date,
            annotation: row.annotation,
            color: row.color,
            style: row.style,
            annotation_mark_style: row.annotation_mark_style,
            selection_info: row.selection_info,
            frame_id: row.frame_id,
            annotation_id: row.annotation_id,
        })
    }
}

/// Durable highlight store over a SQLite pool
///
/// The store is an owned, cloneable handle; inject it wherever highlights are
/// read or written instead of reaching for shared global state. Mutations are
/// serialized through an internal lock so two racing upserts cannot both
/// observe "absent" and insert twice.
#[derive(Clone)]
pub struct HighlightStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl HighlightStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Insert a highlight, returning its store-assigned id
    ///
    /// Duplicate detection matches on the compound identity
    /// `(publication_id, resource_href, resource_index, locations,
    /// selection_info, frame_id)`; a match yields
    /// [`HighlightError::DuplicateExists`] and no row is written.
    pub async fn insert(&self, highlight: &Highlight) -> Result<i64> {
        let locations = highlight.locator.locations.to_json()?;
        let locator_text = match &highlight.locator.text {
            Some(text) => text.to_json()?,
            None => String::new(),
        };

        let _guard = self.write_lock.lock().await;

        let (existing,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM highlights
            WHERE publication_id = ? AND resource_href = ? AND resource_index = ?
              AND locations = ? AND selection_info = ? AND frame_id = ?
            "#,
        )
        .bind(&highlight.publication_id)
        .bind(&highlight.locator.href)
        .bind(highlight.resource_index)
        .bind(&locations)
        .bind(&highlight.selection_info)
        .bind(&highlight.frame_id)
        .fetch_one(&self.pool)
        .await?;

        if existing > 0 {
            return Err(HighlightError::DuplicateExists);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO highlights (
                publication_id, resource_index, resource_href, resource_type,
                resource_title, locations, locator_text, creation_date,
                annotation, color, style, annotation_mark_style,
                selection_info, frame_id, annotation_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&highlight.publication_id)
        .bind(highlight.resource_index)
        .bind(&highlight.locator.href)
        .bind(&highlight.locator.media_type)
        .bind(highlight.locator.title.as_deref().unwrap_or_default())
        .bind(&locations)
        .bind(&locator_text)
        .bind(highlight.creation_date.to_rfc3339())
        .bind(&highlight.annotation)
        .bind(&highlight.color)
        .bind(&highlight.style)
        .bind(&highlight.annotation_mark_style)
        .bind(&highlight.selection_info)
        .bind(&highlight.frame_id)
        .bind(&highlight.annotation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // The unique index backstops the check above under races
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return HighlightError::DuplicateExists;
                }
            }
            HighlightError::Database(e)
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Update the mutable fields of the highlight matching `frame_id`
    ///
    /// Only `annotation`, `color` and `style` are written; locator and
    /// identity fields are immutable after insert. When stale rows from
    /// earlier render sessions share the frame id, only the most recently
    /// inserted row is touched, mirroring [`HighlightStore::find_by_frame_id`].
    pub async fn update(&self, highlight: &Highlight) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query(
            r#"
            UPDATE highlights
            SET annotation = ?, color = ?, style = ?
            WHERE id = (SELECT MAX(id) FROM highlights WHERE frame_id = ?)
            "#,
        )
        .bind(&highlight.annotation)
        .bind(&highlight.color)
        .bind(&highlight.style)
        .bind(&highlight.frame_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HighlightError::NotFound);
        }

        Ok(())
    }

    /// Delete a highlight by its store-assigned id
    pub async fn delete(&self, highlight: &Highlight) -> Result<()> {
        let id = highlight.id.ok_or_else(|| {
            HighlightError::InvalidArgument("cannot delete a highlight without an id".to_string())
        })?;

        let _guard = self.write_lock.lock().await;

        let result = sqlx::query("DELETE FROM highlights WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(HighlightError::NotFound);
        }

        Ok(())
    }

    /// List highlights in storage order, optionally filtered by publication
    /// and resource index
    ///
    /// Storage order is insertion order; reading order is the collection's
    /// concern.
    pub async fn list(
        &self,
        publication_id: Option<&str>,
        resource_index: Option<i64>,
    ) -> Result<Vec<Highlight>> {
        let rows: Vec<HighlightRow> = match (publication_id, resource_index) {
            (Some(publication_id), Some(resource_index)) => {
                sqlx::query_as(&format!(
                    "SELECT {SELECT_COLUMNS} FROM highlights \
                     WHERE publication_id = ? AND resource_index = ? ORDER BY id"
                ))
                .bind(publication_id)
                .bind(resource_index)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(publication_id), None) => {
                sqlx::query_as(&format!(
                    "SELECT {SELECT_COLUMNS} FROM highlights \
                     WHERE publication_id = ? ORDER BY id"
                ))
                .bind(publication_id)
                .fetch_all(&self.pool)
                .await?
            }
            _ => {
                sqlx::query_as(&format!(
                    "SELECT {SELECT_COLUMNS} FROM highlights ORDER BY id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Highlight::try_from).collect()
    }

    /// List highlights for one resource of a publication
    ///
    /// Falls back to the unfiltered list when either filter is absent.
    pub async fn list_by_resource(
        &self,
        publication_id: Option<&str>,
        href: Option<&str>,
    ) -> Result<Vec<Highlight>> {
        let (Some(publication_id), Some(href)) = (publication_id, href) else {
            return self.list(None, None).await;
        };

        let rows: Vec<HighlightRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM highlights \
             WHERE publication_id = ? AND resource_href = ? ORDER BY id"
        ))
        .bind(publication_id)
        .bind(href)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Highlight::try_from).collect()
    }

    /// Find the highlight correlated with a render frame id
    ///
    /// Frame ids are only unique within one render session; when stale rows
    /// share the id, the most recently inserted row wins.
    pub async fn find_by_frame_id(&self, frame_id: &str) -> Result<Option<Highlight>> {
        let row: Option<HighlightRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM highlights \
             WHERE frame_id = ? ORDER BY id DESC LIMIT 1"
        ))
        .bind(frame_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Highlight::try_from).transpose()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::create_pool;
    use tempfile::TempDir;

    pub(crate) async fn test_store() -> (HighlightStore, TempDir) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite:{}", dir.path().join("highlights.db").display()),
            max_connections: 5,
        };
        let pool = create_pool(&config).await.unwrap();
        (HighlightStore::new(pool), dir)
    }

    pub(crate) fn sample_highlight(frame_id: &str, resource_index: i64) -> Highlight {
        let mut locator = Locator::new("chapter1.xhtml", "application/xhtml+xml");
        locator.title = Some("Chapter 1".to_string());
        locator.locations.position = Some(10);
        locator.locations.progression = Some(0.1);
        locator.text = Some(LocatorText {
            before: Some("before ".to_string()),
            highlight: Some("the highlighted words".to_string()),
            after: Some(" after".to_string()),
        });

        let mut highlight = Highlight::new("pub1", resource_index, locator, frame_id);
        highlight.color = r#"{"red":249,"green":239,"blue":125}"#.to_string();
        highlight.style = "highlight".to_string();
        highlight.selection_info = r#"{"start":4,"end":25}"#.to_string();
        highlight
    }

    #[tokio::test]
    async fn insert_assigns_id_and_round_trips() {
        let (store, _dir) = test_store().await;
        let highlight = sample_highlight("H1", 0);

        let id = store.insert(&highlight).await.unwrap();
        assert!(id > 0);

        let fetched = store.find_by_frame_id("H1").await.unwrap().unwrap();
        assert_eq!(fetched.id, Some(id));
        assert_eq!(fetched.publication_id, highlight.publication_id);
        assert_eq!(fetched.locator, highlight.locator);
        assert_eq!(fetched.color, highlight.color);
        assert_eq!(fetched.selection_info, highlight.selection_info);
        assert_eq!(fetched.annotation_id, highlight.annotation_id);
        assert_eq!(
            fetched.creation_date.timestamp(),
            highlight.creation_date.timestamp()
        );
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let (store, _dir) = test_store().await;
        let highlight = sample_highlight("H1", 0);

        store.insert(&highlight).await.unwrap();
        let err = store.insert(&highlight).await.unwrap_err();
        assert!(matches!(err, HighlightError::DuplicateExists));

        let all = store.list(None, None).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn update_targets_frame_id_and_preserves_locator() {
        let (store, _dir) = test_store().await;
        let mut highlight = sample_highlight("H1", 0);
        highlight.id = Some(store.insert(&highlight).await.unwrap());

        highlight.annotation = "a note".to_string();
        highlight.color = r#"{"red":0,"green":0,"blue":255}"#.to_string();
        highlight.style = "annotated".to_string();
        store.update(&highlight).await.unwrap();

        let fetched = store.find_by_frame_id("H1").await.unwrap().unwrap();
        assert_eq!(fetched.annotation, "a note");
        assert_eq!(fetched.style, "annotated");
        assert_eq!(fetched.locator.locations.position, Some(10));
    }

    #[tokio::test]
    async fn update_missing_frame_id_is_not_found() {
        let (store, _dir) = test_store().await;
        let highlight = sample_highlight("missing", 0);

        let err = store.update(&highlight).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_requires_id() {
        let (store, _dir) = test_store().await;
        let highlight = sample_highlight("H1", 0);

        let err = store.delete(&highlight).await.unwrap_err();
        assert!(matches!(err, HighlightError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn delete_then_lookup_is_absent() {
        let (store, _dir) = test_store().await;
        let mut highlight = sample_highlight("H1", 0);
        highlight.id = Some(store.insert(&highlight).await.unwrap());

        store.delete(&highlight).await.unwrap();
        assert!(store.find_by_frame_id("H1").await.unwrap().is_none());

        let err = store.delete(&highlight).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_filters_by_publication_and_resource() {
        let (store, _dir) = test_store().await;

        let mut a = sample_highlight("H1", 0);
        let mut b = sample_highlight("H2", 1);
        b.locator.href = "chapter2.xhtml".to_string();
        let mut c = sample_highlight("H3", 0);
        c.publication_id = "pub2".to_string();

        for h in [&mut a, &mut b, &mut c] {
            h.id = Some(store.insert(h).await.unwrap());
        }

        assert_eq!(store.list(None, None).await.unwrap().len(), 3);
        assert_eq!(store.list(Some("pub1"), None).await.unwrap().len(), 2);
        assert_eq!(store.list(Some("pub1"), Some(1)).await.unwrap().len(), 1);

        let by_resource = store
            .list_by_resource(Some("pub1"), Some("chapter2.xhtml"))
            .await
            .unwrap();
        assert_eq!(by_resource.len(), 1);
        assert_eq!(by_resource[0].frame_id, "H2");
    }

    #[tokio::test]
    async fn find_by_frame_id_prefers_most_recent() {
        let (store, _dir) = test_store().await;

        let first = sample_highlight("H1", 0);
        store.insert(&first).await.unwrap();

        // Same frame id reassigned in a later session, different selection
        let mut second = sample_highlight("H1", 3);
        second.locator.href = "chapter4.xhtml".to_string();
        second.selection_info = r#"{"start":0,"end":2}"#.to_string();
        store.insert(&second).await.unwrap();

        let found = store.find_by_frame_id("H1").await.unwrap().unwrap();
        assert_eq!(found.resource_index, 3);
    }

    #[tokio::test]
    async fn update_leaves_stale_frame_id_rows_untouched() {
        let (store, _dir) = test_store().await;

        let stale = sample_highlight("H1", 0);
        store.insert(&stale).await.unwrap();

        // Same frame id reassigned to a new highlight in a later session
        let mut current = sample_highlight("H1", 3);
        current.locator.href = "chapter4.xhtml".to_string();
        current.selection_info = r#"{"start":0,"end":2}"#.to_string();
        store.insert(&current).await.unwrap();

        current.annotation = "note for the current session".to_string();
        store.update(&current).await.unwrap();

        let stale_row = &store.list(Some("pub1"), Some(0)).await.unwrap()[0];
        assert_eq!(stale_row.annotation, "");

        let current_row = store.find_by_frame_id("H1").await.unwrap().unwrap();
        assert_eq!(current_row.annotation, "note for the current session");
    }
}
