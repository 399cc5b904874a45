//! Cached, ordered view over the highlight store for one publication
//!
//! The collection is the façade the reader UI queries and mutates. It keeps a
//! read-mostly cache of the publication's highlights sorted in reading order;
//! the cache is refreshed by [`HighlightCollection::reload`], which every
//! mutating method calls after a successful write. There is no live
//! subscription to the store.

use crate::db::HighlightStore;
use crate::error::{HighlightError, Result};
use crate::highlight::{reading_order, Highlight};

/// Outcome of an upsert, telling the caller which path was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No record was correlated with the frame id; a new row was inserted
    Inserted(i64),
    /// An existing record was updated in place
    Updated,
}

/// In-memory, reading-ordered collection of one publication's highlights
pub struct HighlightCollection {
    store: HighlightStore,
    publication_id: Option<String>,
    highlights: Vec<Highlight>,
}

impl HighlightCollection {
    /// Open the unscoped view over every stored highlight
    pub async fn all(store: HighlightStore) -> Result<Self> {
        Self::open(store, None).await
    }

    /// Open the view scoped to a single publication
    pub async fn for_publication(
        store: HighlightStore,
        publication_id: impl Into<String>,
    ) -> Result<Self> {
        Self::open(store, Some(publication_id.into())).await
    }

    async fn open(store: HighlightStore, publication_id: Option<String>) -> Result<Self> {
        let mut collection = Self {
            store,
            publication_id,
            highlights: Vec::new(),
        };
        collection.reload().await?;
        Ok(collection)
    }

    pub fn publication_id(&self) -> Option<&str> {
        self.publication_id.as_deref()
    }

    /// Re-fetch the cache from the store and sort it in reading order
    pub async fn reload(&mut self) -> Result<()> {
        let mut highlights = self
            .store
            .list(self.publication_id.as_deref(), None)
            .await?;
        highlights.sort_by(reading_order);
        self.highlights = highlights;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.highlights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }

    /// Bounds-checked access into the sorted cache
    pub fn get(&self, index: usize) -> Option<&Highlight> {
        self.highlights.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Highlight> {
        self.highlights.iter()
    }

    /// Fetch the highlights for one resource, bypassing the cache
    pub async fn by_resource(&self, href: &str) -> Result<Vec<Highlight>> {
        self.store
            .list_by_resource(self.publication_id.as_deref(), Some(href))
            .await
    }

    /// Fetch the highlight correlated with a render frame id
    pub async fn by_frame_id(&self, frame_id: &str) -> Result<Option<Highlight>> {
        self.store.find_by_frame_id(frame_id).await
    }

    /// Insert-or-update keyed on the highlight's frame id
    ///
    /// Existence is judged by frame id alone; the store's compound unique
    /// index backstops the window between the lookup and the insert, and an
    /// insert losing that race falls back to the update path. Reloads the
    /// cache on success.
    pub async fn upsert_by_frame_id(&mut self, highlight: &mut Highlight) -> Result<Upsert> {
        let outcome = if self.store.find_by_frame_id(&highlight.frame_id).await?.is_none() {
            match self.store.insert(highlight).await {
                Ok(id) => {
                    highlight.id = Some(id);
                    Upsert::Inserted(id)
                }
                Err(HighlightError::DuplicateExists) => {
                    tracing::debug!(
                        frame_id = %highlight.frame_id,
                        "insert raced an identical highlight; updating instead"
                    );
                    self.store.update(highlight).await?;
                    Upsert::Updated
                }
                Err(e) => return Err(e),
            }
        } else {
            self.store.update(highlight).await?;
            Upsert::Updated
        };

        self.reload().await?;
        Ok(outcome)
    }

    /// Insert a new highlight, assigning its id, and reload the cache
    pub async fn add(&mut self, highlight: &mut Highlight) -> Result<i64> {
        let id = self.store.insert(highlight).await.map_err(|e| {
            tracing::warn!(frame_id = %highlight.frame_id, error = %e, "failed to add highlight");
            e
        })?;
        highlight.id = Some(id);
        self.reload().await?;
        Ok(id)
    }

    /// Update the highlight matching the record's frame id and reload
    pub async fn change(&mut self, highlight: &Highlight) -> Result<()> {
        self.store.update(highlight).await.map_err(|e| {
            tracing::warn!(frame_id = %highlight.frame_id, error = %e, "failed to change highlight");
            e
        })?;
        self.reload().await
    }

    /// Remove the highlight at a cache position
    ///
    /// Always reloads after a successful delete rather than splicing the
    /// cache, so the cache can never drift from storage.
    pub async fn remove_at(&mut self, index: usize) -> Result<()> {
        let highlight = self
            .highlights
            .get(index)
            .cloned()
            .ok_or_else(|| {
                HighlightError::InvalidArgument(format!("index {index} out of bounds"))
            })?;
        self.remove(&highlight).await
    }

    /// Remove a highlight by its store identity and reload
    pub async fn remove(&mut self, highlight: &Highlight) -> Result<()> {
        self.store.delete(highlight).await.map_err(|e| {
            tracing::warn!(id = ?highlight.id, error = %e, "failed to remove highlight");
            e
        })?;
        self.reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{sample_highlight, test_store};

    #[tokio::test]
    async fn reload_sorts_by_resource_index() {
        let (store, _dir) = test_store().await;

        for (frame_id, index) in [("H2", 2_i64), ("H0", 0), ("H1", 1)] {
            let mut h = sample_highlight(frame_id, index);
            h.locator.locations = Default::default();
            store.insert(&h).await.unwrap();
        }

        let collection = HighlightCollection::for_publication(store, "pub1")
            .await
            .unwrap();

        let order: Vec<i64> = collection.iter().map(|h| h.resource_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn position_tie_break_within_resource() {
        let (store, _dir) = test_store().await;

        let mut a = sample_highlight("H5", 1);
        a.locator.locations.position = Some(5);
        a.selection_info = "a".to_string();
        let mut b = sample_highlight("H3", 1);
        b.locator.locations.position = Some(3);
        b.selection_info = "b".to_string();

        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        let collection = HighlightCollection::for_publication(store, "pub1")
            .await
            .unwrap();

        assert_eq!(collection.get(0).unwrap().frame_id, "H3");
        assert_eq!(collection.get(1).unwrap().frame_id, "H5");
        assert!(collection.get(2).is_none());
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let (store, _dir) = test_store().await;
        let mut collection = HighlightCollection::for_publication(store, "pub1")
            .await
            .unwrap();

        let mut highlight = sample_highlight("H1", 0);
        let first = collection.upsert_by_frame_id(&mut highlight).await.unwrap();
        assert!(matches!(first, Upsert::Inserted(_)));
        assert!(highlight.id.is_some());

        let second = collection.upsert_by_frame_id(&mut highlight).await.unwrap();
        assert_eq!(second, Upsert::Updated);
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn scoped_collection_ignores_other_publications() {
        let (store, _dir) = test_store().await;

        let mut other = sample_highlight("H9", 0);
        other.publication_id = "pub2".to_string();
        store.insert(&other).await.unwrap();
        store.insert(&sample_highlight("H1", 0)).await.unwrap();

        let scoped = HighlightCollection::for_publication(store.clone(), "pub1")
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);

        let all = HighlightCollection::all(store).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn remove_at_out_of_bounds_is_invalid_argument() {
        let (store, _dir) = test_store().await;
        let mut collection = HighlightCollection::for_publication(store, "pub1")
            .await
            .unwrap();

        let err = collection.remove_at(0).await.unwrap_err();
        assert!(matches!(err, HighlightError::InvalidArgument(_)));
    }

    /// Full lifecycle: insert, annotate, delete, observed through the cache
    #[tokio::test]
    async fn end_to_end_scenario() {
        let (store, _dir) = test_store().await;
        let mut collection = HighlightCollection::for_publication(store, "pub1")
            .await
            .unwrap();

        let mut a = sample_highlight("H1", 0);
        a.color = r#"{"red":249,"green":239,"blue":125}"#.to_string();
        collection.add(&mut a).await.unwrap();
        collection.reload().await.unwrap();

        let cached = collection.get(0).unwrap();
        assert!(cached.id.is_some());
        assert_eq!(cached.color, r#"{"red":249,"green":239,"blue":125}"#);

        let mut edited = cached.clone();
        edited.annotation = "note".to_string();
        collection.change(&edited).await.unwrap();

        let fetched = collection.by_frame_id("H1").await.unwrap().unwrap();
        assert_eq!(fetched.annotation, "note");

        collection.remove_at(0).await.unwrap();
        assert!(collection.is_empty());
        assert!(collection.by_frame_id("H1").await.unwrap().is_none());
    }
}
