//! Typed event bridge between the rendering surface and the collection
//!
//! The rendering surface reports what it drew and what the user asked for as
//! [`ReaderEvent`] values; the [`ReaderBridge`] applies them to a
//! [`HighlightCollection`] and drives re-drawing through the outbound
//! [`HighlightRenderer`] interface. This replaces the stringly-typed
//! notification bus of older reader apps with tagged variants.

use tokio::sync::mpsc;

use crate::collection::{HighlightCollection, Upsert};
use crate::error::{HighlightError, Result};
use crate::highlight::Highlight;
use crate::locator::Locator;

/// Style tag for a plain highlight
pub const STYLE_HIGHLIGHT: &str = "highlight";
/// Style tag for a highlight carrying an annotation
pub const STYLE_ANNOTATED: &str = "annotated";

/// Event reported by the document rendering surface
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    /// The surface finished drawing a new highlight
    HighlightDrawn {
        frame_id: String,
        locator: Locator,
        selection_info: String,
    },
    /// The user picked a new color or style for an existing highlight
    StyleChangeRequested {
        frame_id: String,
        color: String,
        style: String,
    },
    /// The user asked to remove a highlight
    DeleteRequested { frame_id: String },
    /// The user edited the free-text note attached to a highlight
    AnnotationEdited { frame_id: String, annotation: String },
}

/// Outbound interface the bridge uses to re-draw persisted highlights
pub trait HighlightRenderer: Send + Sync {
    fn render_highlight(&self, frame_id: &str, locator: &Locator, style: &str, color: &str);
}

/// Applies reader events to the collection and re-draws on resource load
pub struct ReaderBridge<R: HighlightRenderer> {
    collection: HighlightCollection,
    renderer: R,
    /// Ordered resource hrefs of the publication, used to derive the
    /// resource index for newly drawn highlights
    reading_order: Vec<String>,
}

impl<R: HighlightRenderer> ReaderBridge<R> {
    pub fn new(collection: HighlightCollection, renderer: R, reading_order: Vec<String>) -> Self {
        Self {
            collection,
            renderer,
            reading_order,
        }
    }

    pub fn collection(&self) -> &HighlightCollection {
        &self.collection
    }

    /// Apply one event, returning the typed error for callers that branch
    pub async fn handle(&mut self, event: ReaderEvent) -> Result<()> {
        match event {
            ReaderEvent::HighlightDrawn {
                frame_id,
                locator,
                selection_info,
            } => {
                let resource_index = self.resource_index_of(&locator.href);
                let publication_id = self
                    .collection
                    .publication_id()
                    .unwrap_or_default()
                    .to_string();

                let mut highlight =
                    Highlight::new(publication_id, resource_index, locator, frame_id);
                highlight.selection_info = selection_info;
                highlight.style = STYLE_HIGHLIGHT.to_string();

                let outcome = self.collection.upsert_by_frame_id(&mut highlight).await?;
                if let Upsert::Inserted(id) = outcome {
                    tracing::debug!(id, frame_id = %highlight.frame_id, "highlight persisted");
                }
                Ok(())
            }
            ReaderEvent::StyleChangeRequested {
                frame_id,
                color,
                style,
            } => {
                let mut highlight = self.require(&frame_id).await?;
                highlight.color = color;
                highlight.style = style;
                self.collection.change(&highlight).await
            }
            ReaderEvent::DeleteRequested { frame_id } => {
                let highlight = self.require(&frame_id).await?;
                self.collection.remove(&highlight).await
            }
            ReaderEvent::AnnotationEdited {
                frame_id,
                annotation,
            } => {
                let mut highlight = self.require(&frame_id).await?;
                highlight.annotation = annotation;
                highlight.style = STYLE_ANNOTATED.to_string();
                self.collection.change(&highlight).await
            }
        }
    }

    /// Re-draw every persisted highlight of a freshly loaded resource
    ///
    /// Returns how many highlights were handed to the renderer.
    pub async fn resource_loaded(&mut self, href: &str) -> Result<usize> {
        self.collection.reload().await?;

        let mut drawn = 0;
        for highlight in self.collection.iter() {
            if highlight.locator.href == href {
                self.renderer.render_highlight(
                    &highlight.frame_id,
                    &highlight.locator,
                    &highlight.style,
                    &highlight.color,
                );
                drawn += 1;
            }
        }
        Ok(drawn)
    }

    /// Consume events from a channel until the sending side closes
    ///
    /// Failures are logged and never propagate to the UI task; callers that
    /// need to branch on the error kind use [`ReaderBridge::handle`] directly.
    pub async fn run(mut self, mut events: mpsc::Receiver<ReaderEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(event).await {
                if e.is_not_found() {
                    tracing::warn!(error = %e, "reader event targeted a missing highlight");
                } else {
                    tracing::error!(error = %e, "failed to apply reader event");
                }
            }
        }
    }

    async fn require(&self, frame_id: &str) -> Result<Highlight> {
        self.collection
            .by_frame_id(frame_id)
            .await?
            .ok_or(HighlightError::NotFound)
    }

    fn resource_index_of(&self, href: &str) -> i64 {
        match self.reading_order.iter().position(|r| r == href) {
            Some(index) => index as i64,
            None => {
                tracing::warn!(href, "resource not in reading order; using index 0");
                0
            }
        }
    }
}
