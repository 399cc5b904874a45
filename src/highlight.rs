//! Highlight record and reading-order comparison

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::locator::Locator;

/// A persisted user highlight or annotation
///
/// `id` is assigned by the store at first insert and never changes.
/// `frame_id` is the identifier the rendering surface gave the highlight for
/// the current render session; it correlates live UI events to this record
/// but is not a durable primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    /// Store-assigned identity; `None` until the first insert
    pub id: Option<i64>,
    /// Publication the highlight belongs to; empty string means "ungrouped"
    #[serde(rename = "publicationId")]
    pub publication_id: String,
    /// Ordinal of the resource within the publication's reading order
    #[serde(rename = "resourceIndex")]
    pub resource_index: i64,
    pub locator: Locator,
    #[serde(rename = "creationDate")]
    pub creation_date: DateTime<Utc>,
    /// Free-text note; empty string means "no note"
    pub annotation: String,
    /// Serialized color (a JSON object with components), opaque to the store
    pub color: String,
    /// Display style tag, e.g. "highlight" or "annotated"
    pub style: String,
    #[serde(rename = "annotationMarkStyle")]
    pub annotation_mark_style: String,
    /// Serialized selection-range metadata from the rendering surface
    #[serde(rename = "selectionInfo")]
    pub selection_info: String,
    /// Render-session tag from the document surface
    #[serde(rename = "frameId")]
    pub frame_id: String,
    /// Correlation key for annotation-specific UI flows
    #[serde(rename = "annotationId")]
    pub annotation_id: String,
}

impl Highlight {
    /// Create a new, not-yet-persisted highlight
    pub fn new(
        publication_id: impl Into<String>,
        resource_index: i64,
        locator: Locator,
        frame_id: impl Into<String>,
    ) -> Self {
        Highlight {
            id: None,
            publication_id: publication_id.into(),
            resource_index,
            locator,
            creation_date: Utc::now(),
            annotation: String::new(),
            color: String::new(),
            style: String::new(),
            annotation_mark_style: String::new(),
            selection_info: String::new(),
            frame_id: frame_id.into(),
            annotation_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Compare two highlights by reading order
///
/// Within the same resource, discrete positions order before continuous
/// progressions, and a record missing both sorts after records that carry
/// either. The final tie-break is the store identity, so equal positions keep
/// insertion order. This makes the ordering total and deterministic.
pub fn reading_order(a: &Highlight, b: &Highlight) -> Ordering {
    if a.resource_index != b.resource_index {
        return a.resource_index.cmp(&b.resource_index);
    }

    let la = &a.locator.locations;
    let lb = &b.locator.locations;

    let by_location = match (la.position, lb.position) {
        (Some(pa), Some(pb)) => pa.cmp(&pb),
        // Records with a discrete position sort before progression-only ones
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => match (la.progression, lb.progression) {
            (Some(pa), Some(pb)) => pa.total_cmp(&pb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };

    // None sorts last so unsaved records trail their persisted peers
    by_location.then_with(|| match (a.id, b.id) {
        (Some(ia), Some(ib)) => ia.cmp(&ib),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}
