//! Locator value types
//!
//! A [`Locator`] is an immutable reference to a position within one resource
//! of a publication: the resource's href and media type, plus optional
//! structured locations (discrete position, continuous progression) and the
//! captured text around the highlight. The JSON shape follows the Readium
//! locator model so stored blobs stay interoperable with reader frontends.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Position within a publication resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    /// Href of the resource inside the publication
    pub href: String,
    /// Media type of the resource
    #[serde(rename = "type")]
    pub media_type: String,
    /// Title of the resource or chapter, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Structured locations within the resource
    #[serde(default)]
    pub locations: Locations,
    /// Captured text around the highlight, used for re-anchoring and display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<LocatorText>,
}

impl Locator {
    pub fn new(href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Locator {
            href: href.into(),
            media_type: media_type.into(),
            title: None,
            locations: Locations::default(),
            text: None,
        }
    }
}

/// Structured locations within a resource
///
/// Both `position` and `progression` may be absent; ordering falls back to
/// the resource index in that case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Locations {
    /// Fragment identifier within the resource (e.g. a CFI)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    /// Progression through the resource, in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progression: Option<f64>,
    /// Discrete ordinal position (page or paragraph number)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    /// Progression through the whole publication, in [0, 1]
    #[serde(rename = "totalProgression", skip_serializing_if = "Option::is_none")]
    pub total_progression: Option<f64>,
}

/// Text captured around a highlight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorText {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl Locations {
    /// Serialize to the JSON blob stored in the database
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a stored blob; empty text means "no locations"
    pub fn from_json(json: &str) -> Result<Self> {
        if json.is_empty() {
            return Ok(Locations::default());
        }
        Ok(serde_json::from_str(json)?)
    }
}

impl LocatorText {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Option<Self>> {
        if json.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(json)?))
    }
}
