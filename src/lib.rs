//! Marginalia
//!
//! A local highlight and annotation store for paginated documents. The crate
//! persists user-created highlights in SQLite, keeps them ordered by reading
//! position, and reconciles updates arriving from an asynchronous document
//! rendering surface with the durable store.
//!
//! # Modules
//!
//! - `locator`: position value types (resource href, discrete position,
//!   continuous progression, captured text)
//! - `highlight`: the persisted highlight record and reading-order comparator
//! - `db`: SQLite pool, schema migration, and the [`db::HighlightStore`]
//! - `collection`: cached, reading-ordered façade over the store for one
//!   publication
//! - `events`: typed bridge between the rendering surface and the collection
//!
//! Rendering, gesture handling, color pickers, DRM and catalog browsing are
//! external collaborators; they talk to this crate through
//! [`events::ReaderEvent`] and [`events::HighlightRenderer`].

pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod highlight;
pub mod locator;

pub use collection::{HighlightCollection, Upsert};
pub use config::Config;
pub use db::{create_pool, HighlightStore};
pub use error::{HighlightError, Result};
pub use events::{HighlightRenderer, ReaderBridge, ReaderEvent};
pub use highlight::{reading_order, Highlight};
pub use locator::{Locations, Locator, LocatorText};
