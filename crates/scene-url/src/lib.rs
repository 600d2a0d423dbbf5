//! Scene URL - query parameter synchronisation for scene graphs
//!
//! Mirrors the URL-syncable state of a scene tree into the location's query
//! string and applies navigation back to the tree.
//!
//! # Core Concepts
//!
//! - [`LocationService`]: where the query lives; [`MemoryLocation`] for tests
//! - [`UrlQuery`]: ordered query parameters with repeated keys
//! - [`UniqueUrlKeyMapper`]: `from`, `from-2`, ... for competing claimants
//! - [`UrlSyncManager`]: binds one tree to one location
//!
//! # Example
//!
//! ```rust
//! use scene_graph::objects::time_range;
//! use scene_graph::{SceneContext, StatePatch};
//! use scene_url::{MemoryLocation, UrlQuery, UrlSyncManager};
//! use std::sync::Arc;
//!
//! let ctx = SceneContext::new();
//! let range = time_range("now-6h", "now", &ctx).unwrap();
//! let location = MemoryLocation::with_query("/d/abc", UrlQuery::parse("from=now-1h"));
//!
//! let manager = UrlSyncManager::new(Arc::new(location.clone()));
//! manager.init_sync(&range);
//! assert_eq!(range.get_str("from").as_deref(), Some("now-1h"));
//!
//! range.set_state(StatePatch::new().set("to", "now-5m")).unwrap();
//! assert_eq!(location.href(), "/d/abc?from=now-1h&to=now-5m");
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod key_mapper;
pub mod location;
pub mod sync;

// Re-exports for convenience
pub use error::LocationError;
pub use key_mapper::UniqueUrlKeyMapper;
pub use location::{LocationListener, LocationService, MemoryLocation, UrlQuery};
pub use sync::UrlSyncManager;

pub use scene_graph::{UrlState, UrlValue};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
