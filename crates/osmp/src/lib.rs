//! # osmp
//!
//! Trail, junction and access point lookups against the City of Boulder
//! Open Space and Mountain Parks MapServers.
//!
//! ## Example
//!
//! ```no_run
//! use osmp::prelude::*;
//!
//! # async fn run() -> Result<(), OsmpError> {
//! let osmp = Osmp::new()?;
//! if let Some(trail) = osmp.trail(&TrailId::parse("047-012-013")).await? {
//!     println!("{:?}: {:?}", trail.name(), trail.latlon_coords());
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod feature;
pub mod service;
pub mod trail_id;

// Re-exports for convenience
pub mod prelude {
    pub use crate::catalog::Osmp;
    pub use crate::error::OsmpError;
    pub use crate::feature::{OsmpFeature, OsmpKind};
    pub use crate::service::{DEFAULT_ROOT, OsmpService};
    pub use crate::trail_id::{SegmentId, TrailId};
}

pub use prelude::*;
