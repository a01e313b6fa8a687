//! Project-wide resolution state.
//!
//! [`ProjectResolutionState`] keeps one holder per crate with the last
//! published [`CrateDefMap`](crate::hir::CrateDefMap) and the bookkeeping that
//! decides whether it is still valid:
//!
//! ```text
//! Fresh          holder stamp == structure stamp, nothing flagged
//! NeedsRecheck   structure changed somewhere; compare stamps and hashes
//! NeedsRebuild   known dirty; run the collector again
//! ```
//!
//! Change hooks only flip flags. The actual work happens when a caller asks
//! for a map ([`ProjectResolutionState::get_or_update`]) or for a full
//! update ([`ProjectResolutionState::update_all`]).

mod service;
mod update;

pub use service::{DefMapState, ProjectResolutionState};
pub use update::UpdateReport;
