//! Occupancy synchronizer
//!
//! Merges two independently failing inputs into one read model:
//!
//! | Module         | Responsibility                                         |
//! |----------------|--------------------------------------------------------|
//! | `link`         | Connection state machine for the push channel          |
//! | `state`        | Roster, aggregate counts and feed; pure, no I/O        |
//! | `synchronizer` | Poll and reconnect loops driving `state`, teardown     |
//!
//! Periodic full snapshots are the correctness backstop; push events only
//! make the view fresher between pulls. Any drift from a lost or reordered
//! event is gone after the next successful snapshot.

pub mod link;
pub mod state;
pub mod synchronizer;

pub use link::LinkState;
pub use state::{EventOutcome, OccupancyState};
pub use synchronizer::{SyncSettings, Synchronizer};
