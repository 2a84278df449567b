//! Real-time client state engine for CloudPark facilities
//!
//! Two independent state machines:
//!
//! - **Occupancy synchronizer**: reconciles the periodically polled
//!   zone/occupancy snapshot with the pushed spot-status stream, reconnecting
//!   to the stream on its own, and publishes an immutable [`MonitorView`]
//!   (spot statuses, aggregate counts, live/offline, activity feed).
//! - **Navigation stepper**: turns a route's instruction tokens into a
//!   driver-facing step sequence advanced by "continue" actions.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cloudpark_monitor::{
//!     ApiClient, MonitorConfig, NavigationSession, RouteRequest, SyncSettings, Synchronizer,
//!     WsEventSource,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitorConfig::default();
//! let api = Arc::new(ApiClient::new(&config.api)?);
//!
//! // Operator view
//! let sync = Synchronizer::start(
//!     api.clone(),
//!     Arc::new(WsEventSource::new(config.events.url.clone())),
//!     SyncSettings::from(&config),
//! );
//! let view = sync.view();
//! println!("{:.0}% occupied", view.occupancy().rate() * 100.0);
//!
//! // Driver guidance
//! let mut session = NavigationSession::load(api.as_ref(), RouteRequest::to_spot(12)).await;
//! while session.advance() {}
//!
//! sync.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod navigation;
pub mod sync;
pub mod types;
pub mod view;

// Re-export main types
pub use client::{ApiClient, RouteRequest, RouteSource, SnapshotSource};
pub use config::{ApiConfig, EventsConfig, MonitorConfig, SyncConfig};
pub use error::{MonitorError, Result};
pub use events::{EventSource, EventStream, WsEventSource};
pub use feed::{ActivityFeed, FeedEntry, FEED_CAPACITY};
pub use navigation::{Instruction, InstructionDisplay, NavigationSession, StepProgress, StepperState};
pub use sync::{EventOutcome, LinkState, OccupancyState, SyncSettings, Synchronizer};
pub use types::*;
pub use view::MonitorView;
