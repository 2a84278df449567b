//! Read-only view handed to the presentation layer
//!
//! A `MonitorView` is an immutable copy taken after each mutation of the
//! synchronizer state. Readers never see, or touch, the live roster.

use serde::Serialize;

use crate::feed::FeedEntry;
use crate::sync::LinkState;
use crate::types::{OccupancySnapshot, Spot, Zone};

#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorView {
    zones: Option<Vec<Zone>>,
    occupancy: OccupancySnapshot,
    link: LinkState,
    feed: Vec<FeedEntry>,
    revision: u64,
}

impl MonitorView {
    pub(crate) fn new(
        zones: Option<Vec<Zone>>,
        occupancy: OccupancySnapshot,
        link: LinkState,
        feed: Vec<FeedEntry>,
        revision: u64,
    ) -> Self {
        Self {
            zones,
            occupancy,
            link,
            feed,
            revision,
        }
    }

    /// Whether at least one snapshot has been applied
    pub fn has_roster(&self) -> bool {
        self.zones.is_some()
    }

    /// Zones of the last snapshot (empty before the first one)
    pub fn zones(&self) -> &[Zone] {
        self.zones.as_deref().unwrap_or(&[])
    }

    /// The zone shown by default: the first one in the roster
    pub fn primary_zone(&self) -> Option<&Zone> {
        self.zones().first()
    }

    pub fn zone(&self, zone_id: i64) -> Option<&Zone> {
        self.zones().iter().find(|z| z.id == zone_id)
    }

    /// All spots across zones, in roster order
    pub fn spots(&self) -> impl Iterator<Item = &Spot> {
        self.zones().iter().flat_map(|z| z.spots.iter())
    }

    pub fn spot(&self, spot_id: i64) -> Option<&Spot> {
        self.spots().find(|s| s.id == spot_id)
    }

    /// Aggregate counts; all zero before the first snapshot
    pub fn occupancy(&self) -> &OccupancySnapshot {
        &self.occupancy
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn is_live(&self) -> bool {
        self.link.is_live()
    }

    /// Recent status changes, most recent first
    pub fn feed(&self) -> &[FeedEntry] {
        &self.feed
    }

    /// Increases on every state change
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
