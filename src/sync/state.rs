//! Synchronizer state
//!
//! All mutation of the roster and aggregate counts goes through
//! [`OccupancyState::apply_snapshot`] and [`OccupancyState::on_status_event`].
//! Nothing here does I/O; the async driver calls in after each pull or
//! inbound message.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::link::LinkState;
use crate::feed::ActivityFeed;
use crate::types::{OccupancySnapshot, StatusChangeEvent, Zone};
use crate::view::MonitorView;

/// What happened to an inbound status message
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// A loaded spot changed status
    Applied(StatusChangeEvent),
    /// Accepted, but no loaded spot has this id (or no roster yet)
    Unmatched(StatusChangeEvent),
    /// Missing `spot_id` or `status`; ignored
    Discarded,
    /// Sent over a connection that is no longer the live one; ignored
    Stale,
}

impl EventOutcome {
    /// The event, if it was accepted
    pub fn accepted(&self) -> Option<&StatusChangeEvent> {
        match self {
            EventOutcome::Applied(event) | EventOutcome::Unmatched(event) => Some(event),
            EventOutcome::Discarded | EventOutcome::Stale => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct OccupancyState {
    roster: Option<Vec<Zone>>,
    occupancy: OccupancySnapshot,
    link: LinkState,
    next_epoch: u64,
    feed: ActivityFeed,
    revision: u64,
}

impl OccupancyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace roster and aggregate wholesale with freshly pulled data.
    ///
    /// Status changes applied from events since the last pull are dropped
    /// unless the new pull agrees with them.
    pub fn apply_snapshot(&mut self, zones: Vec<Zone>, occupancy: OccupancySnapshot) {
        debug!(
            zones = zones.len(),
            total = occupancy.total,
            occupied = occupancy.occupied,
            "Applying snapshot"
        );
        self.roster = Some(zones);
        self.occupancy = occupancy;
        self.bump();
    }

    /// Handle one inbound push message.
    ///
    /// Malformed payloads are discarded without touching the roster or the
    /// feed. Accepted events update the matching spot in place and are
    /// recorded in the feed.
    pub fn on_status_event(&mut self, payload: &str, observed_at: DateTime<Utc>) -> EventOutcome {
        let event = match StatusChangeEvent::parse(payload, observed_at) {
            Ok(event) => event,
            Err(reason) => {
                debug!(reason = %reason, "Discarding malformed spot event");
                return EventOutcome::Discarded;
            }
        };

        let matched = self.apply_event(&event);
        self.feed.record(&event);
        self.bump();

        if matched {
            debug!(spot_id = event.spot_id, status = %event.status, "Applied spot event");
            EventOutcome::Applied(event)
        } else {
            debug!(spot_id = event.spot_id, "Spot event matched no loaded spot");
            EventOutcome::Unmatched(event)
        }
    }

    /// Like [`on_status_event`](Self::on_status_event), but only for messages
    /// from the live connection `epoch`.
    pub fn on_connection_message(
        &mut self,
        epoch: u64,
        payload: &str,
        observed_at: DateTime<Utc>,
    ) -> EventOutcome {
        if !self.link.accepts(epoch) {
            debug!(epoch, link = ?self.link, "Ignoring message from replaced connection");
            return EventOutcome::Stale;
        }
        self.on_status_event(payload, observed_at)
    }

    fn apply_event(&mut self, event: &StatusChangeEvent) -> bool {
        let Some(zones) = self.roster.as_mut() else {
            return false;
        };
        let mut matched = false;
        for spot in zones
            .iter_mut()
            .flat_map(|z| z.spots.iter_mut())
            .filter(|s| s.id == event.spot_id)
        {
            spot.status = event.status;
            matched = true;
        }
        matched
    }

    pub fn begin_connect(&mut self, attempt: u32) {
        self.set_link(LinkState::Connecting { attempt });
    }

    /// Mark a new connection live and return its epoch
    pub fn connected(&mut self) -> u64 {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        self.set_link(LinkState::Live { epoch });
        epoch
    }

    pub fn disconnected(&mut self, attempt: u32) {
        self.set_link(LinkState::OfflinePendingRetry { attempt });
    }

    pub fn close(&mut self) {
        self.set_link(LinkState::Closed);
    }

    fn set_link(&mut self, link: LinkState) {
        if self.link != link {
            self.link = link;
            self.bump();
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn roster(&self) -> Option<&[Zone]> {
        self.roster.as_deref()
    }

    pub fn occupancy(&self) -> &OccupancySnapshot {
        &self.occupancy
    }

    pub fn feed(&self) -> &ActivityFeed {
        &self.feed
    }

    /// Immutable copy for readers
    pub fn view(&self) -> MonitorView {
        MonitorView::new(
            self.roster.clone(),
            self.occupancy,
            self.link,
            self.feed.to_vec(),
            self.revision,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Spot, SpotStatus};

    fn spot(id: i64, status: SpotStatus) -> Spot {
        Spot {
            id,
            name: format!("S{}", id),
            status,
            zone_id: Some(1),
            x1: Some(0),
            y1: Some(0),
            x2: Some(10),
            y2: Some(20),
        }
    }

    fn zone(spots: Vec<Spot>) -> Zone {
        Zone {
            id: 1,
            name: "Level 1".into(),
            total_spots: Some(spots.len() as u32),
            spots,
            grid: None,
        }
    }

    fn counts(total: u32, occupied: u32) -> OccupancySnapshot {
        OccupancySnapshot {
            total,
            occupied,
            free: total - occupied,
        }
    }

    #[test]
    fn test_event_changes_only_matching_spot() {
        let mut state = OccupancyState::new();
        state.apply_snapshot(
            vec![zone(vec![spot(1, SpotStatus::Free), spot(2, SpotStatus::Free)])],
            counts(2, 0),
        );
        let before = state.roster().unwrap()[0].spots[1].clone();

        let outcome = state.on_status_event(r#"{"spot_id": 1, "status": "occupied"}"#, Utc::now());

        assert!(matches!(outcome, EventOutcome::Applied(_)));
        let spots = &state.roster().unwrap()[0].spots;
        assert_eq!(spots[0].status, SpotStatus::Occupied);
        assert_eq!(spots[1], before);
        assert_eq!(state.feed().len(), 1);
    }

    #[test]
    fn test_malformed_event_is_discarded() {
        let mut state = OccupancyState::new();
        state.apply_snapshot(vec![zone(vec![spot(1, SpotStatus::Free)])], counts(1, 0));
        let roster = state.roster().unwrap().to_vec();
        let revision = state.view().revision();

        let outcome = state.on_status_event(r#"{"spot_id": 1}"#, Utc::now());

        assert_eq!(outcome, EventOutcome::Discarded);
        assert_eq!(state.roster().unwrap(), roster.as_slice());
        assert!(state.feed().is_empty());
        assert_eq!(state.view().revision(), revision);
    }

    #[test]
    fn test_event_before_roster_is_accepted() {
        let mut state = OccupancyState::new();
        let outcome = state.on_status_event(r#"{"spot_id": 4, "status": "free"}"#, Utc::now());

        assert!(matches!(outcome, EventOutcome::Unmatched(_)));
        assert!(outcome.accepted().is_some());
        assert!(state.roster().is_none());
        assert_eq!(state.feed().len(), 1);
    }

    #[test]
    fn test_snapshot_replaces_event_mutations() {
        let mut state = OccupancyState::new();
        state.apply_snapshot(
            vec![zone(vec![spot(1, SpotStatus::Free), spot(2, SpotStatus::Free)])],
            counts(2, 0),
        );
        state.on_status_event(r#"{"spot_id": 2, "status": "occupied"}"#, Utc::now());

        let pulled = vec![zone(vec![spot(1, SpotStatus::Occupied)])];
        state.apply_snapshot(pulled.clone(), counts(1, 1));

        assert_eq!(state.roster().unwrap(), pulled.as_slice());
        assert_eq!(*state.occupancy(), counts(1, 1));
    }

    #[test]
    fn test_stale_connection_messages_are_ignored() {
        let mut state = OccupancyState::new();
        state.apply_snapshot(vec![zone(vec![spot(1, SpotStatus::Free)])], counts(1, 0));

        let first = state.connected();
        state.disconnected(1);
        let second = state.connected();
        assert_ne!(first, second);

        let outcome = state.on_connection_message(
            first,
            r#"{"spot_id": 1, "status": "occupied"}"#,
            Utc::now(),
        );
        assert_eq!(outcome, EventOutcome::Stale);
        assert_eq!(state.roster().unwrap()[0].spots[0].status, SpotStatus::Free);

        let outcome = state.on_connection_message(
            second,
            r#"{"spot_id": 1, "status": "occupied"}"#,
            Utc::now(),
        );
        assert!(matches!(outcome, EventOutcome::Applied(_)));
    }

    #[test]
    fn test_messages_while_offline_are_ignored() {
        let mut state = OccupancyState::new();
        let epoch = state.connected();
        state.disconnected(1);

        let outcome =
            state.on_connection_message(epoch, r#"{"spot_id": 1, "status": "free"}"#, Utc::now());
        assert_eq!(outcome, EventOutcome::Stale);
        assert!(state.feed().is_empty());
    }

    #[test]
    fn test_view_is_a_copy() {
        let mut state = OccupancyState::new();
        state.apply_snapshot(vec![zone(vec![spot(1, SpotStatus::Free)])], counts(1, 0));
        let view = state.view();

        state.on_status_event(r#"{"spot_id": 1, "status": "occupied"}"#, Utc::now());

        assert_eq!(view.spot(1).unwrap().status, SpotStatus::Free);
        assert_eq!(state.view().spot(1).unwrap().status, SpotStatus::Occupied);
        assert!(state.view().revision() > view.revision());
    }
}
