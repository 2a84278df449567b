//! Types for the facility API and the spot event stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Occupancy status of a single spot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SpotStatus {
    Free,
    Occupied,
    /// Anything the detector could not classify, including unrecognized values
    #[default]
    Unknown,
}

impl SpotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotStatus::Free => "free",
            SpotStatus::Occupied => "occupied",
            SpotStatus::Unknown => "unknown",
        }
    }
}

impl From<&str> for SpotStatus {
    fn from(value: &str) -> Self {
        match value {
            "free" => SpotStatus::Free,
            "occupied" => SpotStatus::Occupied,
            _ => SpotStatus::Unknown,
        }
    }
}

impl From<String> for SpotStatus {
    fn from(value: String) -> Self {
        SpotStatus::from(value.as_str())
    }
}

impl std::fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounding box of a spot in zone-local units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotBounds {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl SpotBounds {
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// A single parking space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub status: SpotStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x1: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y1: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x2: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y2: Option<i32>,
}

impl Spot {
    /// Geometry, present only when all four coordinates are
    pub fn bounds(&self) -> Option<SpotBounds> {
        Some(SpotBounds {
            x1: self.x1?,
            y1: self.y1?,
            x2: self.x2?,
            y2: self.y2?,
        })
    }
}

/// One cell of a zone grid overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridCell {
    /// `0`: drivable floor, not drawn as an obstacle
    Open,
    /// `1`
    Wall,
    /// `2`
    FreeSpot,
    /// `3`
    OccupiedSpot,
    /// Any other code; renderers skip it but it is kept as-is
    Other(i64),
}

impl GridCell {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => GridCell::Open,
            1 => GridCell::Wall,
            2 => GridCell::FreeSpot,
            3 => GridCell::OccupiedSpot,
            other => GridCell::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            GridCell::Open => 0,
            GridCell::Wall => 1,
            GridCell::FreeSpot => 2,
            GridCell::OccupiedSpot => 3,
            GridCell::Other(code) => *code,
        }
    }
}

/// Row-major matrix of cell codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridOverlay {
    rows: Vec<Vec<i64>>,
}

impl GridOverlay {
    pub fn new(rows: Vec<Vec<i64>>) -> Self {
        Self { rows }
    }

    /// Parse a `map_grid_data` payload.
    ///
    /// The API stores the grid as a JSON-encoded string; an inline matrix is
    /// accepted too. Returns `None` when the payload is not a matrix of integers.
    pub fn parse(value: &JsonValue) -> Option<Self> {
        let rows = match value {
            JsonValue::String(encoded) => serde_json::from_str::<Vec<Vec<i64>>>(encoded).ok()?,
            JsonValue::Array(_) => serde_json::from_value::<Vec<Vec<i64>>>(value.clone()).ok()?,
            _ => return None,
        };
        Some(Self { rows })
    }

    /// (rows, columns); the column count is taken from the first row
    pub fn dimensions(&self) -> (usize, usize) {
        let cols = self.rows.first().map(Vec::len).unwrap_or(0);
        (self.rows.len(), cols)
    }

    /// A grid with no rows or no columns is not drawn
    pub fn is_renderable(&self) -> bool {
        let (rows, cols) = self.dimensions();
        rows > 0 && cols > 0
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<GridCell> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|code| GridCell::from_code(*code))
    }

    /// Iterate `(row, col, cell)` over every cell
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, GridCell)> + '_ {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(move |(c, code)| (r, c, GridCell::from_code(*code)))
        })
    }

    pub fn codes(&self) -> &[Vec<i64>] {
        &self.rows
    }
}

fn deserialize_grid<'de, D>(deserializer: D) -> Result<Option<GridOverlay>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(JsonValue::Null) => None,
        Some(value) => match GridOverlay::parse(&value) {
            Some(grid) => Some(grid),
            None => {
                tracing::debug!("Discarding unparseable zone grid payload");
                None
            }
        },
    })
}

/// Which data a renderer should draw a zone from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneLayout<'a> {
    Grid(&'a GridOverlay),
    Spots(&'a [Spot]),
}

/// A named area containing spots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: i64,
    pub name: String,
    /// Capacity declared by the operator (may differ from `spots.len()`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_spots: Option<u32>,
    #[serde(default)]
    pub spots: Vec<Spot>,
    #[serde(
        default,
        rename = "map_grid_data",
        deserialize_with = "deserialize_grid",
        skip_serializing_if = "Option::is_none"
    )]
    pub grid: Option<GridOverlay>,
}

impl Zone {
    /// The grid overlay wins when it has cells; spot geometry is the fallback.
    pub fn layout(&self) -> ZoneLayout<'_> {
        match &self.grid {
            Some(grid) if grid.is_renderable() => ZoneLayout::Grid(grid),
            _ => ZoneLayout::Spots(&self.spots),
        }
    }

    pub fn spot(&self, spot_id: i64) -> Option<&Spot> {
        self.spots.iter().find(|s| s.id == spot_id)
    }
}

/// Aggregate occupancy counts for the whole facility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    #[serde(rename = "total_spots", default)]
    pub total: u32,
    #[serde(rename = "occupied_spots", default)]
    pub occupied: u32,
    #[serde(rename = "free_spots", default)]
    pub free: u32,
}

impl OccupancySnapshot {
    /// occupied / total, `0.0` for an empty facility
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.occupied as f64 / self.total as f64
        }
    }

    /// Spots reporting neither free nor occupied
    pub fn unknown(&self) -> u32 {
        self.total.saturating_sub(self.occupied.saturating_add(self.free))
    }
}

/// Why a push message was discarded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("not a JSON object")]
    NotAnObject,
    #[error("missing or non-integer spot_id")]
    MissingSpotId,
    #[error("missing or empty status")]
    MissingStatus,
}

/// A single spot status change pushed by the event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeEvent {
    pub spot_id: i64,
    pub status: SpotStatus,
    pub observed_at: DateTime<Utc>,
}

impl StatusChangeEvent {
    /// Parse an inbound text message.
    ///
    /// Requires an integer `spot_id` and a non-empty `status` string; other
    /// fields are ignored.
    pub fn parse(raw: &str, observed_at: DateTime<Utc>) -> Result<Self, MalformedEvent> {
        let value: JsonValue =
            serde_json::from_str(raw).map_err(|_| MalformedEvent::NotAnObject)?;
        let object = value.as_object().ok_or(MalformedEvent::NotAnObject)?;

        let spot_id = object
            .get("spot_id")
            .and_then(JsonValue::as_i64)
            .ok_or(MalformedEvent::MissingSpotId)?;
        let status = object
            .get("status")
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(MalformedEvent::MissingStatus)?;

        Ok(Self {
            spot_id,
            status: SpotStatus::from(status),
            observed_at,
        })
    }
}

/// Response from the navigation route endpoint
///
/// When no path exists the server answers `{"error": "..."}` with no
/// instructions, which reads as an empty route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Grid cells `(row, col)` from start to target
    #[serde(default)]
    pub path: Vec<[i64; 2]>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response from the spot assignment endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotAssignment {
    pub spot_id: i64,
    pub spot_name: String,
    pub zone_name: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(SpotStatus::from("free"), SpotStatus::Free);
        assert_eq!(SpotStatus::from("occupied"), SpotStatus::Occupied);
        assert_eq!(SpotStatus::from("reserved"), SpotStatus::Unknown);

        let spot: Spot = serde_json::from_str(
            r#"{"id": 4, "name": "A4", "status": "maintenance", "x1": 0, "y1": 0, "x2": 10, "y2": 20}"#,
        )
        .unwrap();
        assert_eq!(spot.status, SpotStatus::Unknown);
        assert_eq!(serde_json::to_value(spot.status).unwrap(), "unknown");
    }

    #[test]
    fn test_spot_bounds_require_all_coordinates() {
        let spot: Spot =
            serde_json::from_str(r#"{"id": 1, "name": "A1", "x1": 2, "y1": 3, "x2": 12, "y2": 23}"#)
                .unwrap();
        let bounds = spot.bounds().unwrap();
        assert_eq!((bounds.width(), bounds.height()), (10, 20));

        let partial: Spot = serde_json::from_str(r#"{"id": 2, "name": "A2", "x1": 2}"#).unwrap();
        assert!(partial.bounds().is_none());
    }

    #[test]
    fn test_grid_from_encoded_string() {
        let zone: Zone = serde_json::from_str(
            r#"{"id": 1, "name": "Level 1", "map_grid_data": "[[0,1],[2,3]]", "spots": []}"#,
        )
        .unwrap();
        let grid = zone.grid.as_ref().unwrap();
        assert_eq!(grid.dimensions(), (2, 2));
        assert_eq!(grid.cell(0, 1), Some(GridCell::Wall));
        assert_eq!(grid.cell(1, 0), Some(GridCell::FreeSpot));
        assert_eq!(grid.cell(1, 1), Some(GridCell::OccupiedSpot));
        assert!(matches!(zone.layout(), ZoneLayout::Grid(_)));
    }

    #[test]
    fn test_unknown_cell_codes_round_trip() {
        let zone: Zone =
            serde_json::from_str(r#"{"id": 1, "name": "L1", "map_grid_data": [[0, 7, -2]]}"#)
                .unwrap();
        let grid = zone.grid.as_ref().unwrap();
        assert_eq!(grid.cell(0, 1), Some(GridCell::Other(7)));
        assert_eq!(GridCell::from_code(7).code(), 7);

        let encoded = serde_json::to_value(&zone).unwrap();
        assert_eq!(encoded["map_grid_data"], serde_json::json!([[0, 7, -2]]));
    }

    #[test]
    fn test_bad_grid_falls_back_to_spots() {
        let zone: Zone = serde_json::from_str(
            r#"{"id": 1, "name": "L1", "map_grid_data": "not a grid",
                "spots": [{"id": 9, "name": "B9", "status": "free"}]}"#,
        )
        .unwrap();
        assert!(zone.grid.is_none());
        match zone.layout() {
            ZoneLayout::Spots(spots) => assert_eq!(spots[0].id, 9),
            ZoneLayout::Grid(_) => panic!("expected spot layout"),
        }

        let empty: Zone =
            serde_json::from_str(r#"{"id": 2, "name": "L2", "map_grid_data": "[[]]"}"#).unwrap();
        assert!(matches!(empty.layout(), ZoneLayout::Spots(_)));
    }

    #[test]
    fn test_occupancy_rate() {
        let empty = OccupancySnapshot::default();
        assert_eq!(empty.rate(), 0.0);

        let snapshot = OccupancySnapshot {
            total: 10,
            occupied: 4,
            free: 5,
        };
        assert!((snapshot.rate() - 0.4).abs() < f64::EPSILON);
        assert_eq!(snapshot.unknown(), 1);
    }

    #[test]
    fn test_unknown_with_inconsistent_counts() {
        let snapshot = OccupancySnapshot {
            total: 10,
            occupied: u32::MAX,
            free: u32::MAX,
        };
        assert_eq!(snapshot.unknown(), 0);
    }

    #[test]
    fn test_occupancy_ignores_server_rate() {
        let snapshot: OccupancySnapshot = serde_json::from_str(
            r#"{"total_spots": 10, "occupied_spots": 4, "free_spots": 6, "occupancy_rate": 40.0}"#,
        )
        .unwrap();
        assert!((snapshot.rate() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_event_parse() {
        let now = Utc::now();
        let event = StatusChangeEvent::parse(r#"{"spot_id": 3, "status": "occupied"}"#, now).unwrap();
        assert_eq!(event.spot_id, 3);
        assert_eq!(event.status, SpotStatus::Occupied);
        assert_eq!(event.observed_at, now);
    }

    #[test]
    fn test_event_parse_rejects_incomplete_messages() {
        let now = Utc::now();
        assert_eq!(
            StatusChangeEvent::parse(r#"{"spot_id": 3}"#, now),
            Err(MalformedEvent::MissingStatus)
        );
        assert_eq!(
            StatusChangeEvent::parse(r#"{"spot_id": 3, "status": ""}"#, now),
            Err(MalformedEvent::MissingStatus)
        );
        assert_eq!(
            StatusChangeEvent::parse(r#"{"status": "free"}"#, now),
            Err(MalformedEvent::MissingSpotId)
        );
        assert_eq!(
            StatusChangeEvent::parse("ping", now),
            Err(MalformedEvent::NotAnObject)
        );
        assert_eq!(
            StatusChangeEvent::parse("[1, 2]", now),
            Err(MalformedEvent::NotAnObject)
        );
    }

    #[test]
    fn test_route_without_instructions() {
        let route: RouteResponse = serde_json::from_str(r#"{"error": "No path found"}"#).unwrap();
        assert!(route.instructions.is_empty());
        assert_eq!(route.error.as_deref(), Some("No path found"));
    }
}
