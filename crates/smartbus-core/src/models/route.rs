//! Route and bus models.
//!
//! These mirror the demo dataset shipped in `data/demo_catalog.json`.

use serde::{Deserialize, Serialize};

/// Occupancy above this percentage is shown as high.
const HIGH_OCCUPANCY_PERCENT: u32 = 80;

/// Occupancy above this percentage is shown as medium.
const MEDIUM_OCCUPANCY_PERCENT: u32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub name: String,
    pub description: String,
    pub frequency: String,
    pub schedule: String,
    pub stops: Vec<String>,
    pub estimated_time: String,
    /// Minutes until the next bus reaches the first stop.
    pub next_arrival: u32,
    pub active_buses: u32,
    /// Hex color used to draw the route.
    pub color: String,
    pub available_seats: u32,
    #[serde(default)]
    pub buses: Vec<RouteBus>,
}

impl Route {
    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    pub fn serves_stop(&self, stop: &str) -> bool {
        self.stops.iter().any(|s| s.eq_ignore_ascii_case(stop))
    }
}

/// Summary of a bus as listed on its route card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct RouteBus {
    pub id: String,
    pub location: String,
    /// Rendered as "occupied/capacity", e.g. "15/40".
    pub occupancy: String,
    pub arrival_time: u32,
}

impl RouteBus {
    /// Parse the "occupied/capacity" string.
    pub fn occupancy_counts(&self) -> Option<(u32, u32)> {
        let (occupied, capacity) = self.occupancy.split_once('/')?;
        Some((occupied.trim().parse().ok()?, capacity.trim().parse().ok()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum BusStatus {
    Available,
    Full,
    OutOfService,
}

impl BusStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            BusStatus::Available => "Available",
            BusStatus::Full => "Full",
            BusStatus::OutOfService => "Out of service",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyLevel {
    Low,
    Medium,
    High,
}

/// A bus with its simulated live position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Bus {
    pub id: String,
    pub route_id: String,
    pub next_stop: String,
    pub estimated_arrival: u32,
    /// Latitude, longitude.
    pub coordinates: (f64, f64),
    pub driver: String,
    pub capacity: u32,
    pub occupancy: u32,
    pub status: BusStatus,
}

impl Bus {
    pub fn occupancy_percent(&self) -> u32 {
        if self.capacity == 0 {
            return 0;
        }
        ((self.occupancy as f64 / self.capacity as f64) * 100.0).round() as u32
    }

    pub fn occupancy_level(&self) -> OccupancyLevel {
        let percent = self.occupancy_percent();
        if percent > HIGH_OCCUPANCY_PERCENT {
            OccupancyLevel::High
        } else if percent > MEDIUM_OCCUPANCY_PERCENT {
            OccupancyLevel::Medium
        } else {
            OccupancyLevel::Low
        }
    }

    pub fn free_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.occupancy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(occupancy: u32, capacity: u32) -> Bus {
        Bus {
            id: "A123456".to_string(),
            route_id: "ruta1".to_string(),
            next_stop: "Malecón Centro".to_string(),
            estimated_arrival: 4,
            coordinates: (18.4861, -69.9312),
            driver: "Carlos Pérez".to_string(),
            capacity,
            occupancy,
            status: BusStatus::Available,
        }
    }

    #[test]
    fn test_occupancy_percent_rounds() {
        assert_eq!(bus(15, 40).occupancy_percent(), 38);
        assert_eq!(bus(41, 45).occupancy_percent(), 91);
        assert_eq!(bus(0, 0).occupancy_percent(), 0);
    }

    #[test]
    fn test_occupancy_level_thresholds() {
        assert_eq!(bus(24, 40).occupancy_level(), OccupancyLevel::Low);
        assert_eq!(bus(32, 40).occupancy_level(), OccupancyLevel::Medium);
        assert_eq!(bus(38, 40).occupancy_level(), OccupancyLevel::High);
    }

    #[test]
    fn test_route_bus_occupancy_counts() {
        let summary = RouteBus {
            id: "B789012".to_string(),
            location: "Alcázar de Colón".to_string(),
            occupancy: "8/40".to_string(),
            arrival_time: 7,
        };
        assert_eq!(summary.occupancy_counts(), Some((8, 40)));
    }
}
