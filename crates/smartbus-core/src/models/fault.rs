//! Fault reports and bus performance records for the admin board.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    Speeding,
    DoorFailure,
    AirConditioning,
    WindshieldWiper,
}

impl FaultType {
    pub fn display_name(&self) -> &'static str {
        match self {
            FaultType::Speeding => "Speeding",
            FaultType::DoorFailure => "Door failure",
            FaultType::AirConditioning => "Air conditioning",
            FaultType::WindshieldWiper => "Windshield wiper",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum FaultStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Fault {
    pub id: String,
    #[serde(rename = "type")]
    pub fault_type: FaultType,
    pub bus_id: String,
    pub description: String,
    pub priority: Priority,
    pub status: FaultStatus,
    pub date: String,
    pub time: String,
    pub details: Option<String>,
    pub route: Option<String>,
    pub driver: Option<String>,
}

impl Fault {
    pub fn is_pending(&self) -> bool {
        self.status == FaultStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum BusHealth {
    Warning,
    Critical,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct BusPerformance {
    pub id: String,
    pub route: String,
    pub driver: String,
    pub status: BusHealth,
    /// Percentage, 0-100.
    pub efficiency: u8,
    pub maintenance: String,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}
