//! Admin fault board.
//!
//! Faults are never removed; resolving one flips it to completed so the
//! resolved count stays meaningful.

use std::str::FromStr;
use std::sync::RwLock;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{BusPerformance, Fault, FaultStatus, Priority};

const DEMO_FAULTS: &str = include_str!("../data/demo_faults.json");

#[derive(Error, Debug)]
pub enum FaultError {
    #[error("Failed to parse fault data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Fault not found: {0}")]
    NotFound(String),

    #[error("Unknown fault filter: {0}")]
    UnknownFilter(String),

    #[error("Fault board unavailable")]
    BoardUnavailable,
}

/// Board tabs. Priority tabs only list pending faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultFilter {
    #[default]
    Pending,
    High,
    Medium,
    Low,
    Completed,
}

impl FaultFilter {
    pub const ALL: [FaultFilter; 5] = [
        FaultFilter::Pending,
        FaultFilter::High,
        FaultFilter::Medium,
        FaultFilter::Low,
        FaultFilter::Completed,
    ];

    pub fn matches(&self, fault: &Fault) -> bool {
        match self {
            FaultFilter::Pending => fault.is_pending(),
            FaultFilter::Completed => fault.status == FaultStatus::Completed,
            FaultFilter::High => fault.is_pending() && fault.priority == Priority::High,
            FaultFilter::Medium => fault.is_pending() && fault.priority == Priority::Medium,
            FaultFilter::Low => fault.is_pending() && fault.priority == Priority::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultFilter::Pending => "pending",
            FaultFilter::High => "high",
            FaultFilter::Medium => "medium",
            FaultFilter::Low => "low",
            FaultFilter::Completed => "completed",
        }
    }
}

impl FromStr for FaultFilter {
    type Err = FaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FaultFilter::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FaultError::UnknownFilter(s.to_string()))
    }
}

/// Header counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultStats {
    pub critical: usize,
    pub medium: usize,
    pub low: usize,
    pub resolved: usize,
}

#[derive(Deserialize)]
struct FaultData {
    faults: Vec<Fault>,
    performance: Vec<BusPerformance>,
}

#[derive(Debug, Default)]
pub struct FaultBoard {
    faults: RwLock<Vec<Fault>>,
    performance: Vec<BusPerformance>,
}

impl FaultBoard {
    pub fn new(faults: Vec<Fault>, performance: Vec<BusPerformance>) -> Self {
        Self {
            faults: RwLock::new(faults),
            performance,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, FaultError> {
        let data: FaultData = serde_json::from_str(json)?;
        debug!(faults = data.faults.len(), "Loaded fault board");
        Ok(Self::new(data.faults, data.performance))
    }

    /// Board seeded with the demo faults and performance records.
    pub fn demo() -> Result<Self, FaultError> {
        Self::from_json(DEMO_FAULTS)
    }

    pub fn faults(&self) -> Vec<Fault> {
        self.faults.read().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn performance(&self) -> &[BusPerformance] {
        &self.performance
    }

    pub fn get(&self, id: &str) -> Option<Fault> {
        let faults = self.faults.read().ok()?;
        faults.iter().find(|f| f.id == id).cloned()
    }

    pub fn stats(&self) -> FaultStats {
        let Ok(faults) = self.faults.read() else {
            return FaultStats::default();
        };
        let mut stats = FaultStats::default();
        for fault in faults.iter() {
            if fault.is_pending() {
                match fault.priority {
                    Priority::High => stats.critical += 1,
                    Priority::Medium => stats.medium += 1,
                    Priority::Low => stats.low += 1,
                }
            } else {
                stats.resolved += 1;
            }
        }
        stats
    }

    pub fn filtered(&self, filter: FaultFilter) -> Vec<Fault> {
        self.faults
            .read()
            .map(|faults| faults.iter().filter(|f| filter.matches(f)).cloned().collect())
            .unwrap_or_default()
    }

    /// Mark a fault completed. Resolving twice is a no-op.
    pub fn resolve(&self, id: &str) -> Result<Fault, FaultError> {
        let mut faults = self
            .faults
            .write()
            .map_err(|_| FaultError::BoardUnavailable)?;
        let fault = faults
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| FaultError::NotFound(id.to_string()))?;
        if fault.is_pending() {
            fault.status = FaultStatus::Completed;
            info!(fault = %fault.id, bus = %fault.bus_id, "Fault resolved");
        }
        Ok(fault.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BusHealth, FaultType};

    #[test]
    fn test_demo_board_stats() {
        let board = FaultBoard::demo().unwrap();
        assert_eq!(board.faults().len(), 4);
        assert_eq!(
            board.stats(),
            FaultStats {
                critical: 2,
                medium: 1,
                low: 1,
                resolved: 0
            }
        );
        assert_eq!(board.performance().len(), 2);
        assert_eq!(board.performance()[1].status, BusHealth::Critical);
        assert_eq!(board.get("C345678").unwrap().fault_type, FaultType::WindshieldWiper);
    }

    #[test]
    fn test_resolve_flips_status_and_updates_filters() {
        let board = FaultBoard::demo().unwrap();
        let resolved = board.resolve("B789012").unwrap();
        assert_eq!(resolved.status, FaultStatus::Completed);

        assert_eq!(board.faults().len(), 4);
        assert_eq!(board.stats().critical, 1);
        assert_eq!(board.stats().resolved, 1);
        assert_eq!(board.filtered(FaultFilter::Pending).len(), 3);
        assert_eq!(board.filtered(FaultFilter::High).len(), 1);

        let completed = board.filtered(FaultFilter::Completed);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "B789012");

        // idempotent
        board.resolve("B789012").unwrap();
        assert_eq!(board.stats().resolved, 1);
    }

    #[test]
    fn test_resolve_unknown_fault() {
        let board = FaultBoard::demo().unwrap();
        assert!(matches!(board.resolve("Z999"), Err(FaultError::NotFound(_))));
    }

    #[test]
    fn test_resolve_reports_poisoned_board() {
        let board = std::sync::Arc::new(FaultBoard::demo().unwrap());
        let poisoner = board.clone();
        let _ = std::thread::spawn(move || {
            let _faults = poisoner.faults.write().unwrap();
            panic!("writer died");
        })
        .join();

        assert!(matches!(
            board.resolve("B789012"),
            Err(FaultError::BoardUnavailable)
        ));
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("High".parse::<FaultFilter>().unwrap(), FaultFilter::High);
        assert_eq!(" completed ".parse::<FaultFilter>().unwrap(), FaultFilter::Completed);
        assert!("urgent".parse::<FaultFilter>().is_err());
    }
}
