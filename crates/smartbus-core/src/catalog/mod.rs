//! Route catalog.
//!
//! The demo has no transit backend; routes and buses come from a dataset
//! embedded at build time. Callers only see the `RouteCatalog` trait.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{Bus, Route};

/// Demo dataset, six Santo Domingo routes and their buses.
const DEMO_CATALOG: &str = include_str!("../../data/demo_catalog.json");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Bus not found: {0}")]
    BusNotFound(String),
}

pub trait RouteCatalog: Send + Sync {
    fn routes(&self) -> &[Route];

    fn buses(&self) -> &[Bus];

    fn route(&self, id: &str) -> Option<&Route> {
        self.routes().iter().find(|r| r.id.eq_ignore_ascii_case(id))
    }

    fn bus(&self, id: &str) -> Option<&Bus> {
        self.buses().iter().find(|b| b.id.eq_ignore_ascii_case(id))
    }

    fn require_route(&self, id: &str) -> Result<&Route, CatalogError> {
        self.route(id)
            .ok_or_else(|| CatalogError::RouteNotFound(id.to_string()))
    }

    fn require_bus(&self, id: &str) -> Result<&Bus, CatalogError> {
        self.bus(id).ok_or_else(|| CatalogError::BusNotFound(id.to_string()))
    }

    fn buses_for_route(&self, route_id: &str) -> Vec<&Bus> {
        self.buses()
            .iter()
            .filter(|b| b.route_id.eq_ignore_ascii_case(route_id))
            .collect()
    }

    /// Case-insensitive match over route name, description and stops.
    /// A blank query matches every route.
    fn search(&self, query: &str) -> Vec<&Route> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.routes().iter().collect();
        }
        self.routes()
            .iter()
            .filter(|r| {
                r.name.to_lowercase().contains(&query)
                    || r.description.to_lowercase().contains(&query)
                    || r.stops.iter().any(|s| s.to_lowercase().contains(&query))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InMemoryRouteCatalog {
    routes: Vec<Route>,
    buses: Vec<Bus>,
}

impl InMemoryRouteCatalog {
    pub fn new(routes: Vec<Route>, buses: Vec<Bus>) -> Self {
        Self { routes, buses }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        debug!(
            routes = catalog.routes.len(),
            buses = catalog.buses.len(),
            "Loaded route catalog"
        );
        Ok(catalog)
    }

    pub fn demo() -> Result<Self, CatalogError> {
        Self::from_json(DEMO_CATALOG)
    }
}

impl RouteCatalog for InMemoryRouteCatalog {
    fn routes(&self) -> &[Route] {
        &self.routes
    }

    fn buses(&self) -> &[Bus] {
        &self.buses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BusStatus;

    #[test]
    fn test_demo_catalog_loads() {
        let catalog = InMemoryRouteCatalog::demo().unwrap();
        assert_eq!(catalog.routes().len(), 6);
        assert_eq!(catalog.buses().len(), 20);

        let route = catalog.route("ruta1").unwrap();
        assert_eq!(route.stop_count(), 5);
        assert_eq!(route.bus_count(), 4);
    }

    #[test]
    fn test_lookup_bus_and_route_buses() {
        let catalog = InMemoryRouteCatalog::demo().unwrap();
        let bus = catalog.bus("d901234").unwrap();
        assert_eq!(bus.route_id, "ruta2");
        assert_eq!(bus.status, BusStatus::Full);

        let ids: Vec<&str> = catalog
            .buses_for_route("ruta3")
            .iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(ids, vec!["E567890", "E789123", "E345678"]);
    }

    #[test]
    fn test_missing_ids_are_typed_errors() {
        let catalog = InMemoryRouteCatalog::demo().unwrap();
        assert!(matches!(
            catalog.require_route("ruta99"),
            Err(CatalogError::RouteNotFound(_))
        ));
        assert!(matches!(
            catalog.require_bus("Z000000"),
            Err(CatalogError::BusNotFound(_))
        ));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let catalog = InMemoryRouteCatalog::demo().unwrap();
        let hits = catalog.search("AEROPUERTO");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "ruta3");

        // stop names count too
        assert!(catalog
            .search("catedral metropolitana")
            .iter()
            .any(|r| r.id == "ruta1"));
        assert_eq!(catalog.search("   ").len(), 6);
        assert!(catalog.search("no such place").is_empty());
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        assert!(matches!(
            InMemoryRouteCatalog::from_json("{\"routes\": 3}"),
            Err(CatalogError::Parse(_))
        ));
    }
}
