use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A user-drawn area as held by the polygon store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Polygon {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Ring of `[lng, lat]` vertex pairs, not necessarily closed
    pub coordinates: Vec<[f64; 2]>,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/polygons`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewPolygon {
    pub coordinates: Vec<[f64; 2]>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl NewPolygon {
    /// Checks vertex count and coordinate ranges before anything is stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.coordinates.len() < 3 {
            return Err("a polygon needs at least 3 points".to_string());
        }
        for [lng, lat] in &self.coordinates {
            if !lng.is_finite() || !lat.is_finite() {
                return Err("coordinates must be numbers".to_string());
            }
            if !(-90.0..=90.0).contains(lat) || !(-180.0..=180.0).contains(lng) {
                return Err(format!("coordinate [{}, {}] out of range", lng, lat));
            }
        }
        Ok(())
    }

    pub fn into_polygon(self) -> Polygon {
        Polygon {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name.filter(|n| !n.is_empty()),
            coordinates: self.coordinates,
            properties: self.properties,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_polygon(coordinates: Vec<[f64; 2]>) -> NewPolygon {
        NewPolygon { coordinates, name: None, properties: HashMap::new() }
    }

    #[test]
    fn test_validate_accepts_triangle() {
        let p = new_polygon(vec![[-75.5782, 6.2783], [-75.5770, 6.2790], [-75.5760, 6.2780]]);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_ring_and_bad_ranges() {
        assert!(new_polygon(vec![[0.0, 0.0], [1.0, 1.0]]).validate().is_err());
        assert!(new_polygon(vec![[0.0, 0.0], [1.0, 91.0], [2.0, 0.0]]).validate().is_err());
        assert!(new_polygon(vec![[181.0, 0.0], [1.0, 1.0], [2.0, 0.0]]).validate().is_err());
        assert!(new_polygon(vec![[f64::NAN, 0.0], [1.0, 1.0], [2.0, 0.0]]).validate().is_err());
    }

    #[test]
    fn test_into_polygon_drops_empty_name() {
        let mut p = new_polygon(vec![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0]]);
        p.name = Some(String::new());
        let polygon = p.into_polygon();
        assert!(polygon.name.is_none());
        assert_eq!(polygon.coordinates.len(), 3);
        assert!(!polygon.id.is_empty());
    }
}
