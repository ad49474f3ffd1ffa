use crate::error::{AppError, Result};
use crate::models::Waypoint;
use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An ordered path of at least two waypoints.
///
/// Consecutive duplicates are allowed: the simulator skips zero-length
/// segments instead of rejecting the route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    waypoints: Vec<Waypoint>,
}

impl Route {
    pub fn new(waypoints: Vec<Waypoint>) -> Result<Self> {
        if waypoints.len() < 2 {
            return Err(AppError::InvalidRoute(format!(
                "a route needs at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        for (i, w) in waypoints.iter().enumerate() {
            Waypoint::new(w.lat, w.lng)
                .map_err(|e| AppError::InvalidRoute(format!("waypoint {}: {}", i, e)))?;
        }
        Ok(Route { waypoints })
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.waypoints.len() - 1
    }

    /// `(start, end, next)` for segment `index`; `next` is the waypoint after
    /// `end`, if any.
    pub fn segment(&self, index: usize) -> Option<(Waypoint, Waypoint, Option<Waypoint>)> {
        let start = *self.waypoints.get(index)?;
        let end = *self.waypoints.get(index + 1)?;
        Some((start, end, self.waypoints.get(index + 2).copied()))
    }

    pub fn destination(&self) -> Waypoint {
        // Construction guarantees at least two points.
        self.waypoints[self.waypoints.len() - 1]
    }

    pub fn total_length_m(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|w| w[0].distance_m(&w[1]))
            .sum()
    }

    /// True when every segment is shorter than `threshold_m`.
    pub fn is_degenerate(&self, threshold_m: f64) -> bool {
        self.waypoints
            .windows(2)
            .all(|w| w[0].distance_m(&w[1]) < threshold_m)
    }

    /// Parse a GeoJSON LineString, or the first LineString found in a
    /// Feature / FeatureCollection.
    pub fn from_geojson_str(input: &str) -> Result<Self> {
        let geojson: GeoJson = input.parse()?;

        let geometries: Vec<geojson::Geometry> = match geojson {
            GeoJson::Geometry(g) => vec![g],
            GeoJson::Feature(f) => f.geometry.into_iter().collect(),
            GeoJson::FeatureCollection(fc) => {
                fc.features.into_iter().filter_map(|f| f.geometry).collect()
            }
        };

        let line = geometries
            .into_iter()
            .find_map(|g| match g.value {
                geojson::Value::LineString(line) => Some(line),
                _ => None,
            })
            .ok_or_else(|| AppError::InvalidRoute("no LineString geometry found".to_string()))?;

        let waypoints = line
            .iter()
            .enumerate()
            .map(|(i, position)| match (position.first(), position.get(1)) {
                // GeoJSON positions are [lng, lat]
                (Some(&lng), Some(&lat)) => Waypoint::new(lat, lng),
                _ => Err(AppError::InvalidRoute(format!(
                    "position {} has fewer than 2 components",
                    i
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Route::new(waypoints)
    }

    /// Parse a plain JSON array of `{"lat": .., "lng": ..}` objects.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let waypoints: Vec<Waypoint> = serde_json::from_str(input)?;
        Route::new(waypoints)
    }

    /// Load a route file, trying GeoJSON first and then the plain waypoint list.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match Route::from_geojson_str(&content) {
            Ok(route) => Ok(route),
            Err(geojson_err) => Route::from_json_str(&content).map_err(|json_err| {
                AppError::InvalidRoute(format!(
                    "{} is neither a GeoJSON LineString ({}) nor a waypoint list ({})",
                    path.display(),
                    geojson_err,
                    json_err
                ))
            }),
        }
    }
}
