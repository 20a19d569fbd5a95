//! In-process [`SpatialStore`] for tests and local development.
//!
//! Rows mirror the `demographics` table: one row per
//! `(layer, name, year)` with an optional geometry and attribute columns.
//! Geometry predicates run through the codec in `geolens_types`, so this
//! store computes true centroids, point-in-polygon containment, and
//! ellipsoidal distances.
//!
//! Distances to polygons are geodesic distances to the closest boundary
//! point found in lon/lat space. That point is close to, but not exactly,
//! the ellipsoidal closest point PostGIS finds.
//!
//! Every trait call is counted (see [`MemoryStore::call_counts`]) so tests
//! can assert how often the store was reached.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use geo::{Closest, ClosestPoint};
use geolens_types::{
    Feature, FeatureCollection, GeoPoint, Geometry, LayerType, Properties, ProximityHit,
    TrendField, TrendPoint,
};

use crate::error::StoreError;
use crate::store::{FeatureQuery, RadiusQuery, RegionQuery, SpatialStore};

/// One row of the in-memory table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeature {
    /// Layer of the entity.
    pub layer: LayerType,
    /// Display name.
    pub name: String,
    /// Name qualified by state (`"Travis County, Texas"`).
    pub full_name: Option<String>,
    /// Postal abbreviation (states only).
    pub abbreviation: Option<String>,
    /// Attribute year; `None` for boundary-only rows.
    pub year: Option<i32>,
    /// Boundary or location.
    pub geometry: Option<Geometry>,
    /// Demographic attribute columns.
    pub attributes: Properties,
}

impl StoredFeature {
    /// A boundary-only row.
    pub fn new(layer: LayerType, name: &str, geometry: Geometry) -> Self {
        Self {
            layer,
            name: name.to_owned(),
            full_name: None,
            abbreviation: None,
            year: None,
            geometry: Some(geometry),
            attributes: Properties::new(),
        }
    }

    /// Set the attribute year.
    #[must_use]
    pub const fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Set the qualified name.
    #[must_use]
    pub fn with_full_name(mut self, full_name: &str) -> Self {
        self.full_name = Some(full_name.to_owned());
        self
    }

    /// Set the postal abbreviation.
    #[must_use]
    pub fn with_abbreviation(mut self, abbreviation: &str) -> Self {
        self.abbreviation = Some(abbreviation.to_owned());
        self
    }

    /// Set one attribute column.
    #[must_use]
    pub fn with_attribute(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    /// Render as a GeoJSON feature. Properties are the attribute columns
    /// plus the identifying columns, like a row minus its geometry.
    pub fn to_feature(&self) -> Feature {
        let mut properties = self.attributes.clone();
        properties.insert(
            String::from("layer_type"),
            serde_json::Value::from(self.layer.as_str()),
        );
        properties.insert(String::from("name"), serde_json::Value::from(self.name.as_str()));
        properties.insert(
            String::from("full_name"),
            self.full_name.as_deref().map_or(serde_json::Value::Null, serde_json::Value::from),
        );
        properties.insert(
            String::from("stusps"),
            self.abbreviation
                .as_deref()
                .map_or(serde_json::Value::Null, serde_json::Value::from),
        );
        properties.insert(
            String::from("year"),
            self.year.map_or(serde_json::Value::Null, serde_json::Value::from),
        );
        Feature::new(self.geometry.clone(), properties)
    }

    /// Parse a seed feature. Identifying columns are read from the
    /// properties (`layer_type`, `name`, `full_name`, `stusps`, `year`);
    /// every other property becomes an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] when `layer_type` or `name` is missing
    /// or invalid, and [`StoreError::Codec`] for an unsupported geometry.
    pub fn from_feature(value: &serde_json::Value) -> Result<Self, StoreError> {
        let mut attributes = value
            .get("properties")
            .and_then(serde_json::Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut take_str = |key: &str| match attributes.remove(key) {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        };
        let layer = take_str("layer_type")
            .ok_or_else(|| StoreError::Query(String::from("seed feature without layer_type")))?
            .parse::<LayerType>()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let name = take_str("name")
            .ok_or_else(|| StoreError::Query(String::from("seed feature without name")))?;
        let full_name = take_str("full_name");
        let abbreviation = take_str("stusps");
        let year = attributes
            .remove("year")
            .and_then(|y| y.as_i64())
            .and_then(|y| i32::try_from(y).ok());
        let geometry = match value.get("geometry") {
            None | Some(serde_json::Value::Null) => None,
            Some(g) => Some(Geometry::decode(g)?),
        };
        Ok(Self {
            layer,
            name,
            full_name,
            abbreviation,
            year,
            geometry,
            attributes,
        })
    }

    fn name_matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        self.name.to_lowercase().contains(&needle.to_lowercase())
            || (self.layer == LayerType::State
                && self
                    .abbreviation
                    .as_deref()
                    .is_some_and(|abbr| abbr.eq_ignore_ascii_case(needle)))
    }

    fn is_exact(&self, needle: &str) -> bool {
        self.name.eq_ignore_ascii_case(needle.trim())
    }
}

/// Snapshot of how often each store operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    /// `fetch_feature_collection` calls.
    pub fetch_feature_collection: usize,
    /// `fetch_centroid` calls.
    pub fetch_centroid: usize,
    /// `find_containing` calls.
    pub find_containing: usize,
    /// `find_within_radius` calls.
    pub find_within_radius: usize,
    /// `find_near_region` calls.
    pub find_near_region: usize,
    /// `find_by_full_name` calls.
    pub find_by_full_name: usize,
    /// `fetch_trend` calls.
    pub fetch_trend: usize,
}

impl StoreCallCounts {
    /// Sum over every operation.
    pub const fn total(&self) -> usize {
        self.fetch_feature_collection
            .saturating_add(self.fetch_centroid)
            .saturating_add(self.find_containing)
            .saturating_add(self.find_within_radius)
            .saturating_add(self.find_near_region)
            .saturating_add(self.find_by_full_name)
            .saturating_add(self.fetch_trend)
    }
}

#[derive(Debug, Default)]
struct Counters {
    fetch_feature_collection: AtomicUsize,
    fetch_centroid: AtomicUsize,
    find_containing: AtomicUsize,
    find_within_radius: AtomicUsize,
    find_near_region: AtomicUsize,
    find_by_full_name: AtomicUsize,
    fetch_trend: AtomicUsize,
}

/// A [`SpatialStore`] over a fixed set of rows.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<StoredFeature>,
    latency: Option<Duration>,
    counters: Counters,
}

impl MemoryStore {
    /// Create a store over `rows`.
    pub fn new(rows: Vec<StoredFeature>) -> Self {
        Self {
            rows,
            latency: None,
            counters: Counters::default(),
        }
    }

    /// Delay every call by `latency`, simulating a network round-trip.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Load rows from a GeoJSON `FeatureCollection` file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the file cannot be read or
    /// parsed, and the errors of [`StoredFeature::from_feature`].
    pub fn from_geojson_file(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Unavailable(format!("failed to read {}: {e}", path.display()))
        })?;
        let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
            StoreError::Unavailable(format!("failed to parse {}: {e}", path.display()))
        })?;
        let rows = value
            .get("features")
            .and_then(serde_json::Value::as_array)
            .map(|features| {
                features
                    .iter()
                    .map(StoredFeature::from_feature)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        tracing::info!(path = %path.display(), rows = rows.len(), "Loaded memory store seed");
        Ok(Self::new(rows))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// How often each operation has been called.
    pub fn call_counts(&self) -> StoreCallCounts {
        let c = &self.counters;
        StoreCallCounts {
            fetch_feature_collection: c.fetch_feature_collection.load(Ordering::Relaxed),
            fetch_centroid: c.fetch_centroid.load(Ordering::Relaxed),
            find_containing: c.find_containing.load(Ordering::Relaxed),
            find_within_radius: c.find_within_radius.load(Ordering::Relaxed),
            find_near_region: c.find_near_region.load(Ordering::Relaxed),
            find_by_full_name: c.find_by_full_name.load(Ordering::Relaxed),
            fetch_trend: c.fetch_trend.load(Ordering::Relaxed),
        }
    }

    async fn enter(&self, counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn layer_rows(&self, layer: LayerType) -> impl Iterator<Item = &StoredFeature> {
        self.rows.iter().filter(move |row| row.layer == layer)
    }

    /// The best name match: exact names first, then alphabetical, then
    /// the latest year.
    fn best_match(&self, layer: LayerType, name: &str) -> Option<&StoredFeature> {
        self.layer_rows(layer)
            .filter(|row| row.name_matches(name))
            .min_by(|a, b| {
                b.is_exact(name)
                    .cmp(&a.is_exact(name))
                    .then_with(|| a.name.cmp(&b.name))
                    .then_with(|| b.year.cmp(&a.year))
            })
    }
}

/// Distance in meters from `point` to `geometry`: zero inside or on the
/// boundary, otherwise the distance to the closest boundary point.
fn distance_to(geometry: &Geometry, point: GeoPoint) -> Result<f64, StoreError> {
    let target = geo::Point::from(point);
    Ok(match geometry.to_geo()?.closest_point(&target) {
        Closest::Intersection(_) => 0.0,
        Closest::SinglePoint(p) => GeoPoint::from(p).geodesic_distance_m(point),
        Closest::Indeterminate => geometry
            .positions()
            .into_iter()
            .map(|p| p.geodesic_distance_m(point))
            .fold(f64::INFINITY, f64::min),
    })
}

/// Keep the nearest hit per name, sort nearest first, cap at `limit`.
fn rank(hits: Vec<ProximityHit>, limit: usize) -> Vec<ProximityHit> {
    let mut nearest: BTreeMap<String, f64> = BTreeMap::new();
    for hit in hits {
        nearest
            .entry(hit.name)
            .and_modify(|d| *d = d.min(hit.distance_m))
            .or_insert(hit.distance_m);
    }
    let mut ranked: Vec<ProximityHit> = nearest
        .into_iter()
        .map(|(name, distance_m)| ProximityHit { name, distance_m })
        .collect();
    ranked.sort_by(|a, b| {
        a.distance_m
            .total_cmp(&b.distance_m)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

#[async_trait]
impl SpatialStore for MemoryStore {
    async fn fetch_feature_collection(
        &self,
        query: &FeatureQuery,
    ) -> Result<FeatureCollection, StoreError> {
        self.enter(&self.counters.fetch_feature_collection).await;

        // One row per name: the requested year beats an unscoped row; with
        // no year requested the latest year wins.
        let mut per_name: BTreeMap<&str, &StoredFeature> = BTreeMap::new();
        for row in self.layer_rows(query.layer).filter(|row| row.name_matches(&query.name)) {
            if query
                .year
                .is_some_and(|year| row.year.is_some_and(|y| y != year))
            {
                continue;
            }
            per_name
                .entry(row.name.as_str())
                .and_modify(|best| {
                    if row.year > best.year {
                        *best = row;
                    }
                })
                .or_insert(row);
        }

        let mut rows: Vec<&StoredFeature> = per_name.into_values().collect();
        rows.sort_by(|a, b| {
            b.is_exact(&query.name)
                .cmp(&a.is_exact(&query.name))
                .then_with(|| a.name.cmp(&b.name))
        });
        rows.truncate(query.limit);

        Ok(FeatureCollection::new(
            rows.into_iter().map(StoredFeature::to_feature).collect(),
        ))
    }

    async fn fetch_centroid(
        &self,
        layer: LayerType,
        name: &str,
    ) -> Result<Option<GeoPoint>, StoreError> {
        self.enter(&self.counters.fetch_centroid).await;
        let Some(geometry) = self
            .best_match(layer, name)
            .and_then(|row| row.geometry.as_ref())
        else {
            return Ok(None);
        };
        Ok(Some(geometry.centroid()?))
    }

    async fn find_containing(
        &self,
        point: GeoPoint,
        layer: LayerType,
    ) -> Result<Vec<String>, StoreError> {
        self.enter(&self.counters.find_containing).await;
        let mut names = BTreeSet::new();
        for row in self.layer_rows(layer) {
            if let Some(geometry) = &row.geometry
                && geometry.contains(point)?
            {
                names.insert(row.name.clone());
            }
        }
        Ok(names.into_iter().collect())
    }

    async fn find_within_radius(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<ProximityHit>, StoreError> {
        self.enter(&self.counters.find_within_radius).await;
        let radius_m = query.radius_km * 1000.0;
        let mut hits = Vec::new();
        for row in self.layer_rows(query.layer) {
            let Some(geometry) = &row.geometry else {
                continue;
            };
            if query
                .exclude_name
                .as_deref()
                .is_some_and(|excluded| row.is_exact(excluded))
            {
                continue;
            }
            let distance_m = distance_to(geometry, query.center)?;
            if distance_m > 0.0 && distance_m <= radius_m {
                hits.push(ProximityHit {
                    name: row.name.clone(),
                    distance_m,
                });
            }
        }
        Ok(rank(hits, query.limit))
    }

    async fn find_near_region(
        &self,
        query: &RegionQuery,
    ) -> Result<Vec<ProximityHit>, StoreError> {
        self.enter(&self.counters.find_near_region).await;
        let radius_m = query.radius_km * 1000.0;
        let mut hits = Vec::new();
        for row in self.layer_rows(query.layer) {
            let Some(geometry) = &row.geometry else {
                continue;
            };
            let mut intersects = false;
            for p in geometry.positions() {
                if query.region.contains(p)? {
                    intersects = true;
                    break;
                }
            }
            if intersects || query.region.contains(geometry.centroid()?)? {
                continue;
            }
            let distance_m = geometry
                .positions()
                .into_iter()
                .map(|p| distance_to(&query.region, p))
                .try_fold(f64::INFINITY, |acc, d| d.map(|d| acc.min(d)))?;
            if distance_m > 0.0 && distance_m <= radius_m {
                hits.push(ProximityHit {
                    name: row.name.clone(),
                    distance_m,
                });
            }
        }
        Ok(rank(hits, query.limit))
    }

    async fn find_by_full_name(
        &self,
        layer: LayerType,
        pattern: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.enter(&self.counters.find_by_full_name).await;
        let needle = pattern.trim().to_lowercase();
        let names: BTreeSet<String> = self
            .layer_rows(layer)
            .filter(|row| {
                row.full_name
                    .as_deref()
                    .is_some_and(|full| full.to_lowercase().contains(&needle))
            })
            .map(|row| row.name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn fetch_trend(
        &self,
        layer: LayerType,
        name: &str,
        field: TrendField,
    ) -> Result<Vec<TrendPoint>, StoreError> {
        self.enter(&self.counters.fetch_trend).await;
        let Some(best) = self.best_match(layer, name) else {
            return Ok(Vec::new());
        };
        let mut points: Vec<TrendPoint> = self
            .layer_rows(layer)
            .filter(|row| row.name == best.name)
            .filter_map(|row| {
                row.year.map(|year| TrendPoint {
                    year,
                    value: row
                        .attributes
                        .get(field.as_str())
                        .and_then(serde_json::Value::as_f64),
                })
            })
            .collect();
        points.sort_by_key(|p| p.year);
        Ok(points)
    }
}
