//! [`SpatialStore`] over the `PostGIS` `demographics` table.
//!
//! Every query is a static template. Caller text only ever reaches the
//! database as a bound parameter, and the trend column comes from a fixed
//! [`TrendField`] to SQL mapping.
//!
//! Name matching is `ILIKE '%name%'` with `%`, `_` and `\` escaped in the
//! name; state lookups also match `stusps` exactly. Among several rows for
//! one name, the requested year wins over an unscoped row, and without a
//! requested year the latest row wins (`DISTINCT ON ... year DESC NULLS
//! LAST`). Distances are `geography` distances in meters on the WGS84
//! ellipsoid.

use async_trait::async_trait;
use geolens_core::StoreError;
use geolens_core::store::{FeatureQuery, RadiusQuery, RegionQuery, SpatialStore};
use geolens_types::{
    Feature, FeatureCollection, GeoPoint, Geometry, LayerType, ProximityHit, TrendField,
    TrendPoint,
};

use crate::error::DbError;
use crate::postgres::PostgresPool;

/// Row predicate: `$1` layer, `$2` trimmed name, `$3` escaped name.
macro_rules! name_match {
    () => {
        "d.layer_type = $1 \
         AND (d.name ILIKE '%' || $3 || '%' ESCAPE '\\' \
              OR ($1 = 'state' AND upper(d.stusps) = upper($2)))"
    };
}

/// Exact-match-first ordering key, same parameters as [`name_match!`].
macro_rules! exact_first {
    () => {
        "(lower(d.name) = lower($2)) DESC, d.name"
    };
}

const FEATURES_SQL: &str = concat!(
    "SELECT m.geometry, m.properties FROM (",
    " SELECT DISTINCT ON (d.name)",
    "  d.name,",
    "  ST_AsGeoJSON(d.geom)::jsonb AS geometry,",
    "  to_jsonb(d) - 'geom' - 'id' AS properties,",
    "  (lower(d.name) = lower($2)) AS exact",
    " FROM demographics d",
    " WHERE ",
    name_match!(),
    "  AND ($4::int IS NULL OR d.year = $4 OR d.year IS NULL)",
    " ORDER BY d.name, d.year DESC NULLS LAST",
    ") m ORDER BY m.exact DESC, m.name LIMIT $5"
);

const CENTROID_SQL: &str = concat!(
    "SELECT ST_X(c.pt) AS lon, ST_Y(c.pt) AS lat FROM (",
    " SELECT ST_Centroid(d.geom) AS pt FROM demographics d",
    " WHERE d.geom IS NOT NULL AND ",
    name_match!(),
    " ORDER BY ",
    exact_first!(),
    ", d.year DESC NULLS LAST LIMIT 1",
    ") c"
);

const CONTAINING_SQL: &str = "SELECT DISTINCT d.name FROM demographics d \
     WHERE d.layer_type = $1 AND d.geom IS NOT NULL \
       AND ST_Contains(d.geom, ST_SetSRID(ST_MakePoint($2, $3), 4326)) \
     ORDER BY d.name";

const RADIUS_SQL: &str = "WITH center AS (\
       SELECT ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography AS g) \
     SELECT n.name, n.distance_m FROM (\
       SELECT DISTINCT ON (d.name) d.name, \
              ST_Distance(d.geom::geography, c.g) AS distance_m \
       FROM demographics d, center c \
       WHERE d.layer_type = $1 AND d.geom IS NOT NULL \
         AND ($5::text IS NULL OR lower(d.name) <> lower($5)) \
         AND ST_DWithin(d.geom::geography, c.g, $4) \
       ORDER BY d.name, distance_m) n \
     WHERE n.distance_m > 0 \
     ORDER BY n.distance_m, n.name LIMIT $6";

const NEAR_REGION_SQL: &str = "WITH region AS (\
       SELECT ST_SetSRID(ST_GeomFromGeoJSON($2), 4326) AS geom) \
     SELECT n.name, n.distance_m FROM (\
       SELECT DISTINCT ON (d.name) d.name, \
              ST_Distance(d.geom::geography, r.geom::geography) AS distance_m \
       FROM demographics d, region r \
       WHERE d.layer_type = $1 AND d.geom IS NOT NULL \
         AND NOT ST_Intersects(d.geom, r.geom) \
         AND ST_DWithin(d.geom::geography, r.geom::geography, $3) \
       ORDER BY d.name, distance_m) n \
     WHERE n.distance_m > 0 \
     ORDER BY n.distance_m, n.name LIMIT $4";

const FULL_NAME_SQL: &str = "SELECT DISTINCT d.name FROM demographics d \
     WHERE d.layer_type = $1 AND d.full_name ILIKE '%' || $2 || '%' ESCAPE '\\' \
     ORDER BY d.name";

/// Trend query for one attribute column. The best name match is picked
/// first, then every year-scoped row of that name is read.
macro_rules! trend_sql {
    ($column:literal) => {
        concat!(
            "WITH best AS (SELECT d.name FROM demographics d WHERE ",
            name_match!(),
            " ORDER BY ",
            exact_first!(),
            " LIMIT 1) ",
            "SELECT d.year, d.",
            $column,
            "::float8 AS value FROM demographics d JOIN best b ON d.name = b.name ",
            "WHERE d.layer_type = $1 AND d.year IS NOT NULL ORDER BY d.year"
        )
    };
}

/// The static trend query for `field`.
const fn trend_sql(field: TrendField) -> &'static str {
    match field {
        TrendField::Population => trend_sql!("population"),
        TrendField::MedianHouseholdIncome => trend_sql!("median_household_income"),
        TrendField::EducationTotal => trend_sql!("education_total"),
        TrendField::BachelorDegree => trend_sql!("bachelor_degree"),
        TrendField::MastersDegree => trend_sql!("masters_degree"),
        TrendField::MeansOfTransportationToWork => {
            trend_sql!("means_of_transportation_to_work")
        }
        TrendField::PopulationBelowPovertyLevel => trend_sql!("population_below_poverty_level"),
    }
}

/// Escape `LIKE` metacharacters so `name` matches literally.
fn escape_like(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn store_err(e: sqlx::Error) -> StoreError {
    DbError::from(e).into()
}

#[derive(sqlx::FromRow)]
struct FeatureRow {
    geometry: Option<serde_json::Value>,
    properties: serde_json::Value,
}

impl FeatureRow {
    fn into_feature(self) -> Result<Feature, StoreError> {
        let geometry = self.geometry.as_ref().map(Geometry::decode).transpose()?;
        let properties = match self.properties {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Ok(Feature::new(geometry, properties))
    }
}

#[async_trait]
impl SpatialStore for PostgresPool {
    async fn fetch_feature_collection(
        &self,
        query: &FeatureQuery,
    ) -> Result<FeatureCollection, StoreError> {
        let name = query.name.trim();
        let rows = sqlx::query_as::<_, FeatureRow>(FEATURES_SQL)
            .bind(query.layer.as_str())
            .bind(name)
            .bind(escape_like(name))
            .bind(query.year)
            .bind(limit(query.limit))
            .fetch_all(self.pool())
            .await
            .map_err(store_err)?;
        let features = rows
            .into_iter()
            .map(FeatureRow::into_feature)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureCollection::new(features))
    }

    async fn fetch_centroid(
        &self,
        layer: LayerType,
        name: &str,
    ) -> Result<Option<GeoPoint>, StoreError> {
        let name = name.trim();
        let row: Option<(Option<f64>, Option<f64>)> = sqlx::query_as(CENTROID_SQL)
            .bind(layer.as_str())
            .bind(name)
            .bind(escape_like(name))
            .fetch_optional(self.pool())
            .await
            .map_err(store_err)?;
        Ok(match row {
            Some((Some(lon), Some(lat))) => Some(GeoPoint::new(lon, lat)),
            _ => None,
        })
    }

    async fn find_containing(
        &self,
        point: GeoPoint,
        layer: LayerType,
    ) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar(CONTAINING_SQL)
            .bind(layer.as_str())
            .bind(point.lon)
            .bind(point.lat)
            .fetch_all(self.pool())
            .await
            .map_err(store_err)
    }

    async fn find_within_radius(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<ProximityHit>, StoreError> {
        let rows: Vec<(String, f64)> = sqlx::query_as(RADIUS_SQL)
            .bind(query.layer.as_str())
            .bind(query.center.lon)
            .bind(query.center.lat)
            .bind(query.radius_km * 1000.0)
            .bind(query.exclude_name.as_deref())
            .bind(limit(query.limit))
            .fetch_all(self.pool())
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|(name, distance_m)| ProximityHit { name, distance_m })
            .collect())
    }

    async fn find_near_region(
        &self,
        query: &RegionQuery,
    ) -> Result<Vec<ProximityHit>, StoreError> {
        let rows: Vec<(String, f64)> = sqlx::query_as(NEAR_REGION_SQL)
            .bind(query.layer.as_str())
            .bind(query.region.encode().to_string())
            .bind(query.radius_km * 1000.0)
            .bind(limit(query.limit))
            .fetch_all(self.pool())
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|(name, distance_m)| ProximityHit { name, distance_m })
            .collect())
    }

    async fn find_by_full_name(
        &self,
        layer: LayerType,
        pattern: &str,
    ) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar(FULL_NAME_SQL)
            .bind(layer.as_str())
            .bind(escape_like(pattern.trim()))
            .fetch_all(self.pool())
            .await
            .map_err(store_err)
    }

    async fn fetch_trend(
        &self,
        layer: LayerType,
        name: &str,
        field: TrendField,
    ) -> Result<Vec<TrendPoint>, StoreError> {
        let name = name.trim();
        let rows: Vec<(i32, Option<f64>)> = sqlx::query_as(trend_sql(field))
            .bind(layer.as_str())
            .bind(name)
            .bind(escape_like(name))
            .fetch_all(self.pool())
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|(year, value)| TrendPoint { year, value })
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn close(&self) {
        Self::close(self).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("Austin"), "Austin");
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
    }

    #[test]
    fn every_trend_field_has_its_own_column() {
        for field in TrendField::ALL {
            let sql = trend_sql(field);
            assert!(sql.contains(&format!("d.{}::float8", field.as_str())), "{sql}");
        }
    }

    #[test]
    fn templates_bind_rather_than_interpolate() {
        for sql in [FEATURES_SQL, CENTROID_SQL, RADIUS_SQL, FULL_NAME_SQL] {
            assert!(sql.contains("$1"));
            assert!(!sql.contains("{}"));
        }
        assert!(NEAR_REGION_SQL.contains("NOT ST_Intersects"));
        assert!(RADIUS_SQL.contains("distance_m > 0"));
    }
}
