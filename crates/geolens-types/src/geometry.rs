//! Geometry codec.
//!
//! Stored geometries arrive as GeoJSON geometry objects. [`Geometry::decode`]
//! turns such a value into a tagged coordinate tree and rejects anything
//! that is not a Point, Polygon, or `MultiPolygon`. Geometric questions
//! (centroid, point containment, geodesic distance) are answered by
//! converting into [`geo`] types, so a malformed tree surfaces as a
//! [`GeometryError`] rather than as a wrong answer.

use geo::{Centroid, Contains, Coord, Distance, Geodesic, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

/// A single GeoJSON position: `[longitude, latitude, ...]`.
pub type Position = Vec<f64>;

/// Errors produced while decoding or evaluating a geometry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The geometry kind is valid GeoJSON but not one this service handles.
    #[error("unsupported geometry kind: {0}")]
    UnsupportedKind(String),

    /// The coordinate tree does not match its declared kind.
    #[error("malformed geometry: {0}")]
    Malformed(String),

    /// The geometry has no area or points to derive a location from.
    #[error("geometry is empty")]
    Empty,
}

/// A WGS84 longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl GeoPoint {
    /// Create a point from longitude and latitude.
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Whether both ordinates are finite and inside the WGS84 range.
    pub fn is_valid(self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// Geodesic (WGS84 ellipsoid) distance to `other` in meters.
    pub fn geodesic_distance_m(self, other: Self) -> f64 {
        Geodesic.distance(geo::Point::from(self), geo::Point::from(other))
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        Self::new(p.lon, p.lat)
    }
}

impl From<geo::Point<f64>> for GeoPoint {
    fn from(p: geo::Point<f64>) -> Self {
        Self::new(p.x(), p.y())
    }
}

/// The kind tag of a [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// One exterior ring plus optional holes.
    Polygon,
    /// A set of polygons.
    MultiPolygon,
}

/// A GeoJSON geometry restricted to the kinds the service supports.
///
/// Serializes as `{"type": "...", "coordinates": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// `[lon, lat]`.
    Point(Position),
    /// Rings of positions; the first ring is the exterior.
    Polygon(Vec<Vec<Position>>),
    /// Polygons of rings of positions.
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// Decode a GeoJSON geometry value.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnsupportedKind`] for any kind other than
    /// Point, Polygon, or `MultiPolygon`, and [`GeometryError::Malformed`]
    /// when the value has no kind tag or its coordinates do not fit it.
    pub fn decode(value: &serde_json::Value) -> Result<Self, GeometryError> {
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| GeometryError::Malformed(String::from("missing \"type\"")))?;
        if !matches!(kind, "Point" | "Polygon" | "MultiPolygon") {
            return Err(GeometryError::UnsupportedKind(kind.to_owned()));
        }
        let geometry: Self = serde_json::from_value(value.clone())
            .map_err(|e| GeometryError::Malformed(format!("{kind}: {e}")))?;
        geometry.to_geo()?;
        Ok(geometry)
    }

    /// Encode as a GeoJSON geometry value.
    pub fn encode(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// A Point geometry at `point`.
    pub fn point(point: GeoPoint) -> Self {
        Self::Point(vec![point.lon, point.lat])
    }

    /// The kind tag.
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// Convert into a [`geo::Geometry`].
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Malformed`] when a position is short or
    /// non-finite, a ring has fewer than three positions, or a polygon has
    /// no rings.
    pub fn to_geo(&self) -> Result<geo::Geometry<f64>, GeometryError> {
        Ok(match self {
            Self::Point(p) => geo::Geometry::Point(geo::Point(coord(p)?)),
            Self::Polygon(rings) => geo::Geometry::Polygon(polygon(rings)?),
            Self::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(MultiPolygon::new(
                polygons
                    .iter()
                    .map(|rings| polygon(rings))
                    .collect::<Result<_, _>>()?,
            )),
        })
    }

    /// The reference point of this geometry.
    ///
    /// A Point is its own reference point. Polygons and multipolygons use
    /// their area-weighted centroid.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Empty`] when the geometry has no centroid
    /// (e.g. an empty `MultiPolygon`), or [`GeometryError::Malformed`]
    /// from [`Geometry::to_geo`].
    pub fn centroid(&self) -> Result<GeoPoint, GeometryError> {
        let centroid = match self.to_geo()? {
            geo::Geometry::Point(p) => Some(p),
            geo::Geometry::Polygon(p) => p.centroid(),
            geo::Geometry::MultiPolygon(mp) => mp.centroid(),
            _ => None,
        };
        centroid.map(GeoPoint::from).ok_or(GeometryError::Empty)
    }

    /// Whether `point` lies in the interior of this geometry.
    ///
    /// Points on a boundary are not contained. A Point geometry contains
    /// nothing but itself.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Malformed`] from [`Geometry::to_geo`].
    pub fn contains(&self, point: GeoPoint) -> Result<bool, GeometryError> {
        let p = geo::Point::from(point);
        Ok(match self.to_geo()? {
            geo::Geometry::Point(q) => q == p,
            geo::Geometry::Polygon(poly) => poly.contains(&p),
            geo::Geometry::MultiPolygon(mp) => mp.contains(&p),
            _ => false,
        })
    }

    /// Every position of the geometry, flattened.
    pub fn positions(&self) -> Vec<GeoPoint> {
        let to_point = |p: &Position| match p.as_slice() {
            [lon, lat, ..] => Some(GeoPoint::new(*lon, *lat)),
            _ => None,
        };
        match self {
            Self::Point(p) => to_point(p).into_iter().collect(),
            Self::Polygon(rings) => rings.iter().flatten().filter_map(to_point).collect(),
            Self::MultiPolygon(polygons) => polygons
                .iter()
                .flatten()
                .flatten()
                .filter_map(to_point)
                .collect(),
        }
    }
}

fn coord(position: &[f64]) -> Result<Coord<f64>, GeometryError> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
        _ => Err(GeometryError::Malformed(format!(
            "invalid position {position:?}"
        ))),
    }
}

fn ring(positions: &[Position]) -> Result<LineString<f64>, GeometryError> {
    if positions.len() < 3 {
        return Err(GeometryError::Malformed(format!(
            "ring has {} positions, need at least 3",
            positions.len()
        )));
    }
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>, GeometryError> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| GeometryError::Malformed(String::from("polygon has no rings")))?;
    let interiors = interiors
        .iter()
        .map(|r| ring(r))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(ring(exterior)?, interiors))
}
