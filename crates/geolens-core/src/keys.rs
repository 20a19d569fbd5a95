//! Cache key construction.
//!
//! A key is an ordered list of typed components joined with `:`. Every
//! parameter that changes the result of a query is part of its key, so
//! two logically distinct queries never share a cache entry. Free-text
//! components are normalized (trimmed, lower-cased) and escape `%` and
//! `:`, which keeps the join unambiguous.
//!
//! | Pattern | Query |
//! |---------|-------|
//! | `feature:{layer}:{name}:{year}` | feature lookup |
//! | `nearby:{layer}:{name}:{year}:{radius_km}:{limit}` | radius search |
//! | `border:{name}:{radius_km}:{limit}` | places along a state border |
//! | `regions:{layer}:{name}:{year}` | enclosing regions |
//! | `trend:{layer}:{name}:{field}` | demographic trend |
//!
//! An absent year is written as `*`, which no escaped year can produce.

use core::fmt;

use geolens_types::{LayerType, TrendField};

/// A fully-formed, collision-free cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a feature lookup.
    pub fn feature(layer: LayerType, name: &str, year: Option<i32>) -> Self {
        Self::build(&["feature", layer.as_str(), &text(name), &year_part(year)])
    }

    /// Key for a radius search around a feature.
    pub fn nearby(
        layer: LayerType,
        name: &str,
        year: Option<i32>,
        radius_km: f64,
        limit: usize,
    ) -> Self {
        Self::build(&[
            "nearby",
            layer.as_str(),
            &text(name),
            &year_part(year),
            &radius_km.to_string(),
            &limit.to_string(),
        ])
    }

    /// Key for a search of places along a state's border.
    pub fn border(state: &str, radius_km: f64, limit: usize) -> Self {
        Self::build(&[
            "border",
            &text(state),
            &radius_km.to_string(),
            &limit.to_string(),
        ])
    }

    /// Key for an enclosing-region lookup.
    pub fn regions(layer: LayerType, name: &str, year: Option<i32>) -> Self {
        Self::build(&["regions", layer.as_str(), &text(name), &year_part(year)])
    }

    /// Key for a demographic trend.
    pub fn trend(layer: LayerType, name: &str, field: TrendField) -> Self {
        Self::build(&["trend", layer.as_str(), &text(name), field.as_str()])
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn build(parts: &[&str]) -> Self {
        Self(parts.join(":"))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a free-text component. `%` is escaped first so the escape
/// sequences themselves stay unambiguous.
fn text(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace('%', "%25")
        .replace(':', "%3A")
        .replace('*', "%2A")
}

fn year_part(year: Option<i32>) -> String {
    year.map_or_else(|| String::from("*"), |y| y.to_string())
}
