//! Year-over-year demographic trends.

use geolens_types::{LayerType, TrendField, TrendPoint};

use crate::error::CoreError;
use crate::keys::CacheKey;
use crate::read_through::{Backends, Resolved};
use crate::resolver::validate_name;

/// Serves one demographic field across every year on record.
#[derive(Clone)]
pub struct TrendService {
    backends: Backends,
}

impl TrendService {
    /// Create a trend service.
    pub const fn new(backends: Backends) -> Self {
        Self { backends }
    }

    /// Values of `field` for `name`, ascending by year.
    ///
    /// `field` is a [`TrendField`], so only allowlisted columns can reach
    /// the store. Parse caller input with `str::parse::<TrendField>` and
    /// reject failures before calling this.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for a blank name.
    /// - [`CoreError::NotFound`] when no year-scoped row matches.
    /// - [`CoreError::Backend`] when the store fails.
    pub async fn trend(
        &self,
        layer: LayerType,
        name: &str,
        field: TrendField,
    ) -> Result<Resolved<Vec<TrendPoint>>, CoreError> {
        let name = validate_name(name)?;
        let key = CacheKey::trend(layer, &name, field);
        let backends = self.backends.clone();
        self.backends
            .read_through(key, async move {
                let points = backends
                    .query(
                        "fetch_trend",
                        layer,
                        &name,
                        backends.store().fetch_trend(layer, &name, field),
                    )
                    .await?;
                if points.is_empty() {
                    return Err(CoreError::not_found(layer, &name));
                }
                Ok(points)
            })
            .await
    }
}
