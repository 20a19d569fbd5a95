//! Enclosing-region lookup.
//!
//! | Input layer | Regions | How |
//! |-------------|---------|-----|
//! | `city`, `place` | counties | geometric: counties containing the centroid |
//! | `county` | MSAs | geometric: MSAs containing the centroid |
//! | `state` | counties | lexical: counties whose full name contains the state name |
//! | `msa` | | rejected |
//!
//! State resolution is lexical because a state polygon containing a point
//! says nothing about which counties lie inside the state.

use std::collections::BTreeSet;

use geolens_types::LayerType;

use crate::error::CoreError;
use crate::keys::CacheKey;
use crate::read_through::{Backends, Resolved};
use crate::resolver::{FeatureResolver, reference_point, validate_name};

/// Resolves the regions enclosing a feature.
#[derive(Clone)]
pub struct ContainmentResolver {
    backends: Backends,
    features: FeatureResolver,
}

impl ContainmentResolver {
    /// Create a resolver looking up base features through `features`.
    pub const fn new(backends: Backends, features: FeatureResolver) -> Self {
        Self { backends, features }
    }

    /// The layer whose regions enclose `layer`, if any.
    pub const fn region_layer(layer: LayerType) -> Option<LayerType> {
        match layer {
            LayerType::City | LayerType::Place | LayerType::State => Some(LayerType::County),
            LayerType::County => Some(LayerType::Msa),
            LayerType::Msa => None,
        }
    }

    /// Names of the regions enclosing `name`, sorted, without repeats.
    /// Empty when nothing encloses it.
    ///
    /// The base feature is resolved through the feature cache with `year`,
    /// so a year without a row is [`CoreError::NotFound`] here as well.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for the `msa` layer or a blank name,
    ///   before any cache or store access.
    /// - [`CoreError::NotFound`] when the feature does not exist.
    /// - [`CoreError::InvalidGeometry`] when it has no usable geometry.
    /// - [`CoreError::Backend`] when the store fails.
    pub async fn regions(
        &self,
        layer: LayerType,
        name: &str,
        year: Option<i32>,
    ) -> Result<Resolved<Vec<String>>, CoreError> {
        let Some(region_layer) = Self::region_layer(layer) else {
            return Err(CoreError::InvalidInput(format!(
                "no enclosing regions are defined for layer {layer}"
            )));
        };
        let name = validate_name(name)?;
        let key = CacheKey::regions(layer, &name, year);
        let resolver = self.clone();
        self.backends
            .read_through(key, async move {
                let names = if layer == LayerType::State {
                    resolver.lexical(&name, year).await?
                } else {
                    resolver.geometric(layer, &name, year, region_layer).await?
                };
                let regions: BTreeSet<String> = names.into_iter().collect();
                tracing::debug!(%layer, %name, regions = regions.len(), "regions resolved");
                Ok(regions.into_iter().collect())
            })
            .await
    }

    async fn geometric(
        &self,
        layer: LayerType,
        name: &str,
        year: Option<i32>,
        region_layer: LayerType,
    ) -> Result<Vec<String>, CoreError> {
        let feature = self.features.resolve_first(layer, name, year).await?;
        let centroid = reference_point(&feature)?;
        self.backends
            .query(
                "find_containing",
                layer,
                name,
                self.backends.store().find_containing(centroid, region_layer),
            )
            .await
    }

    async fn lexical(&self, name: &str, year: Option<i32>) -> Result<Vec<String>, CoreError> {
        let state = self
            .features
            .resolve_first(LayerType::State, name, year)
            .await?;
        let state_name = state.name().unwrap_or(name).to_owned();
        self.backends
            .query(
                "find_by_full_name",
                LayerType::State,
                name,
                self.backends
                    .store()
                    .find_by_full_name(LayerType::County, &state_name),
            )
            .await
    }
}
