use derive_more::Display;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("k must be at least 1, got {0}")]
    KTooSmall(u32),

    #[error("density thresholds must satisfy low < high, got {low} and {high}")]
    ThresholdOrder { low: u64, high: u64 },

    #[error("k levels must not increase with density, got {sparse}, {medium}, {dense}")]
    KOrder { sparse: u32, medium: u32, dense: u32 },
}

/// Maps a local density to the anonymity requirement of a query.
///
/// The mapping must be deterministic and non-increasing in density:
/// the busier a neighborhood, the less a region has to grow.
pub trait KSelector {
    fn select(&self, density: u64) -> u32;
}

/// Ignores density and always requires the same k.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixedK(u32);

impl FixedK {
    pub fn new(k: u32) -> Result<Self, ConfigError> {
        if k < 1 {
            return Err(ConfigError::KTooSmall(k));
        }
        Ok(Self(k))
    }
}

impl KSelector for FixedK {
    fn select(&self, _density: u64) -> u32 {
        self.0
    }
}

/// How a density compares to the configured thresholds.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DensityBand {
    #[display("sparse")]
    Sparse,
    #[display("medium")]
    Medium,
    #[display("dense")]
    Dense,
}

/// Three-step policy: sparse neighborhoods get a large k, dense ones a
/// small k.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DensityAdaptiveK {
    low: u64,
    high: u64,
    k_sparse: u32,
    k_medium: u32,
    k_dense: u32,
}

impl DensityAdaptiveK {
    /// Builds a policy mapping `density < low` to `k_sparse`,
    /// `low <= density < high` to `k_medium` and `density >= high` to
    /// `k_dense`.
    pub fn new(
        low: u64,
        high: u64,
        k_sparse: u32,
        k_medium: u32,
        k_dense: u32,
    ) -> Result<Self, ConfigError> {
        if low >= high {
            return Err(ConfigError::ThresholdOrder { low, high });
        }
        for k in [k_sparse, k_medium, k_dense] {
            if k < 1 {
                return Err(ConfigError::KTooSmall(k));
            }
        }
        if k_dense > k_medium || k_medium > k_sparse {
            return Err(ConfigError::KOrder {
                sparse: k_sparse,
                medium: k_medium,
                dense: k_dense,
            });
        }
        Ok(Self {
            low,
            high,
            k_sparse,
            k_medium,
            k_dense,
        })
    }

    pub fn band(&self, density: u64) -> DensityBand {
        match density {
            d if d < self.low => DensityBand::Sparse,
            d if d < self.high => DensityBand::Medium,
            _ => DensityBand::Dense,
        }
    }
}

impl Default for DensityAdaptiveK {
    fn default() -> Self {
        Self {
            low: 4,
            high: 10,
            k_sparse: 10,
            k_medium: 5,
            k_dense: 2,
        }
    }
}

impl KSelector for DensityAdaptiveK {
    fn select(&self, density: u64) -> u32 {
        match self.band(density) {
            DensityBand::Sparse => self.k_sparse,
            DensityBand::Medium => self.k_medium,
            DensityBand::Dense => self.k_dense,
        }
    }
}
