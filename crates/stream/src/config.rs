use serde::{Deserialize, Serialize};
use std::path::Path;
use viewsync_common::{CellGeometry, DistanceMetric};
use viewsync_kernel::SnapshotKind;

/// Errors from loading or validating a [`StreamConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Streaming configuration: cell geometry, distances and per-tick budgets.
///
/// Distances given in blocks are converted to cells through the configured
/// geometry, and every radius is measured with the same `metric`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Cells are `1 << cell_bits` blocks per edge.
    pub cell_bits: u32,
    /// Base number of cell transmissions allowed per tick.
    pub chunks_per_tick: u32,
    /// Budget multiplier while priority cells are waiting.
    pub priority_multiplier: u32,
    /// Radius (in blocks) around the viewer streamed before anything else.
    pub priority_distance: u32,
    /// Movement (in blocks) since the last check that triggers a recompute.
    pub recompute_distance: f32,
    pub metric: DistanceMetric,
    /// What a cell transmission carries.
    pub snapshot_kind: SnapshotKind,
}

impl Default for StreamConfig {
    fn default() -> Self {
        let half_edge = (CellGeometry::DEFAULT.edge() / 2) as u32;
        Self {
            cell_bits: CellGeometry::DEFAULT.bits(),
            chunks_per_tick: 3,
            priority_multiplier: 4,
            priority_distance: half_edge,
            recompute_distance: half_edge as f32,
            metric: DistanceMetric::Chebyshev,
            snapshot_kind: SnapshotKind::Full,
        }
    }
}

impl StreamConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        CellGeometry::new(self.cell_bits).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.chunks_per_tick == 0 {
            return Err(ConfigError::Invalid("chunks_per_tick must be positive".into()));
        }
        if self.priority_multiplier == 0 {
            return Err(ConfigError::Invalid(
                "priority_multiplier must be positive".into(),
            ));
        }
        if self.recompute_distance.is_nan() || self.recompute_distance < 0.0 {
            return Err(ConfigError::Invalid(
                "recompute_distance must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    /// Cell geometry; falls back to the default for an unvalidated config.
    pub fn geometry(&self) -> CellGeometry {
        CellGeometry::new(self.cell_bits).unwrap_or_default()
    }

    /// Priority distance in cells under the shared metric.
    pub fn priority_radius(&self) -> u32 {
        self.geometry().cells_covering(self.priority_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = StreamConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chunks_per_tick, 3);
        assert_eq!(config.priority_distance, 8);
        assert_eq!(config.priority_radius(), 1);
        assert_eq!(config.geometry().edge(), 16);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = StreamConfig::from_yaml_str("chunks_per_tick: 8\nmetric: euclidean\n").unwrap();
        assert_eq!(config.chunks_per_tick, 8);
        assert_eq!(config.metric, DistanceMetric::Euclidean);
        assert_eq!(config.priority_multiplier, 4);
        assert_eq!(config.snapshot_kind, SnapshotKind::Full);
    }

    #[test]
    fn rejects_zero_budget() {
        let err = StreamConfig::from_yaml_str("chunks_per_tick: 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_cell_bits() {
        let err = StreamConfig::from_yaml_str("cell_bits: 12").unwrap_err();
        assert!(err.to_string().contains("cell_bits"));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = StreamConfig::from_yaml_str("chunks_per_tick: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cell_bits: 5\npriority_distance: 40\nsnapshot_kind: blocks").unwrap();
        let config = StreamConfig::load(file.path()).unwrap();
        assert_eq!(config.geometry().edge(), 32);
        assert_eq!(config.priority_radius(), 2);
        assert_eq!(config.snapshot_kind, SnapshotKind::Blocks);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = StreamConfig::load("/nonexistent/viewsync.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
