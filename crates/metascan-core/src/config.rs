use crate::error::{DiscoveryError, Result as DiscoveryResult};
use crate::types::AnnotationTypeInfo;
use anyhow::{Context, Result};
use config as cfg;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine-level settings, loadable from a TOML file layered with
/// `METASCAN_`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_engine_name")]
    pub engine_name: String,
    /// Page size substituted when a caller passes limit 0.
    #[serde(default = "EngineConfig::default_default_page_size")]
    pub default_page_size: usize,
    /// Upper bound on caller-supplied page sizes.
    #[serde(default = "EngineConfig::default_max_page_size")]
    pub max_page_size: usize,
    /// Annotation kinds available without a catalog round-trip.
    #[serde(default = "EngineConfig::builtin_annotation_types")]
    pub annotation_types: Vec<AnnotationTypeInfo>,
}

impl EngineConfig {
    fn default_engine_name() -> String {
        "metascan".to_string()
    }

    fn default_default_page_size() -> usize {
        50
    }

    fn default_max_page_size() -> usize {
        500
    }

    fn builtin_annotation_types() -> Vec<AnnotationTypeInfo> {
        vec![
            AnnotationTypeInfo::new("schema-analysis", "Structure of the asset's data"),
            AnnotationTypeInfo::new("data-profile", "Value distributions and statistics"),
            AnnotationTypeInfo::new("classification", "Semantic classification of fields"),
            AnnotationTypeInfo::new("quality-metrics", "Data quality measurements"),
        ]
    }

    /// Loads configuration from an optional file plus environment
    /// overrides (`METASCAN_MAX_PAGE_SIZE=...` etc.), falling back to
    /// defaults for anything unset.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = cfg::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(cfg::File::from(path));
        }
        builder = builder.add_source(cfg::Environment::with_prefix("METASCAN"));
        let settings = builder.build().context("building engine configuration")?;
        settings
            .try_deserialize()
            .context("deserializing engine configuration")
    }

    /// Validates caller paging bounds, substituting the default page size
    /// for a zero limit.
    pub fn check_paging(&self, limit: usize) -> DiscoveryResult<usize> {
        if limit == 0 {
            return Ok(self.default_page_size);
        }
        if limit > self.max_page_size {
            return Err(DiscoveryError::invalid_parameter(
                "limit",
                format!("page size {} exceeds maximum {}", limit, self.max_page_size),
            ));
        }
        Ok(limit)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_name: Self::default_engine_name(),
            default_page_size: Self::default_default_page_size(),
            max_page_size: Self::default_max_page_size(),
            annotation_types: Self::builtin_annotation_types(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn paging_bounds() {
        let config = EngineConfig::default();
        assert_eq!(config.check_paging(0).unwrap(), 50);
        assert_eq!(config.check_paging(100).unwrap(), 100);
        assert!(config.check_paging(501).is_err());
    }

    #[test]
    fn load_from_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "engine_name = \"scan-lab\"\nmax_page_size = 1000").unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.engine_name, "scan-lab");
        assert_eq!(config.max_page_size, 1000);
        assert_eq!(config.default_page_size, 50);
        assert!(!config.annotation_types.is_empty());
    }
}
