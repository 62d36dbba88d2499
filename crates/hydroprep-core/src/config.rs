//! Pipeline configuration. Every field has a default reproducing the fixed
//! layout the pipelines were built around, so an absent config file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use hydroprep_projection::Crs;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::facilities::facility_columns;
use crate::watersheds::{EnrichmentCrs, HucLevel};

pub const DEFAULT_STATE: &str = "TX";
pub const DEFAULT_FACILITY_INPUT: &str = "data/raw/echo/cwa_facilities_{state}.parquet";
pub const DEFAULT_FACILITY_OUTPUT: &str =
    "data/processed/echo/cwa_facilities_{state}_clean.parquet";
pub const DEFAULT_BOUNDARY_CONTAINER: &str = "data/external/wbd/WBD_National_GDB.gdb";
pub const DEFAULT_BOUNDARY_OUTPUT_DIR: &str = "data/processed/wbd";

/// Source columns that must be present in every facility extract.
pub const DEFAULT_REQUIRED_COLUMNS: [&str; 3] = ["SourceID", "FacLat", "FacLong"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub facilities: FacilitiesConfig,
    pub watersheds: WatershedsConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PipelineConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.facilities.validate()?;
        self.watersheds.huc_level()?;
        self.watersheds.enrichment_crs()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FacilitiesConfig {
    /// Two-letter state code; also fills `state` when the extract lacks it.
    pub state: String,
    /// Input path template; `{state}` expands to the lowercase state code.
    pub input: String,
    pub output: String,
    pub columns: ColumnSpec,
}

impl Default for FacilitiesConfig {
    fn default() -> Self {
        Self {
            state: DEFAULT_STATE.to_string(),
            input: DEFAULT_FACILITY_INPUT.to_string(),
            output: DEFAULT_FACILITY_OUTPUT.to_string(),
            columns: ColumnSpec::default(),
        }
    }
}

impl FacilitiesConfig {
    pub fn state_code(&self) -> String {
        self.state.trim().to_ascii_uppercase()
    }

    pub fn input_path(&self) -> PathBuf {
        expand_state(&self.input, &self.state)
    }

    pub fn output_path(&self) -> PathBuf {
        expand_state(&self.output, &self.state)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state.trim().is_empty() {
            return Err(ConfigError::EmptyState);
        }
        self.columns.validate()
    }
}

fn expand_state(template: &str, state: &str) -> PathBuf {
    PathBuf::from(template.replace("{state}", &state.trim().to_ascii_lowercase()))
}

/// Which allow-listed source columns an extract must carry and which may be
/// absent. A column named in `required` is required even if it is also
/// listed in `optional`; allow-listed columns named in neither are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnSpec {
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        let required: Vec<String> = DEFAULT_REQUIRED_COLUMNS
            .iter()
            .map(|name| name.to_string())
            .collect();
        let optional = facility_columns()
            .iter()
            .map(|rule| rule.source)
            .filter(|source| !DEFAULT_REQUIRED_COLUMNS.contains(source))
            .map(str::to_string)
            .collect();
        Self { required, optional }
    }
}

impl ColumnSpec {
    pub fn is_required(&self, source: &str) -> bool {
        self.required.iter().any(|name| name == source)
    }

    pub fn is_selected(&self, source: &str) -> bool {
        self.is_required(source) || self.optional.iter().any(|name| name == source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self.required.iter().chain(self.optional.iter()) {
            if !facility_columns().iter().any(|rule| rule.source == name) {
                return Err(ConfigError::UnknownColumn(name.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatershedsConfig {
    pub container: PathBuf,
    pub level: u8,
    pub output_dir: PathBuf,
    pub working_crs: String,
    pub geographic_crs: String,
}

impl Default for WatershedsConfig {
    fn default() -> Self {
        Self {
            container: PathBuf::from(DEFAULT_BOUNDARY_CONTAINER),
            level: HucLevel::HU4.digits(),
            output_dir: PathBuf::from(DEFAULT_BOUNDARY_OUTPUT_DIR),
            working_crs: "EPSG:5070".to_string(),
            geographic_crs: "EPSG:4326".to_string(),
        }
    }
}

impl WatershedsConfig {
    pub fn huc_level(&self) -> Result<HucLevel, ConfigError> {
        HucLevel::new(self.level).ok_or(ConfigError::InvalidLevel(self.level))
    }

    pub fn enrichment_crs(&self) -> Result<EnrichmentCrs, ConfigError> {
        let working = Crs::from_code(&self.working_crs)?;
        let geographic = Crs::from_code(&self.geographic_crs)?;
        if working.is_geographic() {
            return Err(ConfigError::CrsRole {
                role: "working",
                crs: self.working_crs.clone(),
            });
        }
        if !geographic.is_geographic() {
            return Err(ConfigError::CrsRole {
                role: "geographic",
                crs: self.geographic_crs.clone(),
            });
        }
        Ok(EnrichmentCrs {
            working,
            geographic,
        })
    }
}
