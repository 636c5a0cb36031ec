use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use ustcore::{EngineConfig, FilterParams, DEFAULT_NEAR_FIELD_DEFECTS};

/// Physical scan-area extents in millimetres.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AreaSize {
    pub width_mm: f64,
    pub depth_mm: f64,
}

impl Default for AreaSize {
    fn default() -> Self {
        Self {
            width_mm: 40.0,
            depth_mm: 60.0,
        }
    }
}

fn default_skip() -> usize {
    1
}

fn default_window_lateral() -> usize {
    4
}

fn default_window_axial() -> usize {
    26
}

fn default_near_field_defects() -> usize {
    DEFAULT_NEAR_FIELD_DEFECTS
}

/// Full processing-run configuration. `beams` and `depth` are required;
/// everything else carries the platform defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessorConfig {
    pub beams: usize,
    pub depth: usize,
    #[serde(default = "default_skip")]
    pub skip: usize,
    #[serde(default)]
    pub area: AreaSize,
    #[serde(default)]
    pub raw_dir: Option<PathBuf>,
    #[serde(default)]
    pub monitoring_config: Option<PathBuf>,
    #[serde(default = "default_window_lateral")]
    pub window_lateral: usize,
    #[serde(default = "default_window_axial")]
    pub window_axial: usize,
    #[serde(default = "default_near_field_defects")]
    pub near_field_defects: usize,
    #[serde(default)]
    pub filter: FilterParams,
}

impl ProcessorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading processing config {}", path_ref.display()))?;
        let mut config: ProcessorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing processing config {}", path_ref.display()))?;
        config.normalize();
        Ok(config)
    }

    pub fn from_args(beams: usize, depth: usize, skip: usize) -> Self {
        let mut config = Self {
            beams,
            depth,
            skip,
            area: AreaSize::default(),
            raw_dir: None,
            monitoring_config: None,
            window_lateral: default_window_lateral(),
            window_axial: default_window_axial(),
            near_field_defects: default_near_field_defects(),
            filter: FilterParams::default(),
        };
        config.normalize();
        config
    }

    /// A stride of zero would pair nothing; fold it to one.
    fn normalize(&mut self) {
        if self.skip == 0 {
            self.skip = 1;
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            beams: self.beams,
            depth: self.depth,
            window_lateral: self.window_lateral,
            window_axial: self.window_axial,
            near_field_defects: self.near_field_defects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_produces_engine_config() {
        let config = ProcessorConfig::from_args(64, 1024, 2);
        let engine = config.engine_config();
        assert_eq!(engine.beams, 64);
        assert_eq!(engine.window_axial, 26);
        assert_eq!(engine.near_field_defects, DEFAULT_NEAR_FIELD_DEFECTS);
    }

    #[test]
    fn config_load_reads_yaml_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"beams: 128\ndepth: 2048\nskip: 3\n").unwrap();
        let path = temp.into_temp_path();
        let config = ProcessorConfig::load(&path).unwrap();
        assert_eq!(config.beams, 128);
        assert_eq!(config.skip, 3);
        assert_eq!(config.window_lateral, 4);
        assert!((config.area.width_mm - 40.0).abs() < f64::EPSILON);
        assert!(config.raw_dir.is_none());
    }

    #[test]
    fn config_load_fails_without_required_dimensions() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"depth: 2048\n").unwrap();
        let path = temp.into_temp_path();
        assert!(ProcessorConfig::load(&path).is_err());
    }

    #[test]
    fn zero_stride_is_folded_to_one() {
        assert_eq!(ProcessorConfig::from_args(8, 8, 0).skip, 1);
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"beams: 8\ndepth: 64\nskip: 0\n").unwrap();
        let path = temp.into_temp_path();
        assert_eq!(ProcessorConfig::load(&path).unwrap().skip, 1);
    }
}
