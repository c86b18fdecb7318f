use std::path::{
    Path,
    PathBuf,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::alignment::CliqueConfig;
use crate::engine::EngineConfig;
use crate::error::{
    AlignmentError,
    ConfigError,
};
use crate::similarity::SimilarityConfig;

/// Settings the core alignment needs.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy)]
pub struct AlignmentConfig {
    pub engine: EngineConfig,
    pub similarity: SimilarityConfig,
    pub clique: CliqueConfig,
}

impl AlignmentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.similarity.validate()?;
        self.clique.validate()?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub cliques_csv: Option<String>,
    pub unmatched_csv: Option<String>,
    pub summary_json: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            cliques_csv: Some("cliques.csv".into()),
            unmatched_csv: Some("unmatched.csv".into()),
            summary_json: Some("summary.json".into()),
        }
    }
}

impl OutputConfig {
    /// Joins every configured file name onto `dir`.
    pub fn resolve(
        &self,
        dir: &Path,
    ) -> OutputPaths {
        let join = |name: &Option<String>| name.as_ref().map(|n| dir.join(n));
        OutputPaths {
            cliques_csv: join(&self.cliques_csv),
            unmatched_csv: join(&self.unmatched_csv),
            summary_json: join(&self.summary_json),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub cliques_csv: Option<PathBuf>,
    pub unmatched_csv: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub engine_config: EngineConfig,
    pub similarity_config: SimilarityConfig,
    pub clique_config: CliqueConfig,
    pub output_config: OutputConfig,
}

impl Config {
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, AlignmentError> {
        let config_str = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&config_str)?;
        Ok(config)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_str)?;
        config.alignment().validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn alignment(&self) -> AlignmentConfig {
        AlignmentConfig {
            engine: self.engine_config,
            similarity: self.similarity_config,
            clique: self.clique_config,
        }
    }
}

#[cfg(test)]
mod test_config {
    use super::*;
    use crate::matrix::{
        StorageChoice,
        StorageKind,
    };

    #[test]
    fn test_template_round_trip() {
        let text = Config::default().to_toml().unwrap();
        assert!(text.contains("storage = \"auto\""));
        let parsed = Config::from_toml_str(&text).unwrap();
        assert_eq!(parsed.engine_config.tile_size, 512);
        assert_eq!(parsed.clique_config.min_clique_size, 2);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let text = r#"
            [engine_config]
            max_rt_difference = 1.0
            assume_symmetric = false
            num_threads = 2
            tile_size = 64
            storage = "row_compressed"
            show_progress = false
        "#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.engine_config.max_rt_difference, 1.0);
        assert_eq!(config.engine_config.max_rt2_difference, None);
        assert_eq!(
            config.engine_config.storage,
            StorageChoice::Fixed(StorageKind::RowCompressed)
        );
        assert_eq!(config.clique_config.min_similarity, 0.9);
    }

    #[test]
    fn test_bad_storage_kind() {
        let text = r#"
            [engine_config]
            max_rt_difference = 1.0
            assume_symmetric = true
            num_threads = 2
            tile_size = 64
            storage = "columnar"
            show_progress = false
        "#;
        assert!(matches!(
            Config::from_toml_str(text),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let text = r#"
            [clique_config]
            min_similarity = 0.5
            mutual_best_hit = true
            min_clique_size = 0
        "#;
        assert!(matches!(
            Config::from_toml_str(text),
            Err(ConfigError::InvalidParameter {
                name: "min_clique_size",
                ..
            })
        ));
    }

    #[test]
    fn test_output_paths() {
        let config = OutputConfig {
            unmatched_csv: None,
            ..Default::default()
        };
        let paths = config.resolve(Path::new("out"));
        assert_eq!(paths.cliques_csv, Some(PathBuf::from("out/cliques.csv")));
        assert_eq!(paths.unmatched_csv, None);
    }
}
