use crate::discretizer::FeatureDiscretizer;
use crate::error::{RecommenderError, RecommenderResult};
use serde::{Deserialize, Serialize};

/// Root application configuration. Loaded from an optional TOML file, then
/// environment variables with the prefix `SURGIREC__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub bins: BinConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// `.npy` file holding the pre-trained decision table.
    #[serde(default = "default_table_path")]
    pub table_path: String,
    /// Labels for the table's action axis, in order.
    #[serde(default = "default_actions")]
    pub actions: Vec<String>,
}

/// Bin thresholds per continuous feature. Each list must be strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinConfig {
    #[serde(default = "default_age_bins")]
    pub age: Vec<f64>,
    #[serde(default = "default_bmi_bins")]
    pub bmi: Vec<f64>,
    #[serde(default = "default_wbc_bins")]
    pub wbc: Vec<f64>,
    #[serde(default = "default_sodium_bins")]
    pub sodium: Vec<f64>,
    #[serde(default = "default_hemoglobin_bins")]
    pub hemoglobin: Vec<f64>,
    #[serde(default = "default_potassium_bins")]
    pub potassium: Vec<f64>,
}

// Default functions
fn default_node_id() -> String {
    "surgirec-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_table_path() -> String {
    "trained_q_table_balanced.npy".to_string()
}
fn default_actions() -> Vec<String> {
    vec!["Open Surgery".to_string(), "Laparoscopy".to_string()]
}
fn default_age_bins() -> Vec<f64> {
    vec![10.0, 25.0, 60.0]
}
fn default_bmi_bins() -> Vec<f64> {
    vec![18.0, 25.0, 30.0]
}
fn default_wbc_bins() -> Vec<f64> {
    vec![4.0, 10.0, 15.0]
}
fn default_sodium_bins() -> Vec<f64> {
    vec![130.0, 138.0, 145.0]
}
fn default_hemoglobin_bins() -> Vec<f64> {
    vec![10.0, 13.0, 16.0]
}
fn default_potassium_bins() -> Vec<f64> {
    vec![3.5, 4.5, 5.5]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            table_path: default_table_path(),
            actions: default_actions(),
        }
    }
}

impl Default for BinConfig {
    fn default() -> Self {
        Self {
            age: default_age_bins(),
            bmi: default_bmi_bins(),
            wbc: default_wbc_bins(),
            sodium: default_sodium_bins(),
            hemoglobin: default_hemoglobin_bins(),
            potassium: default_potassium_bins(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            policy: PolicyConfig::default(),
            bins: BinConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file and environment variables.
    ///
    /// Environment wins over the file. List values (`SURGIREC__BINS__AGE`,
    /// `SURGIREC__POLICY__ACTIONS`) are comma-separated; a single value is a
    /// one-element list. Scalars stay strings and are converted on
    /// deserialization.
    pub fn load(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let mut env = config::Environment::with_prefix("SURGIREC")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("policy.actions");
        for feature in ["age", "bmi", "wbc", "sodium", "hemoglobin", "potassium"] {
            env = env.with_list_parse_key(&format!("bins.{feature}"));
        }

        let config = builder.add_source(env).build()?;
        config.try_deserialize()
    }

    /// Check the values the rest of the system treats as invariants.
    pub fn validate(&self) -> RecommenderResult<()> {
        FeatureDiscretizer::from_config(&self.bins)?;

        if self.policy.actions.is_empty() {
            return Err(RecommenderError::Config(
                "policy.actions must name at least one action".to_string(),
            ));
        }
        if let Some(blank) = self.policy.actions.iter().position(|a| a.trim().is_empty()) {
            return Err(RecommenderError::Config(format!(
                "policy.actions[{blank}] is empty"
            )));
        }
        if self.policy.table_path.trim().is_empty() {
            return Err(RecommenderError::Config(
                "policy.table_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
