//! Analysis configuration, loadable from TOML.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which resource is counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostMetric {
    /// Only explicit `tick` expressions cost.
    #[default]
    Ticks,
    /// One unit per evaluation step.
    Steps,
    /// One unit per allocated cons cell or tree node.
    Heap,
}

impl fmt::Display for CostMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CostMetric::Ticks => "ticks",
            CostMetric::Steps => "steps",
            CostMetric::Heap => "heap",
        })
    }
}

impl FromStr for CostMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticks" => Ok(CostMetric::Ticks),
            "steps" => Ok(CostMetric::Steps),
            "heap" => Ok(CostMetric::Heap),
            other => Err(format!("unknown metric `{}` (expected ticks, steps or heap)", other)),
        }
    }
}

/// How calls into already-solved groups are typed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallMode {
    /// Use the callee's solved signature as a fixed dependency.
    #[default]
    Fixed,
    /// Re-derive the callee group's constraints at every call site.
    Specialize,
}

impl FromStr for CallMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(CallMode::Fixed),
            "specialize" => Ok(CallMode::Specialize),
            other => Err(format!("unknown call mode `{}` (expected fixed or specialize)", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Maximum polynomial degree of the potential annotations.
    pub degree: u32,
    /// Functions to bound; empty means every function.
    pub targets: Vec<String>,
    pub metric: CostMetric,
    pub call_mode: CallMode,
    pub solver_timeout_ms: Option<u64>,
    /// Worker threads; 0 means one per available core.
    pub threads: usize,
    /// Produce a certificate per group.
    pub certificates: bool,
    /// Type recursive calls with a cost-free signature added on top of the
    /// regular one.
    pub cost_free: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            degree: 1,
            targets: Vec::new(),
            metric: CostMetric::Ticks,
            call_mode: CallMode::Fixed,
            solver_timeout_ms: None,
            threads: 0,
            certificates: false,
            cost_free: true,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: String, error: std::io::Error },
    Parse(toml::de::Error),
    InvalidConfig { field: &'static str, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, error } => write!(f, "failed to read {}: {}", path, error),
            ConfigError::Parse(error) => write!(f, "failed to parse configuration: {}", error),
            ConfigError::InvalidConfig { field, message } => {
                write!(f, "invalid configuration value for `{}`: {}", field, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { error, .. } => Some(error),
            ConfigError::Parse(error) => Some(error),
            ConfigError::InvalidConfig { .. } => None,
        }
    }
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<AnalysisConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.display().to_string(),
            error,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<AnalysisConfig, ConfigError> {
        let config: AnalysisConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.degree == 0 {
            return Err(ConfigError::InvalidConfig {
                field: "degree",
                message: "the degree must be at least 1".to_string(),
            });
        }
        if self.solver_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidConfig {
                field: "solver_timeout_ms",
                message: "a zero timeout can never succeed".to_string(),
            });
        }
        Ok(())
    }

    pub fn solver_timeout(&self) -> Option<Duration> {
        self.solver_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml = r#"
degree = 2
targets = ["append", "rev"]
metric = "heap"
call_mode = "specialize"
solver_timeout_ms = 1500
threads = 4
certificates = true
cost_free = false
"#;
        let config = AnalysisConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.degree, 2);
        assert_eq!(config.targets, vec!["append", "rev"]);
        assert_eq!(config.metric, CostMetric::Heap);
        assert_eq!(config.call_mode, CallMode::Specialize);
        assert_eq!(config.solver_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.threads, 4);
        assert!(config.certificates);
        assert!(!config.cost_free);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.degree, 1);
        assert_eq!(config.metric, CostMetric::Ticks);
        assert!(config.cost_free);
    }

    #[test]
    fn reject_zero_degree() {
        let err = AnalysisConfig::from_toml_str("degree = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { field: "degree", .. }));
        assert!(err.to_string().contains("at least 1"), "Error: {}", err);
    }

    #[test]
    fn reject_unknown_fields() {
        let err = AnalysisConfig::from_toml_str("degre = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn metric_from_str() {
        assert_eq!("steps".parse::<CostMetric>(), Ok(CostMetric::Steps));
        assert!("time".parse::<CostMetric>().is_err());
    }
}
