#[macro_use]
extern crate tracing;

mod args;

pub use args::Args;
use directories::ProjectDirs;
use eyre::{
    eyre,
    OptionExt as _,
    Result,
};
use serde::{
    Deserialize,
    Deserializer,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
    time::Duration,
};
use url::Url;

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");
const CONFIG_FILE_NAME: &str = "config.yaml";

pub fn get_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("LOAD_METRICS_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("video", "hyper", "load-metrics")
        .map(|dirs| dirs.config_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".config"))
}

/// A deployment whose CPU and memory usage gets polled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub workload: String,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, workload: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            workload: workload.into(),
        }
    }
}

impl FromStr for WorkloadRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, workload)) if !namespace.is_empty() && !workload.is_empty() => {
                Ok(Self::new(namespace, workload))
            }
            _ => Err(format!("expected <namespace>/<workload>, got {s:?}")),
        }
    }
}

/// A query that is not part of the built-in catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomQuery {
    pub name: String,
    pub query: String,
    /// `memory`, `percentage` or `simple`; anything else fails the report.
    pub result_kind: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub prometheus_url: Option<Url>,
    #[serde(default)]
    pub api_server_url: Option<Url>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub duration: Option<Duration>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub default_catalog: bool,
    #[serde(default)]
    pub workloads: Vec<WorkloadRef>,
    #[serde(default)]
    pub queries: Vec<CustomQuery>,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .expect("Failed to parse default config")
    }
}

impl Config {
    /// Layers the built-in defaults, the config file and the command-line arguments.
    ///
    /// The file given with `--config` must exist, `config.yaml` in the user config
    /// directory is optional.
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        let (path, required) = match &args.config {
            Some(path) => (path.clone(), true),
            None => (get_config_dir().join(CONFIG_FILE_NAME), false),
        };
        Self::from_file_and_args(&path, required, args)
    }

    fn from_file_and_args(path: &Path, required: bool, args: Args) -> Result<Self, config::ConfigError> {
        debug!(?path, required, "loading configuration");
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml))
            .add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Yaml)
                    .required(required),
            )
            .add_source(args)
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        self.prometheus_url()?;
        if self.interval.is_zero() {
            return Err(eyre!("interval must be greater than zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(eyre!("request_timeout must be greater than zero"));
        }
        if !self.default_catalog && self.workloads.is_empty() && self.queries.is_empty() {
            warn!("no queries configured, metrics collection will be skipped");
        }
        Ok(())
    }

    pub fn prometheus_url(&self) -> Result<&Url> {
        self.prometheus_url
            .as_ref()
            .ok_or_eyre("prometheus_url is required, pass --prometheus-url or set it in the config file")
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    humantime::parse_duration(&value).map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|value| humantime::parse_duration(&value).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser as _;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn missing_file() -> PathBuf {
        PathBuf::from("/nonexistent/load-metrics/config.yaml")
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.duration, None);
        assert!(config.default_catalog);
        assert_eq!(
            config.workloads,
            vec![WorkloadRef::new(
                "application-service",
                "application-service-controller-manager"
            )]
        );
        assert!(config.prometheus_url.is_none());
        assert!(config.validate().is_err());
    }

    #[test]
    fn args_override_defaults() {
        let args = Args::parse_from([
            "load-metrics",
            "--prometheus-url",
            "https://thanos-querier.example.com",
            "--interval",
            "30s",
            "--duration",
            "1h",
            "--workload",
            "ns/deploy",
            "--no-default-catalog",
        ]);
        let config = Config::from_file_and_args(&missing_file(), false, args).unwrap();
        assert_eq!(
            config.prometheus_url.as_ref().map(Url::as_str),
            Some("https://thanos-querier.example.com/")
        );
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.duration, Some(Duration::from_secs(3600)));
        assert_eq!(config.workloads, vec![WorkloadRef::new("ns", "deploy")]);
        assert!(!config.default_catalog);
        config.validate().unwrap();
    }

    #[test]
    fn file_between_defaults_and_args() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("config.yaml");
        std::fs::write(
            &path,
            r#"
prometheus_url: https://prometheus.example.com/
interval: 1m
queries:
  - name: Pipeline Runs
    query: sum(tekton_pipelines_controller_running_pipelineruns_count)
    result_kind: simple
"#,
        )
        .unwrap();

        let args = Args::parse_from(["load-metrics", "--interval", "10s"]);
        let config = Config::from_file_and_args(&path, true, args).unwrap();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(
            config.queries,
            vec![CustomQuery {
                name: "Pipeline Runs".to_string(),
                query: "sum(tekton_pipelines_controller_running_pipelineruns_count)".to_string(),
                result_kind: "simple".to_string(),
            }]
        );
    }

    #[test]
    fn required_file_must_exist() {
        assert!(Config::from_file_and_args(&missing_file(), true, Args::default()).is_err());
    }

    #[test]
    fn invalid_interval() {
        let args = Args::parse_from(["load-metrics", "--interval", "soon"]);
        assert!(Config::from_file_and_args(&missing_file(), false, args).is_err());

        let args = Args::parse_from([
            "load-metrics",
            "--prometheus-url",
            "http://localhost:9090",
            "--interval",
            "0s",
        ]);
        let config = Config::from_file_and_args(&missing_file(), false, args).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn workload_ref_from_str() {
        assert_eq!("ns/deploy".parse::<WorkloadRef>(), Ok(WorkloadRef::new("ns", "deploy")));
        assert!("deploy".parse::<WorkloadRef>().is_err());
        assert!("ns/".parse::<WorkloadRef>().is_err());
    }
}
