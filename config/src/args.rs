use crate::WorkloadRef;
use clap::Parser;
use std::{
    collections::HashMap,
    path::PathBuf,
};
use url::Url;

/// Collect cluster metrics from Prometheus while a load test runs.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file to use instead of `config.yaml` in the user config directory.
    #[arg(long, env = "LOAD_METRICS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the Prometheus / Thanos querier.
    #[arg(long, env = "LOAD_METRICS_PROMETHEUS_URL")]
    pub prometheus_url: Option<Url>,

    /// Cluster API server, used to find the token request page on 403 responses.
    #[arg(long, env = "LOAD_METRICS_API_SERVER_URL")]
    pub api_server_url: Option<Url>,

    /// Bearer token for the querier. Falls back to `oc whoami -t`.
    #[arg(long, env = "LOAD_METRICS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Polling interval, e.g. "30s" or "5m".
    #[arg(long, env = "LOAD_METRICS_INTERVAL")]
    pub interval: Option<String>,

    /// Stop after this long instead of waiting for Ctrl-C.
    #[arg(long, env = "LOAD_METRICS_DURATION")]
    pub duration: Option<String>,

    /// Timeout of a single query request.
    #[arg(long)]
    pub request_timeout: Option<String>,

    /// Deployment to watch as `namespace/workload`. Replaces the configured workloads.
    #[arg(long = "workload")]
    pub workloads: Vec<WorkloadRef>,

    /// Only poll the configured workloads and queries.
    #[arg(long, action)]
    pub no_default_catalog: bool,

    /// Also write the report as JSON to this file.
    #[arg(long, env = "LOAD_METRICS_OUTPUT_FILE")]
    pub output_file: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl config::Source for Args {
    fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
        Box::new((*self).clone())
    }

    fn collect(&self) -> Result<config::Map<String, config::Value>, config::ConfigError> {
        let mut cache = HashMap::<String, config::Value>::new();
        if let Some(url) = &self.prometheus_url {
            cache.insert("prometheus_url".to_string(), url.to_string().into());
        }
        if let Some(url) = &self.api_server_url {
            cache.insert("api_server_url".to_string(), url.to_string().into());
        }
        if let Some(token) = &self.token {
            cache.insert("token".to_string(), token.clone().into());
        }
        if let Some(interval) = &self.interval {
            cache.insert("interval".to_string(), interval.clone().into());
        }
        if let Some(duration) = &self.duration {
            cache.insert("duration".to_string(), duration.clone().into());
        }
        if let Some(timeout) = &self.request_timeout {
            cache.insert("request_timeout".to_string(), timeout.clone().into());
        }
        if !self.workloads.is_empty() {
            cache.insert(
                "workloads".to_string(),
                self.workloads
                    .iter()
                    .map(|ea| {
                        config::ValueKind::Table(HashMap::from_iter([
                            ("namespace".to_string(), ea.namespace.clone().into()),
                            ("workload".to_string(), ea.workload.clone().into()),
                        ]))
                    })
                    .collect::<Vec<_>>()
                    .into(),
            );
        }
        if self.no_default_catalog {
            cache.insert("default_catalog".to_string(), false.into());
        }
        if let Some(path) = &self.output_file {
            cache.insert("output_file".to_string(), path.to_string_lossy().to_string().into());
        }
        Ok(cache)
    }
}
