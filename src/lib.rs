#[macro_use]
extern crate tracing;

mod logging;
mod token;

use color_eyre::Result;
use eyre::Context as _;
pub use load_metrics_config::{
    Args,
    Config,
};
use load_metrics_collector::{
    catalog,
    Collector,
    OAuthDiscovery,
    PrometheusClient,
    QueryDescriptor,
    ReportEntry,
    TokenRequestLookup,
};
pub use logging::{
    init_errors,
    init_logging,
};
use std::{
    path::Path,
    sync::Arc,
};

/// Registers the configured queries on a fresh collector.
pub fn build_collector(config: &Config, client: PrometheusClient) -> Result<Collector> {
    let mut collector = Collector::new(Arc::new(client), config.interval);

    if config.default_catalog {
        collector.add_queries(catalog::cluster_defaults())?;
    }
    for workload in &config.workloads {
        collector.add_queries(catalog::workload(&workload.namespace, &workload.workload))?;
    }
    collector.add_queries(
        config
            .queries
            .iter()
            .map(|query| QueryDescriptor::with_raw_kind(&query.name, &query.query, &query.result_kind)),
    )?;

    Ok(collector)
}

/// Collects until the configured duration elapsed or Ctrl-C was pressed, then reports.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let http_client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let token_lookup = config
        .api_server_url
        .clone()
        .map(|url| Arc::new(OAuthDiscovery::new(http_client.clone(), url)) as Arc<dyn TokenRequestLookup>);

    let token = token::resolve_token(config.token.clone(), token_lookup.as_deref()).await?;
    let client = PrometheusClient::with_http_client(http_client, config.prometheus_url()?.clone(), Some(token))?;
    info!(url = %client.query_url(), "querying prometheus");

    let mut collector = build_collector(&config, client)?;
    if let Some(token_lookup) = token_lookup {
        collector = collector.with_token_lookup(token_lookup);
    }

    let handle = collector.start_collecting();

    let run_for = async {
        match config.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = run_for => info!("collection time is up"),
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("interrupted, stopping metrics collection");
        }
    }

    let collector = handle.stop().await.context("Metrics collection task failed")?;
    let report = collector.print_results()?;

    if let Some(output_file) = &config.output_file {
        export_report(&report, output_file)?;
        info!("Report exported to {}", output_file.display());
    }

    Ok(())
}

fn export_report(report: &[ReportEntry], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).wrap_err_with(|| format!("Failed to write report to {}", path.display()))
}
