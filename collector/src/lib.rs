//! # Load Test Metrics Collector
//!
//! Periodically runs a fixed set of Prometheus queries while a load test is
//! running and reports the average and maximum of every query afterwards.
//!
//! ## Architecture
//!
//! - **`query`**: immutable query descriptors and their result kinds
//! - **`catalog`**: factories for the measurements a run watches
//! - **`getter`**: binds a descriptor to a backend client
//! - **`prometheus`**: HTTP client for the instant query API
//! - **`collector`**: the polling loop and per-name aggregation
//! - **`classify`**: tells authorization failures apart from other backend failures
//! - **`authorization`**: finds the token request page for a cluster
//! - **`report`**: renders the aggregates
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run(api: std::sync::Arc<dyn load_metrics_collector::QueryApi>) -> eyre::Result<()> {
//! use load_metrics_collector::{catalog, Collector};
//! use std::time::Duration;
//!
//! let mut collector = Collector::new(api, Duration::from_secs(300));
//! collector.add_queries(catalog::cluster_defaults())?;
//! let handle = collector.start_collecting();
//! // ... run the load test ...
//! let collector = handle.stop().await?;
//! collector.print_results()?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub mod aggregate;
pub mod authorization;
pub mod catalog;
pub mod classify;
pub mod collector;
pub mod getter;
pub mod prometheus;
pub mod query;
pub mod report;

pub use aggregate::AggregatedResult;
pub use authorization::{
    OAuthDiscovery,
    TokenRequestLookup,
};
pub use classify::{
    FailureClass,
    PollError,
};
pub use collector::{
    CollectingHandle,
    Collector,
    RegistrationError,
};
pub use getter::{
    Getter,
    QueryGetter,
};
pub use prometheus::{
    PrometheusClient,
    QueryApi,
    QueryError,
    QueryResponse,
    Sample,
};
pub use query::{
    QueryDescriptor,
    ResultKind,
};
pub use report::{
    ReportEntry,
    ReportError,
};
