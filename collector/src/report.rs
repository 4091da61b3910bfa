use crate::{
    aggregate::AggregatedResult,
    collector::Collector,
    query::ResultKind,
};
use serde::Serialize;
use std::str::FromStr as _;

const MB: f64 = (1u64 << 20) as f64;
const NO_DATA: &str = "no data";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ReportError {
    #[error("query {name} is missing a valid result type, got {kind:?}")]
    UnknownResultKind { name: String, kind: String },
}

/// Average and max of one getter, rendered according to its result kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub result_kind: ResultKind,
    pub samples: u64,
    pub average: Option<f64>,
    pub max: Option<f64>,
    pub average_display: String,
    pub max_display: String,
}

impl ReportEntry {
    pub fn new(name: impl Into<String>, result_kind: ResultKind, result: &AggregatedResult) -> Self {
        let display = |value: Option<f64>| value.map_or_else(|| NO_DATA.to_string(), |v| format_value(result_kind, v));
        Self {
            name: name.into(),
            result_kind,
            samples: result.sample_count(),
            average: result.average(),
            max: result.max(),
            average_display: display(result.average()),
            max_display: display(result.max()),
        }
    }

    pub fn log(&self) {
        if self.samples == 0 {
            warn!("Average {}: {}", self.name, self.average_display);
            warn!("Max {}: {}", self.name, self.max_display);
        } else {
            info!("Average {}: {}", self.name, self.average_display);
            info!("Max {}: {}", self.name, self.max_display);
        }
    }
}

pub fn format_value(kind: ResultKind, value: f64) -> String {
    match kind {
        ResultKind::Percentage => format!("{:.2} %", value * 100.0),
        ResultKind::Memory => format!("{:.2} MB", value / MB),
        ResultKind::Simple => format!("{value:.4}"),
    }
}

impl Collector {
    /// One entry per getter, in registration order. Fails on the first getter whose
    /// result kind is not one of `memory`, `percentage` or `simple`.
    pub fn report(&self) -> Result<Vec<ReportEntry>, ReportError> {
        self.report_entries().collect()
    }

    /// Logs `Average <name>` and `Max <name>` for every getter and returns the entries.
    ///
    /// Entries preceding an invalid result kind are still logged.
    pub fn print_results(&self) -> Result<Vec<ReportEntry>, ReportError> {
        self.report_entries()
            .map(|entry| {
                let entry = entry?;
                entry.log();
                Ok(entry)
            })
            .collect()
    }

    fn report_entries(&self) -> impl Iterator<Item = Result<ReportEntry, ReportError>> + '_ {
        self.getters().map(|getter| {
            let kind = ResultKind::from_str(getter.result_kind()).map_err(|_| ReportError::UnknownResultKind {
                name: getter.name().to_string(),
                kind: getter.result_kind().to_string(),
            })?;
            let result = self.result(getter.name()).copied().unwrap_or_default();
            Ok(ReportEntry::new(getter.name(), kind, &result))
        })
    }
}
