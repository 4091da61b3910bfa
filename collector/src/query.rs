use serde::{
    Deserialize,
    Serialize,
};
use strum::{
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
};

/// How the aggregated values of a query are rendered. Never affects how they are combined.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Memory,
    Percentage,
    Simple,
}

/// Immutable definition of one named measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    name: String,
    query: String,
    result_kind: String,
}

impl QueryDescriptor {
    pub fn new(name: impl Into<String>, query: impl Into<String>, result_kind: ResultKind) -> Self {
        Self::with_raw_kind(name, query, result_kind.as_ref())
    }

    /// Keeps the result kind as given. An unknown kind is only rejected when the
    /// results get reported.
    pub fn with_raw_kind(name: impl Into<String>, query: impl Into<String>, result_kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            result_kind: result_kind.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn result_kind(&self) -> &str {
        &self.result_kind
    }
}
