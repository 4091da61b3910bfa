use crate::prometheus::Sample;
use serde::Serialize;

/// Running count, sum and max of the datapoints polled for one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregatedResult {
    sample_count: u64,
    sum: f64,
    max: f64,
}

impl AggregatedResult {
    pub fn fold(&mut self, datapoint: f64) {
        self.max = if self.sample_count == 0 {
            datapoint
        } else {
            self.max.max(datapoint)
        };
        self.sum += datapoint;
        self.sample_count += 1;
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// `None` until the first datapoint was folded in.
    pub fn max(&self) -> Option<f64> {
        (self.sample_count > 0).then_some(self.max)
    }

    pub fn average(&self) -> Option<f64> {
        (self.sample_count > 0).then(|| self.sum / self.sample_count as f64)
    }
}

impl FromIterator<f64> for AggregatedResult {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        let mut result = Self::default();
        iter.into_iter().for_each(|datapoint| result.fold(datapoint));
        result
    }
}

/// Reduces a vector to a single datapoint: the mean of its sample values.
///
/// Queries broken down by pod return several series; one representative number
/// per poll is all the report needs.
pub fn datapoint(vector: &[Sample]) -> Option<f64> {
    if vector.is_empty() {
        return None;
    }
    let sum: f64 = vector.iter().map(|sample| sample.value).sum();
    Some(sum / vector.len() as f64)
}
