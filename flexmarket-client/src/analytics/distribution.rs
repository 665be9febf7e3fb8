use super::{sorted_finite, StatsError};

pub fn mean(values: &[f64]) -> Result<f64, StatsError> {
    mean_of_sorted(&sorted_finite(values.iter().copied()))
}

pub fn median(values: &[f64]) -> Result<f64, StatsError> {
    percentile(values, 50.0)
}

/// Percentile with linear interpolation between closest ranks.
///
/// `pct` is clamped to `[0, 100]`.
pub fn percentile(values: &[f64], pct: f64) -> Result<f64, StatsError> {
    percentile_of_sorted(&sorted_finite(values.iter().copied()), pct)
}

/// Sample standard deviation (n - 1). Needs at least two values.
pub fn std_dev(values: &[f64]) -> Result<f64, StatsError> {
    std_dev_of_sorted(&sorted_finite(values.iter().copied()))
}

fn mean_of_sorted(sorted: &[f64]) -> Result<f64, StatsError> {
    if sorted.is_empty() {
        return Err(StatsError::NoData);
    }
    Ok(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

fn percentile_of_sorted(sorted: &[f64], pct: f64) -> Result<f64, StatsError> {
    if sorted.is_empty() {
        return Err(StatsError::NoData);
    }
    let rank = pct.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn std_dev_of_sorted(sorted: &[f64]) -> Result<f64, StatsError> {
    if sorted.len() < 2 {
        return Err(StatsError::NoData);
    }
    let mean = mean_of_sorted(sorted)?;
    let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (sorted.len() - 1) as f64;
    Ok(var.sqrt())
}

/// Descriptive summary of a set of values (volumes or prices).
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Undefined for a single value.
    pub std_dev: Option<f64>,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

impl Summary {
    /// Summarise the finite values; `NoData` when there are none.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Result<Self, StatsError> {
        let sorted = sorted_finite(values);
        let (min, max) = match (sorted.first(), sorted.last()) {
            (Some(min), Some(max)) => (*min, *max),
            _ => return Err(StatsError::NoData),
        };

        Ok(Self {
            count: sorted.len(),
            total: sorted.iter().sum(),
            mean: mean_of_sorted(&sorted)?,
            median: percentile_of_sorted(&sorted, 50.0)?,
            min,
            max,
            std_dev: std_dev_of_sorted(&sorted).ok(),
            p10: percentile_of_sorted(&sorted, 10.0)?,
            p25: percentile_of_sorted(&sorted, 25.0)?,
            p75: percentile_of_sorted(&sorted, 75.0)?,
            p90: percentile_of_sorted(&sorted, 90.0)?,
        })
    }
}
