use std::fmt;

use super::{
    distribution::Summary,
    grouping::{group_by, GroupStat},
    StatsError,
};
use crate::domain::DispatchRow;

/// Utilisation price bands in £/MWh, lower bound inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriceTier {
    UpTo500,
    UpTo1k,
    UpTo2k,
    UpTo4k,
    From4k,
}

impl PriceTier {
    /// `None` for non-positive or non-finite prices, which carry no tier.
    pub fn from_price(price: f64) -> Option<Self> {
        if !price.is_finite() || price <= 0.0 {
            return None;
        }
        Some(match price {
            p if p < 500.0 => Self::UpTo500,
            p if p < 1000.0 => Self::UpTo1k,
            p if p < 2000.0 => Self::UpTo2k,
            p if p < 4000.0 => Self::UpTo4k,
            _ => Self::From4k,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UpTo500 => "£0-500",
            Self::UpTo1k => "£500-1k",
            Self::UpTo2k => "£1k-2k",
            Self::UpTo4k => "£2k-4k",
            Self::From4k => "£4k+",
        }
    }
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn priced(rows: &[DispatchRow]) -> impl Iterator<Item = &DispatchRow> + '_ {
    rows.iter().filter(|r| r.utilisation_price > 0.0)
}

/// Dispatches with a positive utilisation price, grouped by price tier.
pub fn by_price_tier(rows: &[DispatchRow]) -> Vec<GroupStat<PriceTier>> {
    let tiered = rows
        .iter()
        .filter(|r| PriceTier::from_price(r.utilisation_price).is_some());
    group_by(tiered, |r| {
        PriceTier::from_price(r.utilisation_price).unwrap_or(PriceTier::UpTo500)
    })
}

/// Summary of positive utilisation prices.
pub fn price_summary(rows: &[DispatchRow]) -> Result<Summary, StatsError> {
    Summary::from_values(priced(rows).map(|r| r.utilisation_price))
}

/// Positive utilisation prices summarised per category, ordered by
/// category. Categories without a priced dispatch are left out.
pub fn price_by_category<F>(rows: &[DispatchRow], category: F) -> Vec<(String, Summary)>
where
    F: Fn(&DispatchRow) -> &str,
{
    let mut prices: std::collections::BTreeMap<String, Vec<f64>> = Default::default();
    for row in priced(rows) {
        prices
            .entry(category(row).to_owned())
            .or_default()
            .push(row.utilisation_price);
    }
    prices
        .into_iter()
        .filter_map(|(key, values)| Summary::from_values(values).ok().map(|s| (key, s)))
        .collect()
}
