//! As-of value resolution over a date-sorted series.

use crate::models::observation::Observation;

/// Value of the latest observation at or before `date`.
///
/// When the series starts after `date`, the earliest available value is
/// returned instead of failing; cold-start history should degrade scoring,
/// not block it. Only an empty series has no answer.
pub fn value_as_of(series: &[Observation], date: &str) -> Option<f64> {
    let last_at_or_before = series
        .iter()
        .rev()
        .find(|o| o.date.as_str() <= date)
        .map(|o| o.value);

    last_at_or_before.or_else(|| series.first().map(|o| o.value))
}
