//! Percentile scoring across return horizons.
//!
//! For every tracked period each row gets the percentile rank of its return
//! within the population of rows that have a return for that period. The
//! composite score is the plain mean of a row's percentiles.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Omission, OmissionReason};
use crate::stocks::Period;
use crate::table::Row;

/// How ties and extremes map onto [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileKind {
    /// `(below + 0.5 * equal) / n`, the usual percentile of score.
    #[default]
    Mean,
    /// `(below + 0.5 * (equal - 1)) / (n - 1)`: lowest value maps to 0, highest to 1.
    Midrank,
}

/// What to do with rows that lack some of the tracked periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPeriodPolicy {
    /// Drop the row before any population is formed.
    #[default]
    Exclude,
    /// Rank the row only in the periods it has; composite over those.
    ScoreAvailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoringOptions {
    #[serde(default)]
    pub percentile_kind: PercentileKind,
    #[serde(default)]
    pub missing_periods: MissingPeriodPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringOutcome {
    pub rows: Vec<Row>,
    pub omissions: Vec<Omission>,
}

/// Percentile rank of `value` within `population`, in [0, 1].
///
/// Returns `None` for an empty population.
pub fn percentile_of_score(population: &[f64], value: f64, kind: PercentileKind) -> Option<f64> {
    if population.is_empty() {
        return None;
    }
    let below = population.iter().filter(|x| **x < value).count();
    let equal = population.iter().filter(|x| **x == value).count();
    Some(rank(below, equal, population.len(), kind))
}

fn rank(below: usize, equal: usize, n: usize, kind: PercentileKind) -> f64 {
    match kind {
        PercentileKind::Mean => (below as f64 + 0.5 * equal as f64) / n as f64,
        PercentileKind::Midrank => {
            if n == 1 {
                return 1.0;
            }
            let ties_above_self = equal.saturating_sub(1) as f64;
            ((below as f64 + 0.5 * ties_above_self) / (n - 1) as f64).clamp(0.0, 1.0)
        }
    }
}

fn usable_return(row: &Row, period: Period) -> Option<f64> {
    row.period_return(period).filter(|r| r.is_finite())
}

/// Annotate rows with per-period percentiles and a composite score.
///
/// Row order is preserved. Rows dropped under the missing-period policy are
/// returned as omissions.
pub fn score_percentiles(rows: Vec<Row>, periods: &[Period], options: ScoringOptions) -> ScoringOutcome {
    if periods.is_empty() {
        return ScoringOutcome {
            rows,
            omissions: Vec::new(),
        };
    }

    let mut omissions = Vec::new();
    let mut scored: Vec<Row> = Vec::with_capacity(rows.len());
    for row in rows {
        let missing: Vec<Period> = periods
            .iter()
            .copied()
            .filter(|p| usable_return(&row, *p).is_none())
            .collect();
        let keep = match options.missing_periods {
            MissingPeriodPolicy::Exclude => missing.is_empty(),
            MissingPeriodPolicy::ScoreAvailable => missing.len() < periods.len(),
        };
        if keep {
            scored.push(row);
        } else {
            let reason = OmissionReason::MissingPeriods(missing);
            warn!(symbol = %row.symbol, %reason, "dropping row from scoring");
            omissions.push(Omission::new(row.symbol, reason));
        }
    }

    for &period in periods {
        let mut population: Vec<f64> = scored
            .iter()
            .filter_map(|r| usable_return(r, period))
            .collect();
        population.sort_by(f64::total_cmp);

        for row in scored.iter_mut() {
            let Some(value) = usable_return(row, period) else {
                continue;
            };
            let below = population.partition_point(|x| *x < value);
            let through = population.partition_point(|x| *x <= value);
            let pct = rank(below, through - below, population.len(), options.percentile_kind);
            row.percentiles.insert(period, pct);
        }
        debug!(period = period.label(), population = population.len(), "period ranked");
    }

    for row in scored.iter_mut() {
        let values: Vec<f64> = periods.iter().filter_map(|p| row.percentile(*p)).collect();
        row.composite_score = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };
    }

    ScoringOutcome {
        rows: scored,
        omissions,
    }
}
