//! Rank-and-trim of candidate rows.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::stocks::Period;
use crate::table::Row;

/// Value rows are ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Return(Period),
    CompositeScore,
    MarketCap,
}

impl SortKey {
    pub fn value(&self, row: &Row) -> Option<f64> {
        match self {
            SortKey::Return(period) => row.period_return(*period),
            SortKey::CompositeScore => row.composite_score,
            SortKey::MarketCap => row.market_cap,
        }
    }
}

/// Keep the `n` best rows by `key`, best first.
///
/// The sort is stable, so equal keys keep their input order. Rows without a
/// value for `key` rank below every row that has one.
pub fn select_top(mut rows: Vec<Row>, key: SortKey, n: usize) -> Result<Vec<Row>, ValidationError> {
    if n == 0 {
        return Err(ValidationError::InvalidTopN(n));
    }

    rows.sort_by(|a, b| match (key.value(a), key.value(b)) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    rows.truncate(n);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(symbol: &str, score: f64) -> Row {
        let mut row = Row::new(symbol, 10.0);
        row.composite_score = Some(score);
        row
    }

    fn names(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn ties_keep_input_order() {
        let rows = vec![scored("A", 5.0), scored("B", 9.0), scored("C", 9.0), scored("D", 1.0)];
        let top = select_top(rows, SortKey::CompositeScore, 2).unwrap();
        assert_eq!(names(&top), vec!["B", "C"]);
    }

    #[test]
    fn asking_for_more_than_available_returns_all() {
        let rows = vec![scored("A", 1.0), scored("B", 2.0)];
        let top = select_top(rows, SortKey::CompositeScore, 50).unwrap();
        assert_eq!(names(&top), vec!["B", "A"]);
    }

    #[test]
    fn zero_is_rejected() {
        assert_eq!(
            select_top(vec![scored("A", 1.0)], SortKey::CompositeScore, 0).unwrap_err(),
            ValidationError::InvalidTopN(0)
        );
    }

    #[test]
    fn ranks_by_period_return_with_missing_values_last() {
        let rows = vec![
            Row::new("NONE", 1.0),
            Row::new("LOW", 1.0).with_return(Period::OneYear, -0.2),
            Row::new("HIGH", 1.0).with_return(Period::OneYear, 0.8),
        ];
        let top = select_top(rows, SortKey::Return(Period::OneYear), 3).unwrap();
        assert_eq!(names(&top), vec!["HIGH", "LOW", "NONE"]);
    }

    #[test]
    fn ranks_by_market_cap() {
        let cap = |symbol: &str, value: Option<f64>| {
            let mut row = Row::new(symbol, 1.0);
            row.market_cap = value;
            row
        };
        let rows = vec![cap("SMALL", Some(2.0e9)), cap("UNKNOWN", None), cap("MEGA", Some(3.0e12))];
        let top = select_top(rows, SortKey::MarketCap, 2).unwrap();
        assert_eq!(names(&top), vec!["MEGA", "SMALL"]);
        assert_eq!(SortKey::MarketCap.value(&top[0]), Some(3.0e12));
    }
}
