//! Equal-weight position sizing.
//!
//! Capital is split evenly across the final rows and each slice is converted
//! to a whole number of shares by floor division. Every row is sized; the
//! rounding remainder stays uninvested.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ScreenerError, ValidationError};
use crate::table::Row;

/// A row with its recommended purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(flatten)]
    pub row: Row,
    pub shares_to_buy: u64,
}

impl Position {
    pub fn cost(&self) -> f64 {
        self.shares_to_buy as f64 * self.row.price
    }
}

/// Final ordered trade list. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPlan {
    pub capital: f64,
    pub allocation_per_position: f64,
    pub positions: Vec<Position>,
}

impl PortfolioPlan {
    /// Total spend of the recommended purchases.
    pub fn total_cost(&self) -> f64 {
        self.positions.iter().map(Position::cost).sum()
    }

    /// Capital left over after floor rounding.
    pub fn uninvested(&self) -> f64 {
        self.capital - self.total_cost()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Reject capital that is not a finite positive amount.
pub fn validate_capital(capital: f64) -> Result<(), ValidationError> {
    if capital.is_finite() && capital > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidCapital(capital))
    }
}

/// Size every row with an equal share of `capital`.
pub fn size_positions(rows: Vec<Row>, capital: f64) -> Result<PortfolioPlan, ScreenerError> {
    validate_capital(capital)?;
    if rows.is_empty() {
        return Err(ScreenerError::EmptyRowSet);
    }
    if let Some(bad) = rows.iter().find(|r| !r.price.is_finite() || r.price <= 0.0) {
        return Err(ValidationError::NonPositivePrice {
            symbol: bad.symbol.clone(),
            price: bad.price,
        }
        .into());
    }

    let allocation_per_position = capital / rows.len() as f64;
    let positions: Vec<Position> = rows
        .into_iter()
        .map(|row| {
            let shares_to_buy = (allocation_per_position / row.price).floor() as u64;
            Position { row, shares_to_buy }
        })
        .collect();

    let plan = PortfolioPlan {
        capital,
        allocation_per_position,
        positions,
    };

    info!(
        positions = plan.len(),
        allocation = %format!("{:.2}", allocation_per_position),
        total_cost = %format!("{:.2}", plan.total_cost()),
        uninvested = %format!("{:.2}", plan.uninvested()),
        "positions sized"
    );

    Ok(plan)
}
