//! The candidate universe and its CSV ingestion.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::ValidationError;

static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9][A-Z0-9.\-^=]{0,11}$").expect("symbol pattern is valid")
});

/// Header names recognised as the ticker column, compared case-insensitively.
const TICKER_HEADERS: &[&str] = &["ticker", "symbol"];

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("failed to read universe file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed universe CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Ordered, non-empty list of unique ticker symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    symbols: Vec<String>,
}

impl Universe {
    /// Normalise (trim, upper-case) and validate `symbols`, keeping their order.
    pub fn new<I, S>(symbols: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for raw in symbols {
            let symbol = raw.as_ref().trim().to_ascii_uppercase();
            if !SYMBOL_RE.is_match(&symbol) {
                return Err(ValidationError::InvalidSymbol(raw.as_ref().to_string()));
            }
            if !seen.insert(symbol.clone()) {
                return Err(ValidationError::DuplicateInUniverse(symbol));
            }
            out.push(symbol);
        }
        if out.is_empty() {
            return Err(ValidationError::EmptyUniverse);
        }
        Ok(Self { symbols: out })
    }

    /// Read a universe from CSV with a header row.
    ///
    /// The ticker column is the one headed `Ticker` or `Symbol` (any case),
    /// or the first column if neither is present. Blank cells are skipped.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, UniverseError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let column = {
            let headers = rdr.headers()?;
            headers
                .iter()
                .position(|h| TICKER_HEADERS.iter().any(|t| h.eq_ignore_ascii_case(t)))
                .unwrap_or(0)
        };
        debug!(column, "ticker column resolved");

        let mut symbols = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if let Some(cell) = record.get(column) {
                if !cell.is_empty() {
                    symbols.push(cell.to_string());
                }
            }
        }

        Ok(Self::new(symbols)?)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, UniverseError> {
        let file = std::fs::File::open(path).map_err(|source| UniverseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let universe = Self::from_csv_reader(file)?;
        info!(path = %path.display(), symbols = universe.len(), "universe loaded");
        Ok(universe)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_and_keeps_order() {
        let u = Universe::new([" aapl", "MSFT ", "brk.b"]).unwrap();
        assert_eq!(u.symbols(), &["AAPL", "MSFT", "BRK.B"]);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            Universe::new(Vec::<String>::new()).unwrap_err(),
            ValidationError::EmptyUniverse
        );
        assert_eq!(
            Universe::new(["AAPL", "aapl"]).unwrap_err(),
            ValidationError::DuplicateInUniverse("AAPL".into())
        );
        assert!(matches!(
            Universe::new(["AAPL", "NOT A TICKER"]).unwrap_err(),
            ValidationError::InvalidSymbol(_)
        ));
        assert!(matches!(
            Universe::new(["A,B"]).unwrap_err(),
            ValidationError::InvalidSymbol(_)
        ));
    }

    #[test]
    fn reads_ticker_column_from_csv() {
        let csv = "Name,Ticker\nApple,AAPL\nMicrosoft,MSFT\nBlank,\n";
        let u = Universe::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(u.symbols(), &["AAPL", "MSFT"]);
    }

    #[test]
    fn lower_case_header_and_first_column_fallback() {
        let u = Universe::from_csv_reader("ticker\nA\nB\n".as_bytes()).unwrap();
        assert_eq!(u.len(), 2);

        let u = Universe::from_csv_reader("Code,Name\nXOM,Exxon\n".as_bytes()).unwrap();
        assert_eq!(u.symbols(), &["XOM"]);
    }

    #[test]
    fn header_only_file_is_empty_universe() {
        let err = Universe::from_csv_reader("Ticker\n".as_bytes()).unwrap_err();
        assert!(matches!(err, UniverseError::Invalid(ValidationError::EmptyUniverse)));
    }

    #[test]
    fn reads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sp_500_stocks.csv");
        std::fs::write(&path, "Ticker\nA\nAAL\nAAP\n").unwrap();
        let u = Universe::from_csv_path(&path).unwrap();
        assert_eq!(u.len(), 3);

        let err = Universe::from_csv_path(&dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, UniverseError::Io { .. }));
    }
}
