//! Cost parsing and column-mean imputation.
//!
//! Feeds carry monthly charges as free text (`"$1,234.56"`, `"-"`, blank).
//! A column is normalized in two passes: every cell is parsed first, then the
//! mean of the cells that parsed is used to fill the ones that did not. The
//! mean never includes filled values.

use serde::Serialize;

pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Annualize a monthly amount.
pub fn yearly(monthly: f64) -> f64 {
    monthly * MONTHS_PER_YEAR
}

/// A raw cost cell as delivered by a feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawCost<'a> {
    Text(&'a str),
    Number(f64),
    Missing,
}

impl<'a> From<&'a str> for RawCost<'a> {
    fn from(value: &'a str) -> Self {
        RawCost::Text(value)
    }
}

impl From<f64> for RawCost<'_> {
    fn from(value: f64) -> Self {
        RawCost::Number(value)
    }
}

impl<'a> From<Option<&'a str>> for RawCost<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(RawCost::Missing, RawCost::Text)
    }
}

impl RawCost<'_> {
    /// Parse the cell; `None` when missing or unparseable.
    pub fn parse(&self) -> Option<f64> {
        match *self {
            RawCost::Text(text) => parse_amount(text),
            RawCost::Number(n) if n.is_finite() => Some(n),
            RawCost::Number(_) | RawCost::Missing => None,
        }
    }
}

/// Parse currency text.
///
/// Everything except digits, the first decimal point and a leading minus sign
/// is stripped, so `"$1,234.56"` parses to `1234.56`. Text without any digit
/// (`"-"`, `"TBD"`, blank) does not parse.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut cleaned = String::with_capacity(raw.len());
    let mut seen_point = false;
    let mut seen_digit = false;

    for c in raw.chars() {
        match c {
            '0'..='9' => {
                seen_digit = true;
                cleaned.push(c);
            }
            '.' if !seen_point => {
                seen_point = true;
                cleaned.push(c);
            }
            '-' if cleaned.is_empty() => cleaned.push(c),
            _ => {}
        }
    }

    if !seen_digit {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Arithmetic mean, `None` for an empty population.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Parse one cell, falling back to the mean of `fallback_population` when it
/// does not parse. `None` only when both fail.
pub fn normalize_cost<'a>(raw: impl Into<RawCost<'a>>, fallback_population: &[f64]) -> Option<f64> {
    raw.into().parse().or_else(|| mean(fallback_population))
}

/// Result of normalizing one cost column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedColumn {
    /// Parsed or imputed values, in input order. `None` only when the column
    /// had no parseable value at all.
    pub values: Vec<Option<f64>>,
    /// Row indices that were filled with the column mean.
    pub imputed: Vec<usize>,
    /// Indices of cells that held text but failed to parse (subset of `imputed`).
    pub unparseable: Vec<usize>,
    /// The fill value: mean of the cells that parsed.
    pub fill: Option<f64>,
}

/// Normalize a whole column: parse every cell, then impute gaps with the mean
/// of the parsed cells.
pub fn normalize_column<'a, I>(cells: I) -> NormalizedColumn
where
    I: IntoIterator<Item = RawCost<'a>>,
{
    let cells: Vec<RawCost<'a>> = cells.into_iter().collect();
    let parsed: Vec<Option<f64>> = cells.iter().map(RawCost::parse).collect();
    let population: Vec<f64> = parsed.iter().flatten().copied().collect();
    let fill = mean(&population);

    let mut imputed = Vec::new();
    let mut unparseable = Vec::new();
    let values = parsed
        .iter()
        .enumerate()
        .map(|(idx, value)| match value {
            Some(v) => Some(*v),
            None => {
                if fill.is_some() {
                    imputed.push(idx);
                }
                if matches!(cells[idx], RawCost::Text(t) if !t.trim().is_empty()) {
                    unparseable.push(idx);
                }
                fill
            }
        })
        .collect();

    NormalizedColumn {
        values,
        imputed,
        unparseable,
        fill,
    }
}
