//! Wide-to-long reshaping.
//!
//! A block is "wide" when at least [`MIN_MONTH_COLUMNS`] of its columns
//! resolve to distinct periods, either from the column names themselves or
//! from the row right below a header that left placeholder names. Wide blocks
//! are melted into one row per (source row, month column); everything else is
//! passed through as long rows.

use crate::classifier::ColumnRoles;
use crate::header::is_placeholder_column;
use crate::period::{period_from_header, Period};
use crate::sheet::Frame;
use crate::utils::parse_amount;
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

pub const MIN_MONTH_COLUMNS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// Periods read from the column names.
    HeaderTokens,
    /// Periods read from the first data row under placeholder columns.
    SecondHeaderRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthColumn {
    pub index: usize,
    pub period: Period,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthColumns {
    pub strategy: DetectionStrategy,
    pub columns: Vec<MonthColumn>,
}

impl MonthColumns {
    pub fn indices(&self) -> HashSet<usize> {
        self.columns.iter().map(|c| c.index).collect()
    }

    pub fn distinct_periods(&self) -> BTreeSet<Period> {
        self.columns.iter().map(|c| c.period).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn accept(strategy: DetectionStrategy, columns: Vec<MonthColumn>) -> Option<MonthColumns> {
    let detected = MonthColumns { strategy, columns };
    if detected.distinct_periods().len() >= MIN_MONTH_COLUMNS {
        Some(detected)
    } else {
        None
    }
}

/// Header-token strategy: resolves each (non-placeholder) column name.
pub fn detect_from_headers(frame: &Frame, default_year: Option<i32>) -> Option<MonthColumns> {
    let columns = frame
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !is_placeholder_column(name))
        .filter_map(|(index, name)| {
            period_from_header(name, default_year).map(|period| MonthColumn { index, period })
        })
        .collect();
    accept(DetectionStrategy::HeaderTokens, columns)
}

/// Two-row-header strategy: resolves the first data row's cells under the
/// given placeholder columns against the default year.
pub fn detect_from_second_row(
    frame: &Frame,
    placeholder_columns: &[usize],
    default_year: Option<i32>,
) -> Option<MonthColumns> {
    if frame.is_empty() || placeholder_columns.is_empty() {
        return None;
    }

    let columns = placeholder_columns
        .iter()
        .filter_map(|&index| {
            period_from_header(frame.cell(0, index), default_year)
                .map(|period| MonthColumn { index, period })
        })
        .collect();
    accept(DetectionStrategy::SecondHeaderRow, columns)
}

/// Runs both strategies, header tokens first. When the second-row strategy
/// wins, the month-label row is removed from `frame`.
pub fn detect_month_columns(
    frame: &mut Frame,
    placeholder_columns: &[usize],
    default_year: Option<i32>,
) -> Option<MonthColumns> {
    if let Some(found) = detect_from_headers(frame, default_year) {
        return Some(found);
    }

    let found = detect_from_second_row(frame, placeholder_columns, default_year)?;
    frame.drop_first_row();
    Some(found)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Layout {
    Long,
    Wide { month_columns: usize },
}

/// Where a long row's period comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowPeriod {
    /// Resolved from a melted month column.
    Resolved(Period),
    /// Raw cell of the period column, parsed later.
    Cell(String),
    /// No period column.
    Absent,
}

/// One amount with its identifying cells. `None` means the role has no
/// column in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongRow {
    pub company: Option<String>,
    pub account: Option<String>,
    pub center: Option<String>,
    pub scenario: Option<String>,
    pub period: RowPeriod,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reshaped {
    pub layout: Layout,
    pub rows: Vec<LongRow>,
    /// Amount cells that did not parse and were replaced by zero.
    pub amounts_zero_filled: usize,
}

struct AmountCoercion {
    zero_filled: usize,
}

impl AmountCoercion {
    fn coerce(&mut self, raw: &str) -> Decimal {
        match parse_amount(raw) {
            Some(amount) => amount,
            None => {
                self.zero_filled += 1;
                Decimal::ZERO
            }
        }
    }
}

fn identifying_cell(frame: &Frame, row: usize, column: Option<usize>) -> Option<String> {
    column.map(|idx| frame.cell(row, idx).to_string())
}

fn long_row(frame: &Frame, row: usize, roles: &ColumnRoles, period: RowPeriod, amount: Decimal) -> LongRow {
    LongRow {
        company: identifying_cell(frame, row, roles.company),
        account: identifying_cell(frame, row, roles.account),
        center: identifying_cell(frame, row, roles.center),
        scenario: identifying_cell(frame, row, roles.scenario),
        period,
        amount,
    }
}

/// Melts month columns into long rows: one per (row, month column), in row
/// order then column order.
pub fn melt(frame: &Frame, roles: &ColumnRoles, months: &MonthColumns) -> Reshaped {
    let mut coercion = AmountCoercion { zero_filled: 0 };
    let mut rows = Vec::with_capacity(frame.len() * months.len());

    for row in 0..frame.len() {
        for month in &months.columns {
            let amount = coercion.coerce(frame.cell(row, month.index));
            rows.push(long_row(frame, row, roles, RowPeriod::Resolved(month.period), amount));
        }
    }

    Reshaped {
        layout: Layout::Wide {
            month_columns: months.len(),
        },
        rows,
        amounts_zero_filled: coercion.zero_filled,
    }
}

/// Passes a long block through row for row. Returns `None` when there is no
/// amount column.
pub fn pass_through(frame: &Frame, roles: &ColumnRoles) -> Option<Reshaped> {
    let amount_column = roles.amount?;
    let mut coercion = AmountCoercion { zero_filled: 0 };

    let rows = (0..frame.len())
        .map(|row| {
            let period = match roles.period {
                Some(idx) => RowPeriod::Cell(frame.cell(row, idx).to_string()),
                None => RowPeriod::Absent,
            };
            let amount = coercion.coerce(frame.cell(row, amount_column));
            long_row(frame, row, roles, period, amount)
        })
        .collect();

    Some(Reshaped {
        layout: Layout::Long,
        rows,
        amounts_zero_filled: coercion.zero_filled,
    })
}

/// Melts when month columns were detected, otherwise passes through.
pub fn reshape(
    frame: &Frame,
    roles: &ColumnRoles,
    months: Option<&MonthColumns>,
    source: &str,
) -> Option<Reshaped> {
    match months {
        Some(months) => {
            let periods = months.distinct_periods();
            info!(
                "{}: {} month columns detected ({:?}) -> {} distinct periods ({} .. {})",
                source,
                months.len(),
                months.strategy,
                periods.len(),
                periods.first().map(|p| p.to_string()).unwrap_or_default(),
                periods.last().map(|p| p.to_string()).unwrap_or_default(),
            );
            Some(melt(frame, roles, months))
        }
        None => pass_through(frame, roles),
    }
}
