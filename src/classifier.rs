//! Column-role inference over a sampled block of rows.
//!
//! Every column is reduced to a [`ColumnProfile`] of sampled statistics and
//! roles are picked from those profiles with fixed thresholds. Ties always go
//! to the earliest column.

use crate::period::{strict_pattern, PeriodPattern};
use crate::sheet::Frame;
use crate::utils::is_numeric;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;

pub const SAMPLE_ROWS: usize = 100;
pub const MIN_AMOUNT_SCORE: f64 = 0.6;
pub const MIN_PERIOD_SCORE: f64 = 0.6;
pub const TEXT_SHARE_THRESHOLD: f64 = 0.9;
pub const COMPANY_MAX_DISTINCT: usize = 3;
pub const ACCOUNT_MIN_DISTINCT: usize = 10;
pub const CENTER_DISTINCT: RangeInclusive<usize> = 3..=50;
pub const SCENARIO_DISTINCT: RangeInclusive<usize> = 1..=5;

pub const YEAR_MONTH_WEIGHT: f64 = 3.0;
pub const FULL_DATE_WEIGHT: f64 = 3.0;
pub const MONTH_NAME_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Company,
    Period,
    Account,
    Center,
    Amount,
    Scenario,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 6] = [
        ColumnRole::Company,
        ColumnRole::Period,
        ColumnRole::Account,
        ColumnRole::Center,
        ColumnRole::Amount,
        ColumnRole::Scenario,
    ];

    /// Header names matched before any guessing takes place.
    pub fn conventional_names(&self) -> &'static [&'static str] {
        match self {
            ColumnRole::Company => &["Empresa", "Company"],
            ColumnRole::Period => &["Periodo", "Period"],
            ColumnRole::Account => &["Cuenta", "Account"],
            ColumnRole::Center => &["Centro", "Center", "Cost Center"],
            ColumnRole::Amount => &["Monto", "Amount"],
            ColumnRole::Scenario => &["Escenario", "Scenario"],
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::Company => "company",
            ColumnRole::Period => "period",
            ColumnRole::Account => "account",
            ColumnRole::Center => "center",
            ColumnRole::Amount => "amount",
            ColumnRole::Scenario => "scenario",
        };
        write!(f, "{}", name)
    }
}

/// Sampled statistics for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub index: usize,
    pub name: String,
    pub non_empty: usize,
    pub distinct: usize,
    /// Share of non-empty values that parse as numbers.
    pub numeric_score: f64,
    /// Average pattern weight over non-empty values.
    pub period_score: f64,
    /// Share of non-empty values that do not parse as numbers.
    pub text_share: f64,
}

fn pattern_weight(value: &str) -> f64 {
    match strict_pattern(value) {
        Some(PeriodPattern::YearMonth) => YEAR_MONTH_WEIGHT,
        Some(PeriodPattern::FullDate) => FULL_DATE_WEIGHT,
        Some(PeriodPattern::MonthName) => MONTH_NAME_WEIGHT,
        None => 0.0,
    }
}

pub fn profile_column(frame: &Frame, index: usize, sample_rows: usize) -> ColumnProfile {
    let values: Vec<&str> = frame
        .sample_column(index, sample_rows)
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect();

    let non_empty = values.len();
    let distinct = values.iter().collect::<HashSet<_>>().len();
    let numeric = values.iter().filter(|v| is_numeric(v)).count();
    let period_total: f64 = values.iter().map(|v| pattern_weight(v)).sum();

    let (numeric_score, period_score, text_share) = if non_empty == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let n = non_empty as f64;
        (
            numeric as f64 / n,
            period_total / n,
            (non_empty - numeric) as f64 / n,
        )
    };

    ColumnProfile {
        index,
        name: frame.columns.get(index).cloned().unwrap_or_default(),
        non_empty,
        distinct,
        numeric_score,
        period_score,
        text_share,
    }
}

pub fn profile_columns(frame: &Frame) -> Vec<ColumnProfile> {
    (0..frame.width())
        .map(|idx| profile_column(frame, idx, SAMPLE_ROWS))
        .collect()
}

/// Column index per role; `None` when the role is unresolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub company: Option<usize>,
    pub period: Option<usize>,
    pub account: Option<usize>,
    pub center: Option<usize>,
    pub amount: Option<usize>,
    pub scenario: Option<usize>,
}

impl ColumnRoles {
    pub fn get(&self, role: ColumnRole) -> Option<usize> {
        match role {
            ColumnRole::Company => self.company,
            ColumnRole::Period => self.period,
            ColumnRole::Account => self.account,
            ColumnRole::Center => self.center,
            ColumnRole::Amount => self.amount,
            ColumnRole::Scenario => self.scenario,
        }
    }

    pub fn set(&mut self, role: ColumnRole, index: Option<usize>) {
        let slot = match role {
            ColumnRole::Company => &mut self.company,
            ColumnRole::Period => &mut self.period,
            ColumnRole::Account => &mut self.account,
            ColumnRole::Center => &mut self.center,
            ColumnRole::Amount => &mut self.amount,
            ColumnRole::Scenario => &mut self.scenario,
        };
        *slot = index;
    }

    pub fn claimed(&self) -> HashSet<usize> {
        ColumnRole::ALL.iter().filter_map(|r| self.get(*r)).collect()
    }
}

fn best_by<F>(profiles: &[&ColumnProfile], threshold: f64, score: F) -> Option<usize>
where
    F: Fn(&ColumnProfile) -> f64,
{
    let mut best: Option<(usize, f64)> = None;
    for profile in profiles {
        let s = score(profile);
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((profile.index, s));
        }
    }
    best.filter(|(_, s)| *s >= threshold).map(|(idx, _)| idx)
}

/// Picks one column per role.
///
/// Roles already set in `pinned` are kept as-is and their columns are never
/// claimed by another role. Columns in `excluded` (e.g. detected month
/// columns) are never considered.
pub fn classify_columns(
    frame: &Frame,
    pinned: &ColumnRoles,
    excluded: &HashSet<usize>,
) -> ColumnRoles {
    let profiles = profile_columns(frame);
    classify_profiles(&profiles, pinned, excluded)
}

pub fn classify_profiles(
    profiles: &[ColumnProfile],
    pinned: &ColumnRoles,
    excluded: &HashSet<usize>,
) -> ColumnRoles {
    let mut roles = *pinned;
    let mut claimed = pinned.claimed();

    let open = |claimed: &HashSet<usize>| -> Vec<&ColumnProfile> {
        profiles
            .iter()
            .filter(|p| !excluded.contains(&p.index) && !claimed.contains(&p.index))
            .collect()
    };

    if roles.amount.is_none() {
        roles.amount = best_by(&open(&claimed), MIN_AMOUNT_SCORE, |p| p.numeric_score);
        claimed.extend(roles.amount);
    }

    if roles.period.is_none() {
        roles.period = best_by(&open(&claimed), MIN_PERIOD_SCORE, |p| p.period_score);
        claimed.extend(roles.period);
    }

    if roles.company.is_none() {
        roles.company = open(&claimed)
            .into_iter()
            .find(|p| {
                p.distinct > 0
                    && p.distinct <= COMPANY_MAX_DISTINCT
                    && p.text_share > TEXT_SHARE_THRESHOLD
            })
            .map(|p| p.index);
        claimed.extend(roles.company);
    }

    if roles.account.is_none() {
        roles.account = open(&claimed)
            .into_iter()
            .find(|p| p.text_share > TEXT_SHARE_THRESHOLD && p.distinct >= ACCOUNT_MIN_DISTINCT)
            .map(|p| p.index);
        claimed.extend(roles.account);
    }

    if roles.center.is_none() {
        roles.center = open(&claimed)
            .into_iter()
            .find(|p| CENTER_DISTINCT.contains(&p.distinct))
            .map(|p| p.index);
        claimed.extend(roles.center);
    }

    if roles.scenario.is_none() {
        roles.scenario = open(&claimed)
            .into_iter()
            .find(|p| SCENARIO_DISTINCT.contains(&p.distinct))
            .map(|p| p.index);
    }

    roles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(columns: &[&str], rows: Vec<Vec<String>>) -> Frame {
        Frame::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn test_numeric_column_wins_amount() {
        let rows = (0..20)
            .map(|i| {
                vec![
                    format!("{}", i * 10),
                    if i % 2 == 0 { "x".to_string() } else { format!("{}", i) },
                ]
            })
            .collect();
        let f = frame(&["Valores", "Mixta"], rows);

        let values = profile_column(&f, 0, SAMPLE_ROWS);
        let mixed = profile_column(&f, 1, SAMPLE_ROWS);
        assert_eq!(values.numeric_score, 1.0);
        assert!(mixed.numeric_score < MIN_AMOUNT_SCORE);

        let roles = classify_columns(&f, &ColumnRoles::default(), &HashSet::new());
        assert_eq!(roles.amount, Some(0));
    }

    #[test]
    fn test_amount_below_threshold_is_unresolved() {
        let rows = (0..10)
            .map(|i| vec![if i < 5 { "1".to_string() } else { "n/a".to_string() }])
            .collect();
        let f = frame(&["Dato"], rows);
        let roles = classify_columns(&f, &ColumnRoles::default(), &HashSet::new());
        assert_eq!(roles.amount, None);
    }

    #[test]
    fn test_thousands_separators_count_as_numeric() {
        let rows = vec![vec!["1,200.50".to_string()], vec!["3,000".to_string()]];
        let f = frame(&["Importe"], rows);
        assert_eq!(profile_column(&f, 0, SAMPLE_ROWS).numeric_score, 1.0);
    }

    #[test]
    fn test_period_scores() {
        let rows = vec![
            vec!["2024-01".into(), "15/01/2024".into(), "Ene".into(), "hola".into()],
            vec!["2024-02".into(), "15/02/2024".into(), "Feb".into(), "mundo".into()],
        ];
        let f = frame(&["a", "b", "c", "d"], rows);
        let profiles = profile_columns(&f);
        assert_eq!(profiles[0].period_score, 3.0);
        assert_eq!(profiles[1].period_score, 3.0);
        assert_eq!(profiles[2].period_score, 1.0);
        assert_eq!(profiles[3].period_score, 0.0);
    }

    #[test]
    fn test_full_role_assignment() {
        let accounts = [
            "Ventas", "Costos", "Sueldos", "Alquiler", "Luz", "Agua", "Internet", "Seguros",
            "Impuestos", "Intereses", "Fletes", "Publicidad",
        ];
        let centers = ["Norte", "Sur", "Este", "Oeste"];
        let rows = accounts
            .iter()
            .enumerate()
            .map(|(i, acc)| {
                vec![
                    "ACME".to_string(),
                    format!("2024-{:02}", i + 1),
                    acc.to_string(),
                    centers[i % centers.len()].to_string(),
                    "Real".to_string(),
                    format!("{}.50", (i + 1) * 100),
                ]
            })
            .collect();
        let f = frame(&["Firma", "Mes contable", "Rubro", "Zona", "Tipo", "Valor neto"], rows);

        let roles = classify_columns(&f, &ColumnRoles::default(), &HashSet::new());
        assert_eq!(roles.amount, Some(5));
        assert_eq!(roles.period, Some(1));
        assert_eq!(roles.company, Some(0));
        assert_eq!(roles.account, Some(2));
        assert_eq!(roles.center, Some(3));
        assert_eq!(roles.scenario, Some(4));
    }

    #[test]
    fn test_pinned_and_excluded_columns_are_respected() {
        let rows = (0..12)
            .map(|i| vec![format!("{}", i), format!("{}", i * 2), "ACME".to_string()])
            .collect();
        let f = frame(&["A", "B", "C"], rows);

        let pinned = ColumnRoles {
            amount: Some(1),
            ..ColumnRoles::default()
        };
        let excluded: HashSet<usize> = [0].into_iter().collect();
        let roles = classify_columns(&f, &pinned, &excluded);

        assert_eq!(roles.amount, Some(1));
        assert_eq!(roles.company, Some(2));
        assert!(!roles.claimed().contains(&0));
    }

    #[test]
    fn test_center_and_scenario_are_distinct_columns() {
        let rows = (0..6)
            .map(|i| vec![["A", "B", "C"][i % 3].to_string(), "Budget".to_string()])
            .collect();
        let f = frame(&["X", "Y"], rows);
        let pinned = ColumnRoles {
            company: Some(99),
            ..ColumnRoles::default()
        };
        let roles = classify_columns(&f, &pinned, &HashSet::new());
        assert_eq!(roles.center, Some(0));
        assert_eq!(roles.scenario, Some(1));
    }
}
