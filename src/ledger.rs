//! Reading normalized tables back, and an in-memory loader that applies them
//! with natural-key upserts.
//!
//! The [`Ledger`] follows the downstream loader contract: tables are applied
//! in dependency order, every entity is matched on its natural key, and a
//! fact that is loaded twice overwrites its amount instead of duplicating.
//! Periods are matched on `(year, month)`, so `2024-01` and `202401` name the
//! same period.

use crate::chart_of_accounts::guess_account_type_from_code;
use crate::error::{NormalizerError, Result};
use crate::output::{TableSpec, ACCOUNTS, COMPANIES, COST_CENTERS, FACTS, PERIODS, SCENARIOS, TABLES};
use crate::period::parse_period;
use crate::schema::{
    AccountRecord, CompanyRecord, CostCenterRecord, FactRecord, NormalizedTables, PeriodRecord,
    ScenarioKind, ScenarioRecord,
};
use crate::sheet::decode_text;
use crate::utils::{parse_amount, parse_flag, trim_cell};
use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

fn read_headers(path: &Path) -> Result<Vec<String>> {
    let text = decode_text(&std::fs::read(path)?);
    let mut reader = csv::ReaderBuilder::new().from_reader(text.as_bytes());
    Ok(reader
        .headers()?
        .iter()
        .map(|h| trim_cell(h).to_string())
        .collect())
}

/// Checks that all six files exist with their required columns, reporting
/// every problem at once.
pub fn validate_tables(dir: &Path) -> Result<()> {
    let mut problems = Vec::new();

    for spec in TABLES {
        let path = dir.join(spec.file);
        if !path.exists() {
            problems.push(format!("{}: file not found", spec.file));
            continue;
        }

        let headers = read_headers(&path)?;
        let missing: Vec<&str> = spec
            .columns
            .iter()
            .filter(|c| !headers.iter().any(|h| h == *c))
            .copied()
            .collect();
        if !missing.is_empty() {
            problems.push(format!("{}: missing columns {}", spec.file, missing.join(", ")));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(NormalizerError::InvalidTables(problems))
    }
}

/// A CSV row addressed by column name.
struct Row<'a> {
    index: &'a HashMap<String, usize>,
    record: csv::StringRecord,
}

impl Row<'_> {
    fn text(&self, column: &str) -> String {
        self.index
            .get(column)
            .and_then(|idx| self.record.get(*idx))
            .map(|v| trim_cell(v).to_string())
            .unwrap_or_default()
    }

    fn flag(&self, column: &str) -> bool {
        parse_flag(&self.text(column), true)
    }

    fn number<T: std::str::FromStr + Default>(&self, column: &str) -> T {
        let text = self.text(column);
        text.parse()
            .ok()
            .or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .and_then(|v| v.trunc().to_string().parse().ok())
            })
            .unwrap_or_default()
    }

    fn date(&self, column: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.text(column), "%Y-%m-%d").ok()
    }
}

fn read_rows<T, F>(dir: &Path, spec: TableSpec, build: F) -> Result<Vec<T>>
where
    F: Fn(&Row<'_>) -> T,
{
    let text = decode_text(&std::fs::read(dir.join(spec.file))?);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let index: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, h)| (trim_cell(h).to_string(), idx))
        .collect();

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| trim_cell(c).is_empty()) {
            continue;
        }
        out.push(build(&Row {
            index: &index,
            record,
        }));
    }
    Ok(out)
}

/// Validates and reads the six tables from `dir`.
///
/// Reading is lenient: booleans accept `TRUE`/`True`/`1`/`si`, blank numbers
/// become zero, and an unknown account type is inferred from the code.
pub fn read_tables(dir: &Path) -> Result<NormalizedTables> {
    validate_tables(dir)?;

    let tables = NormalizedTables {
        companies: read_rows(dir, COMPANIES, |r| CompanyRecord {
            code: r.text("company_code"),
            name: r.text("company_name"),
            currency: r.text("currency"),
            is_active: r.flag("is_active"),
        })?,
        accounts: read_rows(dir, ACCOUNTS, |r| {
            let code = r.text("account_code");
            let account_type = r
                .text("account_type")
                .parse()
                .unwrap_or_else(|_| guess_account_type_from_code(&code));
            AccountRecord {
                name: r.text("account_name"),
                account_type,
                parent_code: r.text("parent_code"),
                level: r.number("level"),
                is_leaf: r.flag("is_leaf"),
                code,
            }
        })?,
        cost_centers: read_rows(dir, COST_CENTERS, |r| CostCenterRecord {
            code: r.text("center_code"),
            name: r.text("center_name"),
            parent_code: r.text("parent_code"),
            level: r.number("level"),
            is_active: r.flag("is_active"),
        })?,
        periods: read_rows(dir, PERIODS, |r| PeriodRecord {
            code: r.text("period_code"),
            year: r.number("year"),
            month: r.number("month"),
            start_date: r.date("start_date"),
            end_date: r.date("end_date"),
            is_open: r.flag("is_open"),
        })?,
        scenarios: read_rows(dir, SCENARIOS, |r| ScenarioRecord {
            code: r.text("scenario_code"),
            name: r.text("scenario_name"),
            kind: r.text("kind").parse().unwrap_or(ScenarioKind::Actual),
        })?,
        facts: read_rows(dir, FACTS, |r| FactRecord {
            company_code: r.text("company_code"),
            period_code: r.text("period_code"),
            account_code: r.text("account_code"),
            center_code: r.text("center_code"),
            scenario_code: r.text("scenario_code"),
            amount: parse_amount(&r.text("amount")).unwrap_or(Decimal::ZERO),
        })?,
    };

    debug!(
        "Read tables from {}: {} facts",
        dir.display(),
        tables.facts.len()
    );
    Ok(tables)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub companies: UpsertCounts,
    pub accounts: UpsertCounts,
    pub cost_centers: UpsertCounts,
    pub periods: UpsertCounts,
    pub scenarios: UpsertCounts,
    pub facts: UpsertCounts,
}

fn upsert<K: Ord, V: PartialEq>(map: &mut BTreeMap<K, V>, key: K, value: V, counts: &mut UpsertCounts) {
    match map.get_mut(&key) {
        None => {
            map.insert(key, value);
            counts.created += 1;
        }
        Some(existing) if *existing == value => counts.unchanged += 1,
        Some(existing) => {
            *existing = value;
            counts.updated += 1;
        }
    }
}

type MonthKey = (i32, u32);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct LedgerFactKey {
    company: String,
    period: MonthKey,
    account: String,
    center: String,
    scenario: String,
}

fn month_key(code: &str) -> Option<MonthKey> {
    parse_period(code, None).ok().map(|p| (p.year, p.month))
}

fn period_key(record: &PeriodRecord) -> Option<MonthKey> {
    if record.year > 0 && (1..=12).contains(&record.month) {
        Some((record.year, record.month))
    } else {
        month_key(&record.code)
    }
}

/// In-memory store with natural-key upsert semantics.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    companies: BTreeMap<String, CompanyRecord>,
    accounts: BTreeMap<String, AccountRecord>,
    cost_centers: BTreeMap<String, CostCenterRecord>,
    periods: BTreeMap<MonthKey, PeriodRecord>,
    scenarios: BTreeMap<String, ScenarioRecord>,
    facts: BTreeMap<LedgerFactKey, Decimal>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies all six tables in dependency order.
    pub fn apply(&mut self, tables: &NormalizedTables) -> LoadSummary {
        let mut summary = LoadSummary::default();

        for record in &tables.companies {
            if record.code.is_empty() {
                summary.companies.skipped += 1;
                continue;
            }
            upsert(&mut self.companies, record.code.clone(), record.clone(), &mut summary.companies);
        }

        for record in &tables.accounts {
            if record.code.is_empty() {
                summary.accounts.skipped += 1;
                continue;
            }
            upsert(&mut self.accounts, record.code.clone(), record.clone(), &mut summary.accounts);
        }

        for record in &tables.cost_centers {
            if record.code.is_empty() {
                summary.cost_centers.skipped += 1;
                continue;
            }
            upsert(
                &mut self.cost_centers,
                record.code.clone(),
                record.clone(),
                &mut summary.cost_centers,
            );
        }

        for record in &tables.periods {
            match period_key(record) {
                Some(key) => upsert(&mut self.periods, key, record.clone(), &mut summary.periods),
                None => summary.periods.skipped += 1,
            }
        }

        for record in &tables.scenarios {
            if record.code.is_empty() {
                summary.scenarios.skipped += 1;
                continue;
            }
            upsert(&mut self.scenarios, record.code.clone(), record.clone(), &mut summary.scenarios);
        }

        for fact in &tables.facts {
            match self.fact_key(fact) {
                Some(key) => upsert(&mut self.facts, key, fact.amount, &mut summary.facts),
                None => summary.facts.skipped += 1,
            }
        }

        info!(
            "Loaded: companies {:?} accounts {:?} centers {:?} periods {:?} scenarios {:?} facts {:?}",
            summary.companies,
            summary.accounts,
            summary.cost_centers,
            summary.periods,
            summary.scenarios,
            summary.facts
        );
        summary
    }

    /// Resolves a fact's references; `None` when any of them is unknown.
    fn fact_key(&self, fact: &FactRecord) -> Option<LedgerFactKey> {
        let period = month_key(&fact.period_code).filter(|k| self.periods.contains_key(k))?;
        if !self.companies.contains_key(&fact.company_code)
            || !self.accounts.contains_key(&fact.account_code)
            || !self.scenarios.contains_key(&fact.scenario_code)
        {
            return None;
        }

        Some(LedgerFactKey {
            company: fact.company_code.clone(),
            period,
            account: fact.account_code.clone(),
            center: fact.center_code.clone(),
            scenario: fact.scenario_code.clone(),
        })
    }

    pub fn company_count(&self) -> usize {
        self.companies.len()
    }

    pub fn account(&self, code: &str) -> Option<&AccountRecord> {
        self.accounts.get(code)
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    pub fn period(&self, year: i32, month: u32) -> Option<&PeriodRecord> {
        self.periods.get(&(year, month))
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Amount stored for a fact; `period_code` may use either code format.
    pub fn fact_amount(
        &self,
        company_code: &str,
        period_code: &str,
        account_code: &str,
        center_code: &str,
        scenario_code: &str,
    ) -> Option<Decimal> {
        let key = LedgerFactKey {
            company: company_code.to_string(),
            period: month_key(period_code)?,
            account: account_code.to_string(),
            center: center_code.to_string(),
            scenario: scenario_code.to_string(),
        };
        self.facts.get(&key).copied()
    }

    /// Sum of all stored amounts, or `None` if it overflows a `Decimal`.
    pub fn total_amount(&self) -> Option<Decimal> {
        self.facts
            .values()
            .try_fold(Decimal::ZERO, |total, amount| total.checked_add(*amount))
    }
}
