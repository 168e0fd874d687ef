//! Strict producer for flat fact exports.
//!
//! A flat export has exactly one fact per row under a fixed header
//! (`Empresa, Escenario, Año, Mes, Cuenta, Monto`). Unlike the heuristic
//! pipeline, nothing is guessed: a missing column fails the file and a bad
//! year, month or amount skips the row.

use crate::chart_of_accounts::ChartOfAccounts;
use crate::codes::{CodeRegistry, CodeStyle, DEFAULT_CODE_LENGTH};
use crate::config::MappingConfig;
use crate::error::{NormalizerError, Result, SkipReason};
use crate::period::{Period, PeriodCodeFormat};
use crate::schema::{
    AccountRecord, AccountType, CompanyRecord, CostCenterRecord, FactRecord, NormalizedTables,
    PeriodRecord, ScenarioKind, ScenarioRecord,
};
use crate::sheet::decode_text;
use crate::utils::{normalize_token, parse_decimal_comma_amount, trim_cell};
use log::{info, warn};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const REQUIRED_COLUMNS: [&str; 6] = ["Empresa", "Escenario", "Año", "Mes", "Cuenta", "Monto"];
pub const MAIN_CENTER_CODE: &str = "MAIN";
pub const MAIN_CENTER_NAME: &str = "Centro Principal";
pub const DEFAULT_EXPORT_SCENARIO: &str = "BASE";

#[derive(Debug, Clone, PartialEq)]
pub struct FlatExportRow {
    pub company: String,
    pub scenario: String,
    pub account: String,
    pub period: Period,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatExport {
    pub rows: Vec<FlatExportRow>,
    pub rows_read: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatExportOptions {
    pub currency: String,
    pub period_format: PeriodCodeFormat,
    pub account_types: BTreeMap<String, AccountType>,
}

impl Default for FlatExportOptions {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            period_format: PeriodCodeFormat::default(),
            account_types: BTreeMap::new(),
        }
    }
}

impl From<&MappingConfig> for FlatExportOptions {
    fn from(config: &MappingConfig) -> Self {
        Self {
            currency: config.currency.clone(),
            period_format: config.period_format,
            account_types: config.account_types.clone(),
        }
    }
}

pub fn read_flat_export(path: &Path) -> Result<FlatExport> {
    if !path.exists() {
        return Err(NormalizerError::MissingSourceFile(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    parse_flat_export(&bytes, &path.display().to_string())
}

fn locate_columns(headers: &[String], source: &str) -> Result<[usize; 6]> {
    let mut positions = [0usize; 6];
    let mut missing = Vec::new();

    for (slot, required) in REQUIRED_COLUMNS.iter().enumerate() {
        let wanted = normalize_token(required);
        let found = headers
            .iter()
            .position(|h| h == required)
            .or_else(|| headers.iter().position(|h| normalize_token(h) == wanted));
        match found {
            Some(idx) => positions[slot] = idx,
            None => missing.push(required.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(positions)
    } else {
        Err(NormalizerError::MissingColumns {
            file: source.to_string(),
            missing,
            found: headers.to_vec(),
        })
    }
}

fn parse_row(record: &csv::StringRecord, columns: &[usize; 6]) -> std::result::Result<FlatExportRow, SkipReason> {
    let field = |slot: usize| trim_cell(record.get(columns[slot]).unwrap_or(""));
    let [company, scenario, year, month, account, amount] = [0, 1, 2, 3, 4, 5].map(field);

    let year: i32 = year.parse().map_err(|_| SkipReason::InvalidYear)?;
    let month: u32 = month.parse().map_err(|_| SkipReason::InvalidMonth)?;
    let period = Period::new(year, month).map_err(|_| SkipReason::InvalidMonth)?;
    let amount = parse_decimal_comma_amount(amount).ok_or(SkipReason::InvalidAmount)?;

    if company.is_empty() {
        return Err(SkipReason::MissingCompany);
    }
    if account.is_empty() {
        return Err(SkipReason::MissingAccount);
    }

    let scenario = if scenario.is_empty() {
        DEFAULT_EXPORT_SCENARIO
    } else {
        scenario
    };

    Ok(FlatExportRow {
        company: company.to_string(),
        scenario: scenario.to_string(),
        account: account.to_string(),
        period,
        amount,
    })
}

pub fn parse_flat_export(bytes: &[u8], source: &str) -> Result<FlatExport> {
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| trim_cell(h).to_string())
        .collect();
    let columns = locate_columns(&headers, source)?;

    let mut export = FlatExport::default();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| trim_cell(c).is_empty()) {
            continue;
        }
        export.rows_read += 1;
        match parse_row(&record, &columns) {
            Ok(row) => export.rows.push(row),
            Err(reason) => *export.skipped.entry(reason).or_insert(0) += 1,
        }
    }

    if export.rows.is_empty() {
        warn!("{}: no valid rows", source);
    }
    for (reason, count) in &export.skipped {
        warn!("{}: skipped {} rows ({})", source, count, reason);
    }

    Ok(export)
}

/// Builds the six tables from a parsed export. Codes are upper-case with at
/// most 20 characters; every fact is booked to the single `MAIN` center.
pub fn convert_flat_export(export: &FlatExport, options: &FlatExportOptions) -> NormalizedTables {
    let mut tables = NormalizedTables::default();
    if export.rows.is_empty() {
        return tables;
    }

    let chart = ChartOfAccounts::new(&options.account_types);
    let registry = || CodeRegistry::with_max_length(CodeStyle::Upper, DEFAULT_CODE_LENGTH);
    let mut company_codes = registry();
    let mut account_codes = registry();
    let mut scenario_codes = registry();

    let mut companies: HashMap<String, CompanyRecord> = HashMap::new();
    let mut accounts: HashMap<String, AccountRecord> = HashMap::new();
    let mut scenarios: HashMap<String, ScenarioRecord> = HashMap::new();
    let mut periods: BTreeMap<Period, PeriodRecord> = BTreeMap::new();

    for row in &export.rows {
        let company_code = company_codes.code_for(&row.company);
        companies
            .entry(company_code.clone())
            .or_insert_with(|| CompanyRecord {
                code: company_code.clone(),
                name: row.company.clone(),
                currency: options.currency.clone(),
                is_active: true,
            });

        let account_code = account_codes.code_for(&row.account);
        accounts
            .entry(account_code.clone())
            .or_insert_with(|| AccountRecord {
                code: account_code.clone(),
                name: row.account.clone(),
                account_type: chart.resolve(&row.account, None),
                parent_code: String::new(),
                level: 1,
                is_leaf: true,
            });

        let scenario_code = scenario_codes.code_for(&row.scenario);
        scenarios
            .entry(scenario_code.clone())
            .or_insert_with(|| ScenarioRecord {
                code: scenario_code.clone(),
                name: row.scenario.clone(),
                kind: ScenarioKind::Actual,
            });

        let period_code = periods
            .entry(row.period)
            .or_insert_with(|| PeriodRecord {
                code: row.period.code(options.period_format),
                year: row.period.year,
                month: row.period.month,
                start_date: row.period.start_date(),
                end_date: row.period.end_date(),
                is_open: true,
            })
            .code
            .clone();

        tables.facts.push(FactRecord {
            company_code,
            period_code,
            account_code,
            center_code: MAIN_CENTER_CODE.to_string(),
            scenario_code,
            amount: row.amount.round_dp(2),
        });
    }

    tables.companies = companies.into_values().collect();
    tables.accounts = accounts.into_values().collect();
    tables.scenarios = scenarios.into_values().collect();
    tables.periods = periods.into_values().collect();
    tables.cost_centers.push(CostCenterRecord {
        code: MAIN_CENTER_CODE.to_string(),
        name: MAIN_CENTER_NAME.to_string(),
        parent_code: String::new(),
        level: 1,
        is_active: true,
    });
    tables.sort_entities();

    info!(
        "Flat export: companies={} accounts={} periods={} scenarios={} facts={}",
        tables.companies.len(),
        tables.accounts.len(),
        tables.periods.len(),
        tables.scenarios.len(),
        tables.facts.len()
    );

    tables
}
