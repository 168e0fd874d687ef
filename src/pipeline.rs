//! Multi-file normalization.
//!
//! Files are processed one at a time, in configuration order, through
//! header detection, month-column detection, role classification and
//! reshaping. Every long row then becomes either a fact or a counted
//! [`SkipReason`]. Code registries and entity accumulators are owned by the
//! pipeline instance, so separate runs never share codes.

use crate::chart_of_accounts::ChartOfAccounts;
use crate::classifier::{classify_columns, ColumnRole, ColumnRoles};
use crate::codes::CodeRegistry;
use crate::config::{MappingConfig, SourceMapping, DEFAULT_SCENARIO};
use crate::error::{NormalizerError, Result, SkipReason};
use crate::header::{frame_from_sheet, is_placeholder_column, HeaderConfidence};
use crate::period::{parse_period, Period, PeriodCodeFormat};
use crate::reshape::{detect_month_columns, reshape, Layout, LongRow, RowPeriod};
use crate::schema::{
    AccountRecord, AccountType, CompanyRecord, CostCenterRecord, FactRecord, NormalizedTables,
    PeriodRecord, ScenarioKind, ScenarioRecord,
};
use crate::sheet::{Frame, RawSheet};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FileOutcome {
    Processed,
    /// Classification was too ambiguous to map amounts safely.
    Skipped { reason: String, rows: usize },
    /// Structural problem: missing file, unreadable content, bad defaults.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub source: String,
    pub outcome: FileOutcome,
    pub header_row: Option<usize>,
    pub header_confidence: Option<HeaderConfidence>,
    pub layout: Option<Layout>,
    pub rows_read: usize,
    pub rows_emitted: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub amounts_zero_filled: usize,
}

impl FileReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            outcome: FileOutcome::Processed,
            header_row: None,
            header_confidence: None,
            layout: None,
            rows_read: 0,
            rows_emitted: 0,
            skipped: BTreeMap::new(),
            amounts_zero_filled: 0,
        }
    }

    pub fn rows_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub attempted: usize,
    pub produced: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub companies: EntityCounts,
    pub accounts: EntityCounts,
    pub cost_centers: EntityCounts,
    pub periods: EntityCounts,
    pub scenarios: EntityCounts,
    pub facts: EntityCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub counts: TableCounts,
}

impl RunReport {
    pub fn file(&self, source: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.source == source)
    }

    pub fn skip_totals(&self) -> BTreeMap<SkipReason, usize> {
        let mut totals = BTreeMap::new();
        for file in &self.files {
            for (reason, count) in &file.skipped {
                *totals.entry(*reason).or_insert(0) += count;
            }
        }
        totals
    }

    /// True when any file failed or was skipped, or any row was dropped.
    pub fn is_partial(&self) -> bool {
        self.counts.facts.skipped > 0
            || self
                .files
                .iter()
                .any(|f| f.outcome != FileOutcome::Processed)
    }
}

/// Result of a run: the six tables plus the report describing them.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub tables: NormalizedTables,
    pub report: RunReport,
}

/// Records of one entity kind, keyed by issued code.
#[derive(Debug)]
struct EntityTable<T> {
    registry: CodeRegistry,
    records: BTreeMap<String, T>,
    counts: EntityCounts,
}

impl<T> EntityTable<T> {
    fn new(registry: CodeRegistry) -> Self {
        Self {
            registry,
            records: BTreeMap::new(),
            counts: EntityCounts::default(),
        }
    }

    /// Returns the code for `label`, building the record on first sight.
    fn register<F>(&mut self, label: &str, build: F) -> (String, &T)
    where
        F: FnOnce(String) -> T,
    {
        self.counts.attempted += 1;
        let code = self.registry.code_for(label);
        let record = self
            .records
            .entry(code.clone())
            .or_insert_with(|| build(code.clone()));
        (code, record)
    }

    fn into_records(mut self) -> (Vec<T>, EntityCounts) {
        self.counts.produced = self.records.len();
        (self.records.into_values().collect(), self.counts)
    }
}

struct FileContext<'a> {
    source: &'a str,
    mapping: &'a SourceMapping,
    default_period: Option<Period>,
    default_year: Option<i32>,
}

/// Values of one row once defaults are applied.
struct ResolvedRow<'a> {
    company: &'a str,
    account: &'a str,
    center: Option<&'a str>,
    scenario: &'a str,
    period: Period,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn cell_or_default<'a>(cell: Option<&'a str>, default: Option<&'a str>) -> Option<&'a str> {
    non_blank(cell).or_else(|| non_blank(default))
}

fn resolve_row<'a>(
    ctx: &'a FileContext<'a>,
    row: &'a LongRow,
) -> std::result::Result<ResolvedRow<'a>, SkipReason> {
    let defaults = &ctx.mapping.defaults;

    let company = cell_or_default(row.company.as_deref(), defaults.company.as_deref())
        .ok_or(SkipReason::MissingCompany)?;
    let account = cell_or_default(row.account.as_deref(), defaults.account.as_deref())
        .ok_or(SkipReason::MissingAccount)?;

    let period = match &row.period {
        RowPeriod::Resolved(period) => *period,
        RowPeriod::Cell(raw) if !raw.trim().is_empty() => {
            parse_period(raw, ctx.default_year).map_err(|e| match e {
                NormalizerError::InvalidMonth { .. } => SkipReason::InvalidMonth,
                _ => SkipReason::InvalidPeriod,
            })?
        }
        _ => ctx.default_period.ok_or(SkipReason::MissingPeriod)?,
    };

    let scenario = non_blank(ctx.mapping.scenario_value.as_deref())
        .or_else(|| cell_or_default(row.scenario.as_deref(), defaults.scenario.as_deref()))
        .unwrap_or(DEFAULT_SCENARIO);

    Ok(ResolvedRow {
        company,
        account,
        center: cell_or_default(row.center.as_deref(), defaults.center.as_deref()),
        scenario,
        period,
    })
}

pub struct NormalizationPipeline {
    currency: String,
    period_format: PeriodCodeFormat,
    chart: ChartOfAccounts,
    companies: EntityTable<CompanyRecord>,
    accounts: EntityTable<AccountRecord>,
    centers: EntityTable<CostCenterRecord>,
    scenarios: EntityTable<ScenarioRecord>,
    periods: BTreeMap<Period, PeriodRecord>,
    period_counts: EntityCounts,
    facts: Vec<FactRecord>,
    fact_counts: EntityCounts,
    files: Vec<FileReport>,
}

impl NormalizationPipeline {
    pub fn new(config: &MappingConfig) -> Self {
        let registry = || CodeRegistry::new(config.code_style);
        Self {
            currency: config.currency.clone(),
            period_format: config.period_format,
            chart: ChartOfAccounts::new(&config.account_types),
            companies: EntityTable::new(registry()),
            accounts: EntityTable::new(registry()),
            centers: EntityTable::new(registry()),
            scenarios: EntityTable::new(registry()),
            periods: BTreeMap::new(),
            period_counts: EntityCounts::default(),
            facts: Vec::new(),
            fact_counts: EntityCounts::default(),
            files: Vec::new(),
        }
    }

    /// Reads and processes one file. A missing or unreadable file is
    /// reported as failed and does not stop the run.
    pub fn process_file(&mut self, path: &Path, source: &str, mapping: &SourceMapping) -> FileReport {
        match RawSheet::from_path(path) {
            Ok(sheet) => self.process_sheet(source, mapping, &sheet),
            Err(e) => {
                warn!("{}: skipping file: {}", source, e);
                let mut report = FileReport::new(source);
                report.outcome = FileOutcome::Failed {
                    error: e.to_string(),
                };
                self.files.push(report.clone());
                report
            }
        }
    }

    pub fn process_sheet(
        &mut self,
        source: &str,
        mapping: &SourceMapping,
        sheet: &RawSheet,
    ) -> FileReport {
        let report = self.run_sheet(source, mapping, sheet);
        match &report.outcome {
            FileOutcome::Processed => info!(
                "{}: {} rows read -> {} facts ({} rows skipped, {} amounts zero-filled)",
                source,
                report.rows_read,
                report.rows_emitted,
                report.rows_skipped(),
                report.amounts_zero_filled
            ),
            FileOutcome::Skipped { reason, rows } => {
                warn!("{}: skipping {} rows: {}", source, rows, reason)
            }
            FileOutcome::Failed { error } => warn!("{}: failed: {}", source, error),
        }
        self.files.push(report.clone());
        report
    }

    fn run_sheet(&mut self, source: &str, mapping: &SourceMapping, sheet: &RawSheet) -> FileReport {
        let mut report = FileReport::new(source);
        if sheet.is_empty() {
            report.outcome = FileOutcome::Failed {
                error: NormalizerError::EmptyInput(source.to_string()).to_string(),
            };
            return report;
        }

        let default_period = match mapping.defaults.default_period() {
            Ok(period) => period,
            Err(e) => {
                report.outcome = FileOutcome::Failed {
                    error: e.to_string(),
                };
                return report;
            }
        };
        let ctx = FileContext {
            source,
            mapping,
            default_period,
            default_year: mapping.defaults.year.or(default_period.map(|p| p.year)),
        };

        let (mut frame, choice) = frame_from_sheet(sheet, source);
        report.header_row = Some(choice.row);
        report.header_confidence = Some(choice.confidence);

        // Placeholder positions survive renames; the two-row strategy needs them.
        let placeholders: Vec<usize> = frame
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| is_placeholder_column(name))
            .map(|(idx, _)| idx)
            .collect();
        frame.rename_columns(&mapping.rename);

        let months = detect_month_columns(&mut frame, &placeholders, ctx.default_year);
        report.rows_read = frame.len();

        let excluded = months.as_ref().map(|m| m.indices()).unwrap_or_default();
        let pinned = pin_roles(&frame, mapping, &excluded, source);
        let roles = classify_columns(&frame, &pinned, &excluded);
        debug!("{}: column roles {}", source, describe_roles(&frame, &roles));

        let Some(reshaped) = reshape(&frame, &roles, months.as_ref(), source) else {
            return self.skip_file(report, "no amount column cleared the confidence threshold");
        };

        if reshaped.layout == Layout::Long && roles.period.is_none() && ctx.default_period.is_none() {
            return self.skip_file(
                report,
                "no period column cleared the confidence threshold and no default period is configured",
            );
        }

        report.layout = Some(reshaped.layout);
        report.amounts_zero_filled = reshaped.amounts_zero_filled;

        for row in &reshaped.rows {
            self.fact_counts.attempted += 1;
            match self.normalize_row(&ctx, row) {
                Ok(fact) => {
                    self.facts.push(fact);
                    report.rows_emitted += 1;
                }
                Err(reason) => {
                    self.count_skip(reason);
                    *report.skipped.entry(reason).or_insert(0) += 1;
                }
            }
        }

        report
    }

    fn skip_file(&mut self, mut report: FileReport, reason: &str) -> FileReport {
        self.fact_counts.attempted += report.rows_read;
        self.fact_counts.skipped += report.rows_read;
        report.outcome = FileOutcome::Skipped {
            reason: reason.to_string(),
            rows: report.rows_read,
        };
        report
    }

    fn count_skip(&mut self, reason: SkipReason) {
        self.fact_counts.skipped += 1;
        match reason {
            SkipReason::MissingCompany => self.companies.counts.skipped += 1,
            SkipReason::MissingAccount => self.accounts.counts.skipped += 1,
            SkipReason::InvalidPeriod
            | SkipReason::MissingPeriod
            | SkipReason::InvalidYear
            | SkipReason::InvalidMonth => self.period_counts.skipped += 1,
            SkipReason::InvalidAmount => {}
        }
    }

    fn normalize_row(
        &mut self,
        ctx: &FileContext<'_>,
        row: &LongRow,
    ) -> std::result::Result<FactRecord, SkipReason> {
        let resolved = resolve_row(ctx, row)?;

        let company_code = self.register_company(resolved.company);
        let account_type = self.chart.resolve(resolved.account, ctx.mapping.account_type);
        let account_code = self.register_account(ctx.source, resolved.account, account_type);
        let center_code = resolved
            .center
            .map(|name| self.register_center(name))
            .unwrap_or_default();
        let scenario_code =
            self.register_scenario(ctx.source, resolved.scenario, ctx.mapping.scenario_kind);
        let period_code = self.register_period(resolved.period);

        Ok(FactRecord {
            company_code,
            period_code,
            account_code,
            center_code,
            scenario_code,
            amount: row.amount,
        })
    }

    fn register_company(&mut self, name: &str) -> String {
        let currency = &self.currency;
        let (code, _) = self.companies.register(name, |code| CompanyRecord {
            code,
            name: name.to_string(),
            currency: currency.clone(),
            is_active: true,
        });
        code
    }

    fn register_account(&mut self, source: &str, name: &str, account_type: AccountType) -> String {
        let (code, record) = self.accounts.register(name, |code| AccountRecord {
            code,
            name: name.to_string(),
            account_type,
            parent_code: String::new(),
            level: 0,
            is_leaf: true,
        });
        if record.account_type != account_type {
            warn!(
                "{}: account '{}' already registered as {}; ignoring {}",
                source, record.code, record.account_type, account_type
            );
        }
        code
    }

    fn register_center(&mut self, name: &str) -> String {
        let (code, _) = self.centers.register(name, |code| CostCenterRecord {
            code,
            name: name.to_string(),
            parent_code: String::new(),
            level: 0,
            is_active: true,
        });
        code
    }

    fn register_scenario(&mut self, source: &str, name: &str, kind: ScenarioKind) -> String {
        let (code, record) = self.scenarios.register(name, |code| ScenarioRecord {
            code,
            name: name.to_string(),
            kind,
        });
        if record.kind != kind {
            warn!(
                "{}: scenario '{}' already registered as {}; ignoring {}",
                source, record.code, record.kind, kind
            );
        }
        code
    }

    fn register_period(&mut self, period: Period) -> String {
        self.period_counts.attempted += 1;
        let format = self.period_format;
        self.periods
            .entry(period)
            .or_insert_with(|| PeriodRecord {
                code: period.code(format),
                year: period.year,
                month: period.month,
                start_date: period.start_date(),
                end_date: period.end_date(),
                is_open: true,
            })
            .code
            .clone()
    }

    /// Emits the six tables, entity tables sorted by code.
    pub fn finish(self) -> Normalization {
        let (companies, company_counts) = self.companies.into_records();
        let (accounts, account_counts) = self.accounts.into_records();
        let (cost_centers, center_counts) = self.centers.into_records();
        let (scenarios, scenario_counts) = self.scenarios.into_records();

        let mut period_counts = self.period_counts;
        period_counts.produced = self.periods.len();
        let mut fact_counts = self.fact_counts;
        fact_counts.produced = self.facts.len();

        let mut tables = NormalizedTables {
            companies,
            accounts,
            cost_centers,
            periods: self.periods.into_values().collect(),
            scenarios,
            facts: self.facts,
        };
        tables.sort_entities();

        let counts = TableCounts {
            companies: company_counts,
            accounts: account_counts,
            cost_centers: center_counts,
            periods: period_counts,
            scenarios: scenario_counts,
            facts: fact_counts,
        };
        info!(
            "Generated: companies={} accounts={} centers={} periods={} scenarios={} facts={}",
            counts.companies.produced,
            counts.accounts.produced,
            counts.cost_centers.produced,
            counts.periods.produced,
            counts.scenarios.produced,
            counts.facts.produced
        );
        if counts.facts.skipped > 0 {
            warn!("{} rows skipped across all files", counts.facts.skipped);
        }

        Normalization {
            tables,
            report: RunReport {
                files: self.files,
                counts,
            },
        }
    }
}

/// Pins roles from explicit column names, then from conventional header
/// names. Month columns are never pinned.
fn pin_roles(
    frame: &Frame,
    mapping: &SourceMapping,
    excluded: &HashSet<usize>,
    source: &str,
) -> ColumnRoles {
    let mut pinned = ColumnRoles::default();

    for role in ColumnRole::ALL {
        let explicit = mapping.columns.get(role).and_then(|name| {
            let found = frame.column_index(name).or_else(|| frame.find_column(name));
            if found.is_none() {
                warn!("{}: configured {} column '{}' not found", source, role, name);
            }
            found
        });
        let found = explicit.or_else(|| {
            role.conventional_names()
                .iter()
                .find_map(|name| frame.find_column(name))
        });

        let claimed = pinned.claimed();
        if let Some(idx) = found.filter(|idx| !excluded.contains(idx) && !claimed.contains(idx)) {
            pinned.set(role, Some(idx));
        }
    }

    pinned
}

fn describe_roles(frame: &Frame, roles: &ColumnRoles) -> String {
    ColumnRole::ALL
        .iter()
        .map(|role| {
            let column = roles
                .get(*role)
                .and_then(|idx| frame.columns.get(idx))
                .map(String::as_str)
                .unwrap_or("-");
            format!("{}={}", role, column)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes every configured source under `raw_dir`, in key order.
pub fn normalize_directory(raw_dir: &Path, config: &MappingConfig) -> Result<Normalization> {
    config.validate()?;
    if !raw_dir.is_dir() {
        return Err(NormalizerError::MissingSourceFile(
            raw_dir.display().to_string(),
        ));
    }

    let mut pipeline = NormalizationPipeline::new(config);
    for (source, mapping) in &config.sources {
        pipeline.process_file(&raw_dir.join(source), source, mapping);
    }

    Ok(pipeline.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::CodeStyle;
    use rust_decimal::Decimal;

    fn sheet(rows: &[&[&str]]) -> RawSheet {
        RawSheet::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_long_file_with_conventional_headers() {
        let mut pipeline = NormalizationPipeline::new(&MappingConfig::default());
        let report = pipeline.process_sheet(
            "long.csv",
            &SourceMapping::default(),
            &sheet(&[
                &["Empresa", "Periodo", "Cuenta", "Monto"],
                &["ACME", "2024-01", "Ventas", "1,000.50"],
                &["ACME", "2024-02", "Ventas", "2000"],
                &["ACME", "13/2024", "Ventas", "5"],
            ]),
        );

        assert_eq!(report.outcome, FileOutcome::Processed);
        assert_eq!(report.layout, Some(Layout::Long));
        assert_eq!(report.rows_emitted, 2);
        assert_eq!(report.skipped.get(&SkipReason::InvalidPeriod), Some(&1));

        let result = pipeline.finish();
        let tables = &result.tables;
        assert_eq!(tables.companies.len(), 1);
        assert_eq!(tables.companies[0].code, "acme");
        assert_eq!(tables.accounts[0].account_type, AccountType::Revenue);
        assert_eq!(tables.periods.len(), 2);
        assert_eq!(tables.scenarios[0].code, "base");
        assert_eq!(tables.facts[0].amount, Decimal::new(100050, 2));
        assert_eq!(tables.facts[0].center_code, "");
        assert_eq!(result.report.counts.facts.attempted, 3);
        assert_eq!(result.report.counts.facts.skipped, 1);
        assert_eq!(result.report.counts.periods.skipped, 1);
        assert!(result.report.is_partial());
    }

    #[test]
    fn test_missing_amount_skips_whole_file() {
        let mut pipeline = NormalizationPipeline::new(&MappingConfig::default());
        let report = pipeline.process_sheet(
            "notes.csv",
            &SourceMapping::default(),
            &sheet(&[
                &["Empresa", "Cuenta", "Comentario"],
                &["ACME", "Ventas", "ok"],
                &["ACME", "Costos", "revisar"],
            ]),
        );

        assert!(matches!(report.outcome, FileOutcome::Skipped { rows: 2, .. }));
        let result = pipeline.finish();
        assert!(result.tables.facts.is_empty());
        assert!(result.tables.companies.is_empty());
        assert_eq!(result.report.counts.facts.skipped, 2);
    }

    #[test]
    fn test_missing_period_uses_default_or_skips() {
        let rows: &[&[&str]] = &[&["Empresa", "Cuenta", "Monto"], &["ACME", "Ventas", "10"]];
        let mut pipeline = NormalizationPipeline::new(&MappingConfig::default());

        let mut no_default = SourceMapping::default();
        no_default.defaults.period = None;
        let report = pipeline.process_sheet("a.csv", &no_default, &sheet(rows));
        assert!(matches!(report.outcome, FileOutcome::Skipped { .. }));

        let report = pipeline.process_sheet("b.csv", &SourceMapping::default(), &sheet(rows));
        assert_eq!(report.outcome, FileOutcome::Processed);

        let mut mapping = SourceMapping::default();
        mapping.defaults.period = Some("2023-07".to_string());
        let report = pipeline.process_sheet("c.csv", &mapping, &sheet(rows));
        assert_eq!(report.outcome, FileOutcome::Processed);

        let result = pipeline.finish();
        let periods: Vec<&str> = result.tables.facts.iter().map(|f| f.period_code.as_str()).collect();
        assert_eq!(periods, vec!["2025-01", "2023-07"]);
    }

    #[test]
    fn test_blank_roles_fall_back_to_builtin_defaults() {
        let mut pipeline = NormalizationPipeline::new(&MappingConfig::default());
        let report = pipeline.process_sheet(
            "saldos.csv",
            &SourceMapping::default(),
            &sheet(&[
                &["Empresa", "Periodo", "Cuenta", "Monto"],
                &["", "2024-01", "", "10"],
                &["ACME", "", "Ventas", "20"],
            ]),
        );
        assert_eq!(report.rows_emitted, 2);
        assert!(report.skipped.is_empty());

        let mut strict = SourceMapping::default();
        strict.defaults.company = None;
        strict.defaults.account = None;
        let report = pipeline.process_sheet(
            "estricto.csv",
            &strict,
            &sheet(&[
                &["Empresa", "Periodo", "Cuenta", "Monto"],
                &["", "2024-01", "Ventas", "10"],
                &["ACME", "2024-01", "", "20"],
            ]),
        );
        assert_eq!(report.skipped.get(&SkipReason::MissingCompany), Some(&1));
        assert_eq!(report.skipped.get(&SkipReason::MissingAccount), Some(&1));

        let tables = pipeline.finish().tables;
        let companies: Vec<&str> = tables.companies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(companies, vec!["ACME", "MiEmpresa"]);
        let accounts: Vec<&str> = tables.accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(accounts, vec!["ingresos", "Ventas"]);
        assert_eq!(tables.facts[1].period_code, "2025-01");
    }

    #[test]
    fn test_wide_file_with_defaults_and_fixed_tags() {
        let config = MappingConfig {
            code_style: CodeStyle::Upper,
            period_format: PeriodCodeFormat::Compact,
            ..MappingConfig::default()
        };
        let mut mapping = SourceMapping::default();
        mapping.defaults.company = Some("Holding Sur".to_string());
        mapping.account_type = Some(AccountType::Opex);
        mapping.scenario_kind = ScenarioKind::Budget;
        mapping.scenario_value = Some("Presupuesto".to_string());

        let mut pipeline = NormalizationPipeline::new(&config);
        let report = pipeline.process_sheet(
            "wide.csv",
            &mapping,
            &sheet(&[
                &["Cuenta", "2024-01", "2024-02", "2024-03", "2024-04", "2024-05", "2024-06"],
                &["Ventas", "1", "2", "3", "4", "5", "x"],
            ]),
        );

        assert_eq!(report.layout, Some(Layout::Wide { month_columns: 6 }));
        assert_eq!(report.rows_emitted, 6);
        assert_eq!(report.amounts_zero_filled, 1);

        let result = pipeline.finish();
        let tables = result.tables;
        assert_eq!(tables.companies[0].code, "HOLDING_SUR");
        assert_eq!(tables.accounts[0].account_type, AccountType::Opex);
        assert_eq!(tables.scenarios[0].kind, ScenarioKind::Budget);
        assert_eq!(tables.scenarios[0].code, "PRESUPUESTO");
        assert_eq!(tables.periods[0].code, "202401");
        assert_eq!(tables.facts[5].amount, Decimal::ZERO);
    }

    #[test]
    fn test_missing_file_is_reported_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ok.csv"),
            "Empresa,Periodo,Cuenta,Monto\nACME,2024-01,Ventas,10\n",
        )
        .unwrap();

        let config = MappingConfig::from_json_str(
            r#"{"sources": {"absent.csv": {}, "ok.csv": {}}}"#,
        )
        .unwrap();
        let result = normalize_directory(dir.path(), &config).unwrap();

        let absent = result.report.file("absent.csv").unwrap();
        assert!(matches!(absent.outcome, FileOutcome::Failed { .. }));
        assert_eq!(result.report.file("ok.csv").unwrap().rows_emitted, 1);
        assert_eq!(result.tables.facts.len(), 1);
    }

    #[test]
    fn test_codes_are_deterministic_across_runs() {
        let data = sheet(&[
            &["Empresa", "Periodo", "Cuenta", "Monto"],
            &["Acme Corp", "2024-01", "Ventas", "1"],
            &["ACME-CORP", "2024-01", "Ventas", "2"],
        ]);
        let config = MappingConfig {
            code_style: CodeStyle::Upper,
            ..MappingConfig::default()
        };

        let run = || {
            let mut pipeline = NormalizationPipeline::new(&config);
            pipeline.process_sheet("a.csv", &SourceMapping::default(), &data);
            pipeline.finish().tables
        };
        let first = run();
        let second = run();

        let codes: Vec<&str> = first.companies.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["ACME_CORP", "ACME_CORP_2"]);
        assert_eq!(first, second);
    }
}
