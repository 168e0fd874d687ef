//! # Financial Schema Normalizer
//!
//! A library for turning arbitrarily-shaped financial CSV exports into a fixed
//! six-table star schema: companies, accounts, cost centers, periods,
//! scenarios and a fact table of amounts keyed by those dimensions.
//!
//! ## Core Concepts
//!
//! - **Header Locator**: finds the real header row among noisy leading rows
//! - **Column Classifier**: assigns company/account/center/scenario/period/amount roles by sampling values
//! - **Wide-to-Long Reshaper**: melts month-per-column layouts into one amount per row
//! - **Code Generator**: derives short, collision-free codes from free-text labels
//! - **Upsert Ledger**: applies the output tables idempotently on natural keys
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_schema_normalizer::*;
//! use std::path::Path;
//!
//! let config = MappingConfig::from_path(Path::new("import_data/mapping.json"))?;
//! let (result, written) = normalize_and_write(
//!     Path::new("import_data/raw"),
//!     &config,
//!     Path::new("import_data/templates"),
//!     false,
//! )?;
//!
//! for file in &result.report.files {
//!     println!("{}: {:?}", file.source, file.outcome);
//! }
//! ```

pub mod chart_of_accounts;
pub mod classifier;
pub mod codes;
pub mod config;
pub mod error;
pub mod header;
pub mod ingestion;
pub mod ledger;
pub mod output;
pub mod period;
pub mod pipeline;
pub mod reshape;
pub mod schema;
pub mod sheet;
pub mod utils;

pub use chart_of_accounts::{guess_account_type, guess_account_type_from_code, ChartOfAccounts};
pub use classifier::{classify_columns, ColumnProfile, ColumnRole, ColumnRoles};
pub use codes::{codeify, slugify, CodeRegistry, CodeStyle};
pub use config::{ColumnOverrides, MappingConfig, SourceDefaults, SourceMapping};
pub use error::{NormalizerError, Result, SkipReason};
pub use header::{locate_header, normalize_headers, HeaderChoice, HeaderConfidence};
pub use ingestion::{
    convert_flat_export, parse_flat_export, read_flat_export, FlatExport, FlatExportOptions,
    FlatExportRow,
};
pub use ledger::{read_tables, validate_tables, Ledger, LoadSummary, UpsertCounts};
pub use output::{write_tables, WrittenTable};
pub use period::{parse_period, Period, PeriodCodeFormat};
pub use pipeline::{
    normalize_directory, EntityCounts, FileOutcome, FileReport, Normalization,
    NormalizationPipeline, RunReport, TableCounts,
};
pub use reshape::{Layout, MonthColumns};
pub use schema::*;
pub use sheet::{Frame, RawSheet};

use log::{debug, info};
use std::path::Path;

pub struct FinancialNormalizer;

impl FinancialNormalizer {
    /// Normalizes the configured sources and writes the six tables to `out_dir`.
    pub fn normalize_and_write(
        raw_dir: &Path,
        config: &MappingConfig,
        out_dir: &Path,
        dry_run: bool,
    ) -> Result<(Normalization, Vec<WrittenTable>)> {
        info!(
            "Normalizing {} sources from {}",
            config.sources.len(),
            raw_dir.display()
        );

        let result = normalize_directory(raw_dir, config)?;
        let written = write_tables(&result.tables, out_dir, dry_run)?;

        debug!("Skip totals: {:?}", result.report.skip_totals());
        Ok((result, written))
    }

    /// Runs the strict flat-export producer and writes its tables.
    pub fn convert_flat_export_file(
        export_path: &Path,
        options: &FlatExportOptions,
        out_dir: &Path,
        dry_run: bool,
    ) -> Result<(NormalizedTables, Vec<WrittenTable>)> {
        let export = read_flat_export(export_path)?;
        info!(
            "{}: {} rows read, {} valid",
            export_path.display(),
            export.rows_read,
            export.rows.len()
        );

        let tables = convert_flat_export(&export, options);
        let written = write_tables(&tables, out_dir, dry_run)?;
        Ok((tables, written))
    }

    /// Validates and reads the tables in `dir`, then applies them to `ledger`.
    pub fn load_into(ledger: &mut Ledger, dir: &Path) -> Result<LoadSummary> {
        let tables = read_tables(dir)?;
        Ok(ledger.apply(&tables))
    }
}

pub fn normalize_and_write(
    raw_dir: &Path,
    config: &MappingConfig,
    out_dir: &Path,
    dry_run: bool,
) -> Result<(Normalization, Vec<WrittenTable>)> {
    FinancialNormalizer::normalize_and_write(raw_dir, config, out_dir, dry_run)
}

pub fn convert_flat_export_file(
    export_path: &Path,
    options: &FlatExportOptions,
    out_dir: &Path,
    dry_run: bool,
) -> Result<(NormalizedTables, Vec<WrittenTable>)> {
    FinancialNormalizer::convert_flat_export_file(export_path, options, out_dir, dry_run)
}

pub fn load_tables(ledger: &mut Ledger, dir: &Path) -> Result<LoadSummary> {
    FinancialNormalizer::load_into(ledger, dir)
}
