use crate::error::Result;
use crate::schema::NormalizedTables;
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// File name and fixed column set of one output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub file: &'static str,
    pub columns: &'static [&'static str],
}

pub const COMPANIES: TableSpec = TableSpec {
    file: "companies.csv",
    columns: &["company_code", "company_name", "currency", "is_active"],
};

pub const ACCOUNTS: TableSpec = TableSpec {
    file: "accounts.csv",
    columns: &[
        "account_code",
        "account_name",
        "account_type",
        "parent_code",
        "level",
        "is_leaf",
    ],
};

pub const COST_CENTERS: TableSpec = TableSpec {
    file: "cost_centers.csv",
    columns: &["center_code", "center_name", "parent_code", "level", "is_active"],
};

pub const PERIODS: TableSpec = TableSpec {
    file: "periods.csv",
    columns: &["period_code", "year", "month", "start_date", "end_date", "is_open"],
};

pub const SCENARIOS: TableSpec = TableSpec {
    file: "scenarios.csv",
    columns: &["scenario_code", "scenario_name", "kind"],
};

pub const FACTS: TableSpec = TableSpec {
    file: "facts_finance.csv",
    columns: &[
        "company_code",
        "period_code",
        "account_code",
        "center_code",
        "scenario_code",
        "amount",
    ],
};

/// All tables in load order: every table only references tables before it.
pub const TABLES: [TableSpec; 6] = [COMPANIES, ACCOUNTS, COST_CENTERS, PERIODS, SCENARIOS, FACTS];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTable {
    pub file: &'static str,
    pub path: PathBuf,
    pub rows: usize,
    /// False in dry-run mode.
    pub written: bool,
}

fn write_table<T: Serialize>(
    dir: &Path,
    spec: TableSpec,
    records: &[T],
    dry_run: bool,
) -> Result<WrittenTable> {
    let path = dir.join(spec.file);

    if !dry_run {
        let mut file = File::create(&path)?;
        file.write_all(UTF8_BOM)?;

        // Header written explicitly so empty tables still carry their columns.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(spec.columns)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }

    Ok(WrittenTable {
        file: spec.file,
        path,
        rows: records.len(),
        written: !dry_run,
    })
}

/// Writes the six tables as UTF-8 CSV (with BOM) into `dir`, creating it if
/// needed. Entity tables are sorted by code; facts keep their order.
///
/// With `dry_run` nothing touches the filesystem and the returned entries
/// only report row counts.
pub fn write_tables(tables: &NormalizedTables, dir: &Path, dry_run: bool) -> Result<Vec<WrittenTable>> {
    let mut sorted = tables.clone();
    sorted.sort_entities();

    if !dry_run {
        std::fs::create_dir_all(dir)?;
    }

    let written = vec![
        write_table(dir, COMPANIES, &sorted.companies, dry_run)?,
        write_table(dir, ACCOUNTS, &sorted.accounts, dry_run)?,
        write_table(dir, COST_CENTERS, &sorted.cost_centers, dry_run)?,
        write_table(dir, PERIODS, &sorted.periods, dry_run)?,
        write_table(dir, SCENARIOS, &sorted.scenarios, dry_run)?,
        write_table(dir, FACTS, &sorted.facts, dry_run)?,
    ];

    if dry_run {
        warn!("Dry run: no files written to {}", dir.display());
    } else {
        for table in &written {
            info!("Wrote {} ({} rows)", table.path.display(), table.rows);
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CompanyRecord, FactRecord};
    use rust_decimal::Decimal;

    fn sample() -> NormalizedTables {
        let mut tables = NormalizedTables::default();
        for name in ["Zeta", "Acme"] {
            tables.companies.push(CompanyRecord {
                code: name.to_lowercase(),
                name: name.to_string(),
                currency: "USD".to_string(),
                is_active: true,
            });
        }
        tables.facts.push(FactRecord {
            company_code: "zeta".into(),
            period_code: "2024-01".into(),
            account_code: "ventas".into(),
            center_code: String::new(),
            scenario_code: "base".into(),
            amount: Decimal::new(12345, 2),
        });
        tables
    }

    #[test]
    fn test_writes_bom_header_and_sorted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_tables(&sample(), dir.path(), false).unwrap();
        assert_eq!(written.len(), 6);
        assert!(written.iter().all(|t| t.written));

        let companies = std::fs::read(dir.path().join("companies.csv")).unwrap();
        assert!(companies.starts_with(UTF8_BOM));
        let text = String::from_utf8(companies[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "company_code,company_name,currency,is_active");
        assert_eq!(lines[1], "acme,Acme,USD,true");
        assert_eq!(lines[2], "zeta,Zeta,USD,true");

        let facts = std::fs::read_to_string(dir.path().join("facts_finance.csv")).unwrap();
        assert!(facts.contains("zeta,2024-01,ventas,,base,123.45"));

        // Empty tables keep their header.
        let centers = std::fs::read_to_string(dir.path().join("cost_centers.csv")).unwrap();
        assert_eq!(
            centers.trim_start_matches('\u{feff}').trim_end(),
            "center_code,center_name,parent_code,level,is_active"
        );
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("templates");
        let written = write_tables(&sample(), &target, true).unwrap();
        assert_eq!(written[0].rows, 2);
        assert!(!written[0].written);
        assert!(!target.exists());
    }
}
