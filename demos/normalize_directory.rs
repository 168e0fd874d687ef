use financial_schema_normalizer::{normalize_and_write, FileOutcome, Ledger, MappingConfig};
use std::fs;

fn main() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let raw_dir = workspace.path().join("raw");
    let out_dir = workspace.path().join("templates");
    fs::create_dir_all(&raw_dir)?;

    fs::write(
        raw_dir.join("saldos_2023.csv"),
        "Balance de comprobacion 2023\n,,,,\n\
         Empresa,Periodo,Cuenta,Centro,Monto\n\
         Confort SA,2023-10,Ventas,Planta,\"12,500.00\"\n\
         Confort SA,2023-10,Compras de materia prima,Planta,4200\n\
         Confort SA,2023-11,Ventas,Planta,13100\n\
         Confort SA,2023-11,Costos financieros,Administracion,310.75\n",
    )?;

    fs::write(
        raw_dir.join("presupuesto_2024.csv"),
        "Cuenta;Ene;Feb;Mar;Abr;May;Jun;Jul;Ago;Sep;Oct;Nov;Dic\n\
         Ventas;14000;14200;14400;14600;14800;15000;15200;15400;15600;15800;16000;16200\n\
         Gastos de personal administrativo;3000;3000;3000;3000;3000;3000;3000;3000;3000;3000;3000;3100\n",
    )?;

    let config = MappingConfig::from_json_str(
        r#"{
            "currency": "EUR",
            "sources": {
                "saldos_2023.csv": {"scenario_value": "Real"},
                "presupuesto_2024.csv": {
                    "defaults": {"company": "Confort SA", "year": 2024},
                    "scenario_kind": "BUDGET",
                    "scenario_value": "Presupuesto 2024"
                }
            }
        }"#,
    )?;

    let (result, written) = normalize_and_write(&raw_dir, &config, &out_dir, false)?;

    println!("Files:");
    for file in &result.report.files {
        let status = match &file.outcome {
            FileOutcome::Processed => "processed".to_string(),
            FileOutcome::Skipped { reason, .. } => format!("skipped ({})", reason),
            FileOutcome::Failed { error } => format!("failed ({})", error),
        };
        println!(
            "  {:<24} {:<10} layout={:?} rows={} facts={}",
            file.source, status, file.layout, file.rows_read, file.rows_emitted
        );
    }

    println!("\nTables:");
    for table in &written {
        println!("  {:<20} {:>4} rows", table.file, table.rows);
    }

    println!("\nAccounts:");
    for account in &result.tables.accounts {
        println!("  {:<40} {}", account.code, account.account_type);
    }

    let mut ledger = Ledger::new();
    let first = financial_schema_normalizer::load_tables(&mut ledger, &out_dir)?;
    let second = financial_schema_normalizer::load_tables(&mut ledger, &out_dir)?;
    println!(
        "\nLedger: first load created {} facts, second load left {} unchanged (total {})",
        first.facts.created,
        second.facts.unchanged,
        ledger
            .total_amount()
            .map_or_else(|| "overflow".to_string(), |t| t.to_string())
    );

    println!("\n{}", serde_json::to_string_pretty(&result.report.counts)?);
    Ok(())
}
