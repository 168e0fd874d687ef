use crate::schema::AccountType;
use crate::utils::normalize_key;
use std::collections::BTreeMap;

/// Account names with a known type, matched exactly (case- and
/// whitespace-insensitive).
pub const KNOWN_ACCOUNTS: &[(&str, AccountType)] = &[
    ("Ventas", AccountType::Revenue),
    ("Compras de materia prima", AccountType::Cogs),
    ("Gastos de personal obrero", AccountType::Cogs),
    ("Gastos de personal administrativo", AccountType::Opex),
    ("Gastos de Servicios generales", AccountType::Opex),
    ("Gasto de depreciación Mobiliario y enseres", AccountType::Depr),
    ("Gasto de depreciación Maquinarias planta", AccountType::Depr),
    ("Costos financieros", AccountType::Fin),
    ("Impuestos sobre beneficios", AccountType::Tax),
];

/// Name-based heuristic used when no explicit mapping exists.
pub fn guess_account_type(name: &str) -> AccountType {
    let n = name.to_lowercase();
    if n.contains("venta") {
        AccountType::Revenue
    } else if n.contains("compra") || n.contains("materia prima") || n.contains("costo") {
        AccountType::Cogs
    } else if n.contains("depreci") || n.contains("amortiz") {
        AccountType::Depr
    } else if n.contains("financ") {
        AccountType::Fin
    } else if n.contains("impuest") {
        AccountType::Tax
    } else {
        AccountType::Opex
    }
}

/// Heuristic over generated codes, for loaders that only see `account_code`.
pub fn guess_account_type_from_code(code: &str) -> AccountType {
    let n = code.to_lowercase();
    if n.contains("ven") || n.contains("rev") {
        AccountType::Revenue
    } else if n.contains("cog") || n.contains("cost") || n.contains("compra") {
        AccountType::Cogs
    } else if n.contains("depr") || n.contains("amort") {
        AccountType::Depr
    } else if n.contains("fin") || n.contains("int") {
        AccountType::Fin
    } else if n.contains("tax") || n.contains("imp") {
        AccountType::Tax
    } else {
        AccountType::Opex
    }
}

/// Resolves account types: a fixed per-source tag first, then the explicit
/// name mapping, then [`KNOWN_ACCOUNTS`], then [`guess_account_type`].
#[derive(Debug, Clone, Default)]
pub struct ChartOfAccounts {
    explicit: BTreeMap<String, AccountType>,
}

impl ChartOfAccounts {
    pub fn new(explicit: &BTreeMap<String, AccountType>) -> Self {
        let mut chart = Self::default();
        for (name, account_type) in KNOWN_ACCOUNTS {
            chart.explicit.insert(normalize_key(name), *account_type);
        }
        for (name, account_type) in explicit {
            chart.explicit.insert(normalize_key(name), *account_type);
        }
        chart
    }

    pub fn explicit_type(&self, name: &str) -> Option<AccountType> {
        self.explicit.get(&normalize_key(name)).copied()
    }

    pub fn resolve(&self, name: &str, fixed: Option<AccountType>) -> AccountType {
        fixed
            .or_else(|| self.explicit_type(name))
            .unwrap_or_else(|| guess_account_type(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_heuristic() {
        assert_eq!(guess_account_type("Ventas nacionales"), AccountType::Revenue);
        assert_eq!(guess_account_type("Costo de ventas"), AccountType::Revenue);
        assert_eq!(guess_account_type("Costo de producción"), AccountType::Cogs);
        assert_eq!(guess_account_type("Amortización intangibles"), AccountType::Depr);
        assert_eq!(guess_account_type("Gastos financieros"), AccountType::Fin);
        assert_eq!(guess_account_type("Impuesto a la renta"), AccountType::Tax);
        assert_eq!(guess_account_type("Alquiler oficina"), AccountType::Opex);
    }

    #[test]
    fn test_code_heuristic() {
        assert_eq!(guess_account_type_from_code("VENTAS"), AccountType::Revenue);
        assert_eq!(guess_account_type_from_code("cogs-materials"), AccountType::Cogs);
        assert_eq!(guess_account_type_from_code("DEPR_PLANTA"), AccountType::Depr);
        assert_eq!(guess_account_type_from_code("tax"), AccountType::Tax);
        assert_eq!(guess_account_type_from_code("rent"), AccountType::Opex);
    }

    #[test]
    fn test_resolution_order() {
        let mut explicit = BTreeMap::new();
        explicit.insert("Alquiler oficina".to_string(), AccountType::Other);
        explicit.insert("Ventas".to_string(), AccountType::Other);
        let chart = ChartOfAccounts::new(&explicit);

        assert_eq!(chart.resolve("alquiler  oficina", None), AccountType::Other);
        // Configured mapping overrides the built-in table.
        assert_eq!(chart.resolve("Ventas", None), AccountType::Other);
        assert_eq!(chart.resolve("Costos financieros", None), AccountType::Fin);
        assert_eq!(chart.resolve("Sueldos", None), AccountType::Opex);
        assert_eq!(
            chart.resolve("Sueldos", Some(AccountType::Cogs)),
            AccountType::Cogs
        );
    }
}
