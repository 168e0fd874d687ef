use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    #[schemars(description = "Sales and other operating revenue")]
    Revenue,

    #[schemars(description = "Cost of goods sold: raw materials, direct labour")]
    Cogs,

    #[schemars(description = "Operating expenses: administrative staff, general services")]
    Opex,

    #[schemars(description = "Depreciation and amortization")]
    Depr,

    #[schemars(description = "Financial costs and income")]
    Fin,

    #[schemars(description = "Income taxes")]
    Tax,

    #[default]
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Revenue => "REVENUE",
            AccountType::Cogs => "COGS",
            AccountType::Opex => "OPEX",
            AccountType::Depr => "DEPR",
            AccountType::Fin => "FIN",
            AccountType::Tax => "TAX",
            AccountType::Other => "OTHER",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "REVENUE" => Ok(AccountType::Revenue),
            "COGS" => Ok(AccountType::Cogs),
            "OPEX" => Ok(AccountType::Opex),
            "DEPR" => Ok(AccountType::Depr),
            "FIN" => Ok(AccountType::Fin),
            "TAX" => Ok(AccountType::Tax),
            "OTHER" => Ok(AccountType::Other),
            other => Err(format!("unknown account type '{}'", other)),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioKind {
    #[default]
    Actual,
    Budget,
    Forecast,
}

impl ScenarioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::Actual => "ACTUAL",
            ScenarioKind::Budget => "BUDGET",
            ScenarioKind::Forecast => "FORECAST",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACTUAL" => Ok(ScenarioKind::Actual),
            "BUDGET" => Ok(ScenarioKind::Budget),
            "FORECAST" => Ok(ScenarioKind::Forecast),
            other => Err(format!("unknown scenario kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    #[serde(rename = "company_code")]
    pub code: String,
    #[serde(rename = "company_name")]
    pub name: String,
    pub currency: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(rename = "account_code")]
    pub code: String,
    #[serde(rename = "account_name")]
    pub name: String,
    pub account_type: AccountType,
    pub parent_code: String,
    pub level: u32,
    pub is_leaf: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCenterRecord {
    #[serde(rename = "center_code")]
    pub code: String,
    #[serde(rename = "center_name")]
    pub name: String,
    pub parent_code: String,
    pub level: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRecord {
    #[serde(rename = "period_code")]
    pub code: String,
    pub year: i32,
    pub month: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    #[serde(rename = "scenario_code")]
    pub code: String,
    #[serde(rename = "scenario_name")]
    pub name: String,
    pub kind: ScenarioKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRecord {
    pub company_code: String,
    pub period_code: String,
    pub account_code: String,
    /// Empty when the source had no cost-center dimension.
    pub center_code: String,
    pub scenario_code: String,
    pub amount: Decimal,
}

/// The natural key of the fact table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactKey {
    pub company_code: String,
    pub period_code: String,
    pub account_code: String,
    pub center_code: String,
    pub scenario_code: String,
}

impl FactRecord {
    pub fn key(&self) -> FactKey {
        FactKey {
            company_code: self.company_code.clone(),
            period_code: self.period_code.clone(),
            account_code: self.account_code.clone(),
            center_code: self.center_code.clone(),
            scenario_code: self.scenario_code.clone(),
        }
    }
}

/// The six canonical output tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTables {
    pub companies: Vec<CompanyRecord>,
    pub accounts: Vec<AccountRecord>,
    pub cost_centers: Vec<CostCenterRecord>,
    pub periods: Vec<PeriodRecord>,
    pub scenarios: Vec<ScenarioRecord>,
    pub facts: Vec<FactRecord>,
}

impl NormalizedTables {
    /// Sorts entity tables by code; facts keep insertion order.
    pub fn sort_entities(&mut self) {
        self.companies.sort_by(|a, b| a.code.cmp(&b.code));
        self.accounts.sort_by(|a, b| a.code.cmp(&b.code));
        self.cost_centers.sort_by(|a, b| a.code.cmp(&b.code));
        self.periods.sort_by(|a, b| (a.year, a.month).cmp(&(b.year, b.month)));
        self.scenarios.sort_by(|a, b| a.code.cmp(&b.code));
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
            && self.accounts.is_empty()
            && self.cost_centers.is_empty()
            && self.periods.is_empty()
            && self.scenarios.is_empty()
            && self.facts.is_empty()
    }
}
