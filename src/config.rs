use crate::classifier::ColumnRole;
use crate::codes::CodeStyle;
use crate::error::{NormalizerError, Result};
use crate::period::{parse_period, Period, PeriodCodeFormat};
use crate::schema::{AccountType, ScenarioKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_SCENARIO: &str = "Base";
pub const DEFAULT_COMPANY: &str = "MiEmpresa";
pub const DEFAULT_ACCOUNT: &str = "ingresos";
pub const DEFAULT_PERIOD: &str = "2025-01";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_scenario() -> Option<String> {
    Some(DEFAULT_SCENARIO.to_string())
}

fn default_company() -> Option<String> {
    Some(DEFAULT_COMPANY.to_string())
}

fn default_account() -> Option<String> {
    Some(DEFAULT_ACCOUNT.to_string())
}

fn default_period() -> Option<String> {
    Some(DEFAULT_PERIOD.to_string())
}

/// Mapping document driving a normalization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MappingConfig {
    #[schemars(
        description = "Per-file mapping, keyed by file name relative to the raw directory. Files are processed in key order."
    )]
    #[serde(default)]
    pub sources: BTreeMap<String, SourceMapping>,

    #[schemars(description = "Currency assigned to every generated company.")]
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub code_style: CodeStyle,

    #[serde(default)]
    pub period_format: PeriodCodeFormat,

    #[schemars(
        description = "Explicit account-name to account-type mapping. Overrides the name heuristic; matching ignores case and whitespace."
    )]
    #[serde(default)]
    pub account_types: BTreeMap<String, AccountType>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            currency: default_currency(),
            code_style: CodeStyle::default(),
            period_format: PeriodCodeFormat::default(),
            account_types: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct SourceMapping {
    #[schemars(description = "Header renames (old name -> new name) applied right after header detection.")]
    #[serde(default)]
    pub rename: BTreeMap<String, String>,

    #[serde(default)]
    pub columns: ColumnOverrides,

    #[serde(default)]
    pub defaults: SourceDefaults,

    #[schemars(description = "Fixed account type for every account in this file.")]
    #[serde(default)]
    pub account_type: Option<AccountType>,

    #[serde(default)]
    pub scenario_kind: ScenarioKind,

    #[schemars(description = "Fixed scenario label for every row of this file, ignoring any scenario column.")]
    #[serde(default)]
    pub scenario_value: Option<String>,
}

/// Explicit column names per role. Unset roles are matched by conventional
/// header names, then guessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ColumnOverrides {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub center: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
}

impl ColumnOverrides {
    pub fn get(&self, role: ColumnRole) -> Option<&str> {
        let name = match role {
            ColumnRole::Company => &self.company,
            ColumnRole::Period => &self.period,
            ColumnRole::Account => &self.account,
            ColumnRole::Center => &self.center,
            ColumnRole::Amount => &self.amount,
            ColumnRole::Scenario => &self.scenario,
        };
        name.as_deref()
    }
}

/// Values used when a role has no column or a cell is blank.
///
/// Company, account, period and scenario have built-in fallbacks; an explicit
/// `null` turns one off so that rows without the value are skipped instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceDefaults {
    #[serde(default = "default_company")]
    pub company: Option<String>,

    #[schemars(description = "Default period in any recognized form, e.g. '2024-01'.")]
    #[serde(default = "default_period")]
    pub period: Option<String>,

    #[serde(default = "default_account")]
    pub account: Option<String>,

    #[serde(default)]
    pub center: Option<String>,

    #[serde(default = "default_scenario")]
    pub scenario: Option<String>,

    #[schemars(description = "Year for month-only tokens. Falls back to the default period's year.")]
    #[serde(default)]
    pub year: Option<i32>,
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self {
            company: default_company(),
            period: default_period(),
            account: default_account(),
            center: None,
            scenario: default_scenario(),
            year: None,
        }
    }
}

impl SourceDefaults {
    pub fn default_period(&self) -> Result<Option<Period>> {
        self.period
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| parse_period(p, self.year))
            .transpose()
    }

    pub fn default_year(&self) -> Option<i32> {
        self.year
            .or_else(|| self.default_period().ok().flatten().map(|p| p.year))
    }
}

impl MappingConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MappingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.currency.trim().is_empty() {
            return Err(NormalizerError::InvalidConfig(
                "currency must not be empty".to_string(),
            ));
        }

        for (name, source) in &self.sources {
            if name.trim().is_empty() {
                return Err(NormalizerError::InvalidConfig(
                    "source file name must not be empty".to_string(),
                ));
            }

            source.defaults.default_period().map_err(|e| {
                NormalizerError::InvalidConfig(format!("{}: invalid default period: {}", name, e))
            })?;

            if let Some(year) = source.defaults.year {
                if !(1000..=9999).contains(&year) {
                    return Err(NormalizerError::InvalidConfig(format!(
                        "{}: default year {} is not a 4-digit year",
                        name, year
                    )));
                }
            }

            for (from, to) in &source.rename {
                if to.trim().is_empty() {
                    return Err(NormalizerError::InvalidConfig(format!(
                        "{}: rename of '{}' has an empty target",
                        name, from
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MappingConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
