//! Parsing of heterogeneous period representations into a canonical
//! `(year, month)` pair.
//!
//! Recognized inputs, in priority order:
//! 1. `YYYY-MM` / `YYYY/MM`
//! 2. full dates: `YYYY-MM-DD`, `DD/MM/YYYY`, `MM/DD/YYYY`
//! 3. a 4-digit year followed by a 1–2 digit month anywhere in the text
//!    (`202401`, `2024_01`, `FY 2024 03`)
//! 4. a month token (Spanish or English name, abbreviation, bare numeral or
//!    `m`-prefixed numeral) combined with a 4-digit year elsewhere in the text
//!    or a caller-supplied default year.

use crate::error::{NormalizerError, Result};
use crate::utils::{fold_diacritics, month_bounds, normalize_token, trim_cell};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

const MONTH_NAMES: &[(&str, u32)] = &[
    // Spanish
    ("ene", 1),
    ("enero", 1),
    ("feb", 2),
    ("febrero", 2),
    ("mar", 3),
    ("marzo", 3),
    ("abr", 4),
    ("abril", 4),
    ("may", 5),
    ("mayo", 5),
    ("jun", 6),
    ("junio", 6),
    ("jul", 7),
    ("julio", 7),
    ("ago", 8),
    ("agosto", 8),
    ("sep", 9),
    ("set", 9),
    ("sept", 9),
    ("septiembre", 9),
    ("setiembre", 9),
    ("oct", 10),
    ("octubre", 10),
    ("nov", 11),
    ("noviembre", 11),
    ("dic", 12),
    ("diciembre", 12),
    // English
    ("jan", 1),
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("apr", 4),
    ("april", 4),
    ("june", 6),
    ("july", 7),
    ("aug", 8),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("dec", 12),
    ("december", 12),
];

fn year_month_exact() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").expect("static regex"))
}

fn year_month_embedded() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\D)(\d{4})\D?(\d{1,2})(?:\D|$)").expect("static regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeriodCodeFormat {
    #[schemars(description = "Render period codes as 'YYYY-MM' (canonical).")]
    #[default]
    Dashed,

    #[schemars(description = "Render period codes as 'YYYYMM'.")]
    Compact,
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(NormalizerError::InvalidMonth {
                input: format!("{}-{}", year, month),
                month,
            });
        }
        Ok(Self { year, month })
    }

    pub fn code(&self, format: PeriodCodeFormat) -> String {
        match format {
            PeriodCodeFormat::Dashed => format!("{:04}-{:02}", self.year, self.month),
            PeriodCodeFormat::Compact => format!("{:04}{:02}", self.year, self.month),
        }
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        month_bounds(self.year, self.month).map(|(start, _)| start)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        month_bounds(self.year, self.month).map(|(_, end)| end)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code(PeriodCodeFormat::Dashed))
    }
}

impl From<NaiveDate> for Period {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

/// The strict shapes the column classifier rewards when scoring a column as
/// "looks like a period".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodPattern {
    YearMonth,
    FullDate,
    MonthName,
}

/// Resolves a single month token: a Spanish/English name or abbreviation, a
/// bare or zero-padded numeral, or an `m`-prefixed numeral (`m3`, `M03`).
pub fn month_from_token(token: &str) -> Option<u32> {
    let t = normalize_token(token);
    if t.is_empty() {
        return None;
    }

    if let Some((_, month)) = MONTH_NAMES.iter().find(|(name, _)| *name == t) {
        return Some(*month);
    }

    let digits = t.strip_prefix('m').unwrap_or(&t);
    if (1..=2).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        let month: u32 = digits.parse().ok()?;
        if (1..=12).contains(&month) {
            return Some(month);
        }
    }

    None
}

#[derive(Debug, Default)]
struct TokenScan {
    year: Option<i32>,
    month_name: Option<u32>,
    month_number: Option<u32>,
    has_other_words: bool,
}

fn scan_tokens(input: &str) -> TokenScan {
    let mut scan = TokenScan::default();
    let folded = fold_diacritics(&input.to_lowercase());

    for word in folded.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }

        // "m3" / "m03" is a single month token; everything else is split
        // into alternating letter and digit runs ("ene2024" -> "ene", "2024").
        let m_prefixed = word.starts_with('m')
            && (2..=3).contains(&word.len())
            && word[1..].chars().all(|c| c.is_ascii_digit());
        if m_prefixed {
            if let Some(month) = month_from_token(word) {
                scan.month_number.get_or_insert(month);
                continue;
            }
        }

        for run in split_runs(word) {
            if run.chars().all(|c| c.is_ascii_digit()) {
                match run.len() {
                    4 => {
                        if scan.year.is_none() {
                            scan.year = run.parse().ok();
                        }
                    }
                    1 | 2 => {
                        if let Some(month) = month_from_token(run) {
                            scan.month_number.get_or_insert(month);
                        }
                    }
                    _ => {}
                }
            } else if let Some(month) = month_from_token(run) {
                scan.month_name.get_or_insert(month);
            } else {
                scan.has_other_words = true;
            }
        }
    }

    scan
}

fn split_runs(word: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut previous_digit: Option<bool> = None;

    for (idx, c) in word.char_indices() {
        let is_digit = c.is_ascii_digit();
        if let Some(prev) = previous_digit {
            if prev != is_digit {
                runs.push(&word[start..idx]);
                start = idx;
            }
        }
        previous_digit = Some(is_digit);
    }
    if start < word.len() {
        runs.push(&word[start..]);
    }

    runs
}

fn parse_full_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

fn captured_period(input: &str, year: &str, month: &str) -> Result<Period> {
    let year: i32 = year
        .parse()
        .map_err(|_| NormalizerError::InvalidPeriod(input.to_string()))?;
    let month: u32 = month
        .parse()
        .map_err(|_| NormalizerError::InvalidPeriod(input.to_string()))?;
    if !(1..=12).contains(&month) {
        return Err(NormalizerError::InvalidMonth {
            input: input.to_string(),
            month,
        });
    }
    Ok(Period { year, month })
}

/// Parses a period code or free-text period token.
///
/// Fails with [`NormalizerError::InvalidPeriod`] when no year can be
/// established or no month is found, and with
/// [`NormalizerError::InvalidMonth`] when an extracted month is outside 1–12.
pub fn parse_period(input: &str, default_year: Option<i32>) -> Result<Period> {
    let value = trim_cell(input);
    if value.is_empty() {
        return Err(NormalizerError::InvalidPeriod(input.to_string()));
    }

    if let Some(caps) = year_month_exact().captures(value) {
        return captured_period(value, &caps[1], &caps[2]);
    }

    if let Some(date) = parse_full_date(value) {
        return Ok(Period::from(date));
    }

    if let Some(caps) = year_month_embedded().captures(value) {
        return captured_period(value, &caps[1], &caps[2]);
    }

    let scan = scan_tokens(value);
    let year = scan
        .year
        .or(default_year)
        .ok_or_else(|| NormalizerError::InvalidPeriod(value.to_string()))?;
    let month = scan
        .month_name
        .or(scan.month_number)
        .ok_or_else(|| NormalizerError::InvalidPeriod(value.to_string()))?;

    Period::new(year, month)
}

/// Derives a period from a column name alone, for wide-layout detection.
///
/// Stricter than [`parse_period`]: a bare numeral only counts as a month when
/// the label has no other words, so `"Centro 1"` is not a month column while
/// `"03"` or `"m3"` are.
pub fn period_from_header(label: &str, default_year: Option<i32>) -> Option<Period> {
    let value = trim_cell(label);
    if value.is_empty() {
        return None;
    }

    if let Some(caps) = year_month_exact().captures(value) {
        return captured_period(value, &caps[1], &caps[2]).ok();
    }

    let scan = scan_tokens(value);
    if scan.month_name.is_none() {
        if let Some(caps) = year_month_embedded().captures(value) {
            return captured_period(value, &caps[1], &caps[2]).ok();
        }
    }

    let month = match (scan.month_name, scan.month_number) {
        (Some(month), _) => month,
        (None, Some(month)) if !scan.has_other_words => month,
        _ => return None,
    };
    let year = scan.year.or(default_year)?;

    Period::new(year, month).ok()
}

/// Classifies a cell against the strict period shapes.
pub fn strict_pattern(value: &str) -> Option<PeriodPattern> {
    let v = trim_cell(value);
    if v.is_empty() {
        return None;
    }

    if let Some(caps) = year_month_exact().captures(v) {
        if captured_period(v, &caps[1], &caps[2]).is_ok() {
            return Some(PeriodPattern::YearMonth);
        }
    }

    if parse_full_date(v).is_some() {
        return Some(PeriodPattern::FullDate);
    }

    if scan_tokens(v).month_name.is_some() {
        return Some(PeriodPattern::MonthName);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(year: i32, month: u32) -> Period {
        Period { year, month }
    }

    #[test]
    fn test_year_month_codes() {
        assert_eq!(parse_period("2024-01", None).unwrap(), p(2024, 1));
        assert_eq!(parse_period("2024/3", None).unwrap(), p(2024, 3));
        assert_eq!(parse_period(" 2024-12 ", None).unwrap(), p(2024, 12));
    }

    #[test]
    fn test_full_dates() {
        assert_eq!(parse_period("2024-03-15", None).unwrap(), p(2024, 3));
        assert_eq!(parse_period("15/03/2024", None).unwrap(), p(2024, 3));
        assert_eq!(parse_period("03/25/2024", None).unwrap(), p(2024, 3));
        // Day-first wins when both readings are valid.
        assert_eq!(parse_period("04/03/2024", None).unwrap(), p(2024, 3));
    }

    #[test]
    fn test_embedded_year_month() {
        assert_eq!(parse_period("202401", None).unwrap(), p(2024, 1));
        assert_eq!(parse_period("2024_07", None).unwrap(), p(2024, 7));
        assert_eq!(parse_period("2024 11", None).unwrap(), p(2024, 11));
        assert_eq!(parse_period("FY2024-05 close", None).unwrap(), p(2024, 5));
    }

    #[test]
    fn test_month_tokens() {
        assert_eq!(parse_period("Ene-2024", None).unwrap(), p(2024, 1));
        assert_eq!(parse_period("Septiembre 2023", None).unwrap(), p(2023, 9));
        assert_eq!(parse_period("2023 Set", None).unwrap(), p(2023, 9));
        assert_eq!(parse_period("december", Some(2022)).unwrap(), p(2022, 12));
        assert_eq!(parse_period("DIC", Some(2022)).unwrap(), p(2022, 12));
        assert_eq!(parse_period("m03", Some(2025)).unwrap(), p(2025, 3));
        assert_eq!(parse_period("7", Some(2025)).unwrap(), p(2025, 7));
        assert_eq!(parse_period("ene2024", None).unwrap(), p(2024, 1));
    }

    #[test]
    fn test_accented_month_tokens() {
        assert_eq!(parse_period("Diciémbre 2024", None).unwrap(), p(2024, 12));
        assert_eq!(parse_period("SETIÉMBRE", Some(2023)).unwrap(), p(2023, 9));
        assert_eq!(month_from_token("Févr"), None);
        assert_eq!(month_from_token("ÉNERO"), Some(1));
        assert_eq!(period_from_header("Diciémbre", Some(2025)), Some(p(2025, 12)));
        assert_eq!(strict_pattern("Agósto"), Some(PeriodPattern::MonthName));
    }

    #[test]
    fn test_rejects_invalid_months() {
        assert!(matches!(
            parse_period("2024-13", None),
            Err(NormalizerError::InvalidMonth { month: 13, .. })
        ));
        assert!(matches!(
            parse_period("2024/00", None),
            Err(NormalizerError::InvalidMonth { month: 0, .. })
        ));
        assert!(parse_period("202413", None).is_err());
        assert!(parse_period("13", Some(2024)).is_err());
    }

    #[test]
    fn test_rejects_missing_year() {
        assert!(matches!(
            parse_period("Enero", None),
            Err(NormalizerError::InvalidPeriod(_))
        ));
        assert!(parse_period("", Some(2024)).is_err());
        assert!(parse_period("Total", Some(2024)).is_err());
        assert!(parse_period("no date here", None).is_err());
    }

    #[test]
    fn test_round_trip_all_months() {
        for year in 1900..=2100 {
            for month in 1..=12 {
                let period = Period::new(year, month).unwrap();
                let code = period.code(PeriodCodeFormat::Dashed);
                assert_eq!(parse_period(&code, None).unwrap(), period, "{}", code);

                let compact = period.code(PeriodCodeFormat::Compact);
                assert_eq!(parse_period(&compact, None).unwrap(), period, "{}", compact);
            }
        }
    }

    #[test]
    fn test_period_from_header() {
        assert_eq!(period_from_header("Ene-2024", None), Some(p(2024, 1)));
        assert_eq!(period_from_header("2024-06", None), Some(p(2024, 6)));
        assert_eq!(period_from_header("Marzo", Some(2023)), Some(p(2023, 3)));
        assert_eq!(period_from_header("M11", Some(2023)), Some(p(2023, 11)));
        assert_eq!(period_from_header("04", Some(2023)), Some(p(2023, 4)));
        assert_eq!(period_from_header("Marzo", None), None);
        assert_eq!(period_from_header("Centro 1", Some(2023)), None);
        assert_eq!(period_from_header("Empresa", Some(2023)), None);
        assert_eq!(period_from_header("Monto", Some(2023)), None);
        assert_eq!(period_from_header("Año", Some(2023)), None);
    }

    #[test]
    fn test_strict_pattern() {
        assert_eq!(strict_pattern("2024-01"), Some(PeriodPattern::YearMonth));
        assert_eq!(strict_pattern("2024-01-31"), Some(PeriodPattern::FullDate));
        assert_eq!(strict_pattern("Feb 2024"), Some(PeriodPattern::MonthName));
        assert_eq!(strict_pattern("2024-13"), None);
        assert_eq!(strict_pattern("ACME"), None);
        assert_eq!(strict_pattern("150.5"), None);
    }

    #[test]
    fn test_period_bounds() {
        let period = p(2024, 2);
        assert_eq!(period.start_date(), NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(period.end_date(), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(period.to_string(), "2024-02");
        assert_eq!(period.code(PeriodCodeFormat::Compact), "202402");
    }
}
