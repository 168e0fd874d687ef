use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use std::str::FromStr;

pub fn first_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// Returns `(start_date, end_date)` for a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = first_day_of_month(year, month)?;
    let end = last_day_of_month(start.year(), start.month())?;
    Some((start, end))
}

/// Trims whitespace and a stray byte-order mark from a cell.
pub fn trim_cell(text: &str) -> &str {
    text.trim().trim_start_matches('\u{feff}').trim()
}

/// Maps accented Latin letters onto their ASCII base letter.
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

/// Lower-cases a value and removes all whitespace, used for header and
/// column-name comparisons.
pub fn normalize_key(text: &str) -> String {
    trim_cell(text)
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Like [`normalize_key`] but also folds diacritics, so `"Año"` and `"ano"`
/// compare equal.
pub fn normalize_token(text: &str) -> String {
    fold_diacritics(&normalize_key(text))
}

/// True when the value parses as a number once thousands-separator commas are
/// removed.
pub fn is_numeric(value: &str) -> bool {
    let cleaned = trim_cell(value).replace(',', "");
    cleaned.parse::<f64>().is_ok_and(|v| v.is_finite())
}

/// Parses an amount after stripping thousands-separator commas.
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let cleaned = trim_cell(value).replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Parses an amount written with a decimal comma (`"1234,5"`).
pub fn parse_decimal_comma_amount(value: &str) -> Option<Decimal> {
    let cleaned = trim_cell(value).replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Lenient boolean reading for exported tables.
pub fn parse_flag(value: &str, default: bool) -> bool {
    let v = trim_cell(value).to_lowercase();
    if v.is_empty() {
        return default;
    }
    matches!(v.as_str(), "1" | "true" | "t" | "yes" | "y" | "si" | "sí")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28)
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            last_day_of_month(2023, 12),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(last_day_of_month(2023, 13), None);
    }

    #[test]
    fn test_month_bounds() {
        let (start, end) = month_bounds(2024, 4).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("  Año "), "ano");
        assert_eq!(normalize_token("Centro de Costo"), "centrodecosto");
        assert_eq!(normalize_token("\u{feff}Empresa"), "empresa");
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("1,234.50"));
        assert!(is_numeric(" -12 "));
        assert!(!is_numeric(""));
        assert!(!is_numeric("ACME"));
        assert!(!is_numeric("2024-01"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.50"), Some(Decimal::new(123450, 2)));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(
            parse_decimal_comma_amount("1234,5"),
            Some(Decimal::new(12345, 1))
        );
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE", false));
        assert!(parse_flag("True", false));
        assert!(parse_flag("", true));
        assert!(!parse_flag("false", true));
        assert!(!parse_flag("0", true));
    }
}
