use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Returned when a label has nothing left after cleaning.
pub const PLACEHOLDER_CODE: &str = "CODE";
pub const DEFAULT_CODE_LENGTH: usize = 20;
pub const DEFAULT_SLUG_LENGTH: usize = 64;

fn non_alnum_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("static regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CodeStyle {
    #[schemars(description = "Lower-case, hyphen-separated codes (e.g. 'acme-corp'), max 64 characters.")]
    #[default]
    Slug,

    #[schemars(description = "Upper-case, underscore-separated codes (e.g. 'ACME_CORP'), max 20 characters.")]
    Upper,
}

impl CodeStyle {
    pub fn render(&self, label: &str, max_length: usize) -> String {
        match self {
            CodeStyle::Slug => slugify(label, max_length),
            CodeStyle::Upper => codeify(label, max_length),
        }
    }

    pub fn default_max_length(&self) -> usize {
        match self {
            CodeStyle::Slug => DEFAULT_SLUG_LENGTH,
            CodeStyle::Upper => DEFAULT_CODE_LENGTH,
        }
    }
}

fn truncate_trimmed(code: &str, max_length: usize, separator: char) -> String {
    // Codes are ASCII at this point, so byte truncation is safe.
    let cut = &code[..code.len().min(max_length)];
    cut.trim_matches(separator).to_string()
}

/// Turns a free-text label into an upper-case code: every run of characters
/// that are not ASCII letters or digits becomes a single `_`.
pub fn codeify(label: &str, max_length: usize) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return PLACEHOLDER_CODE.to_string();
    }

    let replaced = non_alnum_run().replace_all(trimmed, "_");
    let upper = replaced.trim_matches('_').to_uppercase();
    let code = truncate_trimmed(&upper, max_length, '_');

    if code.is_empty() {
        PLACEHOLDER_CODE.to_string()
    } else {
        code
    }
}

/// Lower-case, hyphenated variant used by the bulk reshaper. Its codes are not
/// expected to match [`codeify`] output for the same label.
pub fn slugify(label: &str, max_length: usize) -> String {
    let lower = label.trim().to_lowercase();
    let replaced = non_alnum_run().replace_all(&lower, "-");
    let slug = truncate_trimmed(replaced.trim_matches('-'), max_length, '-');

    if slug.is_empty() {
        PLACEHOLDER_CODE.to_lowercase()
    } else {
        slug
    }
}

/// Issues collision-free codes for one entity kind.
///
/// The same label always maps to the same code, and two different labels
/// never share one. On collision the base code is suffixed with `_2`, `_3`, …
/// and shortened so that the result still fits `max_length`.
#[derive(Debug, Clone)]
pub struct CodeRegistry {
    style: CodeStyle,
    max_length: usize,
    by_label: HashMap<String, String>,
    issued: HashSet<String>,
}

impl CodeRegistry {
    pub fn new(style: CodeStyle) -> Self {
        Self::with_max_length(style, style.default_max_length())
    }

    pub fn with_max_length(style: CodeStyle, max_length: usize) -> Self {
        Self {
            style,
            max_length,
            by_label: HashMap::new(),
            issued: HashSet::new(),
        }
    }

    /// Returns the code for `label`, issuing a new one the first time it is seen.
    pub fn code_for(&mut self, label: &str) -> String {
        let key = label.trim();
        if let Some(code) = self.by_label.get(key) {
            return code.clone();
        }

        let base = self.style.render(key, self.max_length);
        let mut code = base.clone();
        let mut counter = 2usize;
        while self.issued.contains(&code) {
            code = self.suffixed(&base, counter);
            counter += 1;
        }

        self.issued.insert(code.clone());
        self.by_label.insert(key.to_string(), code.clone());
        code
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.by_label.get(label.trim()).map(String::as_str)
    }

    pub fn is_issued(&self, code: &str) -> bool {
        self.issued.contains(code)
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }

    fn suffixed(&self, base: &str, counter: usize) -> String {
        let suffix = format!("_{}", counter);
        let room = self.max_length.saturating_sub(suffix.len());
        let head = if room == 0 { base } else { &base[..base.len().min(room)] };
        format!("{}{}", head, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codeify_basic() {
        assert_eq!(codeify("  Ventas netas ", 20), "VENTAS_NETAS");
        assert_eq!(codeify("Gasto de depreciación", 20), "GASTO_DE_DEPRECIACI");
        // A separator left at the cut is trimmed so the code stays a fixed point.
        assert_eq!(codeify("Gastos de personal obrero", 20), "GASTOS_DE_PERSONAL_O");
        assert_eq!(codeify("Gastos del personal obrero", 20), "GASTOS_DEL_PERSONAL");
        assert_eq!(codeify("GASTOS_DEL_PERSONAL", 20), "GASTOS_DEL_PERSONAL");
        assert_eq!(codeify("", 20), PLACEHOLDER_CODE);
        assert_eq!(codeify("   ", 20), PLACEHOLDER_CODE);
        assert_eq!(codeify("---", 20), PLACEHOLDER_CODE);
        assert_eq!(codeify("a--b__c", 20), "A_B_C");
    }

    #[test]
    fn test_codeify_is_idempotent() {
        let labels = [
            "Ventas",
            "Compras de materia prima",
            "Gasto de depreciación Maquinarias planta",
            "  __x__ ",
            "ABC DEF GHI JKL MNO PQR",
            "ñandú",
            "",
        ];
        for label in labels {
            for max in [4, 8, 20] {
                let once = codeify(label, max);
                assert_eq!(codeify(&once, max), once, "label {:?} max {}", label, max);
            }
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("ACME Corp.", 64), "acme-corp");
        assert_eq!(slugify("  Centro  Norte ", 64), "centro-norte");
        assert_eq!(slugify("", 64), "code");
        assert_ne!(slugify("ACME Corp", 64), codeify("ACME Corp", 64));
    }

    #[test]
    fn test_registry_memoizes_and_resolves_collisions() {
        let mut registry = CodeRegistry::new(CodeStyle::Upper);
        let a = registry.code_for("ACME Corp");
        let b = registry.code_for("ACME-Corp");
        let c = registry.code_for("acme corp");
        assert_eq!(a, "ACME_CORP");
        assert_eq!(b, "ACME_CORP_2");
        assert_eq!(c, "ACME_CORP_3");
        assert_eq!(registry.code_for(" ACME Corp "), a);
        assert_eq!(registry.len(), 3);
        assert!(registry.is_issued("ACME_CORP_2"));
        assert!(!registry.is_issued("ACME_CORP_4"));
        assert_eq!(registry.get("ACME-Corp"), Some("ACME_CORP_2"));
        assert_eq!(registry.get(" acme corp"), Some("ACME_CORP_3"));
        assert_eq!(registry.get("Globex"), None);
    }

    #[test]
    fn test_registry_collision_at_full_length() {
        let mut registry = CodeRegistry::with_max_length(CodeStyle::Upper, 6);
        let a = registry.code_for("ABCDEFGH");
        let b = registry.code_for("ABCDEFXY");
        assert_eq!(a, "ABCDEF");
        assert_eq!(b, "ABCD_2");
        assert!(b.len() <= 6);
    }

    #[test]
    fn test_registry_is_injective() {
        let labels = [
            "Ventas", "ventas", "VENTAS", "Ventas!", "Ventas 2", "Ventas_2", "Ventas-2",
            "", " ", "?", "Costos", "costos financieros", "Costos Financieros",
        ];
        for style in [CodeStyle::Upper, CodeStyle::Slug] {
            let mut registry = CodeRegistry::with_max_length(style, 8);
            let mut seen: HashMap<String, String> = HashMap::new();
            for label in labels {
                let code = registry.code_for(label);
                if let Some(previous) = seen.get(&code) {
                    assert_eq!(previous.trim(), label.trim(), "code {} reused", code);
                }
                seen.insert(code, label.to_string());
            }
        }
    }
}
