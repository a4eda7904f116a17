//! Yes/No classification flags.

use super::patterns::{IS_DANGEROUS_GOODS, IS_HAZARDOUS, NOT_DANGEROUS_GOODS, NOT_HAZARDOUS};

pub const YES: &str = "Yes";
pub const NO: &str = "No";

/// Title-case a labelled yes/no answer; other values are returned trimmed.
pub fn normalize_yes_no(value: &str) -> String {
    let value = value.trim();
    if value.eq_ignore_ascii_case("yes") {
        YES.to_string()
    } else if value.eq_ignore_ascii_case("no") {
        NO.to_string()
    } else {
        value.to_string()
    }
}

/// Infer the hazardous substance flag from classification statements.
///
/// A negative statement takes precedence over a positive one.
pub fn infer_hazardous(text: &str) -> Option<&'static str> {
    if NOT_HAZARDOUS.is_match(text) {
        Some(NO)
    } else if IS_HAZARDOUS.is_match(text) {
        Some(YES)
    } else {
        None
    }
}

/// Infer the dangerous good flag; a dangerous goods class implies yes.
pub fn infer_dangerous_good(text: &str, has_class: bool) -> Option<&'static str> {
    if NOT_DANGEROUS_GOODS.is_match(text) {
        Some(NO)
    } else if has_class || IS_DANGEROUS_GOODS.is_match(text) {
        Some(YES)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_yes_no() {
        assert_eq!(normalize_yes_no(" YES "), "Yes");
        assert_eq!(normalize_yes_no("no"), "No");
        assert_eq!(normalize_yes_no("Unknown"), "Unknown");
    }

    #[test]
    fn test_infer_hazardous() {
        assert_eq!(infer_hazardous("Classified as hazardous according to WHS"), Some("Yes"));
        assert_eq!(infer_hazardous("NOT classified as hazardous"), Some("No"));
        assert_eq!(infer_hazardous("Store in a cool place"), None);
    }

    #[test]
    fn test_infer_dangerous_good() {
        assert_eq!(
            infer_dangerous_good("Not classified as Dangerous Goods by the ADG Code", false),
            Some("No")
        );
        assert_eq!(infer_dangerous_good("Transport information", true), Some("Yes"));
        assert_eq!(
            infer_dangerous_good("Classified as Dangerous Goods (ADG)", false),
            Some("Yes")
        );
        assert_eq!(infer_dangerous_good("Transport information", false), None);
    }
}
