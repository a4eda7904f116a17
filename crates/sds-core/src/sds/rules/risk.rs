//! Risk rating from consequence and likelihood.

/// Consequence level, 1 to 5.
pub fn consequence_level(value: &str) -> Option<u32> {
    match value.trim().to_lowercase().as_str() {
        "insignificant" => Some(1),
        "minor" | "low" => Some(2),
        "moderate" | "medium" => Some(3),
        "major" | "high" => Some(4),
        "severe" | "extreme" => Some(5),
        _ => None,
    }
}

/// Likelihood level, 1 to 5.
pub fn likelihood_level(value: &str) -> Option<u32> {
    let value = value.trim().to_lowercase();
    match value.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
        "rare" => Some(1),
        "unlikely" => Some(2),
        "possible" => Some(3),
        "likely" => Some(4),
        "almost certain" => Some(5),
        _ => None,
    }
}

/// Band label for a score in 1..=25.
pub fn rating_band(score: u32) -> &'static str {
    match score {
        0..=4 => "Low",
        5..=9 => "Medium",
        10..=16 => "High",
        _ => "Extreme",
    }
}

/// `"<Band> (<score>)"`, or empty when either input is missing or unknown.
pub fn risk_rating(consequence: &str, likelihood: &str) -> String {
    match (consequence_level(consequence), likelihood_level(likelihood)) {
        (Some(c), Some(l)) => {
            let score = c * l;
            format!("{} ({})", rating_band(score), score)
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ratings() {
        assert_eq!(risk_rating("insignificant", "rare"), "Low (1)");
        assert_eq!(risk_rating("moderate", "likely"), "High (12)");
        assert_eq!(risk_rating("Severe", "Almost  Certain"), "Extreme (25)");
        assert_eq!(risk_rating("minor", "possible"), "Medium (6)");
    }

    #[test]
    fn test_aliases() {
        assert_eq!(risk_rating("High", "Likely"), "High (16)");
        assert_eq!(risk_rating("low", "unlikely"), "Low (4)");
    }

    #[test]
    fn test_missing_or_unknown() {
        assert_eq!(risk_rating("catastrophic", "likely"), "");
        assert_eq!(risk_rating("major", ""), "");
        assert_eq!(risk_rating("", ""), "");
    }
}
