//! Hazard summary taken from the hazard-identification section.

use tracing::debug;

use super::patterns::{HAZARD_HEADING, HAZARD_STATEMENT, SIGNAL_WORD};

/// Maximum number of characters read after the heading line.
pub const HAZARD_WINDOW: usize = 800;

/// Lines used when the window has no signal word or hazard statement.
const FALLBACK_LINES: usize = 3;

const SEPARATOR: &str = "; ";

/// Summarize the hazard section.
///
/// Returns the signal word line and the `H###` statement lines found within
/// [`HAZARD_WINDOW`] characters after the first hazard heading, in order and
/// without duplicates. Empty when there is no heading.
pub fn summarize_hazards(text: &str) -> String {
    let Some(window) = hazard_window(text) else {
        return String::new();
    };

    let lines: Vec<&str> = window
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut selected: Vec<&str> = Vec::new();
    for line in &lines {
        let relevant = SIGNAL_WORD.is_match(line) || HAZARD_STATEMENT.is_match(line);
        if relevant && !selected.contains(line) {
            selected.push(line);
        }
    }

    if selected.is_empty() {
        debug!("No signal word or hazard statements in hazard section; using leading lines");
        for line in lines.iter().take(FALLBACK_LINES) {
            if !selected.contains(line) {
                selected.push(line);
            }
        }
    }

    selected.join(SEPARATOR)
}

/// Text after the first heading line, cut to the window size.
fn hazard_window(text: &str) -> Option<&str> {
    let heading = HAZARD_HEADING.find(text)?;
    let rest = &text[heading.end()..];
    let start = match rest.find('\n') {
        Some(pos) => heading.end() + pos + 1,
        None => text.len(),
    };

    let body = &text[start..];
    let end = body
        .char_indices()
        .nth(HAZARD_WINDOW)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    Some(&body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SDS: &str = "SECTION 1: Identification\n\
        Product Name: Acetone\n\
        SECTION 2: Hazards identification\n\
        Classification: Flammable liquid category 2\n\
        Signal word: Danger\n\
        H225 Highly flammable liquid and vapour.\n\
        H319 Causes serious eye irritation.\n\
        H225 Highly flammable liquid and vapour.\n\
        SECTION 3: Composition\n";

    #[test]
    fn test_signal_word_and_statements() {
        assert_eq!(
            summarize_hazards(SDS),
            "Signal word: Danger; H225 Highly flammable liquid and vapour.; H319 Causes serious eye irritation."
        );
    }

    #[test]
    fn test_no_heading() {
        assert_eq!(summarize_hazards("Danger\nH225 Flammable"), "");
    }

    #[test]
    fn test_fallback_to_leading_lines() {
        let text = "Hazard Identification\nNot a hazardous chemical.\n\nNon-dangerous goods.\nKeep cool.\nStore dry.";
        assert_eq!(
            summarize_hazards(text),
            "Not a hazardous chemical.; Non-dangerous goods.; Keep cool."
        );
    }

    #[test]
    fn test_window_bound() {
        let mut text = String::from("Section 2 Hazards\n");
        for i in 0..200 {
            text.push_str(&format!("H{:03} Statement number {} warning text\n", 200 + i, i));
        }
        let summary = summarize_hazards(&text);
        let separators = summary.matches(SEPARATOR).count();
        assert!(!summary.is_empty());
        assert!(summary.chars().count() <= HAZARD_WINDOW + 2 * separators);
        assert!(!summary.contains("H399"));
    }
}
