//! Whitespace normalization applied to merged page text before matching.

/// Normalize whitespace so patterns see a stable shape.
///
/// CRLF and lone CR become LF, tabs and non-breaking spaces become a single
/// space, runs of spaces collapse, trailing spaces are stripped per line and
/// three or more consecutive newlines shrink to one blank line.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines = Vec::new();
    for line in unified.split('\n') {
        let mut out = String::with_capacity(line.len());
        let mut last_space = false;
        for c in line.chars() {
            let c = if c == '\t' || c == '\u{00a0}' { ' ' } else { c };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }
        lines.push(out.trim_end().to_string());
    }

    let mut result = String::with_capacity(unified.len());
    let mut blank_run = 0;
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if i > 0 {
            result.push('\n');
        }
        result.push_str(line);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapses_spaces_and_tabs() {
        assert_eq!(normalize_text("Product\t Name:\u{00a0}\u{00a0}Acetone  "), "Product Name: Acetone");
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(normalize_text("a\r\n\r\n\r\n\r\nb\n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_text(" x \t y\n\n\n\nz ");
        assert_eq!(normalize_text(&once), once);
    }
}
