//! Whitespace normalization applied to extracted text.

/// Normalize extracted text before chunking.
///
/// - Unifies line endings to `\n`.
/// - Strips trailing whitespace from each line.
/// - Collapses runs of blank lines into a single blank line and drops blank
///   lines at either end of the document.
///
/// The normalized form is what chunking and retrieval operate on; the raw file contents are
/// never stored.
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = false;

    for line in unified.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if !blank_run && !lines.is_empty() {
                lines.push("");
            }
            blank_run = true;
        } else {
            blank_run = false;
            lines.push(trimmed);
        }
    }

    while lines.last() == Some(&"") {
        lines.pop();
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifies_line_endings_and_trims() {
        let normalized = normalize_text("alpha  \r\nbeta\r\n");
        assert_eq!(normalized, "alpha\nbeta");
    }

    #[test]
    fn collapses_blank_runs() {
        let normalized = normalize_text("alpha\n\n\n\nbeta\n\n");
        assert_eq!(normalized, "alpha\n\nbeta");
    }

    #[test]
    fn whitespace_only_input_becomes_empty() {
        assert_eq!(normalize_text("  \n\t \n"), "");
    }

    #[test]
    fn leading_blank_lines_are_dropped() {
        assert_eq!(normalize_text("\n\nalpha"), "alpha");
    }
}
