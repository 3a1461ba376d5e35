/// Split pasted text into task titles, one per non-blank line.
///
/// Leading list markers are dropped: bullets (`-`, `*`, `+`, `•`), numbering
/// (`1.`, `2)`), and a markdown checkbox (`[ ]`, `[x]`) after either.
pub fn parse_titles(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_marker)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_marker(line: &str) -> &str {
    let line = line.trim();
    let rest = strip_bullet(line)
        .or_else(|| strip_number(line))
        .unwrap_or(line);
    strip_checkbox(rest).unwrap_or(rest).trim()
}

fn strip_bullet(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix(['-', '*', '+'])
        .or_else(|| line.strip_prefix('•'))?;
    // "-foo" is a title that happens to start with a dash.
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn strip_number(line: &str) -> Option<&str> {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix(['.', ')'])?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn strip_checkbox(line: &str) -> Option<&str> {
    ["[ ]", "[x]", "[X]"]
        .iter()
        .find_map(|checkbox| line.strip_prefix(*checkbox))
        .map(str::trim_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_markers() {
        assert_eq!(parse_titles("- one\n2) two\nthree"), vec!["one", "two", "three"]);
    }

    #[test]
    fn blank_lines_and_whitespace_skipped() {
        assert_eq!(
            parse_titles("\n  * first  \n\n\t+ second\n   \n"),
            vec!["first", "second"]
        );
    }

    #[test]
    fn numbered_with_dots_and_multiple_digits() {
        assert_eq!(parse_titles("1. a\n10. b\n11) c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn checkboxes_and_unicode_bullets() {
        assert_eq!(
            parse_titles("- [ ] todo\n- [x] done\n• dot\n[ ] bare box"),
            vec!["todo", "done", "dot", "bare box"]
        );
    }

    #[test]
    fn markers_without_space_are_content() {
        assert_eq!(
            parse_titles("-flag\n2024.10 release\n3)x"),
            vec!["-flag", "2024.10 release", "3)x"]
        );
    }

    #[test]
    fn marker_only_lines_are_dropped() {
        assert!(parse_titles("-\n*\n3.\n- [ ]").is_empty());
    }

    #[test]
    fn crlf_input() {
        assert_eq!(parse_titles("- a\r\n- b\r\n"), vec!["a", "b"]);
    }
}
