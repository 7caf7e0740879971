//! String utility functions
//!
//! Reading and writing the `key = value` property text used by feature
//! records, archive metadata and free-form writer options.

use std::fmt::Write;

/// Parse property text into ordered (key, value) pairs
///
/// Blank lines and lines starting with `#` or `!` are ignored. Keys and
/// values are separated by the first `=` or `:`; a line without a separator
/// yields an empty value.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| match line.find(|c| c == '=' || c == ':') {
            Some(pos) => (line[..pos].trim().to_string(), unescape(line[pos + 1..].trim())),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

/// Render one property line, terminated by a newline
pub fn write_property(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "{} = {}", key, escape(value));
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Value of the first property with the given key
pub fn property<'a>(properties: &'a [(String, String)], key: &str) -> Option<&'a str> {
    properties.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_and_separators() {
        let props = parse_properties("# header\n\na = 1\nb: two words\n  c=3  \nflag\n");
        assert_eq!(props, vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "two words".to_string()),
            ("c".to_string(), "3".to_string()),
            ("flag".to_string(), String::new()),
        ]);
        assert_eq!(property(&props, "c"), Some("3"));
        assert_eq!(property(&props, "d"), None);
    }

    #[test]
    fn multiline_values_are_escaped() {
        let mut text = String::new();
        write_property(&mut text, "note", "line1\nline2");
        assert_eq!(text, "note = line1\\nline2\n");
        assert_eq!(parse_properties(&text)[0].1, "line1\nline2");
    }
}
