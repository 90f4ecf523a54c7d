// src/core/commons.rs

/// Removes the common leading indentation of a help text, after dropping
/// blank lines at both ends. The first line is stripped independently, since
/// it usually sits right after the opening of the doc block.
pub fn normalize_indent(text: &str) -> String {
    let expanded = text.replace('\t', "    ");
    let mut lines: Vec<&str> = expanded.lines().collect();

    let first = lines.first().map(|line| line.trim().to_string());
    let margin = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut result: Vec<String> = Vec::with_capacity(lines.len());
    if let Some(first) = first {
        result.push(first);
    }
    for line in lines.drain(..).skip(1) {
        result.push(line.get(margin..).unwrap_or("").trim_end().to_string());
    }

    while result.last().is_some_and(|line| line.is_empty()) {
        result.pop();
    }
    while result.first().is_some_and(|line| line.is_empty()) {
        result.remove(0);
    }
    result.join("\n")
}

/// The first non-blank line of a text, trimmed.
pub fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Helper function to wrap a string in quotes and escape internal quotes.
pub fn wrap_value(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}
