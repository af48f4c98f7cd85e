//! Deterministic header rendering.
//!
//! # Responsibility
//! - Render an ordered value tree as YAML front matter text.
//!
//! # Invariants
//! - Output depends only on the tree and `RenderOptions`; map order is the
//!   insertion order chosen by the caller.
//! - An all-scalar list renders inline when it has at most
//!   `inline_max_items` items and the inline form fits `inline_max_width`;
//!   otherwise it renders as a block list.
//! - Every rendered scalar parses back to the same string.

const INDENT: &str = "  ";

/// Thresholds controlling inline vs. block list rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub inline_max_items: usize,
    pub inline_max_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            inline_max_items: 4,
            inline_max_width: 72,
        }
    }
}

/// Ordered YAML value tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YamlNode {
    Scalar(String),
    Number(i64),
    List(Vec<YamlNode>),
    Map(Vec<(String, YamlNode)>),
}

impl YamlNode {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    /// A single item collapses to a scalar; scalar-or-list readers accept
    /// both.
    pub fn scalar_or_list(mut items: Vec<YamlNode>) -> Self {
        if items.len() == 1 && items[0].is_scalar() {
            return items.remove(0);
        }
        Self::List(items)
    }

    fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Number(_))
    }

    fn is_empty_collection(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }
}

/// Builder for an ordered map that skips empty values.
#[derive(Debug, Default)]
pub struct MapBuilder {
    entries: Vec<(String, YamlNode)>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: YamlNode) -> Self {
        if !value.is_empty_collection() {
            self.entries.push((key.to_string(), value));
        }
        self
    }

    pub fn optional(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.field(key, YamlNode::text(value)),
            None => self,
        }
    }

    pub fn build(self) -> YamlNode {
        YamlNode::Map(self.entries)
    }
}

/// Renders a top-level map as front matter body (without `---` lines).
pub fn render_yaml(root: &YamlNode, options: RenderOptions) -> String {
    let mut output = String::new();
    match root {
        YamlNode::Map(entries) => render_map(&mut output, entries, 0, options),
        other => {
            output.push_str(&inline_value(other));
            output.push('\n');
        }
    }
    output
}

fn render_map(output: &mut String, entries: &[(String, YamlNode)], depth: usize, options: RenderOptions) {
    for (key, value) in entries {
        push_indent(output, depth);
        output.push_str(&quote_scalar(key));
        output.push(':');
        render_value_after_key(output, value, depth, options);
    }
}

fn render_value_after_key(output: &mut String, value: &YamlNode, depth: usize, options: RenderOptions) {
    match value {
        YamlNode::Scalar(text) if is_literal_block(text) => {
            output.push_str(" |-\n");
            push_literal(output, text, depth + 1);
        }
        YamlNode::Scalar(_) | YamlNode::Number(_) => {
            output.push(' ');
            output.push_str(&inline_value(value));
            output.push('\n');
        }
        YamlNode::List(items) => match inline_list(items, options) {
            Some(inline) => {
                output.push(' ');
                output.push_str(&inline);
                output.push('\n');
            }
            None => {
                output.push('\n');
                render_list(output, items, depth + 1, options);
            }
        },
        YamlNode::Map(entries) => {
            output.push('\n');
            render_map(output, entries, depth + 1, options);
        }
    }
}

fn render_list(output: &mut String, items: &[YamlNode], depth: usize, options: RenderOptions) {
    for item in items {
        push_indent(output, depth);
        output.push('-');
        match item {
            YamlNode::Map(entries) if !entries.is_empty() => {
                // First entry shares the dash line; the rest align under it.
                let (first_key, first_value) = &entries[0];
                output.push(' ');
                output.push_str(&quote_scalar(first_key));
                output.push(':');
                render_value_after_key(output, first_value, depth + 1, options);
                render_map(output, &entries[1..], depth + 1, options);
            }
            YamlNode::List(inner) => match inline_list(inner, options) {
                Some(inline) => {
                    output.push(' ');
                    output.push_str(&inline);
                    output.push('\n');
                }
                None => {
                    output.push('\n');
                    render_list(output, inner, depth + 1, options);
                }
            },
            YamlNode::Scalar(text) if is_literal_block(text) => {
                output.push_str(" |-\n");
                push_literal(output, text, depth + 1);
            }
            other => {
                output.push(' ');
                output.push_str(&inline_value(other));
                output.push('\n');
            }
        }
    }
}

fn inline_list(items: &[YamlNode], options: RenderOptions) -> Option<String> {
    if items.is_empty() {
        return Some("[]".to_string());
    }
    if items.len() > options.inline_max_items || !items.iter().all(YamlNode::is_scalar) {
        return None;
    }
    if items
        .iter()
        .any(|item| matches!(item, YamlNode::Scalar(text) if text.contains('\n')))
    {
        return None;
    }
    let inline = format!(
        "[{}]",
        items.iter().map(inline_value).collect::<Vec<_>>().join(", ")
    );
    (inline.chars().count() <= options.inline_max_width).then_some(inline)
}

fn inline_value(value: &YamlNode) -> String {
    match value {
        YamlNode::Scalar(text) => quote_scalar(text),
        YamlNode::Number(number) => number.to_string(),
        YamlNode::List(items) => format!(
            "[{}]",
            items.iter().map(inline_value).collect::<Vec<_>>().join(", ")
        ),
        YamlNode::Map(entries) => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(key, value)| format!("{}: {}", quote_scalar(key), inline_value(value)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Literal blocks cannot carry leading or trailing whitespace; such text
/// falls back to a double-quoted scalar.
fn is_literal_block(text: &str) -> bool {
    text.contains('\n') && text == text.trim() && !text.contains('\r')
}

fn push_indent(output: &mut String, depth: usize) {
    for _ in 0..depth {
        output.push_str(INDENT);
    }
}

fn push_literal(output: &mut String, text: &str, depth: usize) {
    for line in text.lines() {
        if !line.is_empty() {
            push_indent(output, depth);
            output.push_str(line);
        }
        output.push('\n');
    }
}

/// Quotes a scalar when the plain form would not read back as the same
/// string.
pub fn quote_scalar(text: &str) -> String {
    if needs_quotes(text) {
        // JSON string syntax is valid YAML double-quoted syntax.
        serde_json::to_string(text).unwrap_or_else(|_| format!("'{}'", text.replace('\'', "''")))
    } else {
        text.to_string()
    }
}

fn needs_quotes(text: &str) -> bool {
    if text.is_empty() || text != text.trim() {
        return true;
    }
    let lowered = text.to_ascii_lowercase();
    if matches!(
        lowered.as_str(),
        "~" | "null" | "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n" | "." | "??"
    ) {
        return true;
    }
    if text.parse::<f64>().is_ok() || looks_numeric(text) {
        return true;
    }
    let first = text.chars().next().unwrap_or(' ');
    if matches!(
        first,
        '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\''
            | '"' | '%' | '@' | '`' | '~'
    ) {
        return true;
    }
    text.contains(": ")
        || text.contains(" #")
        || text.ends_with(':')
        || text.contains(['[', ']', '{', '}', ',', '\n', '\t'])
}

// Catches forms like `0x1F` and `1_000` that YAML 1.1 readers treat as numbers.
fn looks_numeric(text: &str) -> bool {
    let trimmed = text.trim_start_matches(['+', '-']).to_ascii_lowercase();
    if let Some(rest) = trimmed.strip_prefix("0x") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_hexdigit() || c == '_');
    }
    if let Some(rest) = trimmed.strip_prefix("0o") {
        return !rest.is_empty() && rest.chars().all(|c| matches!(c, '0'..='7' | '_'));
    }
    trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed.chars().all(|c| c.is_ascii_digit() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::{quote_scalar, render_yaml, MapBuilder, RenderOptions, YamlNode};

    fn names(values: &[&str]) -> YamlNode {
        YamlNode::List(values.iter().map(|v| YamlNode::text(*v)).collect())
    }

    #[test]
    fn short_scalar_lists_render_inline() {
        let root = MapBuilder::new()
            .field("date", YamlNode::text("2024-03-10"))
            .field("tags", names(&["walk", "spring"]))
            .build();
        assert_eq!(
            render_yaml(&root, RenderOptions::default()),
            "date: 2024-03-10\ntags: [walk, spring]\n"
        );
    }

    #[test]
    fn long_lists_render_as_blocks() {
        let root = MapBuilder::new()
            .field("tags", names(&["a", "b", "c", "d", "e"]))
            .build();
        assert_eq!(
            render_yaml(&root, RenderOptions::default()),
            "tags:\n  - a\n  - b\n  - c\n  - d\n  - e\n"
        );
    }

    #[test]
    fn record_lists_use_dash_line_for_first_key() {
        let scene = MapBuilder::new()
            .field("name", YamlNode::text("Morning Walk"))
            .field("people", names(&["Dana Ibarra"]))
            .build();
        let root = MapBuilder::new()
            .field("scenes", YamlNode::List(vec![scene]))
            .build();
        assert_eq!(
            render_yaml(&root, RenderOptions::default()),
            "scenes:\n  - name: Morning Walk\n    people: [Dana Ibarra]\n"
        );
    }

    #[test]
    fn multi_line_text_uses_literal_block() {
        let root = MapBuilder::new()
            .field("notes", YamlNode::text("line one\nline two"))
            .build();
        assert_eq!(
            render_yaml(&root, RenderOptions::default()),
            "notes: |-\n  line one\n  line two\n"
        );
    }

    #[test]
    fn special_scalars_are_quoted() {
        assert_eq!(quote_scalar("."), "\".\"");
        assert_eq!(quote_scalar("~"), "\"~\"");
        assert_eq!(quote_scalar("2019"), "\"2019\"");
        assert_eq!(quote_scalar("@Dana"), "\"@Dana\"");
        assert_eq!(quote_scalar("Note: this"), "\"Note: this\"");
        assert_eq!(quote_scalar("2024-03-10"), "2024-03-10");
        assert_eq!(quote_scalar("Dana Ibarra"), "Dana Ibarra");
    }

    #[test]
    fn rendered_text_parses_back() {
        let root = MapBuilder::new()
            .field("date", YamlNode::text("2024-03-10"))
            .field("word_count", YamlNode::Number(3))
            .field("people", names(&["Dana Ibarra", "yes", "[x]"]))
            .optional("summary", Some("  padded"))
            .build();
        let text = render_yaml(&root, RenderOptions::default());
        let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(value["people"][1].as_str(), Some("yes"));
        assert_eq!(value["people"][2].as_str(), Some("[x]"));
        assert_eq!(value["summary"].as_str(), Some("  padded"));
        assert_eq!(value["word_count"].as_i64(), Some(3));
    }
}
