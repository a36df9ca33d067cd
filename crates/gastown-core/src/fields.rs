//! Field-parsing helpers for the `Key: Value` lines the issue store keeps
//! in a bead's description body.
//!
//! Label order on read is lexicographic and parsers must be
//! order-independent; the same rule applies to these description-body
//! fields and to dispatch metadata keys.

use std::collections::BTreeMap;

/// Parse `Key: Value` lines out of a free-text body. Unrecognized lines
/// (no `: ` separator, or a blank line) are skipped rather than failing
/// the whole parse — the body may carry prose alongside fields.
#[must_use]
pub fn parse_fields(body: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in body.lines() {
        if let Some((key, value)) = line.split_once(": ") {
            let key = key.trim();
            if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
                fields.insert(key.to_string(), value.trim().to_string());
            }
        }
    }
    fields
}

/// Render fields back into `Key: Value` lines, sorted by key so output is
/// deterministic regardless of insertion order.
#[must_use]
pub fn render_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Discovery notes: backend kind and coop URL are read from `notes`
/// key/value lines before falling back to labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryNotes {
    pub backend: Option<String>,
    pub coop_url: Option<String>,
}

#[must_use]
pub fn parse_discovery_notes(notes: &str) -> DiscoveryNotes {
    let fields = parse_fields(notes);
    DiscoveryNotes {
        backend: fields.get("backend").cloned(),
        coop_url: fields.get("coop_url").cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_fields() {
        let fields = parse_fields("backend: remote\ncoop_url: https://example/agent\n");
        assert_eq!(fields.get("backend"), Some(&"remote".to_string()));
        assert_eq!(fields.get("coop_url"), Some(&"https://example/agent".to_string()));
    }

    #[test]
    fn order_independent() {
        let a = parse_fields("backend: remote\ncoop_url: u\n");
        let b = parse_fields("coop_url: u\nbackend: remote\n");
        assert_eq!(a, b);
    }

    #[test]
    fn skips_prose_lines() {
        let fields = parse_fields("This is a description.\nbackend: remote\nMore prose here.");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("backend"), Some(&"remote".to_string()));
    }

    #[test]
    fn render_roundtrips_through_parse() {
        let mut fields = BTreeMap::new();
        fields.insert("backend".to_string(), "remote".to_string());
        fields.insert("coop_url".to_string(), "https://x".to_string());
        let rendered = render_fields(&fields);
        assert_eq!(parse_fields(&rendered), fields);
    }

    #[test]
    fn discovery_notes_empty_when_absent() {
        let notes = parse_discovery_notes("");
        assert_eq!(notes, DiscoveryNotes::default());
    }
}
