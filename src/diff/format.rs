//! Renderings of a [`SchemaDiff`]

use std::fmt::Write as _;

use super::{ChangeKind, EnumDiff, FieldChange, MessageDiff, SchemaDiff, ValueChangeKind};
use crate::diagnostics::Severity;
use crate::error::Result;

const RULE: &str = "============================================================";

fn marker(change: ChangeKind) -> &'static str {
    match change {
        ChangeKind::Added => "+",
        ChangeKind::Removed => "-",
        ChangeKind::Modified => "~",
        ChangeKind::Moved => ">",
    }
}

fn field_marker(field: &FieldChange) -> &'static str {
    match (&field.old, &field.new) {
        (None, Some(_)) => "+",
        (Some(_), None) => "-",
        _ => "~",
    }
}

impl SchemaDiff {
    fn is_breaking_path(&self, path: &str) -> bool {
        self.breaking
            .iter()
            .any(|b| b.severity == Severity::Error && (b.path == path || b.path.starts_with(&format!("{}.", path))))
    }

    fn title(&self) -> String {
        format!("Schema Comparison: {} -> {}", self.old_version, self.new_version)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Full plain-text report
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title());
        let _ = writeln!(out, "{}", RULE);

        if self.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "No changes");
            return out;
        }

        if !self.messages.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "MESSAGES");
            for message in &self.messages {
                self.write_message(&mut out, message);
            }
        }
        if !self.enums.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "ENUMS");
            for diff in &self.enums {
                self.write_enum(&mut out, diff);
            }
        }
        self.write_breaking(&mut out);
        self.write_renumbers(&mut out);
        self.write_summary(&mut out);
        out
    }

    /// Breaking changes and suspected renumbers only
    pub fn to_text_breaking_only(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title());
        let _ = writeln!(out, "{}", RULE);
        if self.breaking.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "No breaking changes");
        }
        self.write_breaking(&mut out);
        self.write_renumbers(&mut out);
        self.write_summary(&mut out);
        out
    }

    fn write_message(&self, out: &mut String, message: &MessageDiff) {
        let tag = if self.is_breaking_path(&message.path) { " [BREAKING]" } else { "" };
        let _ = writeln!(
            out,
            "  {} {} {}{}",
            marker(message.change),
            message.change.as_str().to_uppercase(),
            message.path,
            tag
        );
        for field in &message.fields {
            let _ = writeln!(out, "      {} {} #{}", field_marker(field), field.name, field.number);
            for detail in &field.details {
                let _ = writeln!(out, "          {}", detail);
            }
        }
    }

    fn write_enum(&self, out: &mut String, diff: &EnumDiff) {
        let tag = if self.is_breaking_path(&diff.path) { " [BREAKING]" } else { "" };
        let target = diff.moved_to.as_deref().map(|p| format!(" -> {}", p)).unwrap_or_default();
        let _ = writeln!(
            out,
            "  {} {} {}{}{}",
            marker(diff.change),
            diff.change.as_str().to_uppercase(),
            diff.path,
            target,
            tag
        );
        for value in &diff.values {
            let line = match value.kind {
                ValueChangeKind::Added => format!("+ {} = {}", value.name, value.new_number.unwrap_or_default()),
                ValueChangeKind::Removed => format!("- {} = {}", value.name, value.old_number.unwrap_or_default()),
                ValueChangeKind::NumberChanged => format!(
                    "~ {}: {} -> {}",
                    value.name,
                    value.old_number.unwrap_or_default(),
                    value.new_number.unwrap_or_default()
                ),
                ValueChangeKind::Renamed => format!(
                    "~ {} -> {} = {}",
                    value.old_name.as_deref().unwrap_or("?"),
                    value.name,
                    value.new_number.unwrap_or_default()
                ),
            };
            let _ = writeln!(out, "      {}", line);
        }
    }

    fn write_breaking(&self, out: &mut String) {
        if self.breaking.is_empty() {
            return;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "BREAKING CHANGES");
        for change in &self.breaking {
            let _ = writeln!(out, "  [{}] {} {}: {}", change.severity, change.kind, change.path, change.description);
            match (&change.old_value, &change.new_value) {
                (Some(old), Some(new)) => {
                    let _ = writeln!(out, "      {} -> {}", old, new);
                }
                (Some(value), None) | (None, Some(value)) => {
                    let _ = writeln!(out, "      {}", value);
                }
                (None, None) => {}
            }
        }
    }

    fn write_renumbers(&self, out: &mut String) {
        if self.renumbers.is_empty() {
            return;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "SUSPECTED RENUMBERS");
        for suspect in &self.renumbers {
            let _ = writeln!(
                out,
                "  {}.{}: #{} -> #{} ({} confidence)",
                suspect.message,
                suspect.field,
                suspect.old_number,
                suspect.new_number,
                suspect.confidence.as_str()
            );
            for line in suspect.toml_hint().lines() {
                let _ = writeln!(out, "      {}", line);
            }
        }
    }

    fn write_summary(&self, out: &mut String) {
        let s = &self.summary;
        let _ = writeln!(out);
        let _ = writeln!(out, "SUMMARY");
        let _ = writeln!(
            out,
            "  messages: {} added, {} removed, {} modified",
            s.messages_added, s.messages_removed, s.messages_modified
        );
        let _ = writeln!(
            out,
            "  enums: {} added, {} removed, {} modified",
            s.enums_added, s.enums_removed, s.enums_modified
        );
        let _ = writeln!(out, "  breaking: {} error, {} warning", s.errors, s.warnings);
        if s.suspected_renumbers > 0 {
            let _ = writeln!(out, "  suspected renumbers: {}", s.suspected_renumbers);
        }
        let _ = writeln!(out, "{}", RULE);
        let verdict = if self.is_breaking() { "BREAKING" } else { "compatible" };
        let _ = writeln!(out, "Result: {}", verdict);
    }

    /// Markdown report for review comments
    pub fn to_markdown(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        let _ = writeln!(out, "# {}", self.title());
        let _ = writeln!(out);
        let _ = writeln!(out, "| | Added | Removed | Modified |");
        let _ = writeln!(out, "|---|---|---|---|");
        let _ = writeln!(out, "| Messages | {} | {} | {} |", s.messages_added, s.messages_removed, s.messages_modified);
        let _ = writeln!(out, "| Enums | {} | {} | {} |", s.enums_added, s.enums_removed, s.enums_modified);
        let _ = writeln!(out);
        let verdict = if self.is_breaking() { "**Breaking**" } else { "Compatible" };
        let _ = writeln!(out, "{}: {} error(s), {} warning(s)", verdict, s.errors, s.warnings);

        if !self.breaking.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Breaking Changes");
            let _ = writeln!(out);
            let _ = writeln!(out, "| Severity | Kind | Path | Description | Old | New |");
            let _ = writeln!(out, "|---|---|---|---|---|---|");
            for change in &self.breaking {
                let _ = writeln!(
                    out,
                    "| {} | `{}` | `{}` | {} | {} | {} |",
                    change.severity,
                    change.kind,
                    change.path,
                    change.description,
                    cell(change.old_value.as_deref()),
                    cell(change.new_value.as_deref())
                );
            }
        }

        let modified: Vec<&MessageDiff> = self.messages.iter().filter(|m| !m.fields.is_empty()).collect();
        if !modified.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Field Changes");
            for message in modified {
                let _ = writeln!(out);
                let _ = writeln!(out, "### `{}`", message.path);
                let _ = writeln!(out);
                for field in &message.fields {
                    let _ = writeln!(out, "- `{}` #{}: {}", field.name, field.number, field.details.join("; "));
                }
            }
        }

        if !self.renumbers.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Suspected Renumbered Fields");
            let _ = writeln!(out);
            let _ = writeln!(out, "| Message | Field | Old | New | Confidence |");
            let _ = writeln!(out, "|---|---|---|---|---|");
            for suspect in &self.renumbers {
                let _ = writeln!(
                    out,
                    "| `{}` | `{}` | {} | {} | {} |",
                    suspect.message,
                    suspect.field,
                    suspect.old_number,
                    suspect.new_number,
                    suspect.confidence.as_str()
                );
            }
        }
        out
    }
}

fn cell(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("`{}`", v.replace('|', "\\|")),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::diff::SchemaDiffer;
    use crate::schema::{EnumDef, FieldKind, FieldSlot, MessageDef, ScalarType, VersionSchema};

    fn scalar(name: &str, number: u32, s: ScalarType) -> FieldSlot {
        FieldSlot::new(name, number, FieldKind::Scalar(s))
    }

    fn sample() -> crate::diff::SchemaDiff {
        let v1 = VersionSchema::new("v1", "shop.v1")
            .enumeration(EnumDef::new("Status", &[("OPEN", 0), ("CLOSED", 1)]))
            .message(MessageDef::new("Legacy"))
            .message(
                MessageDef::new("Order")
                    .field(scalar("total", 2, ScalarType::Int64))
                    .field(scalar("amount", 10, ScalarType::Int64)),
            );
        let v2 = VersionSchema::new("v2", "shop.v2")
            .enumeration(EnumDef::new("Status", &[("OPEN", 0), ("CLOSED", 1), ("HELD", 2)]))
            .message(MessageDef::new("Invoice"))
            .message(
                MessageDef::new("Order")
                    .field(scalar("total", 2, ScalarType::Int32))
                    .field(scalar("amount", 8, ScalarType::Int64)),
            );
        SchemaDiffer::new().compare(&v1, &v2)
    }

    #[test]
    fn test_text_report_sections() {
        let text = sample().to_text();

        assert!(text.starts_with("Schema Comparison: v1 -> v2\n"));
        assert!(text.contains("\nMESSAGES\n"));
        assert!(text.contains("  - REMOVED Legacy [BREAKING]"));
        assert!(text.contains("  + ADDED Invoice"));
        assert!(text.contains("  ~ MODIFIED Order [BREAKING]"));
        assert!(text.contains("          type: int64 -> int32 (NARROWING)"));
        assert!(text.contains("\nENUMS\n"));
        assert!(text.contains("      + HELD = 2"));
        assert!(text.contains("\nBREAKING CHANGES\n"));
        assert!(text.contains("  [error] MESSAGE_REMOVED Legacy: Message removed"));
        assert!(text.contains("  Order.amount: #10 -> #8 (high confidence)"));
        assert!(text.contains("  breaking: 3 error, 0 warning"));
        assert!(text.ends_with("Result: BREAKING\n"));
    }

    #[test]
    fn test_breaking_only_omits_change_listing() {
        let text = sample().to_text_breaking_only();

        assert!(!text.contains("\nMESSAGES\n"));
        assert!(!text.contains("+ ADDED Invoice"));
        assert!(text.contains("FIELD_TYPE_INCOMPATIBLE Order.total"));
    }

    #[test]
    fn test_empty_diff_text() {
        let v1 = VersionSchema::new("v1", "s").message(MessageDef::new("Order"));
        let v2 = VersionSchema::new("v2", "s").message(MessageDef::new("Order"));
        let text = SchemaDiffer::new().compare(&v1, &v2).to_text();

        assert!(text.contains("No changes"));
        assert!(!text.contains("SUMMARY"));
    }

    #[test]
    fn test_markdown_tables() {
        let md = sample().to_markdown();

        assert!(md.starts_with("# Schema Comparison: v1 -> v2\n"));
        assert!(md.contains("| Messages | 1 | 1 | 1 |"));
        assert!(md.contains("**Breaking**: 3 error(s), 0 warning(s)"));
        assert!(md.contains("## Breaking Changes"));
        assert!(md.contains("| error | `FIELD_REMOVED` | `Order.amount` | Field removed | `amount = 10` | - |"));
        assert!(md.contains("## Suspected Renumbered Fields"));
        assert!(md.contains("| `Order` | `amount` | 10 | 8 | high |"));
    }

    #[test]
    fn test_json_carries_breaking_entries() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();

        assert_eq!(json["old_version"], "v1");
        assert_eq!(json["summary"]["errors"], 3);
        assert_eq!(json["renumbers"][0]["new_number"], 8);
        assert!(json["breaking"]
            .as_array()
            .unwrap()
            .iter()
            .any(|b| b["kind"] == "MESSAGE_REMOVED" && b["path"] == "Legacy"));
    }
}
