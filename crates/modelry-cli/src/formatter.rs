//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use modelry_core::TableData;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One rendered instance per line
    Plain,
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format tabulated instances.
    fn format_table(&self, table: &TableData) -> String;

    /// Format rendered instances, one per entry.
    fn format_lines(&self, lines: &[String]) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Plain => Box::new(PlainFormatter),
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

/// Plain text formatter.
pub struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn format_table(&self, table: &TableData) -> String {
        let mut lines = vec![table.headers.join("\t")];
        lines.extend(table.rows.iter().map(|row| row.join("\t")));
        lines.join("\n")
    }

    fn format_lines(&self, lines: &[String]) -> String {
        lines.join("\n")
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_table(&self, data: &TableData) -> String {
        let mut table = Table::new();
        table.set_header(data.headers.iter().map(Cell::new));
        for row in &data.rows {
            table.add_row(row.iter().map(Cell::new));
        }
        format!("{}\n{}", data.title, table)
    }

    fn format_lines(&self, lines: &[String]) -> String {
        lines.join("\n")
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_table(&self, table: &TableData) -> String {
        let rows: Vec<serde_json::Value> = table
            .records()
            .map(|record| {
                let obj: serde_json::Map<String, serde_json::Value> = record
                    .into_iter()
                    .map(|(header, cell)| (header.to_string(), serde_json::Value::from(cell)))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_lines(&self, lines: &[String]) -> String {
        serde_json::to_string_pretty(lines).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({
            "message": message
        })
        .to_string()
    }
}

/// CSV formatter.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_table(&self, table: &TableData) -> String {
        let mut output = csv_line(&table.headers);
        for row in &table.rows {
            output.push('\n');
            output.push_str(&csv_line(row));
        }
        output
    }

    fn format_lines(&self, lines: &[String]) -> String {
        lines.iter().map(|l| escape_csv(l)).collect::<Vec<_>>().join("\n")
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

fn csv_line(cells: &[String]) -> String {
    cells.iter().map(|c| escape_csv(c)).collect::<Vec<_>>().join(",")
}

/// Quote a CSV field when it needs it.
fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableData {
        let mut table = TableData::new("Pet", vec!["id".into(), "name".into()]);
        table.push_row(vec!["1".into(), "Rex, Jr.".into()]);
        table
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Plain.to_string(), "plain");
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_table_formatter() {
        let output = TableFormatter.format_table(&sample());
        assert!(output.starts_with("Pet\n"));
        assert!(output.contains("Rex, Jr."));
    }

    #[test]
    fn test_json_formatter() {
        let output = JsonFormatter.format_table(&sample());
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["name"], "Rex, Jr.");
        assert_eq!(JsonFormatter.format_message("hi"), r#"{"message":"hi"}"#);
    }

    #[test]
    fn test_csv_formatter_escapes() {
        assert_eq!(CsvFormatter.format_table(&sample()), "id,name\n1,\"Rex, Jr.\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_plain_formatter() {
        assert_eq!(PlainFormatter.format_table(&sample()), "id\tname\n1\tRex, Jr.");
        assert_eq!(PlainFormatter.format_lines(&["a".into(), "b".into()]), "a\nb");
    }
}
