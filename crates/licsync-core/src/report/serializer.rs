//! Report serialization strategies

use super::{ReportRow, REPORT_COLUMNS};
use crate::error::ReportError;

/// One way of turning report rows into file contents
pub trait ReportSerializer: Send + Sync {
    /// Strategy name used in logs and error lists
    fn name(&self) -> &'static str;

    /// File extension, without the dot
    fn extension(&self) -> &'static str;

    /// Render every row, header first where the format has one
    ///
    /// # Errors
    /// Returns [`ReportError`] if a row cannot be encoded
    fn render(&self, rows: &[ReportRow]) -> Result<Vec<u8>, ReportError>;
}

/// CSV through the `csv` crate writer
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWriterSerializer;

impl ReportSerializer for CsvWriterSerializer {
    fn name(&self) -> &'static str {
        "csv-writer"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn render(&self, rows: &[ReportRow]) -> Result<Vec<u8>, ReportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(REPORT_COLUMNS)?;
        for row in rows {
            writer.write_record(row.values())?;
        }
        writer
            .into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))
    }
}

/// Hand-built delimited text; quotes are escaped by doubling
#[derive(Debug, Clone, Copy)]
pub struct DelimitedTextSerializer {
    delimiter: char,
}

impl DelimitedTextSerializer {
    /// Comma-delimited
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { delimiter: ',' }
    }

    fn escape(&self, field: &str) -> String {
        let needs_quotes = field.contains(self.delimiter)
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r');
        if needs_quotes {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn line<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> String {
        let escaped: Vec<String> = fields.into_iter().map(|f| self.escape(f)).collect();
        let mut line = escaped.join(&self.delimiter.to_string());
        line.push('\n');
        line
    }
}

impl Default for DelimitedTextSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSerializer for DelimitedTextSerializer {
    fn name(&self) -> &'static str {
        "delimited-text"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn render(&self, rows: &[ReportRow]) -> Result<Vec<u8>, ReportError> {
        let mut out = self.line(REPORT_COLUMNS.iter().copied());
        for row in rows {
            out.push_str(&self.line(row.values()));
        }
        Ok(out.into_bytes())
    }
}

/// One JSON object per line
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesSerializer;

impl ReportSerializer for JsonLinesSerializer {
    fn name(&self) -> &'static str {
        "json-lines"
    }

    fn extension(&self) -> &'static str {
        "jsonl"
    }

    fn render(&self, rows: &[ReportRow]) -> Result<Vec<u8>, ReportError> {
        let mut out = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut out, row)?;
            out.push(b'\n');
        }
        Ok(out)
    }
}

/// CSV writer, then delimited text, then JSON lines
#[must_use]
pub fn default_chain() -> Vec<Box<dyn ReportSerializer>> {
    vec![
        Box::new(CsvWriterSerializer),
        Box::new(DelimitedTextSerializer::new()),
        Box::new(JsonLinesSerializer),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_text_doubles_quotes() {
        let s = DelimitedTextSerializer::new();
        assert_eq!(s.escape("plain"), "plain");
        assert_eq!(s.escape("a,b"), "\"a,b\"");
        assert_eq!(s.escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(s.escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn header_comes_first() {
        let bytes = CsvWriterSerializer.render(&[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("ServerName,ResourceGroup,MachineName"));

        let bytes = DelimitedTextSerializer::new().render(&[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.trim_end(), REPORT_COLUMNS.join(","));
    }

    #[test]
    fn json_lines_writes_one_object_per_row() {
        let rows = vec![ReportRow::default(), ReportRow::default()];
        let bytes = JsonLinesSerializer.render(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("\"ServerName\":\"\""));
    }

    #[test]
    fn default_chain_order() {
        let names: Vec<&str> = default_chain().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["csv-writer", "delimited-text", "json-lines"]);
    }
}
