use std::io::Read;
use std::path::Path;

use pl_core::{Error, Result};

/// Untyped tabular input: a header row plus string cells.
///
/// Every row has exactly `headers.len()` cells; short rows are padded with
/// empty cells (treated as missing downstream) and long rows are truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table from headers and rows.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if headers.is_empty() {
            return Err(Error::Data("table has no columns".into()));
        }
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Ok(Self { headers, rows })
    }

    /// Headers are known non-empty and rows already have the right width.
    pub(crate) fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        debug_assert!(!headers.is_empty());
        debug_assert!(rows.iter().all(|r| r.len() == headers.len()));
        Self { headers, rows }
    }

    /// Convenience constructor from string slices (handy in tests and fixtures).
    pub fn from_strs(headers: &[&str], rows: &[&[&str]]) -> Result<Self> {
        Self::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
        )
    }

    /// Read a CSV/TSV file. The delimiter is chosen from the extension
    /// (`.tsv` → tab, anything else → comma).
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
        let delimiter = if ext == "tsv" { b'\t' } else { b',' };
        tracing::debug!(path = %path.display(), ext = %ext, "reading tabular file");
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file, delimiter)
    }

    /// Read delimited text with a header row from any reader.
    pub fn from_csv_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(Error::Data("CSV file has no columns".into()));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }
        Self::new(headers, rows)
    }

    /// Column headers, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Index of the first header equal to `name` (exact match first, then ASCII case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| self.headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
    }

    /// Write the table as CSV.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_pads_short_rows() {
        let text = "a,b,c\n1,2,3\n4,5\n";
        let t = RawTable::from_csv_reader(text.as_bytes(), b',').unwrap();
        assert_eq!(t.headers(), &["a", "b", "c"]);
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.rows()[1], vec!["4", "5", ""]);
    }

    #[test]
    fn test_read_tsv_trims_fields() {
        let text = "x\ty\n 1 \t two\n";
        let t = RawTable::from_csv_reader(text.as_bytes(), b'\t').unwrap();
        assert_eq!(t.rows()[0], vec!["1", "two"]);
    }

    #[test]
    fn test_column_index_case_insensitive_fallback() {
        let t = RawTable::from_strs(&["IPM", "ipm_raw"], &[]).unwrap();
        assert_eq!(t.column_index("IPM"), Some(0));
        assert_eq!(t.column_index("ipm"), Some(0));
        assert_eq!(t.column_index("missing"), None);
    }

    #[test]
    fn test_csv_write_then_read() {
        let t = RawTable::from_strs(&["a", "b"], &[&["1", "x,y"]]).unwrap();
        let mut buf = Vec::new();
        t.write_csv(&mut buf).unwrap();
        let back = RawTable::from_csv_reader(buf.as_slice(), b',').unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_empty_headers_rejected() {
        assert!(RawTable::new(vec![], vec![]).is_err());
    }
}
