use csv::{ReaderBuilder, Trim};
use std::io::Read;

/// The export exactly as it arrives: one header row, then data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Column names from the first CSV row. Not used downstream; the
    /// transposed table takes its labels from the last column instead.
    pub headers: Vec<String>,
    /// Each data row, one String per field, all the same width as `headers`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Parse delimited text with the first row as headers. Cells are trimmed.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let rows = rdr
            .records()
            .map(|rec| rec.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;

        Ok(Self { headers, rows })
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}
