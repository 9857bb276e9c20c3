//! Tab-separated uploads: a header row followed by one sample per line.

use std::collections::BTreeMap;

use crate::error::{AgingWellError, Result};

#[derive(Debug, Clone)]
pub struct TabularData {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TabularData {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(AgingWellError::InvalidInput(
                "tab data has no header row".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Required columns that are absent from the header row.
    pub fn missing_columns<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|c| !self.headers.contains(c))
            .map(String::as_str)
            .collect()
    }

    /// Numeric values of one row keyed by column name.
    ///
    /// Only `columns` are parsed when given, so free-text columns the model
    /// does not use are tolerated. Empty cells are left out of the map.
    pub fn named_row(&self, row: usize, columns: Option<&[String]>) -> Result<BTreeMap<String, f64>> {
        let record = self
            .rows
            .get(row)
            .ok_or_else(|| AgingWellError::InvalidInput(format!("tab data has no row {row}")))?;

        let mut out = BTreeMap::new();
        for (name, value) in self.headers.iter().zip(record) {
            if columns.is_some_and(|cols| !cols.contains(name)) {
                continue;
            }
            if value.is_empty() {
                continue;
            }
            let parsed = value.parse::<f64>().map_err(|_| {
                AgingWellError::InvalidInput(format!(
                    "row {row} column `{name}`: `{value}` is not numeric"
                ))
            })?;
            out.insert(name.clone(), parsed);
        }
        Ok(out)
    }
}
