//! Tabular data model
//!
//! Search results, cached batches, annotation batches and index-event rows are all
//! carried as a [`Table`]: an ordered list of column names plus rows of nullable
//! string cells. Empty strings are normalised to null on insertion, which makes a
//! table survive a CSV round trip unchanged.

use crate::domain::{Result, SextantError};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

/// A single nullable cell
pub type Cell = Option<String>;

/// Column-named rows of nullable string cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Borrowed view of one row
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> RowRef<'a> {
    /// Value of `column` in this row, `None` if null or the column is absent
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.table.column_index(column)?;
        self.table.rows[self.index][idx].as_deref()
    }

    /// Row position within its table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Raw cells in column order
    pub fn cells(&self) -> &'a [Cell] {
        &self.table.rows[self.index]
    }

    /// Copy the row into a column-keyed record
    pub fn to_record(&self) -> BTreeMap<String, Cell> {
        self.table
            .columns
            .iter()
            .cloned()
            .zip(self.table.rows[self.index].iter().cloned())
            .collect()
    }
}

fn normalize(cell: Cell) -> Cell {
    cell.filter(|v| !v.is_empty())
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw rows in order
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` among the columns
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// True when the table has a column called `name`
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row given in column order
    ///
    /// # Errors
    ///
    /// Returns an error if the row length differs from the column count.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(SextantError::Table(format!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row.into_iter().map(normalize).collect());
        Ok(())
    }

    /// Append a row given as a column-keyed record
    ///
    /// Columns missing from the record are null; keys that are not columns are ignored.
    pub fn push_record(&mut self, record: &BTreeMap<String, Cell>) {
        let row = self
            .columns
            .iter()
            .map(|c| normalize(record.get(c).cloned().flatten()))
            .collect();
        self.rows.push(row);
    }

    /// Borrow row `index`
    pub fn row(&self, index: usize) -> Option<RowRef<'_>> {
        (index < self.rows.len()).then_some(RowRef { table: self, index })
    }

    /// Iterate over rows
    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        (0..self.rows.len()).map(move |index| RowRef { table: self, index })
    }

    /// Value at (`row`, `column`)
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        self.row(row).and_then(|r| r.get(column))
    }

    /// Set the value at (`row`, `column`), adding the column if needed
    pub fn set(&mut self, row: usize, column: &str, value: Cell) {
        let idx = self.ensure_column(column);
        if let Some(cells) = self.rows.get_mut(row) {
            cells[idx] = normalize(value);
        }
    }

    /// Add `name` as an all-null column if absent; returns its index
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(None);
        }
        self.columns.len() - 1
    }

    /// Rename a column; returns false if `from` does not exist
    ///
    /// An existing column called `to` is dropped first so names stay unique.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.has_column(from);
        }
        if !self.has_column(from) {
            return false;
        }
        self.drop_column(to);
        if let Some(idx) = self.column_index(from) {
            self.columns[idx] = to.to_string();
        }
        true
    }

    /// Remove a column; returns false if it does not exist
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    /// Drop rows with a null in any of `columns`; returns the number removed
    ///
    /// A column that does not exist counts as null for every row.
    pub fn drop_nulls(&mut self, columns: &[&str]) -> usize {
        let indices: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let before = self.rows.len();
        self.rows.retain(|row| {
            indices
                .iter()
                .all(|idx| idx.map(|i| row[i].is_some()).unwrap_or(false))
        });
        before - self.rows.len()
    }

    /// Keep only rows matching `keep`
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(RowRef<'_>) -> bool,
    {
        let mask: Vec<bool> = self.iter().map(&mut keep).collect();
        let mut flags = mask.into_iter();
        self.rows.retain(|_| flags.next().unwrap_or(false));
    }

    /// New table with the same columns and the selected rows
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Empty table with the same columns
    pub fn empty_like(&self) -> Table {
        Table::new(self.columns.clone())
    }

    /// Append another table, extending the column set to the union of both
    pub fn append_aligned(&mut self, other: &Table) {
        for column in &other.columns {
            self.ensure_column(column);
        }
        for row in other.iter() {
            self.push_record(&row.to_record());
        }
    }

    /// Left join on `key`
    ///
    /// Every left row is kept. A left row matching several right rows is repeated
    /// once per match, so a one-to-many mapping adds rows. Right columns that
    /// collide with left column names are suffixed `_right`.
    pub fn left_join(&self, right: &Table, key: &str) -> Result<Table> {
        let left_key = self.column_index(key).ok_or_else(|| {
            SextantError::Table(format!("join key '{key}' missing from left table"))
        })?;
        let right_key = right.column_index(key).ok_or_else(|| {
            SextantError::Table(format!("join key '{key}' missing from right table"))
        })?;

        let right_columns: Vec<(usize, String)> = right
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != right_key)
            .map(|(i, c)| {
                let name = if self.has_column(c) {
                    format!("{c}_right")
                } else {
                    c.clone()
                };
                (i, name)
            })
            .collect();

        let mut lookup: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            if let Some(k) = row[right_key].as_deref() {
                lookup.entry(k).or_default().push(i);
            }
        }

        let mut joined = Table::new(
            self.columns
                .iter()
                .cloned()
                .chain(right_columns.iter().map(|(_, c)| c.clone())),
        );
        for row in &self.rows {
            let matches = row[left_key]
                .as_deref()
                .and_then(|k| lookup.get(k))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if matches.is_empty() {
                let mut out = row.clone();
                out.extend(std::iter::repeat(None).take(right_columns.len()));
                joined.rows.push(out);
            } else {
                for &m in matches {
                    let mut out = row.clone();
                    out.extend(right_columns.iter().map(|(i, _)| right.rows[m][*i].clone()));
                    joined.rows.push(out);
                }
            }
        }
        Ok(joined)
    }

    /// Parse CSV with a header row
    ///
    /// Empty input yields an empty table with no columns.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Table> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let columns: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(columns);
        for record in csv_reader.records() {
            let record = record?;
            table
                .rows
                .push(record.iter().map(|v| normalize(Some(v.to_string()))).collect());
        }
        Ok(table)
    }

    /// Parse CSV bytes with a header row
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Table> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Table::default());
        }
        Self::from_csv_reader(bytes)
    }

    /// Serialise as CSV with a header row; nulls become empty fields
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        if self.columns.is_empty() {
            return Ok(Vec::new());
        }
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        writer
            .into_inner()
            .map_err(|e| SextantError::Table(format!("failed to flush CSV buffer: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(v: &str) -> Cell {
        Some(v.to_string())
    }

    fn sample() -> Table {
        let mut t = Table::new(["client_idcode", "updatetime", "text"]);
        t.push_row(vec![cell("P1"), cell("2021-01-01"), cell("chest pain")])
            .unwrap();
        t.push_row(vec![cell("P1"), None, cell("no ts")]).unwrap();
        t.push_row(vec![cell("P1"), cell("2021-02-01"), cell("")])
            .unwrap();
        t
    }

    #[test]
    fn test_empty_strings_become_null() {
        let t = sample();
        assert_eq!(t.value(2, "text"), None);
    }

    #[test]
    fn test_push_row_length_mismatch() {
        let mut t = Table::new(["a", "b"]);
        assert!(t.push_row(vec![cell("1")]).is_err());
    }

    #[test]
    fn test_drop_nulls() {
        let mut t = sample();
        let removed = t.drop_nulls(&["updatetime", "text"]);
        assert_eq!(removed, 2);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_drop_nulls_missing_column_drops_everything() {
        let mut t = sample();
        t.drop_nulls(&["nope"]);
        assert!(t.is_empty());
    }

    #[test]
    fn test_csv_round_trip_is_stable() {
        let t = sample();
        let bytes = t.to_csv_bytes().unwrap();
        let back = Table::from_csv_bytes(&bytes).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.to_csv_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_empty_csv_is_empty_table() {
        let t = Table::from_csv_bytes(b"").unwrap();
        assert!(t.columns().is_empty());
        assert!(Table::default().to_csv_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_header_only_csv_keeps_schema() {
        let t = Table::from_csv_bytes(b"a,b\n").unwrap();
        assert_eq!(t.columns(), &["a".to_string(), "b".to_string()]);
        assert!(t.is_empty());
    }

    #[test]
    fn test_rename_and_ensure_column() {
        let mut t = sample();
        assert!(t.rename_column("updatetime", "ts"));
        assert!(!t.has_column("updatetime"));
        let idx = t.ensure_column("source");
        assert_eq!(idx, 3);
        assert_eq!(t.value(0, "source"), None);
        t.set(0, "source", cell("epr"));
        assert_eq!(t.value(0, "source"), Some("epr"));
    }

    #[test]
    fn test_left_join_one_to_many_duplicates_rows() {
        let mut left = Table::new(["cui", "name"]);
        left.push_row(vec![cell("C1"), cell("a")]).unwrap();
        left.push_row(vec![cell("C2"), cell("b")]).unwrap();

        let mut right = Table::new(["cui", "icd10", "name"]);
        right.push_row(vec![cell("C1"), cell("I10"), cell("x")]).unwrap();
        right.push_row(vec![cell("C1"), cell("I11"), cell("y")]).unwrap();

        let joined = left.left_join(&right, "cui").unwrap();
        assert_eq!(joined.len(), 3);
        assert!(joined.has_column("name_right"));
        assert_eq!(joined.value(0, "icd10"), Some("I10"));
        assert_eq!(joined.value(1, "icd10"), Some("I11"));
        assert_eq!(joined.value(2, "icd10"), None);
    }

    #[test]
    fn test_append_aligned_unions_columns() {
        let mut a = Table::new(["id", "name"]);
        a.push_row(vec![cell("1"), cell("x")]).unwrap();
        let mut b = Table::new(["id", "age"]);
        b.push_row(vec![cell("2"), cell("40")]).unwrap();
        a.append_aligned(&b);
        assert_eq!(a.columns().len(), 3);
        assert_eq!(a.value(0, "age"), None);
        assert_eq!(a.value(1, "age"), Some("40"));
        assert_eq!(a.value(1, "name"), None);
    }

    #[test]
    fn test_retain() {
        let mut t = sample();
        t.retain(|r| r.get("updatetime").is_some());
        assert_eq!(t.len(), 2);
    }
}
