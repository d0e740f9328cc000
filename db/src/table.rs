//! In-memory tabular results.
//!
//! Every read in the dashboard comes back as a [Table](crate::table::Table): a list of
//! column names and rows of dynamically typed [Cell](crate::table::Cell)s. Raw SQL rows
//! are decoded into a [Record](crate::table::Record) without knowing their shape up front.

use std::collections::{HashMap, HashSet};
use std::fmt;

use diesel::deserialize::{self, FromSql, QueryableByName};
use diesel::row::{Field, NamedRow, Row};
use diesel::sql_types::{BigInt, Binary, Double, Text};
use diesel::sqlite::{Sqlite, SqliteType, SqliteValue};
use serde_derive::Serialize;
use sha2::{Digest as _, Sha256};

use crate::DbError;

/// A single value of a result table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Reads the cell as an integer. Text is parsed, reals must be whole.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Integer(i) => Some(*i),
            Cell::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Truthiness of UI marker columns such as the delete checkbox.
    pub fn is_truthy(&self) -> bool {
        match self {
            Cell::Null => false,
            Cell::Bool(b) => *b,
            Cell::Integer(i) => *i != 0,
            Cell::Real(f) => *f != 0.0,
            Cell::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "t" | "yes" | "y" | "1" | "x"
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Cell::Null
    }

    fn feed(&self, hasher: &mut Sha256) {
        match self {
            Cell::Null => hasher.update([0u8]),
            Cell::Bool(b) => hasher.update([1u8, u8::from(*b)]),
            Cell::Integer(i) => {
                hasher.update([2u8]);
                hasher.update(i.to_le_bytes());
            }
            Cell::Real(f) => {
                hasher.update([3u8]);
                hasher.update(f.to_bits().to_le_bytes());
            }
            Cell::Text(s) => {
                hasher.update([4u8]);
                feed_str(hasher, s);
            }
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{}", r),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Integer(i)
    }
}

impl From<i32> for Cell {
    fn from(i: i32) -> Self {
        Cell::Integer(i.into())
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Cell::Real(f)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Null, Into::into)
    }
}

/// One row of an untyped SQL result, with the column names reported by the driver.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    cells: Vec<Cell>,
}

impl QueryableByName<Sqlite> for Record {
    fn build<'a>(row: &impl NamedRow<'a, Sqlite>) -> deserialize::Result<Self> {
        let count = Row::field_count(row);
        let mut columns = Vec::with_capacity(count);
        let mut cells = Vec::with_capacity(count);

        for idx in 0..count {
            let field = Row::get(row, idx).ok_or("row is shorter than its field count")?;
            columns.push(field.field_name().unwrap_or_default().to_string());
            cells.push(match field.value() {
                Some(value) => decode_sqlite(value)?,
                None => Cell::Null,
            });
        }

        Ok(Record { columns, cells })
    }
}

fn decode_sqlite(value: SqliteValue<'_, '_, '_>) -> deserialize::Result<Cell> {
    match value.value_type() {
        Some(SqliteType::Long) | Some(SqliteType::Integer) | Some(SqliteType::SmallInt) => {
            <i64 as FromSql<BigInt, Sqlite>>::from_sql(value).map(Cell::Integer)
        }
        Some(SqliteType::Double) | Some(SqliteType::Float) => {
            <f64 as FromSql<Double, Sqlite>>::from_sql(value).map(Cell::Real)
        }
        Some(SqliteType::Binary) => <Vec<u8> as FromSql<Binary, Sqlite>>::from_sql(value)
            .map(|bytes| Cell::Text(String::from_utf8_lossy(&bytes).into_owned())),
        Some(SqliteType::Text) => <String as FromSql<Text, Sqlite>>::from_sql(value).map(Cell::Text),
        None => Ok(Cell::Null),
    }
}

#[cfg(feature = "mysql")]
impl QueryableByName<diesel::mysql::Mysql> for Record {
    fn build<'a>(row: &impl NamedRow<'a, diesel::mysql::Mysql>) -> deserialize::Result<Self> {
        let count = Row::field_count(row);
        let mut columns = Vec::with_capacity(count);
        let mut cells = Vec::with_capacity(count);

        for idx in 0..count {
            let field = Row::get(row, idx).ok_or("row is shorter than its field count")?;
            columns.push(field.field_name().unwrap_or_default().to_string());
            cells.push(match field.value() {
                Some(value) => decode_mysql(value)?,
                None => Cell::Null,
            });
        }

        Ok(Record { columns, cells })
    }
}

#[cfg(feature = "mysql")]
fn decode_mysql(value: diesel::mysql::MysqlValue<'_>) -> deserialize::Result<Cell> {
    use diesel::mysql::{Mysql, MysqlType};

    match value.value_type() {
        MysqlType::Tiny
        | MysqlType::Short
        | MysqlType::Long
        | MysqlType::LongLong
        | MysqlType::UnsignedTiny
        | MysqlType::UnsignedShort
        | MysqlType::UnsignedLong
        | MysqlType::UnsignedLongLong => {
            <i64 as FromSql<BigInt, Mysql>>::from_sql(value).map(Cell::Integer)
        }
        MysqlType::Float | MysqlType::Double | MysqlType::Numeric => {
            <f64 as FromSql<Double, Mysql>>::from_sql(value).map(Cell::Real)
        }
        _ => <String as FromSql<Text, Mysql>>::from_sql(value).map(Cell::Text),
    }
}

/// Renames repeated column names to `name_1`, `name_2`, ... in order of appearance.
///
/// The first occurrence keeps its name. A generated name never collides with a
/// column that is already present, so the result is always pairwise distinct.
pub fn dedupe_columns(columns: Vec<String>) -> Vec<String> {
    let originals: HashSet<String> = columns.iter().cloned().collect();
    let mut used: HashSet<String> = HashSet::with_capacity(columns.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    columns
        .into_iter()
        .map(|column| {
            if used.insert(column.clone()) {
                seen.entry(column.clone()).or_insert(0);
                return column;
            }

            let counter = seen.entry(column.clone()).or_insert(0);
            loop {
                *counter += 1;
                let candidate = format!("{}_{}", column, counter);
                if !originals.contains(&candidate) && used.insert(candidate.clone()) {
                    return candidate;
                }
            }
        })
        .collect()
}

/// A content hash of a [Table](crate::table::Table).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

fn feed_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Column-named rows of [Cell](crate::table::Cell)s.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Builds a table, padding or truncating rows to the number of columns.
    pub fn new<S: Into<String>>(columns: Vec<S>, rows: Vec<Vec<Cell>>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Null);
                row
            })
            .collect();

        Table { columns, rows }
    }

    /// Assembles decoded SQL rows. Column names come from the first row.
    pub fn from_records(records: Vec<Record>) -> Self {
        let columns = records
            .first()
            .map(|r| r.columns.clone())
            .unwrap_or_default();
        let rows = records.into_iter().map(|r| r.cells).collect();

        Table::new(columns, rows)
    }

    /// Uses `columns` as the header when the result had no rows to take names from.
    pub fn or_columns(self, columns: &[&str]) -> Self {
        if self.columns.is_empty() && self.rows.is_empty() {
            Table::new(columns.to_vec(), Vec::new())
        } else {
            self
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Overwrites one cell, as an editor would.
    pub fn set<C: Into<Cell>>(&mut self, row: usize, column: &str, cell: C) -> Result<(), DbError> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| DbError::MissingColumn {
                column: column.to_string(),
            })?;
        let len = self.rows.len();
        let target = self
            .rows
            .get_mut(row)
            .ok_or_else(|| DbError::InvalidEntry {
                reason: format!("row {} is out of range for a table of {} rows", row, len),
            })?;
        target[idx] = cell.into();

        Ok(())
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn row(&self, index: usize) -> Option<RowRef<'_>> {
        if index < self.rows.len() {
            Some(RowRef { table: self, index })
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        (0..self.rows.len()).map(move |index| RowRef { table: self, index })
    }

    /// Appends a column holding `fill` in every row.
    pub fn with_column(mut self, name: &str, fill: Cell) -> Self {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
        self
    }

    /// Copy of the table without the named columns. Unknown names are ignored.
    pub fn without_columns(&self, names: &[&str]) -> Table {
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !names.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();

        Table {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Disambiguates repeated column names, see [dedupe_columns](crate::table::dedupe_columns).
    pub fn dedupe_columns(mut self) -> Self {
        self.columns = dedupe_columns(self.columns);
        self
    }

    /// Order-sensitive hash over the header, row positions and every cell.
    pub fn digest(&self) -> Digest {
        let mut hasher = Sha256::new();

        hasher.update((self.columns.len() as u64).to_le_bytes());
        for column in &self.columns {
            feed_str(&mut hasher, column);
        }

        hasher.update((self.rows.len() as u64).to_le_bytes());
        for (index, row) in self.rows.iter().enumerate() {
            hasher.update((index as u64).to_le_bytes());
            for cell in row {
                cell.feed(&mut hasher);
            }
        }

        Digest(hasher.finalize().into())
    }
}

/// Borrowed view of one row, with lookups by column name.
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> RowRef<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cells(&self) -> &'a [Cell] {
        &self.table.rows[self.index]
    }

    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        self.table.get(self.index, column)
    }

    pub fn cell(&self, column: &str) -> Result<&'a Cell, DbError> {
        self.get(column).ok_or_else(|| DbError::MissingColumn {
            column: column.to_string(),
        })
    }

    /// Text rendering of a cell. Nulls read as the empty string.
    pub fn text(&self, column: &str) -> Result<String, DbError> {
        self.cell(column).map(|c| c.to_string())
    }

    pub fn optional_text(&self, column: &str) -> Result<Option<String>, DbError> {
        self.cell(column).map(|c| match c {
            Cell::Null => None,
            c => Some(c.to_string()),
        })
    }

    pub fn integer(&self, column: &str) -> Result<i64, DbError> {
        let cell = self.cell(column)?;
        cell.as_i64().ok_or_else(|| DbError::InvalidValue {
            column: column.to_string(),
            value: cell.to_string(),
            expected: "an integer".to_string(),
        })
    }

    /// Whether any column of either row holds a different value in the other.
    pub fn differs_from(&self, other: &RowRef<'_>) -> bool {
        self.table
            .columns
            .iter()
            .chain(other.table.columns.iter())
            .any(|column| self.get(column) != other.get(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scriptures() -> Table {
        Table::new(
            vec!["id", "volume", "book", "chapter", "verse"],
            vec![
                vec![
                    Cell::Integer(1),
                    "Old Testament".into(),
                    "Genesis".into(),
                    "1".into(),
                    "1".into(),
                ],
                vec![
                    Cell::Integer(2),
                    "Book of Mormon".into(),
                    "Alma".into(),
                    "32".into(),
                    "21".into(),
                ],
            ],
        )
    }

    fn names(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn dedupe_numbers_repeats_in_order() {
        assert_eq!(
            dedupe_columns(names(&["id", "volume", "id", "book", "id"])),
            names(&["id", "volume", "id_1", "book", "id_2"])
        );
    }

    #[test]
    fn dedupe_skips_names_already_taken() {
        let deduped = dedupe_columns(names(&["id", "id_1", "id"]));
        assert_eq!(deduped, names(&["id", "id_1", "id_2"]));

        let unique: HashSet<&String> = deduped.iter().collect();
        assert_eq!(unique.len(), deduped.len());
    }

    #[test]
    fn dedupe_leaves_distinct_columns_alone() {
        let columns = names(&["timeline_year", "age", "book"]);
        assert_eq!(dedupe_columns(columns.clone()), columns);
    }

    #[test]
    fn digest_is_stable() {
        let table = scriptures();
        assert_eq!(table.digest(), table.clone().digest());
        assert_eq!(table.digest().to_string().len(), 64);
    }

    #[test]
    fn digest_changes_with_every_single_cell() {
        let table = scriptures();
        let before = table.digest();

        for row in 0..table.len() {
            for column in table.columns().to_vec() {
                let mut edited = table.clone();
                let original = edited.get(row, &column).cloned().unwrap();
                let changed = match original {
                    Cell::Integer(i) => Cell::Integer(i + 100),
                    other => Cell::Text(format!("{}!", other)),
                };
                edited.set(row, &column, changed).unwrap();

                assert_ne!(before, edited.digest(), "row {} column {}", row, column);
            }
        }
    }

    #[test]
    fn digest_is_order_sensitive() {
        let table = scriptures();
        let mut rows = table.rows().to_vec();
        rows.reverse();
        let reversed = Table::new(table.columns().to_vec(), rows);

        assert_ne!(table.digest(), reversed.digest());
    }

    #[test]
    fn digest_tells_types_apart() {
        let text = Table::new(vec!["chapter"], vec![vec!["1".into()]]);
        let number = Table::new(vec!["chapter"], vec![vec![Cell::Integer(1)]]);

        assert_ne!(text.digest(), number.digest());
    }

    #[test]
    fn marker_column_round_trip() {
        let table = scriptures();
        let editor = table.clone().with_column("delete", Cell::Bool(false));

        assert_eq!(editor.columns().last().map(String::as_str), Some("delete"));
        assert_ne!(editor.digest(), table.digest());
        assert_eq!(editor.without_columns(&["delete"]), table);
        assert_eq!(editor.without_columns(&["delete"]).digest(), table.digest());
    }

    #[test]
    fn set_reports_missing_column_and_row() {
        let mut table = scriptures();

        match table.set(0, "doctrine_name", "Faith") {
            Err(DbError::MissingColumn { column }) => assert_eq!(column, "doctrine_name"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(table.set(5, "book", "Exodus").is_err());
    }

    #[test]
    fn row_lookups() {
        let table = scriptures();
        let row = table.row(1).unwrap();

        assert_eq!(row.integer("id").unwrap(), 2);
        assert_eq!(row.text("book").unwrap(), "Alma");
        assert!(row.integer("book").is_err());
        assert!(table.row(2).is_none());
    }

    #[test]
    fn differs_from_compares_by_column_name() {
        let table = scriptures();
        let reordered = Table::new(
            vec!["book", "id", "verse", "chapter", "volume"],
            vec![vec![
                "Genesis".into(),
                Cell::Integer(1),
                "1".into(),
                "1".into(),
                "Old Testament".into(),
            ]],
        );

        assert!(!table.row(0).unwrap().differs_from(&reordered.row(0).unwrap()));
        assert!(table.row(1).unwrap().differs_from(&reordered.row(0).unwrap()));
    }

    #[test]
    fn truthiness() {
        assert!(Cell::Bool(true).is_truthy());
        assert!(Cell::Integer(1).is_truthy());
        assert!(Cell::from("yes").is_truthy());
        assert!(!Cell::Null.is_truthy());
        assert!(!Cell::from("false").is_truthy());
        assert!(!Cell::Integer(0).is_truthy());
    }

    #[test]
    fn empty_result_takes_known_columns() {
        let table = Table::from_records(Vec::new()).or_columns(&["id", "book"]);

        assert_eq!(table.columns(), &names(&["id", "book"])[..]);
        assert!(table.is_empty());
    }
}
