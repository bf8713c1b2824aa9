//! The accumulating table of concatenated records.

use itertools::Itertools;
use std::mem;

use super::{ColumnType, Value};
use crate::common::*;

/// A column in a [`RowBuffer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BufferColumn {
    /// The column label, as found in the CSV header (or after sanitizing).
    pub name: String,
    /// The type of every non-null value in this column.
    pub column_type: ColumnType,
}

/// An ordered, growable table of records, all sharing the same columns.
///
/// Rows are stored positionally, but [`RowBuffer::append`] lines up incoming
/// columns by name, so each record behaves like a map from column name to
/// value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowBuffer {
    columns: Vec<BufferColumn>,
    rows: Vec<Vec<Value>>,
}

impl RowBuffer {
    /// Build a buffer from a list of `(name, type, values)` columns. All
    /// columns must have the same number of values.
    pub fn from_columns(columns: Vec<(String, ColumnType, Vec<Value>)>) -> Result<Self> {
        let row_count = columns.first().map(|(_, _, values)| values.len()).unwrap_or(0);
        if let Some((name, _, values)) =
            columns.iter().find(|(_, _, values)| values.len() != row_count)
        {
            return Err(format_err!(
                "column {:?} has {} values, expected {}",
                name,
                values.len(),
                row_count,
            ));
        }

        let mut rows = (0..row_count)
            .map(|_| Vec::with_capacity(columns.len()))
            .collect::<Vec<_>>();
        let mut buffer_columns = Vec::with_capacity(columns.len());
        for (name, column_type, values) in columns {
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
            buffer_columns.push(BufferColumn { name, column_type });
        }
        Ok(RowBuffer {
            columns: buffer_columns,
            rows,
        })
    }

    /// Our columns, in order.
    pub fn columns(&self) -> &[BufferColumn] {
        &self.columns
    }

    /// The names of our columns, in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// The position of the first column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Do we have any rows?
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up the value of column `name` in row `row`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Iterate over our records.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        self.rows.iter().map(move |values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// Append all the rows of `other`, matching columns by name.
    ///
    /// Columns missing from `other` are filled with `Null`. Columns which only
    /// appear in `other` are added at the end, and are `Null` in all of our
    /// existing rows. If the two buffers disagree about a column's type, it is
    /// widened using [`ColumnType::unify`].
    pub fn append(&mut self, other: RowBuffer) {
        // Decide where each incoming column goes, adding new columns as needed.
        let mut positions = Vec::with_capacity(other.columns.len());
        for col in &other.columns {
            let idx = match self.column_index(&col.name) {
                Some(idx) => idx,
                None => {
                    self.columns.push(BufferColumn {
                        name: col.name.clone(),
                        column_type: ColumnType::Null,
                    });
                    for row in &mut self.rows {
                        row.push(Value::Null);
                    }
                    self.columns.len() - 1
                }
            };
            positions.push(idx);
        }

        // Widen our existing column types.
        for (col, &idx) in other.columns.iter().zip(&positions) {
            let old_type = self.columns[idx].column_type;
            let new_type = old_type.unify(col.column_type);
            if new_type != old_type {
                trace!(
                    "widening column {:?} from {} to {}",
                    col.name,
                    old_type,
                    new_type,
                );
                for row in &mut self.rows {
                    let value = mem::replace(&mut row[idx], Value::Null);
                    row[idx] = value.widen_to(new_type);
                }
                self.columns[idx].column_type = new_type;
            }
        }

        // Copy over the new rows.
        let width = self.columns.len();
        self.rows.reserve(other.rows.len());
        for row in other.rows {
            let mut out = vec![Value::Null; width];
            for (value, &idx) in row.into_iter().zip(&positions) {
                out[idx] = value.widen_to(self.columns[idx].column_type);
            }
            self.rows.push(out);
        }
    }

    /// Replace every column name with `rename(name)`.
    pub fn rename_columns<F>(&mut self, mut rename: F)
    where
        F: FnMut(&str) -> String,
    {
        for col in &mut self.columns {
            col.name = rename(&col.name);
        }
    }

    /// Render the first `n` rows as a small text table, for logging.
    pub fn preview(&self, n: usize) -> String {
        let mut out = self.column_names().join(" | ");
        for record in self.records().take(n) {
            out.push('\n');
            let cells = record
                .values()
                .map(|v| if v.is_null() { "NaN".to_owned() } else { v.to_string() })
                .join(" | ");
            out.push_str(&cells);
        }
        out
    }
}

/// A single row of a [`RowBuffer`], with access to column names.
#[derive(Clone, Copy, Debug)]
pub struct Record<'a> {
    columns: &'a [BufferColumn],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    /// Our values, in column order.
    pub fn values(&self) -> impl Iterator<Item = &'a Value> + 'a {
        self.values.iter()
    }

    /// `(name, value)` pairs, in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_owned())
    }

    fn buffer(columns: Vec<(&str, ColumnType, Vec<Value>)>) -> RowBuffer {
        RowBuffer::from_columns(
            columns
                .into_iter()
                .map(|(name, ty, values)| (name.to_owned(), ty, values))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn from_columns_rejects_ragged_columns() {
        let result = RowBuffer::from_columns(vec![
            ("a".to_owned(), ColumnType::Integer, vec![Value::Integer(1)]),
            ("b".to_owned(), ColumnType::Integer, vec![]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn append_aligns_columns_by_name() {
        let mut all = RowBuffer::default();
        all.append(buffer(vec![
            ("id", ColumnType::Integer, vec![Value::Integer(1)]),
            ("name", ColumnType::Text, vec![text("ana")]),
        ]));
        all.append(buffer(vec![
            ("name", ColumnType::Text, vec![text("bia")]),
            ("id", ColumnType::Integer, vec![Value::Integer(2)]),
        ]));

        assert_eq!(all.column_names().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(all.len(), 2);
        assert_eq!(all.get(1, "id"), Some(&Value::Integer(2)));
        assert_eq!(all.get(1, "name"), Some(&text("bia")));
    }

    #[test]
    fn append_outer_joins_divergent_columns() {
        let mut all = RowBuffer::default();
        all.append(buffer(vec![("a", ColumnType::Integer, vec![Value::Integer(1)])]));
        all.append(buffer(vec![("b", ColumnType::Boolean, vec![Value::Boolean(true)])]));

        assert_eq!(all.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(all.get(0, "b"), Some(&Value::Null));
        assert_eq!(all.get(1, "a"), Some(&Value::Null));
        assert_eq!(all.columns()[0].column_type, ColumnType::Integer);
        assert_eq!(all.columns()[1].column_type, ColumnType::Boolean);
    }

    #[test]
    fn append_widens_conflicting_types() {
        let mut all = RowBuffer::default();
        all.append(buffer(vec![
            ("n", ColumnType::Integer, vec![Value::Integer(1)]),
            ("t", ColumnType::Integer, vec![Value::Integer(7)]),
        ]));
        all.append(buffer(vec![
            ("n", ColumnType::Float, vec![Value::Float(2.5)]),
            ("t", ColumnType::Text, vec![text("x")]),
        ]));

        assert_eq!(all.columns()[0].column_type, ColumnType::Float);
        assert_eq!(all.get(0, "n"), Some(&Value::Float(1.0)));
        assert_eq!(all.columns()[1].column_type, ColumnType::Text);
        assert_eq!(all.get(0, "t"), Some(&text("7")));
        assert_eq!(all.get(1, "t"), Some(&text("x")));
    }

    #[test]
    fn records_expose_names_and_values() {
        let b = buffer(vec![
            ("a", ColumnType::Integer, vec![Value::Integer(1)]),
            ("b", ColumnType::Null, vec![Value::Null]),
        ]);
        let record = b.records().next().unwrap();
        assert_eq!(
            record.iter().collect::<Vec<_>>(),
            vec![("a", &Value::Integer(1)), ("b", &Value::Null)],
        );
        assert_eq!(b.preview(5), "a | b\n1 | NaN");
    }
}
