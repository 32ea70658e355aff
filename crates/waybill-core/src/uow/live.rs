//! Row-level access to live entity tables.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::{row, EntitySchema, Row};
use crate::error::{WaybillError, WaybillResult};

/// One live table, addressed through its schema.
pub struct LiveTable<'a> {
    conn: &'a Connection,
    schema: &'a EntitySchema,
    key: &'a str,
}

impl<'a> LiveTable<'a> {
    pub fn new(conn: &'a Connection, schema: &'a EntitySchema) -> WaybillResult<Self> {
        let key = schema
            .key_column()
            .ok_or_else(|| WaybillError::missing_key(&schema.name))?;
        Ok(Self { conn, schema, key })
    }

    fn select_sql(&self) -> String {
        let mut columns = vec![self.key];
        columns.extend(self.schema.columns.iter().map(|c| c.name.as_str()));
        format!("SELECT {} FROM {}", columns.join(", "), self.schema.table)
    }

    /// Fetch one row by identity.
    pub fn get(&self, id: Uuid) -> WaybillResult<Option<Row>> {
        let sql = format!("{} WHERE {} = ?1", self.select_sql(), self.key);
        let mut stmt = self.conn.prepare(&sql)?;
        stmt.query_row(params![id.to_string()], |r| Ok(self.row_to_map(r)))
            .optional()?
            .transpose()
    }

    /// Page through rows in insertion order.
    ///
    /// An offset beyond what SQLite can address yields an empty page.
    pub fn list(&self, skip: usize, limit: usize) -> WaybillResult<Vec<Row>> {
        let Ok(skip) = i64::try_from(skip) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!("{} ORDER BY rowid LIMIT ?1 OFFSET ?2", self.select_sql());
        self.query(&sql, vec![SqlValue::Integer(limit), SqlValue::Integer(skip)])
    }

    /// Rows whose `column` holds `value`.
    pub fn find_by(&self, column: &str, value: &Value) -> WaybillResult<Vec<Row>> {
        let ty = self
            .schema
            .find_column(column)
            .map(|c| c.ty)
            .ok_or_else(|| {
                WaybillError::invalid_field(column, format!("not a column of {}", self.schema.name))
            })?;
        let sql = format!(
            "{} WHERE {} = ?1 ORDER BY rowid",
            self.select_sql(),
            column
        );
        self.query(&sql, vec![row::to_sql(column, ty, Some(value))?])
    }

    pub fn count(&self) -> WaybillResult<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.schema.table),
            [],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn insert(&self, id: Uuid, state: &Row) -> WaybillResult<()> {
        let mut names = vec![self.key.to_string()];
        let mut values = vec![SqlValue::Text(id.to_string())];
        for column in &self.schema.columns {
            names.push(column.name.clone());
            values.push(self.bind(&column.name, state)?);
        }
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();

        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.schema.table,
                names.join(", "),
                placeholders.join(", ")
            ),
            params_from_iter(values),
        )?;
        Ok(())
    }

    /// Write the listed columns; returns the number of rows touched.
    pub fn update<'c>(
        &self,
        id: Uuid,
        state: &Row,
        columns: impl IntoIterator<Item = &'c String>,
    ) -> WaybillResult<usize> {
        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for name in columns {
            values.push(self.bind(name, state)?);
            assignments.push(format!("{} = ?{}", name, values.len()));
        }
        if assignments.is_empty() {
            return Ok(0);
        }
        values.push(SqlValue::Text(id.to_string()));

        let touched = self.conn.execute(
            &format!(
                "UPDATE {} SET {} WHERE {} = ?{}",
                self.schema.table,
                assignments.join(", "),
                self.key,
                values.len()
            ),
            params_from_iter(values),
        )?;
        Ok(touched)
    }

    pub fn delete(&self, id: Uuid) -> WaybillResult<usize> {
        let removed = self.conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", self.schema.table, self.key),
            params![id.to_string()],
        )?;
        Ok(removed)
    }

    fn bind(&self, name: &str, state: &Row) -> WaybillResult<SqlValue> {
        let column = self
            .schema
            .find_column(name)
            .ok_or_else(|| WaybillError::internal(format!("{} has no column '{}'", self.schema.name, name)))?;
        let value = state.get(name);
        if !column.nullable && value.map_or(true, Value::is_null) {
            return Err(WaybillError::invalid_field(name, "is required"));
        }
        row::to_sql(name, column.ty, value)
    }

    fn query(&self, sql: &str, values: Vec<SqlValue>) -> WaybillResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values), |r| Ok(self.row_to_map(r)))?;
        rows.map(|r| r.map_err(WaybillError::from).and_then(|inner| inner))
            .collect()
    }

    fn row_to_map(&self, r: &rusqlite::Row<'_>) -> WaybillResult<Row> {
        let mut map = Row::new();
        let id: String = r.get(0)?;
        map.insert(self.key.to_string(), Value::String(id));
        for (offset, column) in self.schema.columns.iter().enumerate() {
            let value = row::from_sql(&column.name, column.ty, r.get_ref(1 + offset)?)?;
            map.insert(column.name.clone(), value);
        }
        Ok(map)
    }
}
