// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Read-only database query tool
//!
//! Lets the model inspect the local SQLite database. Only single SELECT
//! statements pass the guard; everything else is refused before reaching
//! the database.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolOutcome};

const MAX_ROWS: usize = 50;

/// Tool for SELECT queries against the configured SQLite database
pub struct QueryDatabaseTool;

fn is_read_only(sql: &str) -> bool {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if !trimmed.to_lowercase().starts_with("select") {
        return false;
    }
    // A second statement hiding behind a semicolon fails the guard too
    !trimmed.contains(';')
}

fn format_value(value: &rusqlite::types::Value) -> String {
    use rusqlite::types::Value as V;
    match value {
        V::Null => "NULL".to_string(),
        V::Integer(i) => i.to_string(),
        V::Real(f) => f.to_string(),
        V::Text(s) => s.clone(),
        V::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[async_trait]
impl Tool for QueryDatabaseTool {
    fn name(&self) -> &str {
        "query_database"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "query_database".to_string(),
            description: "Run a read-only SELECT query against the local SQLite database and \
                          return the rows."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("sql", "A single SELECT statement", true)
                .build(),
        }
    }

    async fn invoke(&self, args: Value, context: &ToolContext) -> Result<ToolOutcome> {
        let Some(sql) = args["sql"]
            .as_str()
            .or_else(|| args["query"].as_str())
            .or_else(|| args["statement"].as_str())
        else {
            return Ok(ToolOutcome::failure("'sql' argument is required"));
        };

        if !is_read_only(sql) {
            return Ok(ToolOutcome::failure(
                "Only single SELECT statements are allowed.",
            ));
        }

        let Some(db_path) = context.database_path.as_ref() else {
            return Ok(ToolOutcome::failure("No database is configured."));
        };

        let conn = match rusqlite::Connection::open(db_path) {
            Ok(conn) => conn,
            Err(e) => {
                return Ok(ToolOutcome::failure(format!(
                    "Could not open database: {}",
                    e
                )))
            }
        };

        let mut stmt = match conn.prepare(sql) {
            Ok(stmt) => stmt,
            Err(e) => return Ok(ToolOutcome::failure(format!("Query error: {}", e))),
        };

        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let column_count = column_names.len();

        let mut rows = match stmt.query([]) {
            Ok(rows) => rows,
            Err(e) => return Ok(ToolOutcome::failure(format!("Query error: {}", e))),
        };

        let mut lines = vec![column_names.join(" | ")];
        let mut row_count = 0usize;
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    if row_count >= MAX_ROWS {
                        lines.push(format!("... (showing first {} rows)", MAX_ROWS));
                        break;
                    }
                    let mut values = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        let value: rusqlite::types::Value =
                            row.get(i).unwrap_or(rusqlite::types::Value::Null);
                        values.push(format_value(&value));
                    }
                    lines.push(values.join(" | "));
                    row_count += 1;
                }
                Ok(None) => break,
                Err(e) => return Ok(ToolOutcome::failure(format!("Query error: {}", e))),
            }
        }

        if row_count == 0 {
            return Ok(ToolOutcome::success("Query returned no rows."));
        }

        lines.push(format!("({} rows)", row_count));
        Ok(ToolOutcome::success(lines.join("\n")))
    }
}
