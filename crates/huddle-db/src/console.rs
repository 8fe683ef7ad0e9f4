//! Raw SQL escape hatch for the super-admin console.

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};
use tracing::warn;

use huddle_types::api::QueryResult;

use crate::Database;

/// Statements that SQLite reports as read-only but that change connection
/// state shared with the rest of the server.
const CONNECTION_CONTROL: &[&str] = &[
    "BEGIN", "COMMIT", "END", "ROLLBACK", "SAVEPOINT", "RELEASE", "ATTACH", "DETACH", "VACUUM",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    ReadWrite,
    /// Rejects statements that would modify the database, and runs the rest
    /// with `PRAGMA query_only` on.
    ReadOnly,
}

impl Database {
    /// Execute one statement. Never fails: any error is folded into
    /// `QueryResult::Error`.
    pub fn execute_query(&self, sql: &str, mode: QueryMode) -> QueryResult {
        if mode == QueryMode::ReadOnly {
            if let Some(keyword) = leading_keyword(sql).filter(|k| CONNECTION_CONTROL.contains(&k.as_str())) {
                return QueryResult::Error {
                    message: format!("{} is not allowed in read-only mode", keyword),
                };
            }
        }

        let outcome = self.with_conn(|conn| {
            if mode == QueryMode::ReadOnly {
                conn.pragma_update(None, "query_only", true)?;
            }
            let result = run_statement(conn, sql, mode);

            // The shared connection goes back in autocommit mode.
            let left_open = !conn.is_autocommit();
            if left_open {
                warn!("Console statement left a transaction open, rolling back");
                conn.execute_batch("ROLLBACK")?;
            }

            if mode == QueryMode::ReadOnly {
                conn.pragma_update(None, "query_only", false)?;
            }

            if left_open {
                return Ok(Ok(QueryResult::Error {
                    message: "Transactions cannot be left open from the console".to_string(),
                }));
            }
            Ok(result)
        });

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => QueryResult::Error {
                message: e.to_string(),
            },
            Err(e) => QueryResult::Error {
                message: e.to_string(),
            },
        }
    }
}

/// First SQL keyword of `sql`, upper-cased, skipping whitespace and comments.
fn leading_keyword(sql: &str) -> Option<String> {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(line) = rest.strip_prefix("--") {
            rest = line.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(block) = rest.strip_prefix("/*") {
            rest = block.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }

    let keyword: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    (!keyword.is_empty()).then(|| keyword.to_ascii_uppercase())
}

fn run_statement(conn: &Connection, sql: &str, mode: QueryMode) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;

    if mode == QueryMode::ReadOnly && !stmt.readonly() {
        return Ok(QueryResult::Error {
            message: "Only read-only statements are allowed".to_string(),
        });
    }

    if stmt.column_count() == 0 {
        let changed = stmt.execute([])?;
        return Ok(QueryResult::Success {
            rows: changed,
            data: vec![],
        });
    }

    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;
    let mut data = Vec::new();

    while let Some(row) = rows.next()? {
        let mut object = Map::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            object.insert(name.clone(), to_json(row.get_ref(idx)?));
        }
        data.push(Value::Object(object));
    }

    Ok(QueryResult::Success {
        rows: data.len(),
        data,
    })
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_returns_rows_as_objects() {
        let db = Database::open_in_memory().unwrap();
        match db.execute_query("SELECT 1 AS one, 'x' AS letter, NULL AS empty", QueryMode::ReadWrite) {
            QueryResult::Success { rows, data } => {
                assert_eq!(rows, 1);
                assert_eq!(data[0]["one"], 1);
                assert_eq!(data[0]["letter"], "x");
                assert!(data[0]["empty"].is_null());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn write_reports_affected_rows() {
        let db = Database::open_in_memory().unwrap();
        let result = db.execute_query(
            "INSERT INTO companies (name) VALUES ('Acme')",
            QueryMode::ReadWrite,
        );
        assert_eq!(result, QueryResult::Success { rows: 1, data: vec![] });
    }

    #[test]
    fn sql_errors_are_captured() {
        let db = Database::open_in_memory().unwrap();
        match db.execute_query("SELECT * FROM nope", QueryMode::ReadWrite) {
            QueryResult::Error { message } => assert!(message.contains("nope")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn leading_keyword_skips_comments() {
        assert_eq!(leading_keyword("  begin transaction").as_deref(), Some("BEGIN"));
        assert_eq!(leading_keyword("-- note\nRollback").as_deref(), Some("ROLLBACK"));
        assert_eq!(leading_keyword("/* a */ /* b */savepoint s").as_deref(), Some("SAVEPOINT"));
        assert_eq!(leading_keyword("/* unterminated"), None);
        assert_eq!(leading_keyword(""), None);
    }

    #[test]
    fn read_only_mode_refuses_connection_control() {
        let db = Database::open_in_memory().unwrap();
        for sql in [
            "BEGIN",
            "begin immediate transaction",
            "SAVEPOINT sp",
            "-- undo everything\nROLLBACK",
            "/* done */ COMMIT",
            "END",
            "RELEASE sp",
            "ATTACH DATABASE ':memory:' AS other",
            "DETACH other",
            "VACUUM",
        ] {
            assert!(
                matches!(db.execute_query(sql, QueryMode::ReadOnly), QueryResult::Error { .. }),
                "{sql} should be rejected"
            );
        }
        assert!(db.with_conn(|conn| Ok(conn.is_autocommit())).unwrap());
    }

    #[test]
    fn console_never_leaves_a_transaction_open() {
        let db = Database::open_in_memory().unwrap();

        assert!(matches!(
            db.execute_query("BEGIN", QueryMode::ReadWrite),
            QueryResult::Error { .. }
        ));
        assert!(db.with_conn(|conn| Ok(conn.is_autocommit())).unwrap());

        // A write made by the server afterwards survives a console ROLLBACK.
        db.create_company(&crate::models::NewCompany {
            name: "Acme".into(),
            description: None,
            is_active: true,
            created_by: None,
        })
        .unwrap();
        assert!(matches!(
            db.execute_query("ROLLBACK", QueryMode::ReadWrite),
            QueryResult::Error { .. }
        ));
        assert!(matches!(
            db.execute_query("ROLLBACK", QueryMode::ReadOnly),
            QueryResult::Error { .. }
        ));
        assert_eq!(db.count_companies().unwrap(), 1);
    }

    #[test]
    fn read_only_mode_blocks_writes_however_spelled() {
        let db = Database::open_in_memory().unwrap();
        for sql in [
            "DELETE FROM companies",
            "/* harmless */ dRoP TABLE messages",
            "UPDATE users SET is_blocked = 1",
        ] {
            assert!(
                matches!(db.execute_query(sql, QueryMode::ReadOnly), QueryResult::Error { .. }),
                "{sql} should be rejected"
            );
        }

        // Still usable for reads, and the connection is writable again afterwards.
        assert!(matches!(
            db.execute_query("SELECT COUNT(*) AS n FROM messages", QueryMode::ReadOnly),
            QueryResult::Success { rows: 1, .. }
        ));
        assert!(matches!(
            db.execute_query("INSERT INTO companies (name) VALUES ('Acme')", QueryMode::ReadWrite),
            QueryResult::Success { rows: 1, .. }
        ));
    }
}
