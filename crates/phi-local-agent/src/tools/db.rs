//! Runs SQL against a local database.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::any::{install_default_drivers, AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row};

use super::{Tool, ToolError};

/// Payload: `{query}`. Returns the result rows as an array of objects keyed
/// by column name.
///
/// The DSN comes from `settings.dsn`, then `DB_DSN`, then a Postgres URL built
/// from `host`/`port`/`database`/`username`/`password` (or `DB_HOST`,
/// `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`).
pub struct DbTool {
    pool: AnyPool,
}

impl DbTool {
    /// Connections are opened on first use.
    pub fn from_settings(settings: &Value) -> Result<Self, ToolError> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(4)
            .connect_lazy(&dsn(settings))?;
        Ok(Self { pool })
    }
}

fn dsn(settings: &Value) -> String {
    let setting = |key: &str, env: &str, default: &str| {
        settings
            .get(key)
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .or_else(|| std::env::var(env).ok())
            .unwrap_or_else(|| default.to_string())
    };

    if let Some(dsn) = settings.get("dsn").and_then(Value::as_str) {
        return dsn.to_string();
    }
    if let Ok(dsn) = std::env::var("DB_DSN") {
        return dsn;
    }
    format!(
        "postgres://{}:{}@{}:{}/{}",
        setting("username", "DB_USER", "postgres"),
        setting("password", "DB_PASSWORD", "postgres"),
        setting("host", "DB_HOST", "localhost"),
        setting("port", "DB_PORT", "5432"),
        setting("database", "DB_NAME", "postgres"),
    )
}

/// First decoding that fits the column; NULL and unsupported types map to null.
fn cell(row: &AnyRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return json!(v);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return json!(v);
    }
    Value::Null
}

#[async_trait]
impl Tool for DbTool {
    fn name(&self) -> &str {
        "db"
    }

    async fn execute(&self, payload: &Value) -> Result<Value, ToolError> {
        let query = payload
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidPayload("query is required".into()))?;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        let rows = rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = row
                    .columns()
                    .iter()
                    .map(|column| (column.name().to_string(), cell(row, column.ordinal())))
                    .collect();
                Value::Object(object)
            })
            .collect();
        Ok(Value::Array(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsn_from_settings() {
        assert_eq!(
            dsn(&json!({ "dsn": "sqlite://wms.db" })),
            "sqlite://wms.db"
        );
        assert_eq!(
            dsn(&json!({
                "dsn": null,
                "host": "db.local",
                "port": 6432,
                "database": "wms",
                "username": "reader",
                "password": "pw"
            }))
            .split_once('@')
            .map(|(_, rest)| rest.to_string()),
            Some("db.local:6432/wms".to_string())
        );
    }

    #[tokio::test]
    async fn test_query_returns_row_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wms.db");
        let tool = DbTool::from_settings(&json!({
            "dsn": format!("sqlite://{}?mode=rwc", path.display())
        }))
        .unwrap();

        for query in [
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, type TEXT, weight REAL)",
            "INSERT INTO orders (type, weight) VALUES ('pick', 1.5), ('pick', 2.0), ('pack', NULL)",
        ] {
            tool.execute(&json!({ "query": query })).await.unwrap();
        }

        let rows = tool
            .execute(&json!({
                "query": "SELECT type, COUNT(*) AS n, MAX(weight) AS heaviest \
                          FROM orders GROUP BY type ORDER BY type"
            }))
            .await
            .unwrap();

        assert_eq!(
            rows,
            json!([
                { "type": "pack", "n": 1, "heaviest": null },
                { "type": "pick", "n": 2, "heaviest": 2.0 }
            ])
        );
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected() {
        let tool = DbTool::from_settings(&json!({ "dsn": "sqlite::memory:" })).unwrap();
        let err = tool.execute(&json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidPayload(_)));
    }
}
