//! Reads and writes files under a base directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{Tool, ToolError};

/// Payload: `{action, path, content?}`.
///
/// Actions: `read` (by extension), `read_text`, `read_json`, `read_csv`,
/// `write_text`, `write_json`. Relative paths resolve against the base path.
pub struct FileTool {
    base_path: PathBuf,
}

impl FileTool {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// `settings.base_path`, defaulting to the working directory.
    pub fn from_settings(settings: &Value) -> Self {
        let base = settings
            .get("base_path")
            .and_then(Value::as_str)
            .unwrap_or(".");
        Self::new(base)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    async fn read_existing(path: &Path) -> Result<String, ToolError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ToolError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(path: &Path, contents: &str) -> Result<Value, ToolError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(json!({ "status": "success", "path": path.display().to_string() }))
    }
}

#[async_trait]
impl Tool for FileTool {
    fn name(&self) -> &str {
        "file"
    }

    async fn execute(&self, payload: &Value) -> Result<Value, ToolError> {
        let action = payload.get("action").and_then(Value::as_str).unwrap_or("read");
        let path = payload
            .get("path")
            .or_else(|| payload.get("file_path"))
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidPayload("path or file_path is required".into()))?;
        let path = self.resolve(path);

        let action = match action {
            "read" => match path.extension().and_then(|e| e.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("csv") => "read_csv",
                Some(ext) if ext.eq_ignore_ascii_case("json") => "read_json",
                _ => "read_text",
            },
            other => other,
        };

        match action {
            "read_text" => Ok(Value::String(Self::read_existing(&path).await?)),
            "read_json" => Ok(serde_json::from_str(&Self::read_existing(&path).await?)?),
            "read_csv" => parse_csv(&Self::read_existing(&path).await?),
            "write_text" | "write_json" => {
                let content = payload.get("content").ok_or_else(|| {
                    ToolError::InvalidPayload("content is required for write actions".into())
                })?;
                let contents = if action == "write_text" {
                    content
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| content.to_string())
                } else {
                    serde_json::to_string_pretty(content)?
                };
                Self::write(&path, &contents).await
            }
            other => Err(ToolError::Unsupported(other.to_string())),
        }
    }
}

/// CSV text to an array of objects keyed by the header row. Numeric cells
/// become JSON numbers.
fn parse_csv(text: &str) -> Result<Value, ToolError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let object: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, key)| (key.to_string(), cell_value(record.get(i).unwrap_or(""))))
            .collect();
        rows.push(Value::Object(object));
    }
    Ok(Value::Array(rows))
}

fn cell_value(cell: &str) -> Value {
    if let Ok(n) = cell.parse::<i64>() {
        return json!(n);
    }
    match cell.parse::<f64>() {
        Ok(n) if n.is_finite() => json!(n),
        _ => Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_csv_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("orders.csv"),
            "date,throughput,station\n2024-01-15,1250,\"packing, 3\"\n",
        )
        .unwrap();
        let tool = FileTool::new(dir.path());

        let rows = tool.execute(&json!({ "path": "orders.csv" })).await.unwrap();

        assert_eq!(
            rows,
            json!([{ "date": "2024-01-15", "throughput": 1250, "station": "packing, 3" }])
        );
    }

    #[tokio::test]
    async fn test_write_then_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileTool::from_settings(&json!({ "base_path": dir.path().to_str().unwrap() }));

        let written = tool
            .execute(&json!({
                "action": "write_json",
                "path": "out/report.json",
                "content": { "picks": 850 }
            }))
            .await
            .unwrap();
        assert_eq!(written["status"], "success");

        let read = tool
            .execute(&json!({ "action": "read_json", "file_path": "out/report.json" }))
            .await
            .unwrap();
        assert_eq!(read, json!({ "picks": 850 }));
    }

    #[tokio::test]
    async fn test_write_text_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileTool::new(dir.path());

        tool.execute(&json!({ "action": "write_text", "path": "note.txt", "content": "dock 4 closed" }))
            .await
            .unwrap();
        let text = tool
            .execute(&json!({ "action": "read_text", "path": "note.txt" }))
            .await
            .unwrap();
        assert_eq!(text, "dock 4 closed");
    }

    #[tokio::test]
    async fn test_errors() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileTool::new(dir.path());

        let missing = tool.execute(&json!({ "path": "nope.csv" })).await.unwrap_err();
        assert!(matches!(missing, ToolError::NotFound(_)));

        let no_path = tool.execute(&json!({ "action": "read_text" })).await.unwrap_err();
        assert!(matches!(no_path, ToolError::InvalidPayload(_)));

        let no_content = tool
            .execute(&json!({ "action": "write_text", "path": "a.txt" }))
            .await
            .unwrap_err();
        assert!(matches!(no_content, ToolError::InvalidPayload(_)));

        let bad = tool
            .execute(&json!({ "action": "delete", "path": "a.txt" }))
            .await
            .unwrap_err();
        assert!(matches!(bad, ToolError::Unsupported(_)));
    }

    #[test]
    fn test_parse_csv_handles_escaped_quotes_and_crlf() {
        let rows = parse_csv("name,picks\r\n\"say \"\"hi\"\"\",2\r\nshort\r\n").unwrap();
        assert_eq!(
            rows,
            json!([
                { "name": "say \"hi\"", "picks": 2 },
                { "name": "short", "picks": "" }
            ])
        );
    }

    #[test]
    fn test_parse_csv_empty_text() {
        assert_eq!(parse_csv("").unwrap(), json!([]));
    }
}
