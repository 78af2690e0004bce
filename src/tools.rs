//! Tools the model may call during project generation.
//!
//! Tool failures never abort generation: they are reported back to the model
//! as the tool result text so it can correct itself.

use crate::content_store::ContentStore;
use crate::specs::openai::{OpenAiFunctionDefinition, OpenAiTool};
use crate::types::*;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub const WRITE_FILE_TOOL: &str = "write_file";

#[derive(Debug, Clone, Copy)]
pub struct ToolContext {
    pub app_id: AppId,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;
    async fn execute(&self, arguments: &Value, ctx: &ToolContext) -> Result<String>;
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<OpenAiTool> {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| OpenAiTool {
                r#type: "function".to_string(),
                function: OpenAiFunctionDefinition {
                    name: t.name().to_string(),
                    description: Some(t.description().to_string()),
                    parameters: t.parameters(),
                },
            })
            .collect()
    }

    /// Runs a tool call and always yields result text for the model.
    pub async fn execute(&self, name: &str, raw_arguments: &str, ctx: &ToolContext) -> String {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => {
                tracing::warn!("[🔧] Model requested unknown tool '{}'", name);
                return format!("Error: there is no tool called {}", name);
            }
        };

        let arguments: Value = if raw_arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(raw_arguments) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("[🔧] Invalid JSON arguments for {}: {}", name, e);
                    return format!("Error: arguments for {} are not valid JSON: {}", name, e);
                }
            }
        };

        let missing = missing_required_params(&tool.parameters(), &arguments);
        if !missing.is_empty() {
            return format!(
                "Error: {} is missing required arguments: {}",
                name,
                missing.join(", ")
            );
        }

        match tool.execute(&arguments, ctx).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("[🔧] Tool {} failed for app {}: {}", name, ctx.app_id, e.inner);
                format!("Error: {} failed: {}", name, e.inner)
            }
        }
    }
}

fn missing_required_params(schema: &Value, arguments: &Value) -> Vec<String> {
    let required = match schema.get("required").and_then(|r| r.as_array()) {
        Some(r) => r,
        None => return Vec::new(),
    };
    required
        .iter()
        .filter_map(|v| v.as_str())
        .filter(|p| arguments.get(*p).map(|v| v.is_null()).unwrap_or(true))
        .map(|p| p.to_string())
        .collect()
}

/// Writes one project file under `{root}/vue_project_{app_id}/`.
pub struct FileWriteTool {
    store: Arc<dyn ContentStore>,
    root: PathBuf,
}

impl FileWriteTool {
    pub fn new(store: Arc<dyn ContentStore>, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    pub fn project_dir(&self, app_id: AppId) -> PathBuf {
        self.root
            .join(GenerationType::ToolDrivenProject.dir_name(app_id))
    }
}

/// Accepts plain relative paths only: no root, prefix, or `..` components.
fn sanitize_relative_path(raw: &str) -> Result<PathBuf> {
    let path = Path::new(raw.trim());
    if raw.trim().is_empty() {
        return Err(CodeloomError::Validation("relative_file_path is empty".into()).into());
    }
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(CodeloomError::Validation(format!(
                    "path '{}' escapes the project directory",
                    raw
                ))
                .into())
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(CodeloomError::Validation(format!("path '{}' names no file", raw)).into());
    }
    Ok(clean)
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &'static str {
        WRITE_FILE_TOOL
    }

    fn description(&self) -> &'static str {
        "Write a file into the project, creating parent directories as needed"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "relative_file_path": {
                    "type": "string",
                    "description": "File path relative to the project root"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content"
                }
            },
            "required": ["relative_file_path", "content"]
        })
    }

    async fn execute(&self, arguments: &Value, ctx: &ToolContext) -> Result<String> {
        let raw_path = arguments
            .get("relative_file_path")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let content = arguments
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let relative = sanitize_relative_path(raw_path)?;
        let project_dir = self.project_dir(ctx.app_id);
        self.store.ensure_directory(&project_dir).await?;
        let file_name = relative.to_string_lossy().to_string();
        self.store
            .write(&project_dir, &file_name, content.as_bytes())
            .await?;

        tracing::info!(
            "[🔧] write_file {} ({} bytes) for app {}",
            file_name,
            content.len(),
            ctx.app_id
        );
        Ok(format!("File written successfully: {}", file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_store::FsContentStore;

    fn registry(root: &Path) -> ToolRegistry {
        ToolRegistry::new().with_tool(Arc::new(FileWriteTool::new(
            Arc::new(FsContentStore::new()),
            root,
        )))
    }

    #[tokio::test]
    async fn test_write_file_tool_writes_into_project_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = registry(tmp.path());
        let ctx = ToolContext { app_id: AppId(9) };
        let result = tools
            .execute(
                WRITE_FILE_TOOL,
                r#"{"relative_file_path":"src/App.vue","content":"<template/>"}"#,
                &ctx,
            )
            .await;
        assert!(result.starts_with("File written successfully"), "{}", result);
        let written = tmp.path().join("vue_project_9/src/App.vue");
        assert_eq!(std::fs::read_to_string(written).unwrap(), "<template/>");
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_error_text() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = registry(tmp.path());
        let result = tools
            .execute("delete_everything", "{}", &ToolContext { app_id: AppId(1) })
            .await;
        assert_eq!(result, "Error: there is no tool called delete_everything");
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = registry(tmp.path());
        let result = tools
            .execute(
                WRITE_FILE_TOOL,
                r#"{"relative_file_path":"../../etc/passwd","content":"x"}"#,
                &ToolContext { app_id: AppId(1) },
            )
            .await;
        assert!(result.starts_with("Error:"), "{}", result);
        assert!(!tmp.path().join("etc").exists());
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let tmp = tempfile::tempdir().unwrap();
        let tools = registry(tmp.path());
        let result = tools
            .execute(
                WRITE_FILE_TOOL,
                r#"{"relative_file_path":"a.txt"}"#,
                &ToolContext { app_id: AppId(1) },
            )
            .await;
        assert!(result.contains("content"), "{}", result);
    }

    #[test]
    fn test_definitions_expose_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let defs = registry(tmp.path()).definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].function.name, WRITE_FILE_TOOL);
        assert_eq!(defs[0].function.parameters["required"][0], "relative_file_path");
    }
}
