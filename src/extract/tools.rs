//! External tool discovery.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::config::ToolsConfig;

/// Availability information for a tool, as printed by `check-tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub available: bool,
    /// First line of `-version` output.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Resolve a tool from an explicit path, falling back to `PATH`.
///
/// A configured path that does not exist is ignored.
pub fn resolve_tool(custom: Option<&Path>, name: &str) -> Option<PathBuf> {
    match custom {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        _ => which::which(name).ok(),
    }
}

async fn tool_version(path: &Path) -> Option<String> {
    let output = tokio::time::timeout(
        Duration::from_secs(10),
        tokio::process::Command::new(path).arg("-version").output(),
    )
    .await
    .ok()?
    .ok()?;

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
}

/// Report availability of ffprobe and ffmpeg.
pub async fn check_tools(config: &ToolsConfig) -> Vec<ToolInfo> {
    let mut tools = Vec::new();

    for (name, custom) in [
        ("ffprobe", config.ffprobe_path.as_deref()),
        ("ffmpeg", config.ffmpeg_path.as_deref()),
    ] {
        let path = resolve_tool(custom, name);
        let version = match &path {
            Some(p) => tool_version(p).await,
            None => None,
        };
        tools.push(ToolInfo {
            name,
            available: path.is_some(),
            version,
            path,
        });
    }

    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_custom_path_falls_back() {
        let resolved = resolve_tool(
            Some(Path::new("/nonexistent/ffprobe_xyz")),
            "nonexistent_tool_xyz_12345",
        );
        assert!(resolved.is_none());
    }

    #[test]
    fn test_existing_custom_path_wins() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let resolved = resolve_tool(Some(file.path()), "nonexistent_tool_xyz_12345");
        assert_eq!(resolved.as_deref(), Some(file.path()));
    }

    #[tokio::test]
    async fn test_check_tools_reports_both() {
        let config = ToolsConfig {
            ffprobe_path: Some(PathBuf::from("/nonexistent/ffprobe")),
            ffmpeg_path: None,
        };
        let tools = check_tools(&config).await;
        let names: Vec<_> = tools.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["ffprobe", "ffmpeg"]);
        for tool in &tools {
            assert_eq!(tool.available, tool.path.is_some());
        }
    }
}
