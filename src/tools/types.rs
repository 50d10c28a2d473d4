//! Argument shapes for the supported tools.

use serde::{Deserialize, Serialize};

/// Arguments of the `shell` tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShellArgs {
    #[serde(alias = "cmd")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    /// Per-command timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_cmd_alias() {
        let args: ShellArgs = serde_json::from_str(r#"{"cmd": ["ls", "-la"]}"#).unwrap();
        assert_eq!(args.command, vec!["ls", "-la"]);
        assert_eq!(args.workdir, None);
    }
}
