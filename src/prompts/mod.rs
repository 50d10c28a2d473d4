//! Static prompt text merged into backend requests.

/// Preamble sent as instructions on every unified-protocol request,
/// ahead of any caller-supplied instructions.
pub const BASE_INSTRUCTIONS: &str = "\
You are a coding agent running inside a terminal session. You are given a \
task and you work on it by reading files, running shell commands through the \
`shell` tool, and reporting back. Keep going until the task is resolved or \
you need input from the user.

Rules:
- Run commands through the `shell` tool; never claim to have run a command \
you did not run.
- Modify files only inside the writable roots you were given.
- Prefer small, verifiable steps over large speculative changes.
- When the task is done, summarize what changed and how it was verified.";

/// System prompt seeding the structured command loop used with backends
/// that lack native tool calling. The model must answer with a bare JSON
/// object on every turn.
pub const COMMAND_PROTOCOL_INSTRUCTIONS: &str = "\
You are a coding agent operating a terminal. On every turn reply with a \
single raw JSON object and nothing else: no prose around it, no code fences.

The object has exactly these fields:
  \"message\":  optional string shown to the user.
  \"command\":  optional array of strings, the command and its arguments to \
execute, e.g. [\"ls\", \"-la\"].
  \"workdir\":  optional string, directory the command runs in.
  \"timeout\":  optional number, command timeout in milliseconds.
  \"complete\": boolean, true once the task is finished and no further \
commands are needed.

After each command you will receive its output as the next user message. \
Issue one command at a time. Set \"complete\": true only when the task is \
done.";

/// Merge the built-in preamble with caller instructions.
pub fn merged_instructions(user_instructions: Option<&str>) -> String {
    match user_instructions {
        Some(extra) if !extra.trim().is_empty() => {
            format!("{BASE_INSTRUCTIONS}\n\n{extra}")
        }
        _ => BASE_INSTRUCTIONS.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_instructions_appends_user_text() {
        let merged = merged_instructions(Some("Always answer in French."));
        assert!(merged.starts_with(BASE_INSTRUCTIONS));
        assert!(merged.ends_with("Always answer in French."));
    }

    #[test]
    fn merged_instructions_ignores_blank_user_text() {
        assert_eq!(merged_instructions(Some("  ")), BASE_INSTRUCTIONS);
        assert_eq!(merged_instructions(None), BASE_INSTRUCTIONS);
    }
}
