//! Command name normalization
//!
//! Commands compare case- and separator-insensitively: `Delete-Pod`,
//! `delete_pod` and `delete  pod` are the same command.

/// Split a command into lower-cased alphanumeric tokens
#[must_use]
pub fn command_tokens(raw: &str) -> Vec<String> {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Canonical `snake_case` form of a command
#[must_use]
pub fn normalize_command(raw: &str) -> String {
    command_tokens(raw).join("_")
}
