// ── Command batch codec ──
//
// Command batches travel between router clients and the station as one
// base64 string: native command texts joined by `\n`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::command::Command;

/// Encode commands in the given order. `None` for an empty batch.
pub fn encode_commands(commands: &[Command]) -> Option<String> {
    if commands.is_empty() {
        return None;
    }

    let mut text = String::new();
    for cmd in commands {
        text.push_str(cmd.native());
        text.push('\n');
    }
    Some(STANDARD.encode(text))
}

/// Decode a batch produced by [`encode_commands`].
///
/// Empty, non-base64 or non-UTF-8 input yields an empty list; lines that
/// are not commands are skipped.
pub fn decode_commands(encoded: &str) -> Vec<Command> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Vec::new();
    }

    let bytes = match STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "command batch is not base64");
            return Vec::new();
        }
    };
    let Ok(text) = String::from_utf8(bytes) else {
        tracing::debug!("command batch is not UTF-8");
        return Vec::new();
    };

    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| Command::parse(line, true))
        .collect()
}
