// ── Command model ──
//
// Outgoing (and echoed) commands: `keyword(objectId, arg, arg[p, p])`.
// The same type decodes the originating command of a reply block and
// builds new commands for transmission.

use std::fmt;
use std::str::FromStr;

use strum::{AsRefStr, Display, EnumString};

use super::argument::{Argument, tokenize};

/// Command keyword. Matching is ASCII case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum CommandKind {
    #[strum(serialize = "get")]
    Get,
    #[strum(serialize = "set")]
    Set,
    #[strum(serialize = "create")]
    Create,
    #[strum(serialize = "request")]
    Request,
    #[strum(serialize = "queryObjects")]
    QueryObjects,
    #[strum(serialize = "release")]
    Release,
    /// Any other keyword. The native text is passed through untouched.
    #[strum(serialize = "unknown")]
    Unknown,
}

impl CommandKind {
    fn from_keyword(keyword: &str) -> Self {
        match Self::from_str(keyword) {
            Ok(Self::Unknown) | Err(_) => Self::Unknown,
            Ok(kind) => kind,
        }
    }
}

/// An immutable protocol command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    object_id: i32,
    arguments: Vec<Argument>,
    native: String,
}

impl Command {
    /// Decode a command from its wire text.
    ///
    /// Returns `None` when there is no `(` or the keyword is shorter than
    /// three characters. Callers treat that as "not a command".
    pub fn parse(text: &str, keep_quotes: bool) -> Option<Self> {
        let text = text.trim();
        let open = text.find('(')?;
        let keyword = &text[..open];
        if keyword.chars().count() < 3 {
            return None;
        }

        let inner = &text[open + 1..];
        let inner = inner.rfind(')').map_or(inner, |close| &inner[..close]);

        let mut tokens = tokenize(inner).into_iter();
        let object_id = tokens
            .next()
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(-1);
        let arguments = tokens
            .filter_map(|t| Argument::parse(t, keep_quotes))
            .collect();

        Some(Self {
            kind: CommandKind::from_keyword(keyword.trim()),
            object_id,
            arguments,
            native: text.to_owned(),
        })
    }

    /// Synthesize a command for transmission.
    pub fn new(kind: CommandKind, object_id: i32, arguments: Vec<Argument>) -> Self {
        let mut native = format!("{kind}({object_id}");
        for arg in &arguments {
            native.push_str(", ");
            native.push_str(&arg.to_string());
        }
        native.push(')');

        Self {
            kind,
            object_id,
            arguments,
            native,
        }
    }

    /// `get(id, field, field, ...)`
    pub fn get(object_id: i32, fields: &[&str]) -> Self {
        Self::new(CommandKind::Get, object_id, flags(fields))
    }

    /// `set(id, arg, ...)`
    pub fn set(object_id: i32, arguments: Vec<Argument>) -> Self {
        Self::new(CommandKind::Set, object_id, arguments)
    }

    /// `request(id, flag, ...)`, e.g. `request(1000, control, force)`.
    pub fn request(object_id: i32, options: &[&str]) -> Self {
        Self::new(CommandKind::Request, object_id, flags(options))
    }

    /// `release(id, flag, ...)`
    pub fn release(object_id: i32, options: &[&str]) -> Self {
        Self::new(CommandKind::Release, object_id, flags(options))
    }

    /// `queryObjects(listId, field, ...)`
    pub fn query_objects(list_id: i32, fields: &[&str]) -> Self {
        Self::new(CommandKind::QueryObjects, list_id, flags(fields))
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Target object id, `-1` when the text carried none.
    pub fn object_id(&self) -> i32 {
        self.object_id
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Wire representation.
    pub fn native(&self) -> &str {
        &self.native
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.native)
    }
}

fn flags(names: &[&str]) -> Vec<Argument> {
    names.iter().map(|n| Argument::flag(*n)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn decodes_kind_and_target() {
        let cmd = Command::parse("get(1000, protocol, name, dir)", false).unwrap();
        assert_eq!(cmd.kind(), CommandKind::Get);
        assert_eq!(cmd.object_id(), 1000);
        let names: Vec<_> = cmd.arguments().iter().map(Argument::name).collect();
        assert_eq!(names, ["protocol", "name", "dir"]);
    }

    #[test]
    fn keyword_matching_ignores_case() {
        for text in ["QUERYOBJECTS(10, addr)", "queryobjects(10)", "QueryObjects(10, name)"] {
            let cmd = Command::parse(text, false).unwrap();
            assert_eq!(cmd.kind(), CommandKind::QueryObjects, "{text}");
            assert_eq!(cmd.object_id(), 10);
        }
        assert_eq!(Command::parse("RELEASE(11, control)", false).unwrap().kind(), CommandKind::Release);
        assert_eq!(Command::parse("Request(5, view)", false).unwrap().kind(), CommandKind::Request);
    }

    #[test]
    fn unknown_keyword_keeps_native_text() {
        let cmd = Command::parse("delete(20000, force)", false).unwrap();
        assert_eq!(cmd.kind(), CommandKind::Unknown);
        assert_eq!(cmd.native(), "delete(20000, force)");
        assert_eq!(cmd.object_id(), 20000);
    }

    #[test]
    fn literal_unknown_keyword_is_unknown() {
        let cmd = Command::parse("unknown(1)", false).unwrap();
        assert_eq!(cmd.kind(), CommandKind::Unknown);
    }

    #[test]
    fn rejects_non_commands() {
        assert!(Command::parse("", false).is_none());
        assert!(Command::parse("get 1000", false).is_none());
        assert!(Command::parse("ab(1)", false).is_none());
    }

    #[test]
    fn keyword_length_counts_characters() {
        // Two characters, four bytes.
        assert!(Command::parse("äö(1)", false).is_none());
        let cmd = Command::parse("äöü(1)", false).unwrap();
        assert_eq!(cmd.kind(), CommandKind::Unknown);
        assert_eq!(cmd.object_id(), 1);
    }

    #[test]
    fn missing_target_is_minus_one() {
        let cmd = Command::parse("get()", false).unwrap();
        assert_eq!(cmd.object_id(), -1);
    }

    #[test]
    fn keep_quotes_reaches_arguments() {
        let cmd = Command::parse("set(1000, name[\"BR 89, grün\"])", true).unwrap();
        assert_eq!(cmd.arguments()[0].first(), Some("\"BR 89, grün\""));
        let cmd = Command::parse("set(1000, name[\"BR 89, grün\"])", false).unwrap();
        assert_eq!(cmd.arguments()[0].first(), Some("BR 89, grün"));
    }

    #[test]
    fn builders_produce_wire_text() {
        assert_eq!(Command::request(11, &["control", "force"]).native(), "request(11, control, force)");
        assert_eq!(
            Command::set(11, vec![Argument::new("switch", ["DCC14"])]).native(),
            "set(11, switch[DCC14])"
        );
        assert_eq!(Command::get(1, &[]).native(), "get(1)");
        assert_eq!(
            Command::query_objects(26, &["ports"]).native(),
            "queryObjects(26, ports)"
        );
    }

    #[test]
    fn built_commands_decode_to_themselves() {
        let built = Command::set(1000, vec![Argument::new("func", ["3", "1"])]);
        let parsed = Command::parse(built.native(), false).unwrap();
        assert_eq!(parsed, built);
    }
}
