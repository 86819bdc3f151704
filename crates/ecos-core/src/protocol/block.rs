// ── Block parser ──
//
// Groups raw protocol lines into reply and event blocks:
//
//   <REPLY get(1000, name)>      <EVENT 1000>
//   1000 name["BR 89"]           1000 speed[41]
//   <END 0 (OK)>                 <END 0 (OK)>

use super::argument::{Argument, parse_arguments};
use super::command::Command;
use crate::error::ProtocolError;

pub const REPLY_START: &str = "<REPLY ";
pub const EVENT_START: &str = "<EVENT ";
pub const BLOCK_END: &str = "<END ";

/// Canonical terminal line of a successful request.
pub const END_OK: &str = "<END 0 (OK)>";

const CRLF: &str = "\r\n";

/// One object-scoped line inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    object_id: i32,
    raw: String,
    arguments: Vec<Argument>,
}

impl Entry {
    /// Decode an entry line. A non-numeric object id becomes `-1`.
    pub fn parse(line: &str) -> Self {
        let raw = line.trim();
        let (id, rest) = raw.split_once(char::is_whitespace).unwrap_or((raw, ""));

        Self {
            object_id: id.parse().unwrap_or(-1),
            raw: raw.to_owned(),
            arguments: parse_arguments(rest, false),
        }
    }

    pub fn object_id(&self) -> i32 {
        self.object_id
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }
}

/// Reply or event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Answer to a command we sent.
    Reply { command: Command },
    /// Unsolicited push for a subscribed object.
    Event { object_id: Option<i32> },
}

/// A complete protocol message bounded by start and terminal lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    kind: BlockKind,
    start_line: String,
    entries: Vec<Entry>,
    end_line: String,
}

impl Block {
    /// Build a block from its buffered lines: start line, entries,
    /// terminal line.
    fn from_lines(lines: &[String]) -> Result<Self, ProtocolError> {
        let (Some(start), Some(end)) = (lines.first(), lines.last()) else {
            return Err(ProtocolError::UnknownBlockStart {
                line: String::new(),
            });
        };
        if lines.len() < 2 {
            return Err(ProtocolError::UnknownBlockStart { line: start.clone() });
        }

        let kind = if has_prefix(start, EVENT_START) {
            BlockKind::Event {
                object_id: marker_body(start, EVENT_START).trim().parse().ok(),
            }
        } else if has_prefix(start, REPLY_START) {
            let command = Command::parse(marker_body(start, REPLY_START), false)
                .ok_or_else(|| ProtocolError::MalformedReply { line: start.clone() })?;
            BlockKind::Reply { command }
        } else {
            return Err(ProtocolError::UnknownBlockStart { line: start.clone() });
        };

        let entries = lines[1..lines.len() - 1]
            .iter()
            .map(|l| Entry::parse(l))
            .collect();

        Ok(Self {
            kind,
            start_line: start.clone(),
            entries,
            end_line: end.trim().to_owned(),
        })
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    pub fn is_event(&self) -> bool {
        matches!(self.kind, BlockKind::Event { .. })
    }

    /// Originating command of a reply block.
    pub fn command(&self) -> Option<&Command> {
        match &self.kind {
            BlockKind::Reply { command } => Some(command),
            BlockKind::Event { .. } => None,
        }
    }

    /// Subject object id of an event block.
    pub fn event_object_id(&self) -> Option<i32> {
        match self.kind {
            BlockKind::Event { object_id } => object_id,
            BlockKind::Reply { .. } => None,
        }
    }

    pub fn start_line(&self) -> &str {
        &self.start_line
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn end_line(&self) -> &str {
        &self.end_line
    }

    /// Numeric status of the terminal line: `<END 0 (OK)>` -> `0`.
    pub fn status_code(&self) -> Option<i32> {
        marker_body(&self.end_line, BLOCK_END)
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    /// Status text between the parentheses of the terminal line.
    pub fn status_message(&self) -> Option<&str> {
        let open = self.end_line.find('(')?;
        let close = self.end_line.rfind(')')?;
        self.end_line.get(open + 1..close)
    }

    /// Whether the terminal line is the canonical OK terminal.
    pub fn is_ok(&self) -> bool {
        self.end_line.eq_ignore_ascii_case(END_OK)
    }

    /// The block re-assembled as wire text.
    pub fn native(&self) -> String {
        let mut out = String::with_capacity(64 * (self.entries.len() + 2));
        out.push_str(&self.start_line);
        out.push_str(CRLF);
        for entry in &self.entries {
            out.push_str(&entry.raw);
            out.push_str(CRLF);
        }
        out.push_str(&self.end_line);
        out.push_str(CRLF);
        out
    }
}

/// Cheap readiness check for a buffered fragment: one terminal marker and
/// at least one start marker. Not a substitute for [`parse_blocks`].
pub fn has_any_block(text: &str) -> bool {
    if text.is_empty() || !text.contains(BLOCK_END) {
        return false;
    }
    text.contains(REPLY_START) || text.contains(EVENT_START)
}

/// [`has_any_block`] over buffered lines; needs at least two lines.
pub fn has_any_block_lines<S: AsRef<str>>(lines: &[S]) -> bool {
    if lines.len() < 2 {
        return false;
    }
    let joined = lines.iter().map(|l| l.as_ref()).collect::<Vec<&str>>().join(CRLF);
    has_any_block(&joined)
}

/// Parse every complete block in `text`.
pub fn parse_blocks(text: &str) -> Result<Vec<Block>, ProtocolError> {
    parse_block_lines(text.split('\n'))
}

/// Parse every complete block in a line sequence.
///
/// A batch whose start marker is not recognized yields an error and no
/// blocks at all. Lines after the last terminal marker are ignored.
pub fn parse_block_lines<I, S>(lines: I) -> Result<Vec<Block>, ProtocolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut blocks = Vec::new();
    let mut buffer: Vec<String> = Vec::new();

    for raw in lines {
        let line = raw.as_ref().trim_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        buffer.push(line.to_owned());
        if !has_prefix(line, BLOCK_END) {
            continue;
        }

        blocks.push(Block::from_lines(&buffer)?);
        buffer.clear();
    }

    if !buffer.is_empty() {
        tracing::trace!(lines = buffer.len(), "ignoring unterminated block tail");
    }

    Ok(blocks)
}

fn has_prefix(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(prefix))
}

/// Text between a start marker and the closing `>`.
fn marker_body<'a>(line: &'a str, prefix: &str) -> &'a str {
    let body = line.get(prefix.len()..).unwrap_or_default();
    body.rfind('>').map_or(body, |close| &body[..close])
}
