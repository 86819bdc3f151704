// ── Line assembler ──
//
// Buffers framed lines from the station until a terminal `<END ...>`
// line arrives, then hands the buffered batch to the block parser.

use ecos_core::protocol::{has_any_block_lines, parse_block_lines};
use ecos_core::{Block, ProtocolError};

const END_PREFIX: &str = "<END ";

#[derive(Debug, Default)]
pub struct LineAssembler {
    lines: Vec<String>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns the completed blocks once a terminal line
    /// closes the batch, otherwise an empty list. The buffer is cleared
    /// after every terminal line, also when parsing fails.
    pub fn push(&mut self, line: &str) -> Result<Vec<Block>, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.lines.push(line.to_owned());
        if !is_terminal(line) {
            return Ok(Vec::new());
        }

        let lines = std::mem::take(&mut self.lines);
        if !has_any_block_lines(&lines) {
            tracing::debug!(count = lines.len(), "Discarding lines without a block start");
            return Ok(Vec::new());
        }
        parse_block_lines(lines)
    }

    /// Lines buffered since the last terminal line.
    pub fn pending(&self) -> usize {
        self.lines.len()
    }

    /// Drop a half-received batch, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.lines.clear();
    }
}

fn is_terminal(line: &str) -> bool {
    line.trim_start()
        .get(..END_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(END_PREFIX))
}
