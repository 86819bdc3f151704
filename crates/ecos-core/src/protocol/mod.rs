//! Wire protocol: argument tokens, commands, reply/event blocks and the
//! base64 command batch codec.

pub mod argument;
pub mod batch;
pub mod block;
pub mod command;

pub use argument::{Argument, parse_arguments, tokenize};
pub use batch::{decode_commands, encode_commands};
pub use block::{
    Block, BlockKind, END_OK, Entry, has_any_block, has_any_block_lines, parse_block_lines,
    parse_blocks,
};
pub use command::{Command, CommandKind};
