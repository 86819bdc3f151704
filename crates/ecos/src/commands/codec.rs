//! `ecos encode` / `ecos decode`: the relay batch format.

use ecos_core::Command;
use ecos_core::protocol::{decode_commands, encode_commands};

use crate::cli::{DecodeArgs, EncodeArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn encode(args: &EncodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let commands = args
        .commands
        .iter()
        .map(|text| {
            Command::parse(text.trim(), true).ok_or_else(|| CliError::BadCommand {
                text: text.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let batch = encode_commands(&commands).ok_or(CliError::EmptyBatch)?;
    output::print_output(&batch, global.quiet);
    Ok(())
}

pub fn decode(args: &DecodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let commands = decode_commands(args.batch.trim());
    if commands.is_empty() {
        return Err(CliError::EmptyBatch);
    }

    let lines: Vec<String> = commands.iter().map(|c| c.native().to_owned()).collect();
    output::print_output(&output::render_lines(global.output, &lines)?, global.quiet);
    Ok(())
}
