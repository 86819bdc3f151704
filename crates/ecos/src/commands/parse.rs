//! `ecos parse`: replay a capture through the reconciliation engine.

use std::io::Read;
use std::path::Path;

use ecos_core::{DataProvider, DataProviderMode};
use ecos_listener::LineAssembler;

use crate::cli::{GlobalOpts, OutputFormat, ParseArgs, SessionMode};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ParseArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let text = read_input(&args.input)?;
    let provider = DataProvider::new(provider_mode(args.mode));
    replay(&provider, &text);

    let rendered = if args.commands {
        let lines: Vec<String> = provider
            .drain_commands()
            .iter()
            .map(|c| c.native().to_owned())
            .collect();
        output::render_lines(global.output, &lines)?
    } else {
        let color = global.output == OutputFormat::Table && output::should_color(global.color);
        output::render_snapshot(global.output, &provider.to_snapshot(), color)?
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}

/// Feed every line through the assembler, like the live session does.
/// Unparsable batches are logged and skipped.
pub fn replay(provider: &DataProvider, text: &str) -> (usize, usize) {
    let mut assembler = LineAssembler::new();
    let (mut blocks, mut handled) = (0, 0);

    for line in text.lines() {
        match assembler.push(line) {
            Ok(batch) => {
                blocks += batch.len();
                handled += batch.iter().filter(|b| provider.handle_data(b)).count();
            }
            Err(e) => tracing::warn!(error = %e, "Skipping unparsable batch"),
        }
    }
    if assembler.pending() > 0 {
        tracing::debug!(lines = assembler.pending(), "Capture ends inside a block");
    }

    tracing::info!(blocks, handled, objects = provider.len(), "Capture replayed");
    (blocks, handled)
}

fn provider_mode(mode: SessionMode) -> DataProviderMode {
    match mode {
        SessionMode::Any => DataProviderMode::Any,
        SessionMode::General => DataProviderMode::General,
        SessionMode::Feedback => DataProviderMode::Feedback,
    }
}

fn read_input(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_counts_blocks() {
        let provider = DataProvider::default();
        let capture = "<REPLY queryObjects(26, ports)>\n100 ports[8]\n<END 0 (OK)>\n\
                       <BAD>\n<EVENT 1>\n<END 0 (OK)>\n\
                       <EVENT 100>\n100 state[0x1]\n<END 0 (OK)>\n";
        assert_eq!(replay(&provider, capture), (2, 2));
        assert_eq!(provider.len(), 1);
    }
}
