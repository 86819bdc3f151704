//! Output formatting: table, JSON, YAML, plain.
//!
//! Table rendering uses `tabled`; structured formats go through serde;
//! plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use ecos_core::{Entity, Item, Snapshot};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: i32,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "State")]
    state: String,
}

impl EntityRow {
    fn new(entity: &Entity, color: bool) -> Self {
        let (name, address, state) = match entity {
            Entity::CentralStation(cs) => (
                cs.name.clone(),
                String::new(),
                format!("{} ({})", cs.state(), cs.application_version),
            ),
            Entity::Locomotive(loco) => (
                loco.name.clone(),
                format!("{} {}", loco.protocol, loco.addr),
                format!(
                    "speed {} {}",
                    loco.speed,
                    if loco.is_backward() { "rev" } else { "fwd" }
                ),
            ),
            Entity::Accessory(acc) => (
                acc.name1.clone(),
                format!("{} {}", acc.protocol, acc.addr),
                format!("state {}", acc.state),
            ),
            Entity::FeedbackBus(bus) => (
                format!("S88 #{}", bus.index),
                format!("{} ports", bus.ports),
                bus.state_binary(),
            ),
        };

        let kind = entity.kind().to_string();
        Self {
            id: entity.object_id(),
            kind: if color { kind.cyan().to_string() } else { kind },
            name,
            address,
            state,
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a model snapshot in the chosen format.
pub fn render_snapshot(
    format: OutputFormat,
    snapshot: &Snapshot,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<EntityRow> = snapshot
                .clone()
                .into_entities()
                .iter()
                .map(|e| EntityRow::new(e, color))
                .collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(snapshot, false),
        OutputFormat::JsonCompact => render_json(snapshot, true),
        OutputFormat::Yaml => render_yaml(snapshot),
        OutputFormat::Plain => Ok(snapshot
            .clone()
            .into_entities()
            .iter()
            .map(|e| e.object_id().to_string())
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Render a list of protocol lines; structured formats get a string array.
pub fn render_lines(format: OutputFormat, lines: &[String]) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(lines, false),
        OutputFormat::JsonCompact => render_json(lines, true),
        OutputFormat::Yaml => render_yaml(lines),
        OutputFormat::Table | OutputFormat::Plain => Ok(lines.join("\n")),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let text = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(text)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}
