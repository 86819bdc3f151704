// ── Accessory (turnout, signal, route) ──

use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::{Item, ItemBase, set_int, set_text};
use super::{ACCESSORIES_ID, EntityKind};
use crate::error::CoreError;
use crate::protocol::{Argument, Command};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Accessory {
    #[serde(flatten)]
    base: ItemBase,
    pub name1: String,
    pub name2: String,
    pub name3: String,
    /// Per-output address extensions, e.g. `["13", "14"]`.
    pub addrext: Vec<String>,
    pub addr: i32,
    pub protocol: String,
    /// `ACCESSORY` or `ROUTE`.
    #[serde(rename = "type")]
    pub accessory_type: String,
    pub mode: String,
    /// Index of the selected output.
    pub state: i32,
    pub switching: i32,
    /// Outputs are wired the other way round.
    pub invert: bool,
}

impl Accessory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throw the accessory to output `index`. Commands go to the switch
    /// manager (object 11); state and switching flag are set right away.
    pub fn switch_to(&mut self, index: usize) -> Result<(), CoreError> {
        let Some(ext) = self.addrext.get(index) else {
            return Err(CoreError::InvalidArgument {
                message: format!(
                    "accessory {} has no output {index} ({} known)",
                    self.object_id(),
                    self.addrext.len()
                ),
            });
        };

        let target = format!("{}{ext}", self.protocol);
        self.commands().push_sequence([
            Command::request(ACCESSORIES_ID, &["control", "force"]),
            Command::set(ACCESSORIES_ID, vec![Argument::new("switch", [target])]),
            Command::release(ACCESSORIES_ID, &["control"]),
        ]);

        self.switching = 1;
        self.state = i32::try_from(index).unwrap_or(i32::MAX);
        Ok(())
    }

    pub fn is_route(&self) -> bool {
        self.accessory_type.eq_ignore_ascii_case("ROUTE")
    }
}

impl Item for Accessory {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ItemBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Accessory
    }

    fn parse(&mut self, arguments: &[Argument]) -> bool {
        for arg in arguments {
            let name = arg.name().to_ascii_lowercase();
            match name.as_str() {
                "name1" => set_text(&mut self.name1, arg),
                "name2" => set_text(&mut self.name2, arg),
                "name3" => set_text(&mut self.name3, arg),
                "addrext" => self.addrext = arg.parameters().to_vec(),
                "addr" => set_int(&mut self.addr, arg),
                "protocol" => set_text(&mut self.protocol, arg),
                "type" => set_text(&mut self.accessory_type, arg),
                "mode" => set_text(&mut self.mode, arg),
                "state" => set_int(&mut self.state, arg),
                "switching" => set_int(&mut self.switching, arg),
                "invert" => {
                    if let Some(raw) = arg.first() {
                        let raw = raw.trim();
                        self.invert = raw == "1" || raw.eq_ignore_ascii_case("true");
                    }
                }
                "symbol" => {}
                _ => tracing::trace!(
                    object_id = self.object_id(),
                    argument = %arg,
                    "unknown accessory argument"
                ),
            }
        }
        true
    }

    fn query_state(&self) {
        self.commands().push(Command::get(self.object_id(), &["state"]));
    }
}

impl fmt::Display for Accessory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name1, self.addrext.join(", "), self.object_id())
    }
}
