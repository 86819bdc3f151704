// ── Central station (object 1) ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::item::{Item, ItemBase, set_text};
use super::{BASE_OBJECT_ID, EntityKind};
use crate::protocol::{Argument, Command};

const STATION_NAME: &str = "ECoS2";

/// Operating state reported in `status[...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum StationState {
    Stop,
    Go,
    Shutdown,
    Unknown,
}

/// The command station itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CentralStation {
    #[serde(skip)]
    base: ItemBase,
    pub status: String,
    pub name: String,
    pub protocol_version: String,
    pub application_version: String,
    pub hardware_version: String,
}

impl Default for CentralStation {
    fn default() -> Self {
        Self {
            base: ItemBase::with_object_id(BASE_OBJECT_ID),
            status: String::new(),
            name: STATION_NAME.to_owned(),
            protocol_version: String::new(),
            application_version: String::new(),
            hardware_version: String::new(),
        }
    }
}

impl CentralStation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StationState {
        StationState::from_str(self.status.trim()).unwrap_or(StationState::Unknown)
    }
}

impl Item for CentralStation {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ItemBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::CentralStation
    }

    fn parse(&mut self, arguments: &[Argument]) -> bool {
        for arg in arguments {
            if arg.is("status") {
                set_text(&mut self.status, arg);
            } else if arg.is("ProtocolVersion") {
                set_text(&mut self.protocol_version, arg);
            } else if arg.is("ApplicationVersion") {
                set_text(&mut self.application_version, arg);
            } else if arg.is("HardwareVersion") {
                set_text(&mut self.hardware_version, arg);
            }
        }
        true
    }

    fn query_state(&self) {
        self.commands().push(Command::get(BASE_OBJECT_ID, &["info", "status"]));
    }

    /// The station is always object 1.
    fn object_id(&self) -> i32 {
        BASE_OBJECT_ID
    }

    fn set_object_id(&mut self, _object_id: i32) {}
}

impl fmt::Display for CentralStation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}",
            self.state(),
            self.name,
            self.protocol_version,
            self.application_version,
            self.hardware_version
        )
    }
}
