// ── Station object model ──
//
// Every object the station reports (central station, locomotives,
// accessories, S88 buses) is an `Entity`. Variants share the `Item`
// trait: identity, argument parsing, view subscription and a pending
// command stack.

pub mod accessory;
pub mod central_station;
pub mod command_stack;
pub mod feedback;
pub mod functions;
pub mod item;
pub mod locomotive;

use serde::Serialize;
use strum::{AsRefStr, Display};

pub use accessory::Accessory;
pub use central_station::{CentralStation, StationState};
pub use command_stack::CommandStack;
pub use feedback::FeedbackBus;
pub use functions::{FUNCTION_SLOTS, FunctionDesc, FunctionSet};
pub use item::{Item, ItemBase};
pub use locomotive::Locomotive;

use crate::protocol::{Argument, Command};

// ── Well-known object ids ────────────────────────────────────────────

/// The central station.
pub const BASE_OBJECT_ID: i32 = 1;
/// Locomotive list.
pub const LOCOMOTIVES_ID: i32 = 10;
/// Accessory list; also the switch manager.
pub const ACCESSORIES_ID: i32 = 11;
/// S88 feedback list.
pub const FEEDBACKS_ID: i32 = 26;

/// Fields requested when (re)listing each object list.
pub const LOCOMOTIVE_LIST_FIELDS: &[&str] = &["addr", "name", "protocol"];
pub const ACCESSORY_LIST_FIELDS: &[&str] = &[
    "addr", "protocol", "type", "addrext", "mode", "symbol", "name1", "name2", "name3",
    "switching",
];
pub const FEEDBACK_LIST_FIELDS: &[&str] = &["ports"];

/// Entity variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    CentralStation,
    Locomotive,
    Accessory,
    FeedbackBus,
}

impl EntityKind {
    /// Variant created for entries of an object list.
    pub fn from_list_id(list_id: i32) -> Option<Self> {
        match list_id {
            LOCOMOTIVES_ID => Some(Self::Locomotive),
            ACCESSORIES_ID => Some(Self::Accessory),
            FEEDBACKS_ID => Some(Self::FeedbackBus),
            _ => None,
        }
    }

    /// Object list this variant is listed in.
    pub fn list_id(self) -> Option<i32> {
        match self {
            Self::CentralStation => None,
            Self::Locomotive => Some(LOCOMOTIVES_ID),
            Self::Accessory => Some(ACCESSORIES_ID),
            Self::FeedbackBus => Some(FEEDBACKS_ID),
        }
    }

    /// The `queryObjects` command that lists every object of this variant.
    pub fn list_query(self) -> Option<Command> {
        let fields = match self {
            Self::CentralStation => return None,
            Self::Locomotive => LOCOMOTIVE_LIST_FIELDS,
            Self::Accessory => ACCESSORY_LIST_FIELDS,
            Self::FeedbackBus => FEEDBACK_LIST_FIELDS,
        };
        Some(Command::query_objects(self.list_id()?, fields))
    }
}

/// Any station object.
#[derive(Debug, Clone)]
pub enum Entity {
    CentralStation(CentralStation),
    Locomotive(Locomotive),
    Accessory(Accessory),
    FeedbackBus(FeedbackBus),
}

impl Entity {
    /// A fresh, unassigned entity of the given variant.
    pub fn new(kind: EntityKind) -> Self {
        match kind {
            EntityKind::CentralStation => Self::CentralStation(CentralStation::new()),
            EntityKind::Locomotive => Self::Locomotive(Locomotive::new()),
            EntityKind::Accessory => Self::Accessory(Accessory::new()),
            EntityKind::FeedbackBus => Self::FeedbackBus(FeedbackBus::new()),
        }
    }

    pub fn as_item(&self) -> &dyn Item {
        match self {
            Self::CentralStation(e) => e,
            Self::Locomotive(e) => e,
            Self::Accessory(e) => e,
            Self::FeedbackBus(e) => e,
        }
    }

    pub fn as_item_mut(&mut self) -> &mut dyn Item {
        match self {
            Self::CentralStation(e) => e,
            Self::Locomotive(e) => e,
            Self::Accessory(e) => e,
            Self::FeedbackBus(e) => e,
        }
    }

    pub fn as_locomotive(&self) -> Option<&Locomotive> {
        match self {
            Self::Locomotive(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_locomotive_mut(&mut self) -> Option<&mut Locomotive> {
        match self {
            Self::Locomotive(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_accessory(&self) -> Option<&Accessory> {
        match self {
            Self::Accessory(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_accessory_mut(&mut self) -> Option<&mut Accessory> {
        match self {
            Self::Accessory(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_feedback(&self) -> Option<&FeedbackBus> {
        match self {
            Self::FeedbackBus(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_central_station(&self) -> Option<&CentralStation> {
        match self {
            Self::CentralStation(c) => Some(c),
            _ => None,
        }
    }
}

impl Item for Entity {
    fn base(&self) -> &ItemBase {
        self.as_item().base()
    }

    fn base_mut(&mut self) -> &mut ItemBase {
        self.as_item_mut().base_mut()
    }

    fn kind(&self) -> EntityKind {
        self.as_item().kind()
    }

    fn parse(&mut self, arguments: &[Argument]) -> bool {
        self.as_item_mut().parse(arguments)
    }

    fn query_state(&self) {
        self.as_item().query_state();
    }

    fn object_id(&self) -> i32 {
        self.as_item().object_id()
    }

    fn set_object_id(&mut self, object_id: i32) {
        self.as_item_mut().set_object_id(object_id);
    }
}

impl From<CentralStation> for Entity {
    fn from(e: CentralStation) -> Self {
        Self::CentralStation(e)
    }
}

impl From<Locomotive> for Entity {
    fn from(e: Locomotive) -> Self {
        Self::Locomotive(e)
    }
}

impl From<Accessory> for Entity {
    fn from(e: Accessory) -> Self {
        Self::Accessory(e)
    }
}

impl From<FeedbackBus> for Entity {
    fn from(e: FeedbackBus) -> Self {
        Self::FeedbackBus(e)
    }
}
