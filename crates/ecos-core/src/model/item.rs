// ── Shared entity behaviour ──

use serde::{Deserialize, Serialize};

use super::EntityKind;
use super::command_stack::CommandStack;
use crate::protocol::{Argument, Command, encode_commands};

/// State every entity carries: identity, view subscription and the
/// pending command stack. Only the object id is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemBase {
    object_id: i32,
    #[serde(skip)]
    has_view: bool,
    #[serde(skip)]
    commands: CommandStack,
}

impl ItemBase {
    pub fn with_object_id(object_id: i32) -> Self {
        Self {
            object_id,
            ..Self::default()
        }
    }
}

impl Default for ItemBase {
    fn default() -> Self {
        Self {
            object_id: -1,
            has_view: false,
            commands: CommandStack::new(),
        }
    }
}

/// Behaviour shared by every station object.
pub trait Item {
    fn base(&self) -> &ItemBase;

    fn base_mut(&mut self) -> &mut ItemBase;

    fn kind(&self) -> EntityKind;

    /// Apply decoded arguments. Unknown argument names are ignored.
    fn parse(&mut self, arguments: &[Argument]) -> bool;

    /// Enqueue the `get` that refreshes this object's state.
    fn query_state(&self);

    /// Station object id, `-1` until assigned.
    fn object_id(&self) -> i32 {
        self.base().object_id
    }

    fn set_object_id(&mut self, object_id: i32) {
        self.base_mut().object_id = object_id;
    }

    fn commands(&self) -> &CommandStack {
        &self.base().commands
    }

    fn has_view(&self) -> bool {
        self.base().has_view
    }

    /// Subscribe to events for this object. No-op when already subscribed.
    fn enable_view(&mut self) {
        if self.has_view() {
            return;
        }
        let id = self.object_id();
        self.commands().push(Command::request(id, &["view"]));
        self.base_mut().has_view = true;
    }

    fn disable_view(&mut self) {
        if !self.has_view() {
            return;
        }
        let id = self.object_id();
        self.commands().push(Command::release(id, &["view"]));
        self.base_mut().has_view = false;
    }

    /// Pending commands as a base64 batch, in drain order. The stack is
    /// left untouched.
    fn to_base64(&self) -> Option<String> {
        encode_commands(&self.commands().pending())
    }
}

/// Store the first parameter of `arg` as an integer field. A parameter
/// that is present but not numeric is stored as `-1`.
pub(crate) fn set_int(field: &mut i32, arg: &Argument) {
    if let Some(raw) = arg.first() {
        *field = raw.trim().parse().unwrap_or(-1);
    }
}

/// Store the first parameter of `arg` as a string field.
pub(crate) fn set_text(field: &mut String, arg: &Argument) {
    if let Some(raw) = arg.first() {
        raw.clone_into(field);
    }
}
