// ── S88 feedback bus ──

use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::{Item, ItemBase, set_int, set_text};
use super::EntityKind;
use crate::protocol::{Argument, Command};

const DEFAULT_PORTS: i32 = 16;
/// Upper bound for `ports`; larger wire values are clamped.
pub const MAX_PORTS: i32 = 256;

/// One S88 feedback module. The station reports the port state as a hex
/// word, least significant bit = port 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackBus {
    #[serde(flatten)]
    base: ItemBase,
    pub index: i32,
    pub ports: i32,
    pub state_original: String,
}

impl Default for FeedbackBus {
    fn default() -> Self {
        Self {
            base: ItemBase::default(),
            index: 0,
            ports: DEFAULT_PORTS,
            state_original: String::new(),
        }
    }
}

impl FeedbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn port_count(&self) -> usize {
        usize::try_from(self.ports.clamp(0, MAX_PORTS)).unwrap_or(0)
    }

    /// Port bits, least significant first, decoded one hex digit at a
    /// time. `None` when empty or not valid hex.
    fn state_bits(&self) -> Option<Vec<bool>> {
        let raw = self.state_original.trim();
        let hex = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        if hex.is_empty() {
            return None;
        }

        let mut bits = Vec::with_capacity(hex.len() * 4);
        for c in hex.chars().rev() {
            let digit = c.to_digit(16)?;
            bits.extend((0..4).map(|shift| (digit >> shift) & 1 == 1));
        }
        Some(bits)
    }

    /// Port state as binary text, MSB first, left-padded to the port count.
    /// Empty or invalid state reads as all ports free.
    pub fn state_binary(&self) -> String {
        let mut bits = self.state_bits().unwrap_or_default();
        while bits.last() == Some(&false) {
            bits.pop();
        }
        let width = self.port_count().max(bits.len());
        bits.resize(width, false);
        bits.iter().rev().map(|&on| if on { '1' } else { '0' }).collect()
    }

    /// Whether port `nr` (1-based, from the least significant bit) is
    /// occupied. Out-of-range ports read as free.
    pub fn pin(&self, nr: u32) -> bool {
        let Ok(nr) = usize::try_from(nr) else {
            return false;
        };
        if nr == 0 || nr > self.port_count() {
            return false;
        }
        self.state_bits()
            .is_some_and(|bits| bits.get(nr - 1).copied().unwrap_or(false))
    }
}

impl Item for FeedbackBus {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ItemBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::FeedbackBus
    }

    fn parse(&mut self, arguments: &[Argument]) -> bool {
        for arg in arguments {
            if arg.is("ports") {
                set_int(&mut self.ports, arg);
                self.ports = self.ports.clamp(0, MAX_PORTS);
            } else if arg.is("state") {
                set_text(&mut self.state_original, arg);
            }
        }
        true
    }

    fn query_state(&self) {
        self.commands().push(Command::get(self.object_id(), &["state"]));
    }
}

impl fmt::Display for FeedbackBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} {}",
            self.object_id(),
            self.index,
            self.ports,
            self.state_binary()
        )
    }
}
