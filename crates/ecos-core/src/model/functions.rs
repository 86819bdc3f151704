// ── Locomotive function slots ──

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Number of function slots a decoder exposes.
pub const FUNCTION_SLOTS: usize = 32;

/// Active/inactive state of the 32 function slots.
///
/// Serialized as a string of `0`/`1`, slot 0 first, the same shape the
/// station reports in `funcset[...]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionSet([bool; FUNCTION_SLOTS]);

impl FunctionSet {
    /// Decode a `0101...` string. Returns the set and the number of
    /// characters the station reported. Slots beyond the 32nd are ignored.
    pub fn parse(bits: &str) -> (Self, usize) {
        let mut set = Self::default();
        let bits = bits.trim();
        for (slot, c) in bits.chars().take(FUNCTION_SLOTS).enumerate() {
            set.0[slot] = c == '1';
        }
        (set, bits.chars().count())
    }

    pub fn get(&self, slot: usize) -> bool {
        self.0.get(slot).copied().unwrap_or(false)
    }

    /// Returns `false` when `slot` is out of range.
    pub fn set(&mut self, slot: usize, active: bool) -> bool {
        match self.0.get_mut(slot) {
            Some(s) => {
                *s = active;
                true
            }
            None => false,
        }
    }

    pub fn active(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().filter(|(_, on)| **on).map(|(i, _)| i)
    }
}

impl fmt::Display for FunctionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for on in self.0 {
            f.write_str(if on { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl Serialize for FunctionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FunctionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw).0)
    }
}

/// One `funcdesc` entry: slot index and function type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDesc {
    pub idx: i32,
    #[serde(rename = "type")]
    pub type_code: i32,
}

impl FunctionDesc {
    pub fn label(&self) -> Option<&'static str> {
        describe(self.type_code)
    }
}

/// Human-readable name of a function type code.
pub fn describe(type_code: i32) -> Option<&'static str> {
    let label = match type_code {
        2 => "Function",
        3 => "Light",
        4 => "Light_0",
        5 => "Light_1",
        7 => "Sound",
        8 => "Music",
        9 => "Announce",
        10 => "Routing Speed",
        11 => "abv",
        32 => "Coupler",
        33 => "Steam",
        34 => "Panto",
        35 => "Highbeam",
        36 => "Bell",
        37 => "Horn",
        38 => "Whistle",
        39 => "Door Sound",
        40 => "Fan",
        42 => "Shovel Work Sound",
        44 => "Shift",
        260 => "Interior Lighting",
        261 => "Plate Light",
        263 => "Brakesound",
        299 => "Crane Raise Lower",
        555 => "Hook Up Down",
        773 => "Wheel Light",
        811 => "Turn",
        1031 => "Steam Blow",
        1033 => "Radio Sound",
        1287 => "Coupler Sound",
        1543 => "Track Sound",
        1607 => "Notch up",
        1608 => "Notch down",
        2055 => "Thunderer Whistle",
        3847 => "Buffer Sound",
        _ => return None,
    };
    Some(label)
}

/// `funcdesc` as `[{idx, type}]` on the wire, slot map in memory.
pub(crate) mod funcdesc_list {
    use super::{BTreeMap, Deserialize, Deserializer, FunctionDesc, Serialize, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        map: &BTreeMap<i32, i32>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<FunctionDesc> = map
            .iter()
            .map(|(&idx, &type_code)| FunctionDesc { idx, type_code })
            .collect();
        list.serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<i32, i32>, D::Error> {
        let list = Vec::<FunctionDesc>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|d| (d.idx, d.type_code)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reports_length_and_bits() {
        let (set, reported) = FunctionSet::parse("10100000000000000000000000001");
        assert_eq!(reported, 29);
        assert!(set.get(0));
        assert!(!set.get(1));
        assert!(set.get(2));
        assert!(set.get(28));
        assert_eq!(set.active().collect::<Vec<_>>(), [0, 2, 28]);
    }

    #[test]
    fn display_always_has_all_slots() {
        let mut set = FunctionSet::default();
        set.set(1, true);
        let text = set.to_string();
        assert_eq!(text.len(), FUNCTION_SLOTS);
        assert!(text.starts_with("010"));
    }

    #[test]
    fn out_of_range_slots_are_rejected() {
        let mut set = FunctionSet::default();
        assert!(!set.set(FUNCTION_SLOTS, true));
        assert!(!set.get(99));
    }

    #[test]
    fn known_type_codes_have_labels() {
        assert_eq!(describe(3), Some("Light"));
        assert_eq!(describe(1608), Some("Notch down"));
        assert_eq!(describe(1), None);
        assert_eq!(FunctionDesc { idx: 0, type_code: 37 }.label(), Some("Horn"));
    }
}
