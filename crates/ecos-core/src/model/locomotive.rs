// ── Locomotive ──

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::functions::{FunctionSet, funcdesc_list};
use super::item::{Item, ItemBase, set_int, set_text};
use super::EntityKind;
use crate::protocol::{Argument, Command};

/// Fields requested by `query_state`.
const STATE_FIELDS: &[&str] = &[
    "speed", "speedstep", "profile", "protocol", "name", "addr", "dir", "funcset", "funcdesc",
];

/// A locomotive decoder known to the station.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Locomotive {
    #[serde(flatten)]
    base: ItemBase,
    pub name: String,
    /// `MM14`, `MM27`, `MM128`, `DCC14`, `DCC28`, `DCC128`, `SX32`, `MMFKT`, `MFX`
    pub protocol: String,
    pub addr: i32,
    pub speed: i32,
    pub speedstep: i32,
    /// 0 forward, 1 backward.
    pub direction: i32,
    pub funcset: FunctionSet,
    #[serde(with = "funcdesc_list")]
    pub funcdesc: BTreeMap<i32, i32>,
    pub nr_of_functions: i32,
    pub max_speed_fahrstufe: i32,
    pub block_speed_fahrstufe: i32,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<DateTime<Utc>>,
}

impl Locomotive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_backward(&self) -> bool {
        self.direction == 1
    }

    pub fn is_forward(&self) -> bool {
        self.direction == 0
    }

    /// Speed steps the decoder protocol supports.
    pub fn speedsteps(&self) -> u32 {
        let protocol = self.protocol.to_ascii_uppercase();
        match protocol.as_str() {
            "MM14" | "DCC14" => 14,
            "MM27" => 27,
            "DCC28" => 28,
            _ => 128,
        }
    }

    pub fn change_name(&mut self, name: &str) {
        let id = self.object_id();
        self.commands().push_sequence([
            Command::set(id, vec![Argument::quoted("name", name)]),
            Command::get(id, &["name"]),
        ]);
    }

    pub fn stop(&mut self) {
        let id = self.object_id();
        self.commands().push(Command::set(id, vec![Argument::flag("stop")]));
        self.stop_time = Some(Utc::now());
    }

    /// Switch functions on or off, keyed by slot.
    pub fn toggle_functions(&mut self, states: &BTreeMap<u32, bool>) {
        let id = self.object_id();
        let mut steps = vec![Command::request(id, &["control", "force"])];
        for (&slot, &on) in states {
            let value = if on { "1" } else { "0" };
            steps.push(Command::set(
                id,
                vec![Argument::new("func", [slot.to_string(), value.to_owned()])],
            ));
            if let Ok(slot) = usize::try_from(slot) {
                self.funcset.set(slot, on);
            }
        }
        steps.push(Command::release(id, &["control"]));
        self.commands().push_sequence(steps);
    }

    pub fn change_direction(&mut self, backward: bool) {
        let id = self.object_id();
        let value = if backward { "1" } else { "0" };
        self.direction = i32::from(backward);
        self.commands().push_sequence([
            Command::request(id, &["control", "force"]),
            Command::set(id, vec![Argument::new("dir", [value])]),
            Command::release(id, &["control"]),
        ]);
    }

    /// Set the speed step. A ramp spreads over several calls: the first
    /// acquires control, the last releases it and reads the speed back.
    pub fn change_speed(&mut self, step: i32, is_first: bool, is_last: bool) {
        self.track_motion(step);

        let id = self.object_id();
        let mut steps = Vec::with_capacity(4);
        if is_first {
            steps.push(Command::request(id, &["control", "force"]));
        }
        steps.push(Command::set(id, vec![Argument::new("speed", [step.to_string()])]));
        if is_last {
            steps.push(Command::release(id, &["control"]));
            steps.push(Command::get(id, &["speed", "speedstep"]));
        }
        self.commands().push_sequence(steps);

        self.speed = step;
    }

    pub fn change_speedstep(&mut self, step: i32) {
        self.track_motion(step);

        let id = self.object_id();
        self.commands().push_sequence([
            Command::request(id, &["control", "force"]),
            Command::set(id, vec![Argument::new("speedstep", [step.to_string()])]),
            Command::release(id, &["control"]),
        ]);

        self.speedstep = step;
    }

    fn track_motion(&mut self, step: i32) {
        if self.speed == 0 && step > 0 {
            self.start_time = Some(Utc::now());
            self.stop_time = None;
        } else if step <= 0 {
            self.start_time = None;
            self.stop_time = Some(Utc::now());
        }
    }

    fn apply(&mut self, arg: &Argument) {
        let name = arg.name().to_ascii_lowercase();
        match name.as_str() {
            "name" => set_text(&mut self.name, arg),
            "protocol" => set_text(&mut self.protocol, arg),
            "addr" => set_int(&mut self.addr, arg),
            "speed" => set_int(&mut self.speed, arg),
            "speedstep" => set_int(&mut self.speedstep, arg),
            "dir" => set_int(&mut self.direction, arg),
            "funcdesc" => {
                let idx = arg.int(0).unwrap_or(-1);
                let type_code = arg.int(1).unwrap_or(-1);
                self.funcdesc.insert(idx, type_code);
            }
            "funcset" => {
                if let Some(bits) = arg.first() {
                    let (set, reported) = FunctionSet::parse(bits);
                    self.funcset = set;
                    self.nr_of_functions = i32::try_from(reported).unwrap_or(i32::MAX);
                }
            }
            "func" => {
                let slot = arg.int(0).and_then(|s| usize::try_from(s).ok());
                if let (Some(slot), Some(state)) = (slot, arg.parameter(1)) {
                    self.funcset.set(slot, state.trim() == "1");
                }
            }
            "profile" => {}
            _ => {
                tracing::trace!(
                    object_id = self.object_id(),
                    argument = %arg,
                    "unknown locomotive argument"
                );
            }
        }
    }
}

impl Item for Locomotive {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ItemBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Locomotive
    }

    fn parse(&mut self, arguments: &[Argument]) -> bool {
        for arg in arguments {
            self.apply(arg);
        }
        true
    }

    fn query_state(&self) {
        self.commands().push(Command::get(self.object_id(), STATE_FIELDS));
    }
}

impl fmt::Display for Locomotive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "Locomotive {},{}", self.addr, self.protocol)
        } else {
            f.write_str(&self.name)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::protocol::parse_arguments;

    fn loco(id: i32) -> Locomotive {
        let mut l = Locomotive::new();
        l.set_object_id(id);
        l
    }

    fn drained(l: &Locomotive) -> Vec<String> {
        l.commands().drain().iter().map(|c| c.native().to_owned()).collect()
    }

    #[test]
    fn parses_reply_fields() {
        let mut l = loco(1000);
        l.parse(&parse_arguments(
            "name[\"18 527 DRG\"] protocol[MFX] addr[3] speed[41] speedstep[12] dir[1]",
            false,
        ));
        assert_eq!(l.name, "18 527 DRG");
        assert_eq!(l.protocol, "MFX");
        assert_eq!((l.addr, l.speed, l.speedstep, l.direction), (3, 41, 12, 1));
        assert!(l.is_backward());
    }

    #[test]
    fn invalid_integers_become_minus_one() {
        let mut l = loco(1000);
        l.parse(&parse_arguments("addr[x]", false));
        assert_eq!(l.addr, -1);
    }

    #[test]
    fn function_arguments_update_state() {
        let mut l = loco(1000);
        l.parse(&parse_arguments("funcset[0010000000000000000000000000]", false));
        assert_eq!(l.nr_of_functions, 28);
        assert!(l.funcset.get(2));

        l.parse(&parse_arguments("func[2, 0] func[5, 1]", false));
        assert!(!l.funcset.get(2));
        assert!(l.funcset.get(5));

        l.parse(&parse_arguments("funcdesc[0, 3] funcdesc[1, 1031] funcdesc[0, 4]", false));
        assert_eq!(l.funcdesc.get(&0), Some(&4));
        assert_eq!(l.funcdesc.get(&1), Some(&1031));
    }

    #[test]
    fn speedsteps_follow_protocol() {
        let mut l = loco(1000);
        for (protocol, steps) in [("MM14", 14), ("dcc14", 14), ("MM27", 27), ("DCC28", 28), ("DCC128", 128), ("MFX", 128), ("", 128)] {
            protocol.clone_into(&mut l.protocol);
            assert_eq!(l.speedsteps(), steps, "{protocol}");
        }
    }

    #[test]
    fn speed_ramp_brackets_control() {
        let mut l = loco(1002);
        l.change_speed(20, true, true);
        assert_eq!(
            drained(&l),
            [
                "request(1002, control, force)",
                "set(1002, speed[20])",
                "release(1002, control)",
                "get(1002, speed, speedstep)",
            ]
        );
        assert_eq!(l.speed, 20);
    }

    #[test]
    fn intermediate_speed_step_is_bare() {
        let mut l = loco(1002);
        l.change_speed(10, false, false);
        assert_eq!(drained(&l), ["set(1002, speed[10])"]);
    }

    #[test]
    fn starting_and_stopping_track_timestamps() {
        let mut l = loco(1002);
        l.stop_time = Some(Utc::now());
        l.change_speed(30, true, true);
        assert!(l.start_time.is_some());
        assert!(l.stop_time.is_none());

        l.change_speed(0, true, true);
        assert!(l.start_time.is_none());
        assert!(l.stop_time.is_some());
    }

    #[test]
    fn toggling_functions_is_optimistic() {
        let mut l = loco(1000);
        let states = BTreeMap::from([(0, true), (3, false)]);
        l.funcset.set(3, true);
        l.toggle_functions(&states);

        assert!(l.funcset.get(0));
        assert!(!l.funcset.get(3));
        assert_eq!(
            drained(&l),
            [
                "request(1000, control, force)",
                "set(1000, func[0, 1])",
                "set(1000, func[3, 0])",
                "release(1000, control)",
            ]
        );
    }

    #[test]
    fn change_direction_and_name() {
        let mut l = loco(1000);
        l.change_direction(true);
        assert_eq!(l.direction, 1);
        assert_eq!(
            drained(&l),
            ["request(1000, control, force)", "set(1000, dir[1])", "release(1000, control)"]
        );

        l.change_name("BR 89");
        assert_eq!(drained(&l), ["set(1000, name[\"BR 89\"])", "get(1000, name)"]);
    }

    #[test]
    fn query_state_requests_all_fields() {
        let l = loco(1000);
        l.query_state();
        assert_eq!(
            drained(&l),
            ["get(1000, speed, speedstep, profile, protocol, name, addr, dir, funcset, funcdesc)"]
        );
    }

    #[test]
    fn display_falls_back_to_address() {
        let mut l = loco(1000);
        l.addr = 3;
        "DCC28".clone_into(&mut l.protocol);
        assert_eq!(l.to_string(), "Locomotive 3,DCC28");
        "BR 89".clone_into(&mut l.name);
        assert_eq!(l.to_string(), "BR 89");
    }
}
