#![allow(clippy::unwrap_used)]
// Replays station traffic through the block parser and the data provider.

use pretty_assertions::assert_eq;
use serde_json::json;

use ecos_core::protocol::{decode_commands, parse_blocks};
use ecos_core::{DataProvider, DataProviderMode, EntityKind, Item, Snapshot};

// ── Helpers ─────────────────────────────────────────────────────────

fn feed(provider: &DataProvider, text: &str) -> Vec<bool> {
    parse_blocks(text)
        .unwrap()
        .iter()
        .map(|block| provider.handle_data(block))
        .collect()
}

fn natives(provider: &DataProvider) -> Vec<String> {
    provider
        .drain_commands()
        .iter()
        .map(|c| c.native().to_owned())
        .collect()
}

const STARTUP: &str = "\
<REPLY get(1, info, status)>\r\n\
1 status[GO]\r\n\
1 ProtocolVersion[0.5]\r\n\
1 ApplicationVersion[4.2.9]\r\n\
1 HardwareVersion[2.0]\r\n\
<END 0 (OK)>\r\n\
<REPLY request(10, view)>\r\n\
<END 0 (OK)>\r\n\
<REPLY queryObjects(10, addr, name, protocol)>\r\n\
1000 addr[3] name[\"BR 89\"] protocol[DCC28]\r\n\
1001 addr[78] name[\"18 527 DRG\"] protocol[MFX]\r\n\
<END 0 (OK)>\r\n\
<REPLY queryObjects(11, addr, protocol, type, addrext, mode, symbol, name1, name2, name3, switching)>\r\n\
20000 addr[13] protocol[DCC] type[ACCESSORY] addrext[13r, 13g] mode[SWITCH] symbol[0] name1[\"W1\"] name2[\"\"] name3[\"\"] switching[0]\r\n\
<END 0 (OK)>\r\n";

// ── Session replay ──────────────────────────────────────────────────

#[test]
fn startup_traffic_builds_model() {
    let provider = DataProvider::new(DataProviderMode::General);
    assert_eq!(feed(&provider, STARTUP), [true, true, true, true]);
    assert_eq!(provider.len(), 4);

    let kinds: Vec<_> = provider.objects().iter().map(Item::kind).collect();
    assert_eq!(
        kinds,
        [
            EntityKind::CentralStation,
            EntityKind::Locomotive,
            EntityKind::Locomotive,
            EntityKind::Accessory
        ]
    );

    let accessory = provider.get_object_by(20000).unwrap();
    assert_eq!(accessory.as_accessory().unwrap().addrext, ["13r", "13g"]);
    assert!(accessory.has_view());
}

#[test]
fn discovered_objects_subscribe_and_query() {
    let provider = DataProvider::default();
    feed(&provider, STARTUP);

    assert_eq!(
        natives(&provider),
        [
            "get(1000, speed, speedstep, profile, protocol, name, addr, dir, funcset, funcdesc)",
            "request(1000, view)",
            "get(1001, speed, speedstep, profile, protocol, name, addr, dir, funcset, funcdesc)",
            "request(1001, view)",
            "get(20000, state)",
            "request(20000, view)",
        ]
    );
}

#[test]
fn redelivered_query_reply_is_idempotent() {
    let provider = DataProvider::default();
    feed(&provider, STARTUP);
    provider.drain_commands();
    let before = provider.len();

    feed(&provider, STARTUP);
    assert_eq!(provider.len(), before);
    assert!(provider.drain_commands().is_empty());
}

#[test]
fn list_change_round_trip() {
    let provider = DataProvider::default();
    feed(&provider, STARTUP);
    let mut commands = provider.subscribe_commands();

    feed(
        &provider,
        "<EVENT 11>\r\n11 msg[LIST_CHANGED]\r\n20001 appended\r\n11 size[2]\r\n<END 0 (OK)>\r\n",
    );
    let emitted = commands.try_recv().unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(
        emitted[0].native(),
        "queryObjects(11, addr, protocol, type, addrext, mode, symbol, name1, name2, name3, switching)"
    );

    feed(
        &provider,
        "<EVENT 10>\r\n10 msg[LIST_CHANGED]\r\n1000 removed\r\n10 size[1]\r\n<END 0 (OK)>\r\n",
    );
    assert_eq!(provider.len(), 3);
    assert!(provider.get_object_by(1000).is_none());
    assert!(provider.get_object_by(1001).is_some());
}

#[test]
fn events_update_subscribed_objects() {
    let provider = DataProvider::default();
    feed(&provider, STARTUP);

    let handled = feed(
        &provider,
        "<EVENT 1001>\r\n1001 speed[64]\r\n<END 0 (OK)>\r\n\
         <EVENT 20000>\r\n20000 state[1]\r\n<END 0 (OK)>\r\n\
         <EVENT 1>\r\n1 status[STOP]\r\n<END 0 (OK)>\r\n",
    );
    assert_eq!(handled, [true, true, true]);

    let loco = provider.get_object_by(1001).unwrap();
    assert_eq!(loco.as_locomotive().unwrap().speed, 64);
    let acc = provider.get_object_by(20000).unwrap();
    assert_eq!(acc.as_accessory().unwrap().state, 1);
    let station = provider.get_object_by(1).unwrap();
    assert_eq!(
        station.as_central_station().unwrap().state(),
        ecos_core::StationState::Stop
    );
}

#[test]
fn modified_fires_once_per_handled_block() {
    let provider = DataProvider::default();
    let rx = provider.subscribe_modified();
    let start = *rx.borrow();

    feed(&provider, STARTUP);
    // Four blocks, one of them a request ack that changes nothing.
    assert_eq!(*rx.borrow(), start + 3);
}

// ── Snapshots ───────────────────────────────────────────────────────

#[test]
fn snapshot_round_trip_preserves_entities() {
    let provider = DataProvider::default();
    feed(&provider, STARTUP);
    feed(
        &provider,
        "<REPLY get(1000, funcset, funcdesc)>\r\n\
         1000 funcset[1100000000000000000000000000]\r\n\
         1000 funcdesc[0, 3]\r\n\
         1000 funcdesc[1, 1031]\r\n\
         <END 0 (OK)>\r\n",
    );

    let json = provider.to_json().unwrap();
    let restored = DataProvider::default();
    restored.load_json(&json.to_string()).unwrap();

    assert_eq!(restored.len(), provider.len());
    assert_eq!(restored.to_json().unwrap(), json);
    for (a, b) in provider.objects().iter().zip(restored.objects().iter()) {
        assert_eq!(a.object_id(), b.object_id());
        assert_eq!(a.kind(), b.kind());
    }

    let loco = restored.get_object_by(1000).unwrap();
    let loco = loco.as_locomotive().unwrap();
    assert_eq!(loco.nr_of_functions, 28);
    assert!(loco.funcset.get(1));
    assert_eq!(loco.funcdesc.get(&1), Some(&1031));
    assert!(restored.drain_commands().is_empty());
}

#[test]
fn snapshot_sections_have_wire_field_names() {
    let provider = DataProvider::default();
    feed(&provider, STARTUP);
    let json = provider.to_json().unwrap();

    assert_eq!(
        json["ecosbase"][0],
        json!({
            "status": "GO",
            "name": "ECoS2",
            "protocolVersion": "0.5",
            "applicationVersion": "4.2.9",
            "hardwareVersion": "2.0",
        })
    );
    assert_eq!(json["accessories"][0]["type"], "ACCESSORY");
    assert_eq!(json["locomotives"][1]["protocol"], "MFX");
    assert_eq!(json["feedbacks"], json!([]));
}

#[test]
fn feedback_snapshot_document() {
    let provider = DataProvider::new(DataProviderMode::Feedback);
    feed(
        &provider,
        "<REPLY queryObjects(26, ports)>\r\n100 ports[16]\r\n<END 0 (OK)>\r\n\
         <EVENT 100>\r\n100 state[0x8001]\r\n<END 0 (OK)>\r\n",
    );

    let snapshot: Snapshot = provider.to_snapshot();
    insta::assert_json_snapshot!(snapshot, @r#"
    {
      "ecosbase": [],
      "locomotives": [],
      "accessories": [],
      "feedbacks": [
        {
          "objectId": 100,
          "index": 0,
          "ports": 16,
          "stateOriginal": "0x8001"
        }
      ]
    }
    "#);

    let bus = provider.get_object_by(100).unwrap();
    let bus = bus.as_feedback().unwrap();
    assert!(bus.pin(1));
    assert!(bus.pin(16));
    assert!(!bus.pin(8));
}

#[test]
fn pending_commands_encode_as_batch() {
    let provider = DataProvider::default();
    feed(&provider, STARTUP);

    provider
        .with_object_mut(1000, |e| {
            e.as_locomotive_mut().unwrap().change_speed(20, true, true);
        })
        .unwrap();
    let encoded = provider.get_object_by(1000).unwrap().to_base64().unwrap();
    let batch: Vec<_> = decode_commands(&encoded)
        .iter()
        .map(|c| c.native().to_owned())
        .collect();

    assert_eq!(
        &batch[..4],
        [
            "request(1000, control, force)",
            "set(1000, speed[20])",
            "release(1000, control)",
            "get(1000, speed, speedstep)",
        ]
    );
}
