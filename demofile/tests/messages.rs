use std::borrow::Cow;

use demofile::{
    container::{Frame, FrameKind},
    message::{
        DeltaOp, EntityDelta, GameEvent, GameEventDescriptor, KeyType, Message, MessageDecoder,
        PropChange, RawValue, UserCommand, MSG_TEMP_ENTITIES, MSG_VOICE_DATA,
    },
    sendtables::{PropType, ServerClass},
    writer::{self, PacketWriter},
};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

fn frame(kind: FrameKind, data: Vec<u8>) -> Frame<'static> {
    Frame {
        kind,
        tick: 1,
        data: Cow::Owned(data),
    }
}

fn death_descriptor() -> GameEventDescriptor {
    GameEventDescriptor {
        id: 23,
        name: "player_death".to_owned(),
        keys: vec![
            ("userid".to_owned(), KeyType::Short),
            ("attacker".to_owned(), KeyType::Short),
            ("weapon".to_owned(), KeyType::String),
            ("headshot".to_owned(), KeyType::Bool),
            ("distance".to_owned(), KeyType::Float),
            ("attacker_xuid".to_owned(), KeyType::U64),
        ],
    }
}

#[test]
fn game_event() {
    let mut decoder = MessageDecoder::new();

    let mut signon = PacketWriter::new();
    signon.game_event_list(&[death_descriptor()]);
    assert_eq!(
        Vec::<Message>::new(),
        decoder.decode(&frame(FrameKind::Signon, signon.finish())).unwrap()
    );
    assert_eq!(Some(&death_descriptor()), decoder.event_descriptor(23));

    let mut packet = PacketWriter::new();
    packet.game_event(
        &death_descriptor(),
        &[
            ("userid", RawValue::I32(3)),
            ("attacker", RawValue::I32(-1)),
            ("weapon", RawValue::String("world".to_owned())),
            ("headshot", RawValue::Bool(true)),
            ("attacker_xuid", RawValue::U64(76561198000000001)),
        ],
    );
    let messages = decoder
        .decode(&frame(FrameKind::Packet, packet.finish()))
        .unwrap();

    let expected = GameEvent {
        name: "player_death".to_owned(),
        keys: vec![
            ("userid".to_owned(), RawValue::I32(3)),
            ("attacker".to_owned(), RawValue::I32(-1)),
            ("weapon".to_owned(), RawValue::String("world".to_owned())),
            ("headshot".to_owned(), RawValue::Bool(true)),
            ("distance".to_owned(), RawValue::F32(0.0)),
            ("attacker_xuid".to_owned(), RawValue::U64(76561198000000001)),
        ],
    };
    assert_eq!(vec![Message::GameEvent(expected.clone())], messages);

    assert_eq!(Some(3), expected.get_i32("userid"));
    assert_eq!(Some(true), expected.get_bool("headshot"));
    assert_eq!(Some("world"), expected.get_str("weapon"));
    assert_eq!(Some(76561198000000001), expected.get_u64("attacker_xuid"));
    assert_eq!(None, expected.get_i32("missing"));
}

#[test]
#[traced_test]
fn game_event_without_descriptor() {
    let mut decoder = MessageDecoder::new();

    let mut packet = PacketWriter::new();
    packet.game_event(&death_descriptor(), &[]);
    let messages = decoder
        .decode(&frame(FrameKind::Packet, packet.finish()))
        .unwrap();

    assert!(messages.is_empty());
    assert!(logs_contain("Game event without descriptor"));
}

#[test]
#[traced_test]
fn unknown_and_ignored_messages() {
    let mut decoder = MessageDecoder::new();

    let mut packet = PacketWriter::new();
    packet
        .message(MSG_VOICE_DATA, &[1, 2, 3])
        .message(9999, &[0xFF; 16])
        .message(MSG_TEMP_ENTITIES, &[])
        .entity_deltas(&[EntityDelta {
            entity_id: 4,
            op: DeltaOp::Delete,
            changes: Vec::new(),
        }]);

    let messages = decoder
        .decode(&frame(FrameKind::Packet, packet.finish()))
        .unwrap();

    assert_eq!(
        vec![Message::EntityDeltas(vec![EntityDelta {
            entity_id: 4,
            op: DeltaOp::Delete,
            changes: Vec::new(),
        }])],
        messages
    );
    assert_eq!(1, decoder.skipped_messages());
    assert!(logs_contain("Skipping unknown message"));
}

#[test]
fn entity_deltas() {
    let deltas = vec![
        EntityDelta {
            entity_id: 10,
            op: DeltaOp::Create { class_id: 1 },
            changes: vec![
                PropChange {
                    index: 0,
                    data: vec![2],
                },
                PropChange {
                    index: 3,
                    data: vec![0, 0, 128, 63],
                },
            ],
        },
        EntityDelta {
            entity_id: 11,
            op: DeltaOp::Update,
            changes: vec![PropChange {
                index: 1,
                data: Vec::new(),
            }],
        },
        EntityDelta {
            entity_id: 12,
            op: DeltaOp::Delete,
            changes: Vec::new(),
        },
    ];

    let mut packet = PacketWriter::new();
    packet.entity_deltas(&deltas);

    let mut decoder = MessageDecoder::new();
    let messages = decoder
        .decode(&frame(FrameKind::Packet, packet.finish()))
        .unwrap();

    assert_eq!(vec![Message::EntityDeltas(deltas)], messages);
}

#[test]
fn entity_delta_with_invalid_operation() {
    let mut packet = PacketWriter::new();
    // One delta for entity 1 with operation 7
    packet.message(demofile::message::MSG_PACKET_ENTITIES, &[1, 1, 7]);

    let mut decoder = MessageDecoder::new();
    let result = decoder.decode(&frame(FrameKind::Packet, packet.finish()));

    assert!(
        matches!(result, Err(demofile::DemoError::InvalidMessage { .. })),
        "{:?}",
        result
    );
}

#[test]
fn truncated_sub_message() {
    let mut packet = PacketWriter::new();
    packet.message(MSG_VOICE_DATA, &[1, 2, 3, 4]);
    let mut data = packet.finish();
    data.truncate(data.len() - 2);

    let mut decoder = MessageDecoder::new();
    let result = decoder.decode(&frame(FrameKind::Packet, data));

    assert!(
        matches!(result, Err(demofile::DemoError::OutOfBounds { .. })),
        "{:?}",
        result
    );
}

#[test]
fn string_tables() {
    let mut decoder = MessageDecoder::new();

    let data = writer::encode_string_tables(&[
        ("userinfo", vec![(1, "s1mple"), (2, "ZywOo")]),
        ("modelprecache", vec![(0, "models/player.vmdl")]),
    ]);
    assert!(decoder
        .decode(&frame(FrameKind::StringTables, data))
        .unwrap()
        .is_empty());

    let mut packet = PacketWriter::new();
    packet
        .string_table(false, "userinfo", &[(2, "ropz"), (3, "NiKo")])
        .string_table(true, "downloadables", &[]);
    decoder
        .decode(&frame(FrameKind::Packet, packet.finish()))
        .unwrap();

    let userinfo = decoder.string_tables().get("userinfo").unwrap();
    assert_eq!(
        vec![(1, "s1mple"), (2, "ropz"), (3, "NiKo")],
        userinfo.iter().collect::<Vec<_>>()
    );
    assert_eq!(
        Some("models/player.vmdl"),
        decoder
            .string_tables()
            .get("modelprecache")
            .and_then(|t| t.get(0))
    );
    assert!(decoder
        .string_tables()
        .get("downloadables")
        .unwrap()
        .is_empty());
}

#[test]
fn data_tables() {
    let classes = vec![
        ServerClass::new(1, "CCSPlayerPawn")
            .with_prop("m_iHealth", PropType::Int)
            .with_prop("m_vecOrigin", PropType::Vector),
        ServerClass::new(40, "CCSTeam").with_prop("m_szTeamname", PropType::String),
    ];

    let mut decoder = MessageDecoder::new();
    let messages = decoder
        .decode(&frame(
            FrameKind::DataTables,
            writer::encode_classes(&classes),
        ))
        .unwrap();

    assert_eq!(vec![Message::ServerClasses(classes)], messages);
}

#[test]
fn data_tables_with_unknown_prop_type() {
    let mut data = writer::encode_classes(&[
        ServerClass::new(1, "CCSPlayerPawn").with_prop("m_iHealth", PropType::Int)
    ]);
    *data.last_mut().unwrap() = 9;

    let mut decoder = MessageDecoder::new();
    let result = decoder.decode(&frame(FrameKind::DataTables, data));

    assert!(
        matches!(result, Err(demofile::DemoError::InvalidMessage { .. })),
        "{:?}",
        result
    );
}

#[test]
fn user_and_console_commands() {
    let command = UserCommand {
        user_id: 4,
        pitch: -12.5,
        yaw: 90.0,
        buttons: UserCommand::BUTTON_ATTACK,
    };

    let mut decoder = MessageDecoder::new();
    let messages = decoder
        .decode(&frame(
            FrameKind::UserCmd,
            writer::encode_user_command(&command),
        ))
        .unwrap();
    assert_eq!(vec![Message::UserCommand(command)], messages);
    assert!(command.attacking());

    let messages = decoder
        .decode(&frame(FrameKind::ConsoleCmd, b"status\0".to_vec()))
        .unwrap();
    assert_eq!(vec![Message::ConsoleCommand("status".to_owned())], messages);
}
