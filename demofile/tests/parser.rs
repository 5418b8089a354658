use demofile::{
    container::Compression,
    synthetic::MatchBuilder,
    Container, DemoError, DomainEvent, EventStream, Team, UserId, Vector3,
};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

fn duel() -> MatchBuilder {
    let mut builder = MatchBuilder::new("de_inferno");
    builder.team_name(Team::CounterTerrorist, "Astralis");

    let ct = builder.add_player("device", 76561197987713664, Team::CounterTerrorist);
    let t = builder.add_player("s1mple", 76561198034202275, Team::Terrorist);

    builder
        .round_start(64)
        .move_player(64, ct, Vector3::new(100.0, 200.0, 0.0))
        .aim(64, ct, 2.5, 90.0)
        .shot(100, ct, "ak47")
        .damage(100, ct, t, 27, 2)
        .shot(110, ct, "ak47")
        .kill(110, ct, t, true)
        .round_end(300, Team::CounterTerrorist, 8);

    builder
}

#[test]
fn synthetic_match() {
    let output = demofile::parse(&duel().finish()).unwrap();

    assert_eq!("de_inferno", output.header.map_name());
    assert_eq!(300, output.header.total_ticks);
    assert_eq!(300, output.last_tick);
    assert!(output.skipped_entities.is_empty());
    assert_eq!(0, output.skipped_messages);

    let userinfo = output.string_tables.get("userinfo").unwrap();
    assert_eq!(2, userinfo.len());

    let names: Vec<_> = output
        .player_info
        .iter()
        .map(|(id, p)| (*id, p.name.as_str(), p.xuid, p.team))
        .collect();
    assert_eq!(
        vec![
            (UserId(1), "device", 76561197987713664, Team::CounterTerrorist),
            (UserId(2), "s1mple", 76561198034202275, Team::Terrorist),
        ],
        names
    );

    let kinds: Vec<_> = output
        .events
        .iter()
        .map(|e| match e {
            DomainEvent::PlayerKilled(_) => "kill",
            DomainEvent::PlayerDamaged(_) => "damage",
            DomainEvent::RoundStart(_) => "round_start",
            DomainEvent::RoundEnd(_) => "round_end",
            DomainEvent::BombPlanted(_) => "plant",
            DomainEvent::BombDefused(_) => "defuse",
            DomainEvent::ShotFired(_) => "shot",
            DomainEvent::PlayerConnected(_) => "connect",
        })
        .collect();
    assert_eq!(
        vec![
            "connect",
            "connect",
            "round_start",
            "shot",
            "damage",
            "shot",
            "kill",
            "round_end"
        ],
        kinds
    );

    let ct = output
        .final_state
        .team(Team::CounterTerrorist)
        .unwrap();
    assert_eq!("Astralis", ct.clan_name);
    assert_eq!(1, ct.score);
}

#[test]
fn events_see_the_previous_snapshot() {
    let output = demofile::parse(&duel().finish()).unwrap();

    let kill = output
        .events
        .iter()
        .find_map(|e| match e {
            DomainEvent::PlayerKilled(k) => Some(k),
            _ => None,
        })
        .unwrap();

    assert_eq!(110, kill.tick);
    assert_eq!(Team::CounterTerrorist, kill.attacker_team);
    assert_eq!(Team::Terrorist, kill.victim_team);
    assert_eq!(Some(Vector3::new(100.0, 200.0, 0.0)), kill.attacker_position);
    assert_eq!(Some(Vector3::new(2.5, 90.0, 0.0)), kill.attacker_angles);
    assert_eq!("ak47", kill.weapon);

    // The victim died in the same packet, the final state shows it
    let victim = output.final_state.player(UserId(2)).unwrap();
    assert!(!victim.is_alive());
    assert_eq!(Some("ak47"), victim.active_weapon.as_deref());
}

#[test]
fn ticks_are_monotonic() {
    let mut builder = duel();
    builder.round_start(400).round_end(380, Team::Terrorist, 9);

    let output = demofile::parse(&builder.finish()).unwrap();

    let ticks: Vec<u32> = output.events.iter().map(|e| e.tick()).collect();
    let mut sorted = ticks.clone();
    sorted.sort();
    assert_eq!(sorted, ticks);
}

#[test]
fn compression_does_not_change_the_result() {
    let plain = demofile::parse(&duel().finish()).unwrap();

    let mut builder = duel();
    builder.compression(Compression::Snappy);
    let compressed = demofile::parse(&builder.finish()).unwrap();

    assert_eq!(plain.events, compressed.events);
    assert_eq!(plain.player_info, compressed.player_info);
    assert_eq!(plain.final_state, compressed.final_state);
}

#[test]
#[traced_test]
fn unknown_entity_class_is_skipped() {
    let mut builder = duel();
    builder.unknown_entity(80, 500, 77);

    let output = demofile::parse(&builder.finish()).unwrap();

    assert_eq!(vec![500], output.skipped_entities.into_iter().collect::<Vec<_>>());
    assert_eq!(8, output.events.len());
    assert!(logs_contain("Skipping entity of unknown class"));
}

#[test]
#[traced_test]
fn unknown_message_is_skipped() {
    let mut builder = duel();
    builder.raw_message(120, 4242, vec![1, 2, 3, 4]);

    let output = demofile::parse(&builder.finish()).unwrap();

    assert_eq!(1, output.skipped_messages);
    assert_eq!(8, output.events.len());
}

#[test]
fn truncated_demo_has_no_output() {
    let data = duel().finish();

    // Inside the stop frame and inside the last packet
    for cut in [1, 2, 3, 5] {
        let result = demofile::parse(&data[..data.len() - cut]);
        assert!(
            matches!(result, Err(DemoError::MalformedFrame { .. })),
            "cut {}: {:?}",
            cut,
            result.map(|o| o.events.len())
        );
    }
}

#[test]
fn stream_stops_after_error() {
    let data = duel().finish();
    let container = Container::parse(&data[..data.len() - 5]).unwrap();

    let results: Vec<_> = EventStream::new(&container).collect();

    assert!(results.len() > 1);
    let (last, rest) = results.split_last().unwrap();
    assert!(rest.iter().all(|r| r.is_ok()));
    assert!(last.is_err());
}

#[test]
fn userinfo_names_without_connect_events() {
    let mut builder = MatchBuilder::new("de_nuke");
    builder.add_player("", 1, Team::Terrorist);

    let output = demofile::parse(&builder.finish()).unwrap();

    // The connect event carries an empty name, the string table as well
    assert_eq!("Player 1", output.player_info[&UserId(1)].name);
}
