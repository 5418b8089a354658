use demofile::{
    entities::{PlayerSnapshot, WorldSnapshot},
    events::{DomainEvent, EventExtractor, PlayerDamaged, PlayerKilled, RoundEnd, WinReason},
    message::{GameEvent, RawValue, UserCommand},
    types::HitGroup,
    Team, UserId, Vector3,
};
use pretty_assertions::assert_eq;

fn event(name: &str, keys: &[(&str, RawValue)]) -> GameEvent {
    GameEvent {
        name: name.to_owned(),
        keys: keys
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect(),
    }
}

fn player(user: i32, team: Team, position: Vector3) -> PlayerSnapshot {
    PlayerSnapshot {
        entity_id: 10 + user as u32,
        user_id: UserId(user),
        team,
        health: 100,
        position,
        view_angles: Vector3::new(1.0, 2.0, 0.0),
        active_weapon: Some("m4a1".to_owned()),
    }
}

fn snapshot(tick: u32) -> WorldSnapshot {
    WorldSnapshot {
        tick,
        players: vec![
            player(1, Team::CounterTerrorist, Vector3::new(1.0, 1.0, 1.0)),
            player(2, Team::Terrorist, Vector3::new(2.0, 2.0, 2.0)),
            player(3, Team::Terrorist, Vector3::new(3.0, 3.0, 3.0)),
        ],
        teams: Vec::new(),
    }
}

#[test]
fn kill_enriched_from_snapshot() {
    let mut extractor = EventExtractor::new();
    extractor.observe_snapshot(snapshot(10));

    let result = extractor.extract(
        12,
        &event(
            "player_death",
            &[
                ("userid", RawValue::I32(2)),
                ("attacker", RawValue::I32(1)),
                ("assister", RawValue::I32(-1)),
                ("weapon", RawValue::String("weapon_ak47".to_owned())),
                ("headshot", RawValue::Bool(true)),
            ],
        ),
    );

    assert_eq!(
        Some(DomainEvent::PlayerKilled(PlayerKilled {
            tick: 12,
            victim: UserId(2),
            victim_team: Team::Terrorist,
            attacker: Some(UserId(1)),
            attacker_team: Team::CounterTerrorist,
            assister: None,
            weapon: "ak47".to_owned(),
            headshot: true,
            attacker_position: Some(Vector3::new(1.0, 1.0, 1.0)),
            attacker_angles: Some(Vector3::new(1.0, 2.0, 0.0)),
            victim_position: Some(Vector3::new(2.0, 2.0, 2.0)),
        })),
        result
    );
}

#[test]
fn world_and_team_kills() {
    let mut extractor = EventExtractor::new();
    extractor.observe_snapshot(snapshot(10));

    let world = extractor
        .extract(
            11,
            &event(
                "player_death",
                &[
                    ("userid", RawValue::I32(2)),
                    ("attacker", RawValue::I32(-1)),
                    ("weapon", RawValue::String("world".to_owned())),
                ],
            ),
        )
        .unwrap();
    let team = extractor
        .extract(
            11,
            &event(
                "player_death",
                &[("userid", RawValue::I32(2)), ("attacker", RawValue::I32(3))],
            ),
        )
        .unwrap();
    let suicide = extractor
        .extract(
            11,
            &event(
                "player_death",
                &[("userid", RawValue::I32(2)), ("attacker", RawValue::I32(2))],
            ),
        )
        .unwrap();

    match (world, team, suicide) {
        (
            DomainEvent::PlayerKilled(world),
            DomainEvent::PlayerKilled(team),
            DomainEvent::PlayerKilled(suicide),
        ) => {
            assert_eq!(None, world.attacker);
            assert_eq!(None, world.attacker_position);
            assert!(!world.is_team_kill());

            assert!(team.is_team_kill());
            // Falls back to the active weapon of the snapshot
            assert_eq!("m4a1", team.weapon);

            assert!(suicide.is_suicide());
            assert!(!suicide.is_team_kill());
        }
        other => panic!("{:?}", other),
    }
}

#[test]
fn damage() {
    let mut extractor = EventExtractor::new();
    extractor.observe_snapshot(snapshot(10));

    let result = extractor.extract(
        10,
        &event(
            "player_hurt",
            &[
                ("userid", RawValue::I32(1)),
                ("attacker", RawValue::I32(2)),
                ("health", RawValue::I32(3)),
                ("dmg_health", RawValue::I32(97)),
                ("dmg_armor", RawValue::I32(-5)),
                ("weapon", RawValue::String("deagle".to_owned())),
                ("hitgroup", RawValue::I32(1)),
            ],
        ),
    );

    assert_eq!(
        Some(DomainEvent::PlayerDamaged(PlayerDamaged {
            tick: 10,
            victim: UserId(1),
            victim_team: Team::CounterTerrorist,
            attacker: Some(UserId(2)),
            attacker_team: Team::Terrorist,
            damage: 97,
            armor_damage: 0,
            health: 3,
            weapon: "deagle".to_owned(),
            hit_group: HitGroup::Head,
        })),
        result
    );
}

#[test]
fn rounds() {
    let mut extractor = EventExtractor::new();

    let events: Vec<_> = [
        event("round_start", &[]),
        event(
            "round_end",
            &[("winner", RawValue::I32(2)), ("reason", RawValue::I32(9))],
        ),
        event("round_start", &[]),
        event(
            "round_end",
            &[("winner", RawValue::I32(3)), ("reason", RawValue::I32(400))],
        ),
    ]
    .iter()
    .enumerate()
    .filter_map(|(i, e)| extractor.extract(i as u32 * 100, e))
    .collect();

    assert_eq!(4, events.len());
    assert_eq!(
        DomainEvent::RoundEnd(RoundEnd {
            tick: 100,
            round: 1,
            winner: Team::Terrorist,
            reason: WinReason::CTKilled,
        }),
        events[1]
    );
    assert_eq!(
        DomainEvent::RoundEnd(RoundEnd {
            tick: 300,
            round: 2,
            winner: Team::CounterTerrorist,
            reason: WinReason::StillInProgress,
        }),
        events[3]
    );
}

#[test]
fn ticks_never_decrease() {
    let mut extractor = EventExtractor::new();

    let ticks: Vec<u32> = [50, 20, 80, 80, 0]
        .into_iter()
        .filter_map(|tick| extractor.extract(tick, &event("round_start", &[])))
        .map(|e| e.tick())
        .collect();

    assert_eq!(vec![50, 50, 80, 80, 80], ticks);
}

#[test]
fn ignored_and_incomplete_events() {
    let mut extractor = EventExtractor::new();

    assert_eq!(None, extractor.extract(1, &event("player_footstep", &[])));
    // A death without a victim cannot be attributed to anyone
    assert_eq!(None, extractor.extract(1, &event("player_death", &[])));
}

#[test]
fn bomb_shots_and_connects() {
    let mut extractor = EventExtractor::new();
    extractor.observe_snapshot(snapshot(1));

    let planted = extractor
        .extract(
            2,
            &event(
                "bomb_planted",
                &[("userid", RawValue::I32(2)), ("site", RawValue::I32(1))],
            ),
        )
        .unwrap();
    assert!(matches!(
        planted,
        DomainEvent::BombPlanted(ref b) if b.team == Team::Terrorist && b.site == 1
    ));

    let defused = extractor
        .extract(3, &event("bomb_defused", &[("userid", RawValue::I32(1))]))
        .unwrap();
    assert!(matches!(defused, DomainEvent::BombDefused(ref b) if b.player == UserId(1)));

    let shot = extractor
        .extract(
            4,
            &event(
                "weapon_fire",
                &[
                    ("userid", RawValue::I32(3)),
                    ("weapon", RawValue::String("weapon_awp".to_owned())),
                ],
            ),
        )
        .unwrap();
    assert!(matches!(shot, DomainEvent::ShotFired(ref s) if s.weapon == "awp"));

    let connected = extractor
        .extract(
            5,
            &event(
                "player_connect",
                &[
                    ("name", RawValue::String("dev1ce".to_owned())),
                    ("userid", RawValue::I32(9)),
                    ("xuid", RawValue::U64(76561197987713664)),
                ],
            ),
        )
        .unwrap();
    assert!(matches!(
        connected,
        DomainEvent::PlayerConnected(ref c)
            if c.name == "dev1ce" && c.steam_id == 76561197987713664 && c.user_id == UserId(9)
    ));
}

#[test]
fn user_command_angles_without_snapshot() {
    let mut extractor = EventExtractor::new();
    extractor.observe_user_command(&UserCommand {
        user_id: 4,
        pitch: 5.0,
        yaw: 175.0,
        buttons: 0,
    });

    let result = extractor
        .extract(
            2,
            &event(
                "player_death",
                &[("userid", RawValue::I32(5)), ("attacker", RawValue::I32(4))],
            ),
        )
        .unwrap();

    match result {
        DomainEvent::PlayerKilled(kill) => {
            assert_eq!(Some(Vector3::new(5.0, 175.0, 0.0)), kill.attacker_angles);
            assert_eq!(None, kill.attacker_position);
            assert_eq!(Team::Unassigned, kill.attacker_team);
            assert_eq!("unknown", kill.weapon);
        }
        other => panic!("{:?}", other),
    }
}

#[test]
fn teams_survive_leaving_the_snapshot() {
    let mut extractor = EventExtractor::new();
    extractor.observe_snapshot(snapshot(1));
    extractor.observe_snapshot(WorldSnapshot {
        tick: 2,
        players: Vec::new(),
        teams: Vec::new(),
    });

    assert_eq!(Some(&Team::Terrorist), extractor.teams().get(&UserId(3)));
    assert_eq!(2, extractor.last_snapshot().unwrap().tick);
}
