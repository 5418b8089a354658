//! Builds small but complete demos for tests and benchmarks.
//!
//! ```
//! use demofile::{synthetic::MatchBuilder, types::Team};
//!
//! let mut builder = MatchBuilder::new("de_mirage");
//! let a = builder.add_player("a", 1, Team::CounterTerrorist);
//! let b = builder.add_player("b", 2, Team::Terrorist);
//! builder.round_start(64);
//! builder.kill(100, a, b, true);
//! builder.round_end(200, Team::CounterTerrorist, 8);
//!
//! // Two connects, round start, kill and round end
//! let output = demofile::parse(&builder.finish()).unwrap();
//! assert_eq!(5, output.events.len());
//! ```

use std::collections::BTreeMap;

use crate::{
    container::{Compression, DemoHeader, FrameKind},
    message::{DeltaOp, EntityDelta, GameEventDescriptor, KeyType, PropChange, RawValue, UserCommand},
    parser::USERINFO_TABLE,
    sendtables::{PropType, PropValue, ServerClass},
    types::{Team, UserId, Vector3},
    writer::{self, encode_prop, DemoWriter, PacketWriter},
};

pub const PAWN_CLASS_ID: u32 = 1;
pub const WEAPON_CLASS_ID: u32 = 2;
pub const TEAM_CLASS_ID: u32 = 3;

/// Item definition index of the AK-47.
const DEFAULT_WEAPON: i32 = 7;

const FIRST_PAWN_ENTITY: u32 = 10;
const FIRST_WEAPON_ENTITY: u32 = 100;

pub fn server_classes() -> Vec<ServerClass> {
    vec![
        ServerClass::new(PAWN_CLASS_ID, crate::entities::PLAYER_PAWN_CLASS)
            .with_prop("m_iPlayerSlot", PropType::Int)
            .with_prop("m_iHealth", PropType::Int)
            .with_prop("m_iTeamNum", PropType::Int)
            .with_prop("m_vecOrigin", PropType::Vector)
            .with_prop("m_angEyeAngles", PropType::Vector)
            .with_prop("m_hActiveWeapon", PropType::Int)
            .with_prop("m_bIsScoped", PropType::Bool),
        ServerClass::new(WEAPON_CLASS_ID, "CWeaponAK47")
            .with_prop("m_iItemDefinitionIndex", PropType::Int)
            .with_prop("m_flNextPrimaryAttack", PropType::Float),
        ServerClass::new(TEAM_CLASS_ID, crate::entities::TEAM_CLASS)
            .with_prop("m_iTeamNum", PropType::Int)
            .with_prop("m_szTeamname", PropType::String)
            .with_prop("m_szClanTeamname", PropType::String)
            .with_prop("m_iScore", PropType::Int),
    ]
}

pub fn event_descriptors() -> Vec<GameEventDescriptor> {
    fn descriptor(id: u32, name: &str, keys: &[(&str, KeyType)]) -> GameEventDescriptor {
        GameEventDescriptor {
            id,
            name: name.to_owned(),
            keys: keys.iter().map(|(k, t)| ((*k).to_owned(), *t)).collect(),
        }
    }

    vec![
        descriptor(
            1,
            "player_death",
            &[
                ("userid", KeyType::Short),
                ("attacker", KeyType::Short),
                ("assister", KeyType::Short),
                ("weapon", KeyType::String),
                ("headshot", KeyType::Bool),
            ],
        ),
        descriptor(
            2,
            "player_hurt",
            &[
                ("userid", KeyType::Short),
                ("attacker", KeyType::Short),
                ("health", KeyType::Byte),
                ("dmg_health", KeyType::Short),
                ("dmg_armor", KeyType::Byte),
                ("weapon", KeyType::String),
                ("hitgroup", KeyType::Byte),
            ],
        ),
        descriptor(3, "round_start", &[("timelimit", KeyType::Long)]),
        descriptor(
            4,
            "round_end",
            &[
                ("winner", KeyType::Byte),
                ("reason", KeyType::Byte),
                ("message", KeyType::String),
            ],
        ),
        descriptor(
            5,
            "bomb_planted",
            &[("userid", KeyType::Short), ("site", KeyType::Short)],
        ),
        descriptor(
            6,
            "bomb_defused",
            &[("userid", KeyType::Short), ("site", KeyType::Short)],
        ),
        descriptor(
            7,
            "weapon_fire",
            &[
                ("userid", KeyType::Short),
                ("weapon", KeyType::String),
                ("silenced", KeyType::Bool),
            ],
        ),
        descriptor(
            8,
            "player_connect",
            &[
                ("name", KeyType::String),
                ("userid", KeyType::Short),
                ("xuid", KeyType::U64),
            ],
        ),
        descriptor(9, "round_freeze_end", &[]),
    ]
}

#[derive(Debug, Clone)]
struct SyntheticPlayer {
    user_id: UserId,
    name: String,
    xuid: u64,
    team: Team,
    pawn: u32,
    weapon: u32,
    health: i32,
}

#[derive(Debug, Clone)]
enum Entry {
    Delta(EntityDelta),
    Event(&'static str, Vec<(&'static str, RawValue)>),
    Message(u32, Vec<u8>),
    UserCommand(UserCommand),
}

/// Records a match as a timeline and encodes it on [`MatchBuilder::finish`].
///
/// Every tick with at least one entry becomes one packet, entity deltas are
/// written before the game events of the same tick.
#[derive(Debug, Clone)]
pub struct MatchBuilder {
    header: DemoHeader,
    compression: Compression,
    players: Vec<SyntheticPlayer>,
    team_names: BTreeMap<Team, String>,
    scores: BTreeMap<Team, i32>,
    timeline: Vec<(u32, Entry)>,
}

impl MatchBuilder {
    pub fn new(map: &str) -> Self {
        Self {
            header: DemoHeader {
                demo_protocol: 4,
                network_protocol: 14030,
                map_name: map.to_owned(),
                server_name: "synthetic".to_owned(),
                tick_interval: 1.0 / 64.0,
                total_ticks: 0,
            },
            compression: Compression::None,
            players: Vec::new(),
            team_names: BTreeMap::new(),
            scores: BTreeMap::new(),
            timeline: Vec::new(),
        }
    }

    pub fn tick_interval(&mut self, interval: f32) -> &mut Self {
        self.header.tick_interval = interval;
        self
    }

    pub fn compression(&mut self, compression: Compression) -> &mut Self {
        self.compression = compression;
        self
    }

    pub fn team_name(&mut self, team: Team, clan_name: &str) -> &mut Self {
        self.team_names.insert(team, clan_name.to_owned());
        self
    }

    /// Adds a player that is connected and alive from tick 0 on.
    pub fn add_player(&mut self, name: &str, xuid: u64, team: Team) -> UserId {
        let index = self.players.len() as u32;
        let user_id = UserId(index as i32 + 1);

        self.players.push(SyntheticPlayer {
            user_id,
            name: name.to_owned(),
            xuid,
            team,
            pawn: FIRST_PAWN_ENTITY + index,
            weapon: FIRST_WEAPON_ENTITY + index,
            health: 100,
        });
        user_id
    }

    fn player_mut(&mut self, user: UserId) -> &mut SyntheticPlayer {
        self.players
            .iter_mut()
            .find(|p| p.user_id == user)
            .unwrap_or_else(|| panic!("{:?} was never added", user))
    }

    fn push(&mut self, tick: u32, entry: Entry) -> &mut Self {
        self.header.total_ticks = self.header.total_ticks.max(tick);
        self.timeline.push((tick, entry));
        self
    }

    fn set_props(&mut self, tick: u32, entity_id: u32, changes: Vec<PropChange>) -> &mut Self {
        self.push(
            tick,
            Entry::Delta(EntityDelta {
                entity_id,
                op: DeltaOp::Update,
                changes,
            }),
        )
    }

    fn set_health(&mut self, tick: u32, user: UserId, health: i32) {
        let player = self.player_mut(user);
        player.health = health;
        let pawn = player.pawn;
        self.set_props(tick, pawn, vec![change(1, PropValue::I32(health))]);
    }

    pub fn round_start(&mut self, tick: u32) -> &mut Self {
        let users: Vec<UserId> = self.players.iter().map(|p| p.user_id).collect();
        for user in users {
            self.set_health(tick, user, 100);
        }
        self.push(
            tick,
            Entry::Event("round_start", vec![("timelimit", RawValue::I32(115))]),
        )
    }

    /// Ends the round and bumps the winner's team entity score.
    pub fn round_end(&mut self, tick: u32, winner: Team, reason: i32) -> &mut Self {
        let score = self.scores.entry(winner).or_insert(0);
        *score += 1;
        let score = *score;

        if let Some(entity) = team_entity(winner) {
            self.set_props(tick, entity, vec![change(3, PropValue::I32(score))]);
        }
        self.push(
            tick,
            Entry::Event(
                "round_end",
                vec![
                    ("winner", RawValue::I32(winner.number())),
                    ("reason", RawValue::I32(reason)),
                ],
            ),
        )
    }

    pub fn move_player(&mut self, tick: u32, user: UserId, position: Vector3) -> &mut Self {
        let pawn = self.player_mut(user).pawn;
        self.set_props(
            tick,
            pawn,
            vec![change(
                3,
                PropValue::Vector([position.x, position.y, position.z]),
            )],
        )
    }

    /// Puts the player on `team` from `tick` on, like the side swap at halftime.
    pub fn switch_team(&mut self, tick: u32, user: UserId, team: Team) -> &mut Self {
        let pawn = self.player_mut(user).pawn;
        self.set_props(tick, pawn, vec![change(2, PropValue::I32(team.number()))])
    }

    pub fn aim(&mut self, tick: u32, user: UserId, pitch: f32, yaw: f32) -> &mut Self {
        let pawn = self.player_mut(user).pawn;
        self.set_props(tick, pawn, vec![change(4, PropValue::Vector([pitch, yaw, 0.0]))])
    }

    /// A user command frame, as recorded for the demo's own player.
    pub fn user_command(&mut self, tick: u32, user: UserId, pitch: f32, yaw: f32) -> &mut Self {
        self.push(
            tick,
            Entry::UserCommand(UserCommand {
                user_id: user.0,
                pitch,
                yaw,
                buttons: UserCommand::BUTTON_ATTACK,
            }),
        )
    }

    pub fn shot(&mut self, tick: u32, user: UserId, weapon: &str) -> &mut Self {
        self.push(
            tick,
            Entry::Event(
                "weapon_fire",
                vec![
                    ("userid", RawValue::I32(user.0)),
                    ("weapon", RawValue::String(format!("weapon_{}", weapon))),
                ],
            ),
        )
    }

    pub fn damage(
        &mut self,
        tick: u32,
        attacker: UserId,
        victim: UserId,
        amount: i32,
        hit_group: i32,
    ) -> &mut Self {
        let health = (self.player_mut(victim).health - amount).max(0);
        self.set_health(tick, victim, health);

        self.push(
            tick,
            Entry::Event(
                "player_hurt",
                vec![
                    ("userid", RawValue::I32(victim.0)),
                    ("attacker", RawValue::I32(attacker.0)),
                    ("health", RawValue::I32(health)),
                    ("dmg_health", RawValue::I32(amount)),
                    ("weapon", RawValue::String("ak47".to_owned())),
                    ("hitgroup", RawValue::I32(hit_group)),
                ],
            ),
        )
    }

    pub fn kill(&mut self, tick: u32, attacker: UserId, victim: UserId, headshot: bool) -> &mut Self {
        self.kill_with(tick, Some(attacker), victim, None, "ak47", headshot)
    }

    /// `attacker` of `None` is a death to the world.
    pub fn kill_with(
        &mut self,
        tick: u32,
        attacker: Option<UserId>,
        victim: UserId,
        assister: Option<UserId>,
        weapon: &str,
        headshot: bool,
    ) -> &mut Self {
        self.set_health(tick, victim, 0);

        self.push(
            tick,
            Entry::Event(
                "player_death",
                vec![
                    ("userid", RawValue::I32(victim.0)),
                    ("attacker", RawValue::I32(attacker.map(|a| a.0).unwrap_or(-1))),
                    ("assister", RawValue::I32(assister.map(|a| a.0).unwrap_or(-1))),
                    ("weapon", RawValue::String(weapon.to_owned())),
                    ("headshot", RawValue::Bool(headshot)),
                ],
            ),
        )
    }

    pub fn respawn(&mut self, tick: u32, user: UserId) -> &mut Self {
        self.set_health(tick, user, 100);
        self
    }

    pub fn plant(&mut self, tick: u32, user: UserId, site: i32) -> &mut Self {
        self.push(
            tick,
            Entry::Event(
                "bomb_planted",
                vec![("userid", RawValue::I32(user.0)), ("site", RawValue::I32(site))],
            ),
        )
    }

    pub fn defuse(&mut self, tick: u32, user: UserId, site: i32) -> &mut Self {
        self.push(
            tick,
            Entry::Event(
                "bomb_defused",
                vec![("userid", RawValue::I32(user.0)), ("site", RawValue::I32(site))],
            ),
        )
    }

    /// Creates an entity of a class that is never announced, followed by an
    /// update for it.
    pub fn unknown_entity(&mut self, tick: u32, entity_id: u32, class_id: u32) -> &mut Self {
        self.push(
            tick,
            Entry::Delta(EntityDelta {
                entity_id,
                op: DeltaOp::Create { class_id },
                changes: vec![change(0, PropValue::I32(1))],
            }),
        );
        self.set_props(tick + 1, entity_id, vec![change(0, PropValue::I32(2))])
    }

    /// A packet sub-message with an arbitrary type id.
    pub fn raw_message(&mut self, tick: u32, type_id: u32, body: Vec<u8>) -> &mut Self {
        self.push(tick, Entry::Message(type_id, body))
    }

    fn spawn_deltas(&self) -> Vec<EntityDelta> {
        let mut deltas = Vec::new();

        for team in [Team::Terrorist, Team::CounterTerrorist] {
            let entity_id = match team_entity(team) {
                Some(e) => e,
                None => continue,
            };
            deltas.push(EntityDelta {
                entity_id,
                op: DeltaOp::Create {
                    class_id: TEAM_CLASS_ID,
                },
                changes: vec![
                    change(0, PropValue::I32(team.number())),
                    change(1, PropValue::String(team.name().to_owned())),
                    change(
                        2,
                        PropValue::String(self.team_names.get(&team).cloned().unwrap_or_default()),
                    ),
                    change(3, PropValue::I32(0)),
                ],
            });
        }

        for player in self.players.iter() {
            deltas.push(EntityDelta {
                entity_id: player.weapon,
                op: DeltaOp::Create {
                    class_id: WEAPON_CLASS_ID,
                },
                changes: vec![change(0, PropValue::I32(DEFAULT_WEAPON))],
            });
            deltas.push(EntityDelta {
                entity_id: player.pawn,
                op: DeltaOp::Create {
                    class_id: PAWN_CLASS_ID,
                },
                changes: vec![
                    change(0, PropValue::I32(player.user_id.0)),
                    change(1, PropValue::I32(100)),
                    change(2, PropValue::I32(player.team.number())),
                    change(3, PropValue::Vector([0.0, 0.0, 0.0])),
                    change(4, PropValue::Vector([0.0, 0.0, 0.0])),
                    change(5, PropValue::I32(player.weapon as i32)),
                    change(6, PropValue::Bool(false)),
                ],
            });
        }

        deltas
    }

    pub fn finish(&self) -> Vec<u8> {
        let descriptors = event_descriptors();
        let mut demo = DemoWriter::new(&self.header).with_compression(self.compression);

        let mut signon = PacketWriter::new();
        signon.game_event_list(&descriptors);
        let userinfo: Vec<(u32, &str)> = self
            .players
            .iter()
            .map(|p| (p.user_id.0 as u32, p.name.as_str()))
            .collect();
        signon.string_table(true, USERINFO_TABLE, &userinfo);
        demo.write_frame(FrameKind::Signon, u32::MAX, &signon.finish());

        demo.write_frame(
            FrameKind::DataTables,
            0,
            &writer::encode_classes(&server_classes()),
        );
        demo.write_frame(
            FrameKind::StringTables,
            0,
            &writer::encode_string_tables(&[("downloadables", vec![(0, "maps/synthetic.vpk")])]),
        );
        demo.write_frame(FrameKind::SyncTick, 0, &[]);

        let mut spawn = PacketWriter::new();
        spawn.entity_deltas(&self.spawn_deltas());
        let descriptor = |name: &str| descriptors.iter().find(|d| d.name == name);
        if let Some(connect) = descriptor("player_connect") {
            for player in self.players.iter() {
                spawn.game_event(
                    connect,
                    &[
                        ("name", RawValue::String(player.name.clone())),
                        ("userid", RawValue::I32(player.user_id.0)),
                        ("xuid", RawValue::U64(player.xuid)),
                    ],
                );
            }
        }
        demo.write_frame(FrameKind::Packet, 0, &spawn.finish());

        let mut timeline = self.timeline.clone();
        timeline.sort_by_key(|(tick, _)| *tick);

        let mut last_tick = 0;
        let mut index = 0;
        while index < timeline.len() {
            let tick = timeline[index].0;
            let end = timeline[index..]
                .iter()
                .position(|(t, _)| *t != tick)
                .map(|offset| index + offset)
                .unwrap_or(timeline.len());
            let entries = &timeline[index..end];

            for (_, entry) in entries.iter() {
                if let Entry::UserCommand(command) = entry {
                    demo.write_frame(FrameKind::UserCmd, tick, &writer::encode_user_command(command));
                }
            }

            let deltas: Vec<EntityDelta> = entries
                .iter()
                .filter_map(|(_, e)| match e {
                    Entry::Delta(d) => Some(d.clone()),
                    _ => None,
                })
                .collect();

            let mut packet = PacketWriter::new();
            if !deltas.is_empty() {
                packet.entity_deltas(&deltas);
            }
            for (_, entry) in entries.iter() {
                match entry {
                    Entry::Event(name, values) => {
                        if let Some(d) = descriptor(*name) {
                            packet.game_event(d, values);
                        }
                    }
                    Entry::Message(type_id, body) => {
                        packet.message(*type_id, body);
                    }
                    Entry::Delta(_) | Entry::UserCommand(_) => {}
                }
            }
            if !packet.is_empty() {
                demo.write_frame(FrameKind::Packet, tick, &packet.finish());
            }

            last_tick = tick;
            index = end;
        }

        demo.finish(last_tick)
    }
}

fn change(index: u32, value: PropValue) -> PropChange {
    PropChange {
        index,
        data: encode_prop(&value),
    }
}

fn team_entity(team: Team) -> Option<u32> {
    match team {
        Team::Terrorist => Some(1),
        Team::CounterTerrorist => Some(2),
        _ => None,
    }
}
