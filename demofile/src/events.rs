//! Turns decoded game events into [`DomainEvent`]s, enriched with the state
//! of the most recent [`WorldSnapshot`].

use std::collections::HashMap;

use crate::{
    entities::WorldSnapshot,
    message::{GameEvent, UserCommand},
    types::{HitGroup, Team, UserId, Vector3},
};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WinReason {
    StillInProgress,
    BombExploded,
    VipEscaped,
    VipKilled,
    TSaved,
    CtStoppedEscape,
    RoundEndReasonTerroristsStopped,
    BombDefused,
    TKilled,
    CTKilled,
    Draw,
    HostageRescued,
    TimeRanOut,
    RoundEndReasonHostagesNotRescued,
    TerroristsNotEscaped,
    VipNotEscaped,
    GameStart,
    TSurrender,
    CTSurrender,
    TPlanted,
    CTReachedHostage,
}

// https://github.com/markus-wa/demoinfocs-golang/blob/205b0bb25e9f3e96e1d306d154199b4a6292940e/pkg/demoinfocs/events/events.go#L53
pub static ROUND_WIN_REASON: phf::Map<i32, WinReason> = phf::phf_map! {
    0_i32 => WinReason::StillInProgress,
    1_i32 => WinReason::BombExploded,
    2_i32 => WinReason::VipEscaped,
    3_i32 => WinReason::VipKilled,
    4_i32 => WinReason::TSaved,
    5_i32 => WinReason::CtStoppedEscape,
    6_i32 => WinReason::RoundEndReasonTerroristsStopped,
    7_i32 => WinReason::BombDefused,
    8_i32 => WinReason::TKilled,
    9_i32 => WinReason::CTKilled,
    10_i32 => WinReason::Draw,
    11_i32 => WinReason::HostageRescued,
    12_i32 => WinReason::TimeRanOut,
    13_i32 => WinReason::RoundEndReasonHostagesNotRescued,
    14_i32 => WinReason::TerroristsNotEscaped,
    15_i32 => WinReason::VipNotEscaped,
    16_i32 => WinReason::GameStart,
    17_i32 => WinReason::TSurrender,
    18_i32 => WinReason::CTSurrender,
    19_i32 => WinReason::TPlanted,
    20_i32 => WinReason::CTReachedHostage,
};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlayerKilled {
    pub tick: u32,
    pub victim: UserId,
    pub victim_team: Team,
    /// `None` for world damage (falling, bomb, ...)
    pub attacker: Option<UserId>,
    pub attacker_team: Team,
    pub assister: Option<UserId>,
    pub weapon: String,
    pub headshot: bool,
    pub attacker_position: Option<Vector3>,
    pub attacker_angles: Option<Vector3>,
    pub victim_position: Option<Vector3>,
}

impl PlayerKilled {
    pub fn is_suicide(&self) -> bool {
        self.attacker == Some(self.victim)
    }

    pub fn is_team_kill(&self) -> bool {
        !self.is_suicide()
            && self.attacker.is_some()
            && self.attacker_team.is_playing()
            && self.attacker_team == self.victim_team
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlayerDamaged {
    pub tick: u32,
    pub victim: UserId,
    pub victim_team: Team,
    pub attacker: Option<UserId>,
    pub attacker_team: Team,
    pub damage: u32,
    pub armor_damage: u32,
    /// Health left after the hit
    pub health: i32,
    pub weapon: String,
    pub hit_group: HitGroup,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RoundStart {
    pub tick: u32,
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RoundEnd {
    pub tick: u32,
    pub round: u32,
    pub winner: Team,
    pub reason: WinReason,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BombEvent {
    pub tick: u32,
    pub player: UserId,
    pub team: Team,
    pub site: i32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ShotFired {
    pub tick: u32,
    pub player: UserId,
    pub weapon: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlayerConnected {
    pub tick: u32,
    pub user_id: UserId,
    pub name: String,
    pub steam_id: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum DomainEvent {
    PlayerKilled(PlayerKilled),
    PlayerDamaged(PlayerDamaged),
    RoundStart(RoundStart),
    RoundEnd(RoundEnd),
    BombPlanted(BombEvent),
    BombDefused(BombEvent),
    ShotFired(ShotFired),
    PlayerConnected(PlayerConnected),
}

impl DomainEvent {
    pub fn tick(&self) -> u32 {
        match self {
            Self::PlayerKilled(e) => e.tick,
            Self::PlayerDamaged(e) => e.tick,
            Self::RoundStart(e) => e.tick,
            Self::RoundEnd(e) => e.tick,
            Self::BombPlanted(e) | Self::BombDefused(e) => e.tick,
            Self::ShotFired(e) => e.tick,
            Self::PlayerConnected(e) => e.tick,
        }
    }
}

/// Builds domain events in wire order.
///
/// Ticks never go backwards: an event from a frame stamped earlier than the
/// last emitted event is clamped to that event's tick.
#[derive(Debug, Default)]
pub struct EventExtractor {
    snapshot: Option<WorldSnapshot>,
    teams: HashMap<UserId, Team>,
    view_angles: HashMap<UserId, Vector3>,
    round: u32,
    last_tick: u32,
}

impl EventExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `snapshot` the reference state for all following events.
    pub fn observe_snapshot(&mut self, snapshot: WorldSnapshot) {
        for player in snapshot.players.iter() {
            if player.team != Team::Unassigned {
                self.teams.insert(player.user_id, player.team);
            }
        }
        self.snapshot = Some(snapshot);
    }

    pub fn observe_user_command(&mut self, command: &UserCommand) {
        self.view_angles.insert(
            UserId(command.user_id),
            Vector3::new(command.pitch, command.yaw, 0.0),
        );
    }

    pub fn last_snapshot(&self) -> Option<&WorldSnapshot> {
        self.snapshot.as_ref()
    }

    /// Last known team of every player seen in a snapshot.
    pub fn teams(&self) -> &HashMap<UserId, Team> {
        &self.teams
    }

    fn team_of(&self, user: UserId) -> Team {
        self.teams.get(&user).copied().unwrap_or(Team::Unassigned)
    }

    fn position_of(&self, user: UserId) -> Option<Vector3> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.player(user))
            .map(|p| p.position)
    }

    fn angles_of(&self, user: UserId) -> Option<Vector3> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.player(user))
            .map(|p| p.view_angles)
            .or_else(|| self.view_angles.get(&user).copied())
    }

    fn weapon_of(&self, user: UserId) -> Option<String> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.player(user))
            .and_then(|p| p.active_weapon.clone())
    }

    pub fn extract(&mut self, tick: u32, event: &GameEvent) -> Option<DomainEvent> {
        let tick = tick.max(self.last_tick);

        let domain_event = match event.name.as_str() {
            "player_death" => {
                let victim = UserId(event.get_i32("userid")?);
                let attacker = user_key(event, "attacker");

                if let Some(previous) = self.snapshot.as_ref().and_then(|s| s.player(victim)) {
                    if !previous.is_alive() {
                        tracing::debug!(tick, ?victim, "Death of a player that was not alive");
                    }
                }

                DomainEvent::PlayerKilled(PlayerKilled {
                    tick,
                    victim,
                    victim_team: self.team_of(victim),
                    attacker,
                    attacker_team: attacker
                        .map(|a| self.team_of(a))
                        .unwrap_or(Team::Unassigned),
                    assister: user_key(event, "assister"),
                    weapon: self.weapon_name(event, attacker),
                    headshot: event.get_bool("headshot").unwrap_or(false),
                    attacker_position: attacker.and_then(|a| self.position_of(a)),
                    attacker_angles: attacker.and_then(|a| self.angles_of(a)),
                    victim_position: self.position_of(victim),
                })
            }
            "player_hurt" => {
                let victim = UserId(event.get_i32("userid")?);
                let attacker = user_key(event, "attacker");

                DomainEvent::PlayerDamaged(PlayerDamaged {
                    tick,
                    victim,
                    victim_team: self.team_of(victim),
                    attacker,
                    attacker_team: attacker
                        .map(|a| self.team_of(a))
                        .unwrap_or(Team::Unassigned),
                    damage: non_negative(event.get_i32("dmg_health")),
                    armor_damage: non_negative(event.get_i32("dmg_armor")),
                    health: event.get_i32("health").unwrap_or(0),
                    weapon: self.weapon_name(event, attacker),
                    hit_group: HitGroup::from_number(event.get_i32("hitgroup").unwrap_or(0)),
                })
            }
            "round_start" => {
                self.round += 1;
                DomainEvent::RoundStart(RoundStart {
                    tick,
                    round: self.round,
                })
            }
            "round_end" => DomainEvent::RoundEnd(RoundEnd {
                tick,
                round: self.round,
                winner: Team::from_number(event.get_i32("winner").unwrap_or(0)),
                reason: event
                    .get_i32("reason")
                    .and_then(|r| ROUND_WIN_REASON.get(&r))
                    .cloned()
                    .unwrap_or(WinReason::StillInProgress),
            }),
            "bomb_planted" | "bomb_defused" => {
                let player = UserId(event.get_i32("userid")?);
                let bomb = BombEvent {
                    tick,
                    player,
                    team: self.team_of(player),
                    site: event.get_i32("site").unwrap_or(0),
                };

                if event.name == "bomb_planted" {
                    DomainEvent::BombPlanted(bomb)
                } else {
                    DomainEvent::BombDefused(bomb)
                }
            }
            "weapon_fire" => {
                let player = UserId(event.get_i32("userid")?);
                DomainEvent::ShotFired(ShotFired {
                    tick,
                    player,
                    weapon: self.weapon_name(event, Some(player)),
                })
            }
            "player_connect" => DomainEvent::PlayerConnected(PlayerConnected {
                tick,
                user_id: UserId(event.get_i32("userid")?),
                name: event.get_str("name").unwrap_or_default().to_owned(),
                steam_id: event.get_u64("xuid").unwrap_or(0),
            }),
            _ => return None,
        };

        self.last_tick = tick;
        Some(domain_event)
    }

    fn weapon_name(&self, event: &GameEvent, holder: Option<UserId>) -> String {
        event
            .get_str("weapon")
            .filter(|w| !w.is_empty())
            .map(|w| w.trim_start_matches("weapon_").to_owned())
            .or_else(|| holder.and_then(|h| self.weapon_of(h)))
            .unwrap_or_else(|| "unknown".to_owned())
    }
}

/// User ids below zero mark an absent player.
fn user_key(event: &GameEvent, key: &str) -> Option<UserId> {
    event.get_i32(key).filter(|id| *id >= 0).map(UserId)
}

fn non_negative(value: Option<i32>) -> u32 {
    value.map(|v| v.max(0) as u32).unwrap_or(0)
}
