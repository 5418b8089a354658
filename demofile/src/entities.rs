//! Tracks the networked entities of one decode pass and projects them into
//! per-tick [`WorldSnapshot`]s.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    message::{DeltaOp, EntityDelta},
    sendtables::{ClassRegistry, PropValue, ServerClass},
    types::{Team, UserId, Vector3, ITEM_DEFINITIONS},
    DemoError,
};

pub const PLAYER_PAWN_CLASS: &str = "CCSPlayerPawn";
pub const TEAM_CLASS: &str = "CCSTeam";

#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub id: u32,
    pub class_id: u32,
    pub class: String,
    props: BTreeMap<String, PropValue>,
}

impl EntityState {
    fn new(id: u32, class: &ServerClass) -> Self {
        Self {
            id,
            class_id: class.id,
            class: class.name.clone(),
            props: BTreeMap::new(),
        }
    }

    pub fn get_prop(&self, name: &str) -> Option<&PropValue> {
        self.props.get(name)
    }

    pub fn props(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.props.iter().map(|(n, v)| (n.as_str(), v))
    }

    fn is_weapon(&self) -> bool {
        self.class.starts_with("CWeapon") || self.get_prop("m_iItemDefinitionIndex").is_some()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlayerSnapshot {
    pub entity_id: u32,
    pub user_id: UserId,
    pub team: Team,
    pub health: i32,
    pub position: Vector3,
    pub view_angles: Vector3,
    pub active_weapon: Option<String>,
}

impl PlayerSnapshot {
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TeamSnapshot {
    pub team: Team,
    pub name: String,
    pub clan_name: String,
    pub score: i32,
}

/// Read-only view of the tracked entities at one tick.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct WorldSnapshot {
    pub tick: u32,
    /// Sorted by user id
    pub players: Vec<PlayerSnapshot>,
    /// Sorted by team
    pub teams: Vec<TeamSnapshot>,
}

impl WorldSnapshot {
    pub fn player(&self, user_id: UserId) -> Option<&PlayerSnapshot> {
        self.players
            .binary_search_by_key(&user_id, |p| p.user_id)
            .ok()
            .map(|i| &self.players[i])
    }

    pub fn team(&self, team: Team) -> Option<&TeamSnapshot> {
        self.teams.iter().find(|t| t.team == team)
    }
}

/// Owns the entity table for a whole decode pass.
#[derive(Debug, Default)]
pub struct Reconstructor {
    classes: ClassRegistry,
    entities: BTreeMap<u32, EntityState>,
    /// Entities whose class could not be resolved, their updates are dropped
    skipped: BTreeSet<u32>,
}

impl Reconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_classes(&mut self, classes: impl IntoIterator<Item = ServerClass>) {
        self.classes.register(classes);
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn entity(&self, id: u32) -> Option<&EntityState> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    /// Applies one delta to the entity table.
    ///
    /// Returns [`DemoError::UnknownEntityClass`] if the delta creates an
    /// entity of a class that was never announced. The entity is then
    /// ignored until it is deleted or created again.
    pub fn apply(&mut self, delta: &EntityDelta) -> Result<(), DemoError> {
        let entity_id = delta.entity_id;

        match delta.op {
            DeltaOp::Delete => {
                self.entities.remove(&entity_id);
                self.skipped.remove(&entity_id);
                return Ok(());
            }
            DeltaOp::Create { class_id } => {
                let class = match self.classes.get(class_id) {
                    Some(c) => c,
                    None => {
                        self.entities.remove(&entity_id);
                        self.skipped.insert(entity_id);
                        return Err(DemoError::UnknownEntityClass {
                            entity_id,
                            class_id,
                        });
                    }
                };

                self.skipped.remove(&entity_id);
                self.entities
                    .insert(entity_id, EntityState::new(entity_id, class));
            }
            DeltaOp::Update => {
                if self.skipped.contains(&entity_id) {
                    tracing::trace!(entity_id, "Dropping update for skipped entity");
                    return Ok(());
                }
            }
        }

        let entity = match self.entities.get_mut(&entity_id) {
            Some(e) => e,
            None => {
                tracing::warn!(entity_id, "Update for entity that was never created");
                return Ok(());
            }
        };
        let class = match self.classes.get(entity.class_id) {
            Some(c) => c,
            None => return Ok(()),
        };

        for change in delta.changes.iter() {
            let prop = match class.props.get(change.index as usize) {
                Some(p) => p,
                None => {
                    tracing::warn!(
                        entity_id,
                        class = %class.name,
                        index = change.index,
                        "Property index out of range"
                    );
                    continue;
                }
            };

            let value = prop.kind.decode(&change.data)?;
            tracing::trace!(entity_id, prop = %prop.name, ?value, "Property");

            // Only transmitted fields change, everything else keeps its value
            entity.props.insert(prop.name.clone(), value);
        }

        Ok(())
    }

    /// Projects the current entity table into a snapshot, does not modify
    /// any state.
    pub fn snapshot(&self, tick: u32) -> WorldSnapshot {
        let mut players: Vec<PlayerSnapshot> = self
            .entities
            .values()
            .filter(|e| e.class == PLAYER_PAWN_CLASS)
            .filter_map(|pawn| self.player_snapshot(pawn))
            .collect();
        players.sort_by_key(|p| p.user_id);

        let mut teams: Vec<TeamSnapshot> = self
            .entities
            .values()
            .filter(|e| e.class == TEAM_CLASS)
            .map(|entity| TeamSnapshot {
                team: Team::from_number(
                    entity
                        .get_prop("m_iTeamNum")
                        .and_then(|v| v.as_i32())
                        .unwrap_or(0),
                ),
                name: entity
                    .get_prop("m_szTeamname")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_owned(),
                clan_name: entity
                    .get_prop("m_szClanTeamname")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_owned(),
                score: entity
                    .get_prop("m_iScore")
                    .and_then(|v| v.as_i32())
                    .unwrap_or(0),
            })
            .collect();
        teams.sort_by_key(|t| t.team);

        WorldSnapshot {
            tick,
            players,
            teams,
        }
    }

    fn player_snapshot(&self, pawn: &EntityState) -> Option<PlayerSnapshot> {
        let user_id = pawn.get_prop("m_iPlayerSlot")?.as_i32()?;

        let active_weapon = pawn
            .get_prop("m_hActiveWeapon")
            .and_then(|v| v.as_u32())
            .and_then(|id| self.entities.get(&id))
            .filter(|weapon| weapon.is_weapon())
            .and_then(|weapon| weapon.get_prop("m_iItemDefinitionIndex"))
            .and_then(|v| v.as_i32())
            .and_then(|index| ITEM_DEFINITIONS.get(&index))
            .map(|name| (*name).to_owned());

        Some(PlayerSnapshot {
            entity_id: pawn.id,
            user_id: UserId(user_id),
            team: Team::from_number(
                pawn.get_prop("m_iTeamNum")
                    .and_then(|v| v.as_i32())
                    .unwrap_or(0),
            ),
            health: pawn
                .get_prop("m_iHealth")
                .and_then(|v| v.as_i32())
                .unwrap_or(0),
            position: pawn
                .get_prop("m_vecOrigin")
                .and_then(|v| v.as_vector())
                .map(Vector3::from)
                .unwrap_or_default(),
            view_angles: pawn
                .get_prop("m_angEyeAngles")
                .and_then(|v| v.as_vector())
                .map(Vector3::from)
                .unwrap_or_default(),
            active_weapon,
        })
    }
}
