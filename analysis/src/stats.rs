use std::collections::{BTreeMap, BTreeSet};

use demofile::{events::PlayerKilled, parser::Player, types, DomainEvent, Team, UserId};

/// Raw per player counters collected in one pass over the events.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlayerStats {
    pub kills: usize,
    pub deaths: usize,
    pub assists: usize,
    pub team_kills: usize,
    /// Kills by the side the player was on at the time
    pub ct_kills: usize,
    pub t_kills: usize,
    pub headshots: usize,
    pub shots_fired: usize,
    pub shots_hit: usize,
    pub damage_dealt: usize,
    pub damage_taken: usize,
    pub bomb_plants: usize,
    pub bomb_defuses: usize,
    pub objective_rounds: BTreeSet<u32>,
    pub weapon_kills: BTreeMap<String, usize>,
    pub utility_used: BTreeSet<String>,
    /// Kills per round number, `0` collects everything before the first round
    pub round_kills: BTreeMap<u32, usize>,
    /// `(tick, damage)` dealt to other players, in event order
    pub damage_ticks: Vec<(u32, u32)>,
    pub first_tick: Option<u32>,
    pub last_tick: u32,
}

impl PlayerStats {
    fn seen(&mut self, tick: u32) {
        if self.first_tick.is_none() {
            self.first_tick = Some(tick);
        }
        self.last_tick = self.last_tick.max(tick);
    }

    /// Hits over shots, `0` without any shots.
    pub fn accuracy(&self) -> f64 {
        if self.shots_fired == 0 {
            return 0.0;
        }
        self.shots_hit.min(self.shots_fired) as f64 / self.shots_fired as f64
    }

    pub fn headshot_percent(&self) -> f64 {
        if self.kills == 0 {
            return 0.0;
        }
        self.headshots as f64 / self.kills as f64 * 100.0
    }

    pub fn kd_ratio(&self) -> f64 {
        self.kills as f64 / self.deaths.max(1) as f64
    }

    /// Number of rounds with exactly `n` kills.
    pub fn multi_kills(&self, n: usize) -> usize {
        self.round_kills.values().filter(|k| **k == n).count()
    }

    /// HLTV 1.0 rating.
    pub fn rating(&self, rounds: usize) -> f64 {
        let rounds = rounds.max(1) as f64;

        let kill_rating = self.kills as f64 / rounds / 0.679;
        let survival_rating = 0.7 * (rounds - self.deaths as f64) / rounds / 0.317;

        // Rounds with 5 or more kills all count as aces
        let aces = self
            .round_kills
            .values()
            .filter(|k| **k >= 5)
            .count();
        let multi_kill_points = self.multi_kills(1)
            + 4 * self.multi_kills(2)
            + 9 * self.multi_kills(3)
            + 16 * self.multi_kills(4)
            + 25 * aces;
        let multi_kill_rating = multi_kill_points as f64 / rounds / 1.277;

        (kill_rating + survival_rating + multi_kill_rating) / 2.7
    }

    pub fn into_analysis(
        self,
        user_id: UserId,
        player: Option<&Player>,
        rounds: usize,
    ) -> common::PlayerAnalysis {
        let (name, steam_id, team) = match player {
            Some(p) => (
                p.name.clone(),
                if p.xuid == 0 {
                    String::new()
                } else {
                    p.xuid.to_string()
                },
                p.team,
            ),
            None => (format!("Player {}", user_id.0), String::new(), Team::Unassigned),
        };

        common::PlayerAnalysis {
            user_id: user_id.0,
            name,
            steam_id,
            team: team.name().to_owned(),
            kills: self.kills,
            deaths: self.deaths,
            assists: self.assists,
            team_kills: self.team_kills,
            ct_kills: self.ct_kills,
            t_kills: self.t_kills,
            headshots: self.headshots,
            hs_percent: self.headshot_percent(),
            shots_fired: self.shots_fired,
            shots_hit: self.shots_hit,
            accuracy: self.accuracy(),
            damage_dealt: self.damage_dealt,
            damage_taken: self.damage_taken,
            adr: self.damage_dealt as f64 / rounds.max(1) as f64,
            kd_ratio: self.kd_ratio(),
            rating: crate::round2(self.rating(rounds)),
            rounds_played: rounds,
            bomb_plants: self.bomb_plants,
            bomb_defuses: self.bomb_defuses,
            objective_rounds: self.objective_rounds.len(),
            weapon_kills: self.weapon_kills,
            utility_used: self.utility_used.into_iter().collect(),
        }
    }
}

/// Aggregates the counters of every player that shows up in at least one
/// event, a connect counts. Users only known from the userinfo table or the
/// final snapshot get no entry and so no assessment.
pub fn collect(events: &[DomainEvent]) -> BTreeMap<UserId, PlayerStats> {
    let mut stats: BTreeMap<UserId, PlayerStats> = BTreeMap::new();

    let mut round = 0;
    for event in events.iter() {
        match event {
            DomainEvent::RoundStart(start) => {
                round = start.round;
            }
            DomainEvent::RoundEnd(_) => {}
            DomainEvent::PlayerKilled(death) => {
                player_death(death, round, &mut stats);
            }
            DomainEvent::PlayerDamaged(hurt) => {
                let victim = stats.entry(hurt.victim).or_default();
                victim.seen(hurt.tick);
                victim.damage_taken += hurt.damage as usize;

                let attacker_id = match hurt.attacker.filter(|a| *a != hurt.victim) {
                    Some(a) => a,
                    None => continue,
                };
                let attacker = stats.entry(attacker_id).or_default();
                attacker.seen(hurt.tick);

                if !types::is_utility_damage(&hurt.weapon) {
                    attacker.shots_hit += 1;
                }

                if hurt.attacker_team.is_playing() && hurt.attacker_team == hurt.victim_team {
                    tracing::trace!(tick = hurt.tick, ?attacker_id, "Team damage");
                    continue;
                }

                attacker.damage_dealt += hurt.damage as usize;
                attacker.damage_ticks.push((hurt.tick, hurt.damage));
            }
            DomainEvent::BombPlanted(planted) => {
                let player = stats.entry(planted.player).or_default();
                player.seen(planted.tick);
                player.bomb_plants += 1;
                player.objective_rounds.insert(round);
            }
            DomainEvent::BombDefused(defused) => {
                let player = stats.entry(defused.player).or_default();
                player.seen(defused.tick);
                player.bomb_defuses += 1;
                player.objective_rounds.insert(round);
            }
            DomainEvent::ShotFired(shot) => {
                let player = stats.entry(shot.player).or_default();
                player.seen(shot.tick);

                if types::GRENADES.contains(&shot.weapon.as_str()) {
                    player.utility_used.insert(shot.weapon.clone());
                } else {
                    player.shots_fired += 1;
                }
            }
            DomainEvent::PlayerConnected(connected) => {
                stats.entry(connected.user_id).or_default();
            }
        };
    }

    stats
}

fn player_death(death: &PlayerKilled, round: u32, stats: &mut BTreeMap<UserId, PlayerStats>) {
    let victim = stats.entry(death.victim).or_default();
    victim.seen(death.tick);
    victim.deaths += 1;

    if let Some(assist_id) = death
        .assister
        .filter(|a| Some(*a) != death.attacker && *a != death.victim)
    {
        let assister = stats.entry(assist_id).or_default();
        assister.seen(death.tick);
        assister.assists += 1;
    }

    if death.is_suicide() {
        return;
    }
    let attacker_id = match death.attacker {
        Some(a) => a,
        None => return,
    };

    let attacker = stats.entry(attacker_id).or_default();
    attacker.seen(death.tick);
    attacker.kills += 1;
    *attacker.round_kills.entry(round).or_default() += 1;
    *attacker.weapon_kills.entry(death.weapon.clone()).or_default() += 1;

    if death.headshot {
        attacker.headshots += 1;
    }
    if death.is_team_kill() {
        attacker.team_kills += 1;
    }
    match death.attacker_team {
        Team::CounterTerrorist => attacker.ct_kills += 1,
        Team::Terrorist => attacker.t_kills += 1,
        Team::Spectator | Team::Unassigned => {}
    }
}
