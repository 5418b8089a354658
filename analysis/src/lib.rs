//! Turns a decoded demo into the analysis result handed to callers.
//!
//! [`parse`] is the whole pipeline from bytes to [`DemoAnalysisResult`],
//! [`analyse`] does the same starting from an already decoded demo.

use common::{DemoAnalysisResult, DemoRound, GameMode, TeamResult};
use demofile::{DemoError, Team, UserId};

pub mod fraud;
pub mod perround;
pub mod stats;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Suspicious activities reported per player
    pub max_activities: usize,
    pub burst_window_secs: f32,
    /// Damage that has to be exceeded within one burst window
    pub burst_damage_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_activities: 15,
            burst_window_secs: 2.0,
            burst_damage_threshold: 150,
        }
    }
}

pub fn parse(config: &Config, buf: &[u8]) -> Result<DemoAnalysisResult, DemoError> {
    let output = demofile::parse(buf)?;
    Ok(analyse(config, &output))
}

pub fn analyse(config: &Config, output: &demofile::Output) -> DemoAnalysisResult {
    let _guard = tracing::debug_span!("analyse", map = output.header.map_name()).entered();

    let rounds = perround::from_events(&output.events);
    let total_rounds = rounds.rounds.len();
    let tick_rate = output.header.tick_rate() as f64;

    let mut players = Vec::new();
    let mut fraud_assessments = Vec::new();
    for (id, stats) in stats::collect(&output.events) {
        let analysis = stats
            .clone()
            .into_analysis(id, output.player_info.get(&id), total_rounds);
        fraud_assessments.push(fraud::assess(config, &analysis, &stats, tick_rate));
        players.push(analysis);
    }

    let playing = output
        .final_state
        .players
        .iter()
        .filter(|p| p.team.is_playing())
        .count();
    let player_count = if playing > 0 {
        playing
    } else {
        output
            .player_info
            .values()
            .filter(|p| p.team.is_playing())
            .count()
    };

    let team_result = |team: Team| {
        let snapshot = output.final_state.team(team);
        TeamResult {
            name: snapshot
                .map(|t| t.clan_name.as_str())
                .filter(|name| !name.is_empty())
                .unwrap_or(team.name())
                .to_owned(),
            score: snapshot
                .map(|t| t.score.max(0) as u32)
                .unwrap_or_else(|| rounds.wins(team)),
        }
    };

    let duration_ticks = if output.header.total_ticks > 0 {
        output.header.total_ticks
    } else {
        output.last_tick
    };

    let player_name = |id: Option<UserId>| match id {
        Some(id) => output
            .player_info
            .get(&id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Player {}", id.0)),
        None => "World".to_owned(),
    };
    let demo_rounds = rounds
        .rounds
        .iter()
        .map(|round| DemoRound {
            number: round.number,
            start_tick: round.start,
            end_tick: round.end,
            winner: round.winner.name().to_owned(),
            reason: perround::win_reason(&round.winreason),
            events: round
                .events
                .iter()
                .map(|event| match event {
                    perround::RoundEvent::BombPlanted(p) => common::RoundEvent::BombPlanted {
                        player: player_name(Some(*p)),
                    },
                    perround::RoundEvent::BombDefused(p) => common::RoundEvent::BombDefused {
                        player: player_name(Some(*p)),
                    },
                    perround::RoundEvent::Kill {
                        attacker,
                        died,
                        headshot,
                    } => common::RoundEvent::Killed {
                        attacker: player_name(*attacker),
                        died: player_name(Some(*died)),
                        headshot: *headshot,
                    },
                })
                .collect(),
        })
        .collect();

    tracing::debug!(
        players = players.len(),
        rounds = total_rounds,
        events = output.events.len(),
        "Analysed demo"
    );

    DemoAnalysisResult {
        map_name: clean_map_name(output.header.map_name()),
        raw_map_name: output.header.map_name().to_owned(),
        server_name: output.header.server_name.clone(),
        game_mode: GameMode::from_player_count(player_count),
        team_a: team_result(Team::CounterTerrorist),
        team_b: team_result(Team::Terrorist),
        duration_seconds: round2(duration_ticks as f64 * output.header.tick_interval as f64),
        tick_rate: round2(tick_rate),
        total_rounds,
        players,
        fraud_assessments,
        rounds: demo_rounds,
        total_events_processed: output.events.len(),
        skipped_entities: output.skipped_entities.len(),
    }
}

/// Display name of a map, `de_dust2` becomes `Dust2`.
pub fn clean_map_name(raw: &str) -> String {
    let name = ["de_", "cs_", "aim_", "fy_"]
        .iter()
        .find_map(|prefix| raw.strip_prefix(prefix))
        .unwrap_or(raw);

    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_names() {
        assert_eq!("Dust2", clean_map_name("de_dust2"));
        assert_eq!("Office", clean_map_name("cs_office"));
        assert_eq!("Redline", clean_map_name("aim_redline"));
        assert_eq!("Iceworld", clean_map_name("fy_iceworld"));
        assert_eq!("Workshop_map", clean_map_name("workshop_map"));
        assert_eq!("", clean_map_name(""));
        assert_eq!("", clean_map_name("de_"));
    }

    #[test]
    fn rounding() {
        assert_eq!(55.67, round2(55.6666));
        assert_eq!(0.0, round2(0.0));
    }
}
