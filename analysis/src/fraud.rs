//! Heuristic scoring of how likely a player was cheating.
//!
//! Everything in here is a pure function of the aggregated stats, running
//! it twice on the same input gives the same assessment.

use common::{ActivityKind, FraudAssessment, PlayerAnalysis, RiskLevel, SuspiciousActivity};

use crate::{round2, stats::PlayerStats, Config};

const AIM_WEIGHT: f64 = 0.35;
const POSITIONING_WEIGHT: f64 = 0.15;
const REACTION_WEIGHT: f64 = 0.15;
const GAME_SENSE_WEIGHT: f64 = 0.15;
const CONSISTENCY_WEIGHT: f64 = 0.20;

/// Percentage points added per suspicious activity
const ACTIVITY_BONUS: f64 = 5.0;
const MAX_ACTIVITY_BONUS: f64 = 20.0;

/// A damage burst also has to span more than this many ticks
const MIN_BURST_TICKS: u32 = 10;
const BURST_CONFIDENCE_DAMAGE: f64 = 300.0;

/// Used when the header carries no usable tick interval
const DEFAULT_TICK_RATE: f64 = 64.0;

/// The five sub-scores, each in `[0, 1]`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub aim: f64,
    pub positioning: f64,
    pub reaction: f64,
    pub game_sense: f64,
    pub consistency: f64,
}

impl SubScores {
    pub fn compute(player: &PlayerAnalysis) -> Self {
        let kd = player.kd_ratio;
        let hs = player.hs_percent;

        let mut aim = 0.0;
        if player.accuracy > 0.5 {
            aim += 25.0;
        }
        if hs > 40.0 {
            aim += 20.0;
        }
        if kd > 3.0 {
            aim += 15.0;
        }
        if player.kills > player.deaths * 2 {
            aim += 10.0;
        }

        let mut positioning = 0.0;
        if kd > 2.5 {
            positioning += 15.0;
        }
        if player.damage_dealt > 2000 {
            positioning += 10.0;
        }
        if player.assists as f64 > player.kills as f64 * 0.5 {
            positioning -= 10.0;
        }

        let mut reaction = 0.0;
        if player.kills > 15 {
            reaction += 20.0;
        }
        if hs > 35.0 {
            reaction += 15.0;
        }

        let mut game_sense = 0.0;
        if kd > 2.0 {
            game_sense += 15.0;
        }
        if player.assists > 5 {
            game_sense -= 10.0;
        }

        let mut consistency = 0.0;
        if kd > 2.0 {
            consistency += 20.0;
        }
        if hs > 30.0 {
            consistency += 15.0;
        }

        let normalize = |points: f64| (points / 100.0).clamp(0.0, 1.0);
        Self {
            aim: normalize(aim),
            positioning: normalize(positioning),
            reaction: normalize(reaction),
            game_sense: normalize(game_sense),
            consistency: normalize(consistency),
        }
    }

    /// Weighted sum scaled to `[0, 100]`.
    pub fn weighted(&self) -> f64 {
        (self.aim * AIM_WEIGHT
            + self.positioning * POSITIONING_WEIGHT
            + self.reaction * REACTION_WEIGHT
            + self.game_sense * GAME_SENSE_WEIGHT
            + self.consistency * CONSISTENCY_WEIGHT)
            * 100.0
    }
}

/// Flags derived from the aggregated ratios, they span the ticks the player
/// was active in.
pub fn stat_flags(player: &PlayerAnalysis, first_tick: u32, last_tick: u32) -> Vec<SuspiciousActivity> {
    let activity = |kind, confidence: f64, description: String| SuspiciousActivity {
        kind,
        confidence: round2(confidence),
        description,
        tick: first_tick,
        tick_start: first_tick,
        tick_end: last_tick,
    };

    let mut flags = Vec::new();

    if player.accuracy > 0.55 {
        flags.push(activity(
            ActivityKind::UnusualAccuracy,
            ((player.accuracy - 0.3) * 100.0).min(95.0),
            format!("Abnormally high accuracy: {:.1}%", player.accuracy * 100.0),
        ));
    }
    if player.hs_percent > 45.0 {
        flags.push(activity(
            ActivityKind::QuickFlickSpam,
            ((player.hs_percent - 20.0) * 2.0).min(90.0),
            format!("Unusually high headshot rate: {:.1}%", player.hs_percent),
        ));
    }
    if player.kd_ratio > 3.0 {
        flags.push(activity(
            ActivityKind::ConsistentLockOnHead,
            ((player.kd_ratio - 1.5) * 15.0).min(85.0),
            format!("Exceptionally high K/D ratio: {:.2}", player.kd_ratio),
        ));
    }
    if player.rating > 1.3 {
        flags.push(activity(
            ActivityKind::AbnormalReactionTime,
            ((player.rating - 0.8) * 40.0).min(80.0),
            format!("Exceptional HLTV Rating: {:.2}", player.rating),
        ));
    }

    flags
}

/// Finds the first window in which the player dealt more than the threshold.
///
/// `damage_ticks` has to be in tick order, which the event stream guarantees.
pub fn damage_burst(
    damage_ticks: &[(u32, u32)],
    window_ticks: u32,
    threshold: u32,
) -> Option<SuspiciousActivity> {
    for (i, (start, _)) in damage_ticks
        .iter()
        .enumerate()
        .take(damage_ticks.len().saturating_sub(1))
    {
        let mut damage = 0u32;
        let mut end = *start;

        for (tick, dealt) in damage_ticks[i..]
            .iter()
            .take_while(|(tick, _)| tick - start < window_ticks)
        {
            damage = damage.saturating_add(*dealt);
            end = *tick;
        }

        if damage > threshold && end - start > MIN_BURST_TICKS {
            let confidence = (damage as f64 / BURST_CONFIDENCE_DAMAGE * 100.0).min(95.0);

            return Some(SuspiciousActivity {
                kind: ActivityKind::DamageBurst,
                confidence: round2(confidence),
                description: format!(
                    "High damage burst: {} damage in {} ticks",
                    damage,
                    end - start
                ),
                tick: *start,
                tick_start: *start,
                tick_end: end,
            });
        }
    }

    None
}

/// Combines the sub-scores with the number of flagged activities.
pub fn fraud_probability(scores: &SubScores, activities: usize) -> f64 {
    let bonus = (activities as f64 * ACTIVITY_BONUS).min(MAX_ACTIVITY_BONUS);
    round2((scores.weighted() + bonus).clamp(0.0, 100.0))
}

pub fn assess(
    config: &Config,
    player: &PlayerAnalysis,
    stats: &PlayerStats,
    tick_rate: f64,
) -> FraudAssessment {
    let scores = SubScores::compute(player);

    let first_tick = stats.first_tick.unwrap_or(0);
    let mut activities = stat_flags(player, first_tick, stats.last_tick.max(first_tick));

    let tick_rate = if tick_rate > 0.0 {
        tick_rate
    } else {
        DEFAULT_TICK_RATE
    };
    let window_ticks = ((config.burst_window_secs as f64 * tick_rate).round() as u32).max(1);
    if let Some(burst) = damage_burst(
        &stats.damage_ticks,
        window_ticks,
        config.burst_damage_threshold,
    ) {
        activities.push(burst);
    }

    let fraud_probability = fraud_probability(&scores, activities.len());

    activities.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.tick.cmp(&b.tick))
    });
    activities.truncate(config.max_activities);

    if !activities.is_empty() {
        tracing::debug!(
            user_id = player.user_id,
            fraud_probability,
            activities = activities.len(),
            "Flagged player"
        );
    }

    FraudAssessment {
        user_id: player.user_id,
        player_name: player.name.clone(),
        aim_score: round2(scores.aim),
        positioning_score: round2(scores.positioning),
        reaction_score: round2(scores.reaction),
        game_sense_score: round2(scores.game_sense),
        consistency_score: round2(scores.consistency),
        fraud_probability,
        risk_level: RiskLevel::from_probability(fraud_probability),
        suspicious_activities: activities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> PlayerAnalysis {
        PlayerAnalysis {
            user_id: 1,
            name: "tester".to_owned(),
            steam_id: String::new(),
            team: "Terrorists".to_owned(),
            kills: 0,
            deaths: 0,
            assists: 0,
            team_kills: 0,
            ct_kills: 0,
            t_kills: 0,
            headshots: 0,
            hs_percent: 0.0,
            shots_fired: 0,
            shots_hit: 0,
            accuracy: 0.0,
            damage_dealt: 0,
            damage_taken: 0,
            adr: 0.0,
            kd_ratio: 0.0,
            rating: 0.0,
            rounds_played: 1,
            bomb_plants: 0,
            bomb_defuses: 0,
            objective_rounds: 0,
            weapon_kills: Default::default(),
            utility_used: Vec::new(),
        }
    }

    #[test]
    fn idle_player_scores_nothing() {
        let scores = SubScores::compute(&player());

        assert_eq!(SubScores::default(), scores);
        assert_eq!(0.0, fraud_probability(&scores, 0));
        assert!(stat_flags(&player(), 0, 0).is_empty());
    }

    #[test]
    fn negative_points_clamp_to_zero() {
        let p = PlayerAnalysis {
            kills: 2,
            assists: 8,
            kd_ratio: 1.0,
            ..player()
        };

        let scores = SubScores::compute(&p);
        assert_eq!(0.0, scores.positioning);
        assert_eq!(0.0, scores.game_sense);
    }

    #[test]
    fn maxed_out_player() {
        let p = PlayerAnalysis {
            kills: 30,
            deaths: 2,
            headshots: 20,
            hs_percent: 66.67,
            accuracy: 0.8,
            damage_dealt: 3500,
            kd_ratio: 15.0,
            rating: 2.5,
            ..player()
        };

        let scores = SubScores::compute(&p);
        assert_eq!(0.7, scores.aim);
        assert_eq!(0.25, scores.positioning);
        assert_eq!(0.35, scores.reaction);
        assert_eq!(0.15, scores.game_sense);
        assert_eq!(0.35, scores.consistency);

        let flags = stat_flags(&p, 10, 500);
        let kinds: Vec<_> = flags.iter().map(|f| f.kind).collect();
        assert_eq!(
            vec![
                ActivityKind::UnusualAccuracy,
                ActivityKind::QuickFlickSpam,
                ActivityKind::ConsistentLockOnHead,
                ActivityKind::AbnormalReactionTime,
            ],
            kinds
        );
        let confidences: Vec<_> = flags.iter().map(|f| f.confidence).collect();
        assert_eq!(vec![50.0, 90.0, 85.0, 68.0], confidences);
        assert_eq!("Abnormally high accuracy: 80.0%", flags[0].description);
        assert!(flags.iter().all(|f| f.tick_start == 10 && f.tick_end == 500));

        // 24.5 + 3.75 + 5.25 + 2.25 + 7 = 42.75, plus 4 activities
        assert_eq!(62.75, fraud_probability(&scores, flags.len()));
    }

    #[test]
    fn activity_bonus_is_capped() {
        let scores = SubScores::default();

        assert_eq!(20.0, fraud_probability(&scores, 4));
        assert_eq!(20.0, fraud_probability(&scores, 12));
    }

    #[test]
    fn burst_in_window() {
        let damage = [(100, 27), (110, 100), (130, 40), (400, 100)];

        let burst = damage_burst(&damage, 128, 150).unwrap();
        assert_eq!(ActivityKind::DamageBurst, burst.kind);
        assert_eq!(100, burst.tick_start);
        assert_eq!(130, burst.tick_end);
        assert_eq!(55.67, burst.confidence);
        assert_eq!("High damage burst: 167 damage in 30 ticks", burst.description);
    }

    #[test]
    fn burst_needs_spread_and_damage() {
        // Enough damage but within a single tick span of 5
        assert_eq!(None, damage_burst(&[(100, 100), (105, 100), (300, 1)], 128, 150));
        // Spread out but below the threshold
        assert_eq!(None, damage_burst(&[(100, 50), (150, 50), (200, 50)], 128, 150));
        assert_eq!(None, damage_burst(&[(100, 500)], 128, 150));
        assert_eq!(None, damage_burst(&[], 128, 150));
    }

    #[test]
    fn burst_confidence_is_capped() {
        let burst = damage_burst(&[(0, 400), (20, 400), (30, 0)], 128, 150).unwrap();

        assert_eq!(95.0, burst.confidence);
    }

    #[test]
    fn activities_sorted_and_capped() {
        let config = Config {
            max_activities: 2,
            ..Default::default()
        };
        let p = PlayerAnalysis {
            kills: 30,
            deaths: 2,
            hs_percent: 66.67,
            accuracy: 0.8,
            kd_ratio: 15.0,
            rating: 2.5,
            ..player()
        };
        let stats = PlayerStats {
            first_tick: Some(64),
            last_tick: 900,
            ..Default::default()
        };

        let assessment = assess(&config, &p, &stats, 64.0);

        let kinds: Vec<_> = assessment
            .suspicious_activities
            .iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            vec![ActivityKind::QuickFlickSpam, ActivityKind::ConsistentLockOnHead],
            kinds
        );
        // The bonus counts every flag, not only the reported ones
        assert!(assessment.fraud_probability >= 20.0);
        assert_eq!(
            RiskLevel::from_probability(assessment.fraud_probability),
            assessment.risk_level
        );
    }
}
