use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAnalysis {
    pub user_id: i32,
    pub name: String,
    pub steam_id: String,
    pub team: String,
    pub kills: usize,
    pub deaths: usize,
    pub assists: usize,
    /// Included in `kills`
    pub team_kills: usize,
    /// Kills made while on the Counter-Terrorist side, included in `kills`
    pub ct_kills: usize,
    /// Kills made while on the Terrorist side, included in `kills`
    pub t_kills: usize,
    pub headshots: usize,
    pub hs_percent: f64,
    pub shots_fired: usize,
    pub shots_hit: usize,
    pub accuracy: f64,
    pub damage_dealt: usize,
    pub damage_taken: usize,
    pub adr: f64,
    pub kd_ratio: f64,
    pub rating: f64,
    pub rounds_played: usize,
    pub bomb_plants: usize,
    pub bomb_defuses: usize,
    pub objective_rounds: usize,
    pub weapon_kills: BTreeMap<String, usize>,
    pub utility_used: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudAssessment {
    pub user_id: i32,
    pub player_name: String,
    pub aim_score: f64,
    pub positioning_score: f64,
    pub reaction_score: f64,
    pub game_sense_score: f64,
    pub consistency_score: f64,
    pub fraud_probability: f64,
    pub risk_level: RiskLevel,
    pub suspicious_activities: Vec<SuspiciousActivity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 80.0 {
            Self::Critical
        } else if probability >= 60.0 {
            Self::High
        } else if probability >= 30.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousActivity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub confidence: f64,
    pub description: String,
    pub tick: u32,
    pub tick_start: u32,
    pub tick_end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    UnusualAccuracy,
    QuickFlickSpam,
    ConsistentLockOnHead,
    AbnormalReactionTime,
    DamageBurst,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoRound {
    pub number: u32,
    pub start_tick: u32,
    pub end_tick: u32,
    pub winner: String,
    pub reason: RoundWinReason,
    pub events: Vec<RoundEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoundWinReason {
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

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoundEvent {
    BombPlanted { player: String },
    BombDefused { player: String },
    Killed {
        attacker: String,
        died: String,
        headshot: bool,
    },
}
