pub mod demo_analysis;

pub use demo_analysis::{
    ActivityKind, DemoRound, FraudAssessment, PlayerAnalysis, RiskLevel, RoundEvent,
    RoundWinReason, SuspiciousActivity,
};

/// Everything one analysis run hands back to its caller.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoAnalysisResult {
    /// Display name, `de_dust2` becomes `Dust2`
    pub map_name: String,
    pub raw_map_name: String,
    pub server_name: String,
    pub game_mode: GameMode,
    /// Counter-Terrorists
    pub team_a: TeamResult,
    /// Terrorists
    pub team_b: TeamResult,
    pub duration_seconds: f64,
    pub tick_rate: f64,
    pub total_rounds: usize,
    pub players: Vec<PlayerAnalysis>,
    pub fraud_assessments: Vec<FraudAssessment>,
    pub rounds: Vec<DemoRound>,
    pub total_events_processed: usize,
    pub skipped_entities: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamResult {
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GameMode {
    #[serde(rename = "5v5")]
    Competitive,
    #[serde(rename = "wingman")]
    Wingman,
    #[serde(rename = "deathmatch")]
    Deathmatch,
    #[serde(rename = "community")]
    Community,
    #[serde(rename = "other")]
    Other,
}

impl GameMode {
    /// Derived from the number of players at the end of the demo.
    pub fn from_player_count(count: usize) -> Self {
        match count {
            0 => Self::Other,
            1..=4 => Self::Wingman,
            5..=8 => Self::Deathmatch,
            9..=10 => Self::Competitive,
            _ => Self::Community,
        }
    }
}
