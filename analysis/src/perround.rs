use demofile::{events::WinReason, DomainEvent, Team, UserId};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Round {
    pub number: u32,
    pub winreason: WinReason,
    pub winner: Team,
    pub start: u32,
    /// `u32::MAX` while the round never ended
    pub end: u32,
    pub events: Vec<RoundEvent>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RoundEvent {
    BombPlanted(UserId),
    BombDefused(UserId),
    Kill {
        attacker: Option<UserId>,
        died: UserId,
        headshot: bool,
    },
}

#[derive(Debug, Default, PartialEq)]
pub struct PerRound {
    pub rounds: Vec<Round>,
}

impl PerRound {
    /// Number of rounds the team won according to the round end events.
    pub fn wins(&self, team: Team) -> u32 {
        self.rounds.iter().filter(|r| r.winner == team).count() as u32
    }

    /// Players with a plant or defuse in the round, per round.
    pub fn objective_players(&self) -> impl Iterator<Item = (u32, UserId)> + '_ {
        self.rounds.iter().flat_map(|round| {
            round.events.iter().filter_map(move |e| match e {
                RoundEvent::BombPlanted(p) | RoundEvent::BombDefused(p) => Some((round.number, *p)),
                RoundEvent::Kill { .. } => None,
            })
        })
    }
}

pub fn parse(buf: &[u8]) -> Result<PerRound, demofile::DemoError> {
    let output = demofile::parse(buf)?;
    Ok(from_events(&output.events))
}

/// Groups the events into rounds.
///
/// Everything before the first round start is warmup and ignored, events
/// between a round end and the next start still count for the ended round.
pub fn from_events(events: &[DomainEvent]) -> PerRound {
    let mut rounds: Vec<Round> = Vec::new();

    for event in events.iter() {
        match event {
            DomainEvent::RoundStart(start) => {
                rounds.push(Round {
                    number: rounds.len() as u32 + 1,
                    winreason: WinReason::StillInProgress,
                    winner: Team::Unassigned,
                    start: start.tick,
                    end: u32::MAX,
                    events: Vec::new(),
                });
            }
            DomainEvent::RoundEnd(end) => {
                if !matches!(rounds.last(), Some(r) if r.end == u32::MAX) {
                    tracing::debug!(tick = end.tick, "Round end without a round start");
                    rounds.push(Round {
                        number: rounds.len() as u32 + 1,
                        winreason: WinReason::StillInProgress,
                        winner: Team::Unassigned,
                        start: rounds.last().map(|r| r.end).unwrap_or(0),
                        end: u32::MAX,
                        events: Vec::new(),
                    });
                }
                let round = match rounds.last_mut() {
                    Some(r) => r,
                    None => continue,
                };

                round.end = end.tick;
                round.winner = end.winner;
                round.winreason = end.reason.clone();
            }
            DomainEvent::BombPlanted(planted) => {
                if let Some(round) = rounds.last_mut() {
                    round.events.push(RoundEvent::BombPlanted(planted.player));
                }
            }
            DomainEvent::BombDefused(defused) => {
                if let Some(round) = rounds.last_mut() {
                    round.events.push(RoundEvent::BombDefused(defused.player));
                }
            }
            DomainEvent::PlayerKilled(death) => {
                if let Some(round) = rounds.last_mut() {
                    round.events.push(RoundEvent::Kill {
                        attacker: death.attacker,
                        died: death.victim,
                        headshot: death.headshot,
                    });
                }
            }
            _ => {}
        };
    }

    PerRound { rounds }
}

pub(crate) fn win_reason(reason: &WinReason) -> common::RoundWinReason {
    use common::RoundWinReason as R;

    match reason {
        WinReason::StillInProgress => R::StillInProgress,
        WinReason::BombExploded => R::BombExploded,
        WinReason::VipEscaped => R::VipEscaped,
        WinReason::VipKilled => R::VipKilled,
        WinReason::TSaved => R::TSaved,
        WinReason::CtStoppedEscape => R::CtStoppedEscape,
        WinReason::RoundEndReasonTerroristsStopped => R::RoundEndReasonTerroristsStopped,
        WinReason::BombDefused => R::BombDefused,
        WinReason::TKilled => R::TKilled,
        WinReason::CTKilled => R::CTKilled,
        WinReason::Draw => R::Draw,
        WinReason::HostageRescued => R::HostageRescued,
        WinReason::TimeRanOut => R::TimeRanOut,
        WinReason::RoundEndReasonHostagesNotRescued => R::RoundEndReasonHostagesNotRescued,
        WinReason::TerroristsNotEscaped => R::TerroristsNotEscaped,
        WinReason::VipNotEscaped => R::VipNotEscaped,
        WinReason::GameStart => R::GameStart,
        WinReason::TSurrender => R::TSurrender,
        WinReason::CTSurrender => R::CTSurrender,
        WinReason::TPlanted => R::TPlanted,
        WinReason::CTReachedHostage => R::CTReachedHostage,
    }
}
