//! Runs the demo analysis over a batch of files.
//!
//! Every demo is decoded on its own blocking worker with isolated state, the
//! caller owns the deadline for each of them.

use std::time::Duration;

pub mod storage;

use storage::{AnalysisInput, DemoStorage};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl FileReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok { .. })
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok {
        result: Box<common::DemoAnalysisResult>,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The file could not be loaded
    Io,
    Corrupt,
    UnsupportedVersion,
    Timeout,
    /// The worker itself died
    Internal,
}

impl Outcome {
    fn failed(kind: FailureKind, message: impl ToString) -> Self {
        Self::Failed {
            kind,
            message: message.to_string(),
        }
    }
}

impl From<Result<common::DemoAnalysisResult, demofile::DemoError>> for Outcome {
    fn from(value: Result<common::DemoAnalysisResult, demofile::DemoError>) -> Self {
        match value {
            Ok(result) => Self::Ok {
                result: Box::new(result),
            },
            Err(e) if e.is_unsupported_version() => Self::failed(FailureKind::UnsupportedVersion, e),
            Err(e) => Self::failed(FailureKind::Corrupt, e),
        }
    }
}

/// Loads and analyses one demo, discarding the decode once `timeout` passed.
#[tracing::instrument(skip(storage, config))]
pub async fn analyse_one(
    name: String,
    storage: Box<dyn DemoStorage>,
    config: analysis::Config,
    timeout: Option<Duration>,
) -> FileReport {
    let input = match AnalysisInput::load(name.clone(), storage.as_ref()).await {
        Ok(i) => i,
        Err(e) => {
            tracing::error!("Loading demo: {:?}", e);
            return FileReport {
                name,
                outcome: Outcome::failed(FailureKind::Io, format!("{:#}", e)),
            };
        }
    };

    let worker = tokio::task::spawn_blocking(move || {
        let result = analysis::parse(&config, input.data());
        tracing::debug!(name = %input.name, ok = result.is_ok(), "Finished analysis");
        result
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, worker).await {
            Ok(joined) => joined,
            Err(_) => {
                // The blocking worker can not be interrupted, its result is dropped
                tracing::warn!(?limit, "Analysis timed out");
                return FileReport {
                    name,
                    outcome: Outcome::failed(
                        FailureKind::Timeout,
                        format!("analysis took longer than {:?}", limit),
                    ),
                };
            }
        },
        None => worker.await,
    };

    let outcome = match joined {
        Ok(result) => Outcome::from(result),
        Err(e) => {
            tracing::error!("Analysis worker: {:?}", e);
            Outcome::failed(FailureKind::Internal, e)
        }
    };

    if let Outcome::Failed { kind, message } = &outcome {
        tracing::warn!(?kind, "Analysis failed: {}", message);
    }

    FileReport { name, outcome }
}

/// Analyses all demos concurrently, the reports keep the order of `names`.
pub async fn analyse_all(
    names: Vec<String>,
    storage: &dyn DemoStorage,
    config: &analysis::Config,
    timeout: Option<Duration>,
) -> Vec<FileReport> {
    let tasks = names
        .into_iter()
        .map(|name| analyse_one(name, storage.duplicate(), config.clone(), timeout));

    futures::future::join_all(tasks).await
}
