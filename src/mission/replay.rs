//! Playing back a recorded mission.
//!
//! Blocks are emitted at the pace of their mission time, scaled by the
//! replay speed. A speed of zero pauses the replay.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::mission::{LogBlock, SECTOR_SIZE, SuperBlock, parse_sector};
use crate::protocol::transmission::ParsedBlock;

/// Output of a running replay.
///
/// Every event carries the id of the replay that produced it, so events
/// still queued from a stopped replay can be told apart.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEvent {
    /// A block from the recording.
    Block { replay: u64, block: ParsedBlock },
    /// The end of the recording was reached.
    Finished { replay: u64 },
}

impl ReplayEvent {
    /// Id of the replay that sent this event.
    #[must_use]
    pub const fn replay(&self) -> u64 {
        match self {
            Self::Block { replay, .. } | Self::Finished { replay } => *replay,
        }
    }
}

/// Handle to a running replay task.
#[derive(Debug)]
pub struct ReplayHandle {
    id: u64,
    speed: watch::Sender<f64>,
    task: JoinHandle<()>,
}

impl ReplayHandle {
    /// Starts replaying the mission at `path`. Events are tagged with `id`.
    #[must_use]
    pub fn spawn(id: u64, path: PathBuf, speed: f64, events: mpsc::Sender<ReplayEvent>) -> Self {
        let (speed_tx, speed_rx) = watch::channel(speed);
        let task = tokio::spawn(async move {
            if let Err(e) = run(id, &path, speed_rx, &events).await {
                tracing::error!("replay of {} failed: {}", path.display(), e);
            }
            let _ = events.send(ReplayEvent::Finished { replay: id }).await;
        });
        Self {
            id,
            speed: speed_tx,
            task,
        }
    }

    /// Id carried by this replay's events.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Changes the replay speed.
    pub fn set_speed(&self, speed: f64) {
        self.speed.send_replace(speed);
    }

    /// Current replay speed.
    #[must_use]
    pub fn speed(&self) -> f64 {
        *self.speed.borrow()
    }

    /// Returns true once the replay has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the replay.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for ReplayHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    id: u64,
    path: &Path,
    mut speed: watch::Receiver<f64>,
    events: &mpsc::Sender<ReplayEvent>,
) -> Result<()> {
    let contents = tokio::fs::read(path).await?;
    let super_block = SuperBlock::parse(&contents).map_err(|reason| Error::MissionFile {
        path: path.to_path_buf(),
        reason,
    })?;

    let mut last_time: Option<u32> = None;

    for flight in super_block.flights.iter().filter(|f| f.is_valid()) {
        let first = flight.first_block as usize;
        let last = first + flight.num_blocks as usize;

        for index in first..last {
            let start = index * SECTOR_SIZE;
            let Some(sector) = contents.get(start..start + SECTOR_SIZE) else {
                tracing::warn!("{} ends before sector {}", path.display(), index);
                return Ok(());
            };

            let (blocks, errors) = parse_sector(sector);
            for error in errors {
                tracing::debug!("sector {}: {}", index, error);
            }

            for block in blocks {
                let LogBlock::Telemetry(block) = block else {
                    continue;
                };

                if let Some(time) = block.mission_time() {
                    if let Some(previous) = last_time {
                        let delta = u64::from(time.saturating_sub(previous));
                        if !wait(Duration::from_millis(delta), &mut speed).await {
                            return Ok(());
                        }
                    } else if !wait(Duration::ZERO, &mut speed).await {
                        return Ok(());
                    }
                    last_time = Some(last_time.map_or(time, |t| t.max(time)));
                }

                let event = ReplayEvent::Block { replay: id, block };
                if events.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}

/// Waits `mission_delta` of mission time at the current speed.
///
/// Speed changes during the wait apply to the remaining mission time.
/// Returns false if the handle was dropped.
async fn wait(mission_delta: Duration, speed: &mut watch::Receiver<f64>) -> bool {
    let mut remaining = mission_delta;

    loop {
        let current = *speed.borrow_and_update();
        if current <= 0.0 || current.is_nan() {
            if speed.changed().await.is_err() {
                return false;
            }
            continue;
        }
        if remaining.is_zero() {
            return true;
        }

        let started = Instant::now();
        tokio::select! {
            () = sleep_scaled(remaining, 1.0 / current) => return true,
            changed = speed.changed() => {
                if changed.is_err() {
                    return false;
                }
                let elapsed = scale(started.elapsed(), current).unwrap_or(Duration::MAX);
                remaining = remaining.saturating_sub(elapsed);
            }
        }
    }
}

/// `duration * factor`, or `None` if that is not a valid duration.
fn scale(duration: Duration, factor: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).ok()
}

/// Sleeps for `duration * factor`. A wait too long to represent never ends.
async fn sleep_scaled(duration: Duration, factor: f64) {
    match scale(duration, factor) {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
