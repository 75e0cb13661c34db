//! Per-station background worker.
//!
//! The worker owns the station's ticker subscriptions and runs every feed
//! and slide cycle, so a slow fragment fetch only ever delays its own
//! station. Manual triggers reach it through [`WorkerCommand`]s.

use super::manager::StreamManagerInner;
use crate::ticker::TickSubscription;
use anyhow::{anyhow, Result};
use std::sync::Weak;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Commands sent to the background worker.
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    Feed { done: oneshot::Sender<()> },
    Slide { done: oneshot::Sender<usize> },
}

/// Handle to the spawned worker task.
pub(crate) struct StreamWorker {
    slug: String,
    join_handle: JoinHandle<()>,
}

impl StreamWorker {
    pub(crate) fn spawn(
        manager: Weak<StreamManagerInner>,
        slug: String,
        mut feeder: TickSubscription,
        mut slider: TickSubscription,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Sender<WorkerCommand>) {
        let (tx, mut rx) = mpsc::channel(16);
        let station = slug.clone();

        let join_handle = tokio::spawn(async move {
            info!(station = %station, "Starting stream worker");

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    tick = feeder.next_tick() => {
                        let Some(timestamp) = tick else {
                            warn!(station = %station, "Feeder ticker closed");
                            break;
                        };
                        let Some(manager) = manager.upgrade() else { break };
                        debug!(station = %station, timestamp, "Feeder tick");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = manager.feed_cycle() => {}
                        }
                    }
                    tick = slider.next_tick() => {
                        if tick.is_none() {
                            warn!(station = %station, "Slider ticker closed");
                            break;
                        }
                        let Some(manager) = manager.upgrade() else { break };
                        manager.slide();
                    }
                    cmd = rx.recv() => {
                        let Some(cmd) = cmd else { break };
                        let Some(manager) = manager.upgrade() else { break };
                        match cmd {
                            WorkerCommand::Feed { done } => {
                                tokio::select! {
                                    _ = cancel.cancelled() => break,
                                    _ = manager.feed_cycle() => {}
                                }
                                let _ = done.send(());
                            }
                            WorkerCommand::Slide { done } => {
                                let _ = done.send(manager.slide());
                            }
                        }
                    }
                }
            }

            info!(station = %station, "Stream worker stopped");
        });

        (Self { slug, join_handle }, tx)
    }

    pub(crate) async fn wait(self) -> Result<()> {
        if let Err(err) = self.join_handle.await {
            if err.is_cancelled() {
                warn!(station = %self.slug, "Stream worker cancelled: {err}");
                return Ok(());
            }
            return Err(anyhow!("Stream worker join error: {}", err));
        }
        Ok(())
    }
}
