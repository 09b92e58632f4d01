//! Drawing loop: ask the capability, validate, commit, pace, repeat.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use drawboard_providers::DrawingCapability;

use crate::manager::{AgentSessionManager, Commit};

/// Run one session until it is stopped or its capability fails.
///
/// A capability call in flight is not interrupted by a stop. Its result is
/// discarded once it returns, and every commit is checked against `run_id`
/// so nothing from a finished run reaches the canvas.
pub async fn run_session(
    manager: Arc<AgentSessionManager>,
    agent_id: String,
    run_id: u64,
    capability: Arc<dyn DrawingCapability>,
    cancel: CancellationToken,
) {
    let settings = manager.settings().clone();
    let provider_cooldown = settings.provider_cooldown(capability.id());
    let mut drawn: u64 = 0;

    info!(agent_id = %agent_id, run_id, "drawing loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let Some(ctx) = manager.next_context(&agent_id, run_id) else {
            break;
        };

        let action = match capability.next_action(&ctx).await {
            Ok(action) => action,
            Err(e) => {
                manager.fail(&agent_id, run_id, &e);
                break;
            }
        };
        if cancel.is_cancelled() {
            break;
        }

        let mut erasing = false;
        match action.validate() {
            Err(e) => {
                debug!(agent_id = %agent_id, error = %e, "dropping invalid action");
            }
            Ok(()) => {
                erasing = action.is_eraser();
                let parts = if settings.segment_paths {
                    action.into_segments()
                } else {
                    vec![action]
                };
                let count = parts.len();
                for (i, part) in parts.into_iter().enumerate() {
                    match manager.commit(&agent_id, run_id, part) {
                        Commit::Drawn(event) => {
                            drawn += 1;
                            debug!(
                                agent_id = %agent_id,
                                seq = event.sequence_index,
                                kind = event.action.kind(),
                                "stroke committed"
                            );
                        }
                        Commit::Rejected(e) => {
                            debug!(agent_id = %agent_id, error = %e, "commit rejected");
                        }
                        Commit::Stopped => {
                            info!(agent_id = %agent_id, run_id, drawn, "drawing loop ended");
                            return;
                        }
                    }
                    if i + 1 < count && !pause(&cancel, settings.point_delay).await {
                        break;
                    }
                }
            }
        }

        let mut wait = settings.stroke_interval + provider_cooldown;
        if erasing {
            wait += settings.erase_cooldown;
        }
        if !pause(&cancel, wait).await {
            break;
        }
    }

    info!(agent_id = %agent_id, run_id, drawn, "drawing loop ended");
}

/// Sleep for `duration` unless cancelled first. Returns false on cancel.
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
