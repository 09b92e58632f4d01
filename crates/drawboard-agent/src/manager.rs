//! Agent Session Manager.
//!
//! Per agent id the lifecycle is `Registered -> Running -> Stopped`, and
//! `Running` may be entered again after a stop. Every transition that viewers
//! can observe runs inside [`ConnectionRegistry::publish`], so the change and
//! its broadcast are one step relative to other broadcasts and to viewer
//! handshakes.
//!
//! Each run gets a fresh `run_id`. The drawing loop presents it on every
//! commit and the commit is refused once the session it belongs to is gone,
//! so a loop that is still finishing a provider call after `stop` can never
//! write to the canvas.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use drawboard_canvas::{
    CanvasEvent, ConnectionRegistry, CursorInfo, DrawingAction, EventLog, Point, ServerMessage,
    ValidationError,
};
use drawboard_providers::{DrawingCapability, ProviderError, StrokeContext};

use crate::runtime;
use crate::session::{
    ActiveSession, LoopSettings, RegisteredAgent, SessionError, SessionInfo, new_agent_id,
    random_cursor,
};

/// Outcome of committing one action from a drawing loop.
#[derive(Debug)]
pub(crate) enum Commit {
    Drawn(CanvasEvent),
    Rejected(ValidationError),
    /// The run this loop belongs to has ended.
    Stopped,
}

pub struct AgentSessionManager {
    log: Arc<EventLog>,
    viewers: Arc<ConnectionRegistry>,
    settings: LoopSettings,
    registered: Mutex<HashMap<String, RegisteredAgent>>,
    sessions: Mutex<HashMap<String, ActiveSession>>,
    next_run: AtomicU64,
    failures: AtomicU64,
}

impl AgentSessionManager {
    pub fn new(log: Arc<EventLog>, viewers: Arc<ConnectionRegistry>, settings: LoopSettings) -> Self {
        Self {
            log,
            viewers,
            settings,
            registered: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            next_run: AtomicU64::new(1),
            failures: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Issue a fresh agent id for `name`.
    pub fn register(&self, name: &str) -> RegisteredAgent {
        let name = match name.trim() {
            "" => "AI",
            trimmed => trimmed,
        };
        let agent = RegisteredAgent {
            agent_id: new_agent_id(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        lock(&self.registered).insert(agent.agent_id.clone(), agent.clone());
        info!(agent_id = %agent.agent_id, name = %agent.name, "agent registered");
        agent
    }

    pub fn registered(&self, agent_id: &str) -> Option<RegisteredAgent> {
        lock(&self.registered).get(agent_id).cloned()
    }

    /// Start a drawing session for a registered agent and spawn its loop.
    pub fn start(
        self: &Arc<Self>,
        agent_id: &str,
        capability: Arc<dyn DrawingCapability>,
    ) -> Result<SessionInfo, SessionError> {
        let agent = self
            .registered(agent_id)
            .ok_or_else(|| SessionError::UnknownAgent(agent_id.to_string()))?;
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let cursor = random_cursor();

        let info = self.viewers.publish(|| {
            let mut sessions = lock(&self.sessions);
            if sessions.contains_key(agent_id) {
                return (vec![], Err(SessionError::AlreadyRunning(agent_id.to_string())));
            }
            let session = ActiveSession {
                display_name: agent.name.clone(),
                provider_id: capability.id().to_string(),
                cursor,
                cancel: cancel.clone(),
                pending: None,
                run_id,
                started_at: Utc::now(),
                task: None,
            };
            let info = session.info(agent_id);
            sessions.insert(agent_id.to_string(), session);
            (vec![cursor_message(agent_id, &agent.name, cursor)], Ok(info))
        })?;

        info!(agent_id, name = %agent.name, provider = capability.id(), run_id, "session started");
        let task = tokio::spawn(runtime::run_session(
            Arc::clone(self),
            agent_id.to_string(),
            run_id,
            capability,
            cancel,
        ));
        if let Some(session) = lock(&self.sessions).get_mut(agent_id) {
            if session.run_id == run_id {
                session.task = Some(task);
            }
        }
        Ok(info)
    }

    /// Stop a running session. Stopping an agent that is not running does
    /// nothing and broadcasts nothing.
    pub fn stop(&self, agent_id: &str) -> bool {
        self.viewers.publish(|| {
            let removed = lock(&self.sessions).remove(agent_id);
            match removed {
                Some(session) => {
                    session.cancel.cancel();
                    info!(agent_id, name = %session.display_name, "session stopped");
                    (
                        vec![ServerMessage::CursorRemove {
                            ai_ids: vec![agent_id.to_string()],
                        }],
                        true,
                    )
                }
                None => (vec![], false),
            }
        })
    }

    /// Stop every session whose display name is `name`. Returns the stopped ids.
    pub fn stop_by_name(&self, name: &str) -> Vec<String> {
        self.viewers.publish(|| {
            let mut sessions = lock(&self.sessions);
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| s.display_name == name)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                if let Some(session) = sessions.remove(id) {
                    session.cancel.cancel();
                }
            }
            if ids.is_empty() {
                return (vec![], ids);
            }
            info!(name, count = ids.len(), "sessions stopped by name");
            (
                vec![ServerMessage::CursorRemove {
                    ai_ids: ids.clone(),
                }],
                ids,
            )
        })
    }

    /// Stop everything and abort the loops. Used on shutdown.
    pub fn stop_all(&self) -> usize {
        let stopped = self.viewers.publish(|| {
            let drained: Vec<(String, ActiveSession)> = lock(&self.sessions).drain().collect();
            let ids: Vec<String> = drained.iter().map(|(id, _)| id.clone()).collect();
            let msgs = if ids.is_empty() {
                vec![]
            } else {
                vec![ServerMessage::CursorRemove { ai_ids: ids }]
            };
            (msgs, drained)
        });
        for (_, session) in &stopped {
            session.cancel.cancel();
            if let Some(task) = &session.task {
                task.abort();
            }
        }
        stopped.len()
    }

    /// Hand `text` to the session addressed by id, or else to every session
    /// with that display name. Returns how many sessions received it; zero
    /// means the message was dropped.
    pub fn deliver_message(&self, target: &str, text: &str) -> usize {
        let mut sessions = lock(&self.sessions);
        if let Some(session) = sessions.get_mut(target) {
            session.pending = Some(text.to_string());
            return 1;
        }
        let mut delivered = 0;
        for session in sessions.values_mut().filter(|s| s.display_name == target) {
            session.pending = Some(text.to_string());
            delivered += 1;
        }
        delivered
    }

    /// Current cursor of every running session, keyed by agent id.
    pub fn cursor_map(&self) -> BTreeMap<String, CursorInfo> {
        lock(&self.sessions)
            .iter()
            .map(|(id, s)| {
                (
                    id.clone(),
                    CursorInfo {
                        ai_name: s.display_name.clone(),
                        x: s.cursor.x,
                        y: s.cursor.y,
                    },
                )
            })
            .collect()
    }

    pub fn status(&self) -> Vec<SessionInfo> {
        let mut all: Vec<SessionInfo> = lock(&self.sessions)
            .iter()
            .map(|(id, s)| s.info(id))
            .collect();
        all.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        all
    }

    pub fn is_running(&self, agent_id: &str) -> bool {
        lock(&self.sessions).contains_key(agent_id)
    }

    pub fn running_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Sessions ended by a provider failure since startup.
    pub fn failures_total(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    // --- drawing loop hooks ---

    /// Build the context for the next call, consuming the pending message.
    /// `None` when the run has ended.
    pub(crate) fn next_context(&self, agent_id: &str, run_id: u64) -> Option<StrokeContext> {
        let (agent_name, cursor, pending, other_cursors) = {
            let mut sessions = lock(&self.sessions);
            let others: Vec<(String, Point)> = sessions
                .iter()
                .filter(|(id, _)| id.as_str() != agent_id)
                .map(|(_, s)| (s.display_name.clone(), s.cursor))
                .collect();
            let session = sessions
                .get_mut(agent_id)
                .filter(|s| s.run_id == run_id)?;
            (
                session.display_name.clone(),
                session.cursor,
                session.pending.take(),
                others,
            )
        };

        Some(StrokeContext {
            agent_name,
            cursor,
            other_cursors,
            canvas: self.log.recent(self.settings.context_events),
            pending_message: pending,
        })
    }

    /// Append `action` for this run and broadcast the event and the moved
    /// cursor.
    pub(crate) fn commit(&self, agent_id: &str, run_id: u64, action: DrawingAction) -> Commit {
        self.viewers.publish(|| {
            let mut sessions = lock(&self.sessions);
            let Some(session) = sessions
                .get_mut(agent_id)
                .filter(|s| s.run_id == run_id && !s.cancel.is_cancelled())
            else {
                return (vec![], Commit::Stopped);
            };

            match self.log.append(action, agent_id, &session.display_name) {
                Ok(event) => {
                    if let Some(point) = event.action.terminal_point() {
                        session.cursor = point;
                    }
                    let msgs = vec![
                        ServerMessage::for_event(event.clone()),
                        cursor_message(agent_id, &session.display_name, session.cursor),
                    ];
                    (msgs, Commit::Drawn(event))
                }
                Err(e) => (vec![], Commit::Rejected(e)),
            }
        })
    }

    /// End this run after a provider failure and tell viewers why.
    pub(crate) fn fail(&self, agent_id: &str, run_id: u64, error: &ProviderError) {
        let ended = self.viewers.publish(|| {
            let mut sessions = lock(&self.sessions);
            let current = sessions.get(agent_id).is_some_and(|s| s.run_id == run_id);
            if !current {
                return (vec![], false);
            }
            let Some(session) = sessions.remove(agent_id) else {
                return (vec![], false);
            };
            session.cancel.cancel();
            (
                vec![
                    ServerMessage::AiError {
                        ai_name: session.display_name.clone(),
                        detail: error.to_string(),
                    },
                    ServerMessage::CursorRemove {
                        ai_ids: vec![agent_id.to_string()],
                    },
                ],
                true,
            )
        });
        if ended {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!(agent_id, run_id, error = %error, "session ended by provider failure");
        }
    }
}

fn cursor_message(agent_id: &str, name: &str, cursor: Point) -> ServerMessage {
    ServerMessage::Cursor {
        ai_id: agent_id.to_string(),
        ai_name: name.to_string(),
        x: cursor.x,
        y: cursor.y,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
