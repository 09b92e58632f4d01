//! Live viewer connections and the broadcast fan-out.
//!
//! Each viewer is represented by the sending half of a bounded queue that
//! its writer task drains onto the socket. Fan-out never blocks: a viewer
//! whose queue is full or closed is pruned after the pass and resyncs on
//! reconnect.
//!
//! The registry lock is also the serialization point for the sync protocol.
//! [`ConnectionRegistry::publish`] runs a state mutation and the broadcast of
//! its messages under that lock, and [`ConnectionRegistry::attach`] takes the
//! handshake snapshot under it, so a new viewer sees every event exactly once.
//! Lock order is registry, then agent sessions, then the event log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::ServerMessage;

pub type ConnectionId = String;

#[derive(Debug, Error, PartialEq)]
pub enum ConnectionError {
    #[error("connection {0} is not registered")]
    Unknown(ConnectionId),

    #[error("connection {0} is not keeping up")]
    Full(ConnectionId),

    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, mpsc::Sender<String>>>,
    pruned: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer without a handshake.
    pub fn register(&self, tx: mpsc::Sender<String>) -> ConnectionId {
        let id = uuid::Uuid::new_v4().to_string();
        self.lock().insert(id.clone(), tx);
        tracing::debug!(conn_id = %id, "viewer registered");
        id
    }

    /// Queue the handshake produced by `initial`, then register the viewer,
    /// both under the registry lock.
    pub fn attach<F>(&self, tx: mpsc::Sender<String>, initial: F) -> Result<ConnectionId, ConnectionError>
    where
        F: FnOnce() -> Vec<ServerMessage>,
    {
        let id = uuid::Uuid::new_v4().to_string();
        let mut connections = self.lock();
        for msg in initial() {
            enqueue(&id, &tx, msg.to_json())?;
        }
        connections.insert(id.clone(), tx);
        tracing::debug!(conn_id = %id, viewers = connections.len(), "viewer attached");
        Ok(id)
    }

    /// Remove a viewer. Returns whether it was still registered.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            tracing::debug!(conn_id = %id, "viewer unregistered");
        }
        removed
    }

    /// Unicast. A failed send unregisters the viewer.
    pub fn send(&self, id: &str, msg: &ServerMessage) -> Result<(), ConnectionError> {
        let mut connections = self.lock();
        let tx = connections
            .get(id)
            .ok_or_else(|| ConnectionError::Unknown(id.to_string()))?;
        let result = enqueue(id, tx, msg.to_json());
        if result.is_err() {
            connections.remove(id);
            self.pruned.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Deliver `msg` to every viewer. Returns how many accepted it.
    pub fn broadcast(&self, msg: &ServerMessage) -> usize {
        let mut connections = self.lock();
        self.fan_out(&mut connections, std::slice::from_ref(msg))
    }

    /// Run `mutate` and broadcast the messages it returns without letting a
    /// concurrent attach or publish interleave. `mutate` must not call back
    /// into the registry.
    pub fn publish<R, F>(&self, mutate: F) -> R
    where
        F: FnOnce() -> (Vec<ServerMessage>, R),
    {
        let mut connections = self.lock();
        let (messages, result) = mutate();
        if !messages.is_empty() {
            self.fan_out(&mut connections, &messages);
        }
        result
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Viewers dropped so far because they were slow or gone.
    pub fn pruned_total(&self) -> u64 {
        self.pruned.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, mpsc::Sender<String>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn fan_out(
        &self,
        connections: &mut HashMap<ConnectionId, mpsc::Sender<String>>,
        messages: &[ServerMessage],
    ) -> usize {
        let frames: Vec<String> = messages.iter().map(ServerMessage::to_json).collect();
        let mut failed = Vec::new();

        for (id, tx) in connections.iter() {
            for frame in &frames {
                if let Err(e) = enqueue(id, tx, frame.clone()) {
                    tracing::warn!(error = %e, "pruning viewer");
                    failed.push(id.clone());
                    break;
                }
            }
        }

        for id in &failed {
            connections.remove(id);
        }
        self.pruned.fetch_add(failed.len() as u64, Ordering::Relaxed);
        connections.len()
    }
}

fn enqueue(id: &str, tx: &mpsc::Sender<String>, frame: String) -> Result<(), ConnectionError> {
    tx.try_send(frame).map_err(|e| match e {
        TrySendError::Full(_) => ConnectionError::Full(id.to_string()),
        TrySendError::Closed(_) => ConnectionError::Closed(id.to_string()),
    })
}
