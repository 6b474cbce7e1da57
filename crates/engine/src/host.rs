// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pane host seam.
//!
//! Everything the engine needs from the daemon goes through [`PaneHost`]:
//! the real implementation speaks the control channel, the fake is
//! scripted for tests. Adapters stay thin; policy lives in the engine.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use troupe_core::{PaneId, PaneSpec};
use troupe_daemon::protocol::{
    DaemonEvent, EnterOutcome, PaneStatusEntry, Request, Response, SubscribeChannel, WriteMode,
    WriteStatus,
};
use troupe_daemon::{ClientError, DaemonClient};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("daemon unreachable")]
    Unreachable,

    #[error("pane {0} rejected the operation: {1}")]
    Rejected(PaneId, String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<ClientError> for HostError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Unreachable(_) => HostError::Unreachable,
            other => HostError::Transport(other.to_string()),
        }
    }
}

/// One observed output chunk from a pane.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneData {
    pub pane_id: PaneId,
    pub byte_len: usize,
    pub meaningful: bool,
    /// Raw bytes, present only on raw subscriptions.
    pub bytes: Option<String>,
    pub at_ms: u64,
}

/// A pane's terminal exit notification.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneDown {
    pub pane_id: PaneId,
    pub exit_code: Option<i32>,
    pub reason: String,
}

/// What the engine needs from the daemon.
#[async_trait]
pub trait PaneHost: Send + Sync + 'static {
    async fn spawn(&self, spec: PaneSpec, restart_on_dead: bool) -> Result<u32, HostError>;

    async fn write(
        &self,
        pane_id: PaneId,
        data: &str,
        mode: WriteMode,
        window: Option<usize>,
    ) -> Result<(WriteStatus, usize), HostError>;

    async fn send_trusted_enter(&self, pane_id: PaneId) -> Result<EnterOutcome, HostError>;

    async fn kill(&self, pane_id: PaneId, reason: &str) -> Result<bool, HostError>;

    /// Stream of output observations for all panes (caller filters).
    async fn subscribe_data(&self, raw: bool) -> Result<mpsc::Receiver<PaneData>, HostError>;

    /// Resolves when the pane's process exits.
    async fn await_down(&self, pane_id: PaneId) -> Result<PaneDown, HostError>;

    async fn status(&self) -> Result<Vec<PaneStatusEntry>, HostError>;
}

/// Real host: the daemon client over the UNIX socket.
pub struct SocketPaneHost {
    client: Arc<DaemonClient>,
}

impl SocketPaneHost {
    pub async fn connect(socket_path: &Path) -> Result<Self, HostError> {
        let client = DaemonClient::connect(socket_path).await?;
        Ok(Self { client: Arc::new(client) })
    }
}

#[async_trait]
impl PaneHost for SocketPaneHost {
    async fn spawn(&self, spec: PaneSpec, restart_on_dead: bool) -> Result<u32, HostError> {
        let request = Request::Spawn {
            pane_id: spec.pane_id,
            role: spec.role,
            command: spec.command,
            env: spec.env,
            geometry: spec.geometry,
            scrollback_bytes: Some(spec.scrollback_bytes),
            restart_on_dead,
        };
        match self.client.request(request).await? {
            Response::Spawned { pid, .. } => Ok(pid),
            Response::Error { kind, message } => {
                Err(HostError::Rejected(spec.pane_id, format!("{kind}: {message}")))
            }
            other => Err(HostError::Transport(format!("unexpected response: {other:?}"))),
        }
    }

    async fn write(
        &self,
        pane_id: PaneId,
        data: &str,
        mode: WriteMode,
        window: Option<usize>,
    ) -> Result<(WriteStatus, usize), HostError> {
        let request = Request::Write { pane_id, data: data.to_string(), mode, window };
        match self.client.request(request).await? {
            Response::WriteAck { status, acked_bytes } => Ok((status, acked_bytes)),
            other => Err(HostError::Transport(format!("unexpected response: {other:?}"))),
        }
    }

    async fn send_trusted_enter(&self, pane_id: PaneId) -> Result<EnterOutcome, HostError> {
        match self.client.request(Request::SendTrustedEnter { pane_id }).await? {
            Response::EnterResult { outcome } => Ok(outcome),
            other => Err(HostError::Transport(format!("unexpected response: {other:?}"))),
        }
    }

    async fn kill(&self, pane_id: PaneId, reason: &str) -> Result<bool, HostError> {
        let request =
            Request::Kill { pane_id, signal: None, reason: Some(reason.to_string()) };
        match self.client.request(request).await? {
            Response::Killed { .. } => Ok(true),
            Response::Error { .. } => Ok(false),
            other => Err(HostError::Transport(format!("unexpected response: {other:?}"))),
        }
    }

    async fn subscribe_data(&self, raw: bool) -> Result<mpsc::Receiver<PaneData>, HostError> {
        let mut events = self
            .client
            .subscribe(vec![SubscribeChannel::Data], raw)
            .await?;
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let DaemonEvent::PtyData { pane_id, byte_len, meaningful, bytes, at_ms } = event
                {
                    let data = PaneData { pane_id, byte_len, meaningful, bytes, at_ms };
                    if tx.send(data).await.is_err() {
                        break;
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn await_down(&self, pane_id: PaneId) -> Result<PaneDown, HostError> {
        let mut events = self
            .client
            .subscribe(vec![SubscribeChannel::Lifecycle], false)
            .await?;
        while let Some(event) = events.recv().await {
            if let DaemonEvent::PtyDown { pane_id: p, exit_code, reason } = event {
                if p == pane_id {
                    return Ok(PaneDown { pane_id, exit_code, reason });
                }
            }
        }
        Err(HostError::Unreachable)
    }

    async fn status(&self) -> Result<Vec<PaneStatusEntry>, HostError> {
        match self.client.request(Request::Status).await? {
            Response::Status { panes } => Ok(panes),
            other => Err(HostError::Transport(format!("unexpected response: {other:?}"))),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod testing {
    //! Scripted pane host for tests.

    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::broadcast;

    use super::*;

    /// One recorded write call.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedWrite {
        pub pane_id: PaneId,
        pub data: String,
        pub mode: WriteMode,
    }

    #[derive(Default)]
    struct FakeState {
        /// Panes that reject writes as missing.
        offline: HashSet<PaneId>,
        /// Scripted write results consumed in order (per pane); defaults
        /// to `Accepted`.
        write_results: HashMap<PaneId, VecDeque<(WriteStatus, usize)>>,
        enter_outcome: HashMap<PaneId, EnterOutcome>,
        writes: Vec<RecordedWrite>,
        enters: Vec<PaneId>,
        spawned: Vec<PaneSpec>,
        killed: Vec<(PaneId, String)>,
        exit_codes: HashMap<PaneId, Option<i32>>,
        /// Echo output automatically after a successful write.
        echo_on_write: bool,
    }

    /// A fully scripted [`PaneHost`].
    pub struct FakePaneHost {
        state: Mutex<FakeState>,
        data_tx: broadcast::Sender<PaneData>,
        down_tx: broadcast::Sender<PaneDown>,
    }

    impl Default for FakePaneHost {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FakePaneHost {
        pub fn new() -> Self {
            let (data_tx, _) = broadcast::channel(256);
            let (down_tx, _) = broadcast::channel(64);
            Self { state: Mutex::new(FakeState::default()), data_tx, down_tx }
        }

        /// Echo meaningful output automatically after every accepted write
        /// (a responsive, healthy pane).
        pub fn with_echo(self) -> Self {
            self.state.lock().echo_on_write = true;
            self
        }

        pub fn set_offline(&self, pane_id: PaneId) {
            self.state.lock().offline.insert(pane_id);
        }

        pub fn set_online(&self, pane_id: PaneId) {
            self.state.lock().offline.remove(&pane_id);
        }

        pub fn script_write(&self, pane_id: PaneId, status: WriteStatus, acked: usize) {
            self.state
                .lock()
                .write_results
                .entry(pane_id)
                .or_default()
                .push_back((status, acked));
        }

        pub fn set_enter_outcome(&self, pane_id: PaneId, outcome: EnterOutcome) {
            self.state.lock().enter_outcome.insert(pane_id, outcome);
        }

        /// Inject an output observation, as the pane would produce.
        pub fn emit_data(&self, pane_id: PaneId, meaningful: bool, bytes: &str, at_ms: u64) {
            let _ = self.data_tx.send(PaneData {
                pane_id,
                byte_len: bytes.len(),
                meaningful,
                bytes: Some(bytes.to_string()),
                at_ms,
            });
        }

        /// Simulate the pane's child exiting.
        pub fn emit_down(&self, pane_id: PaneId, exit_code: Option<i32>) {
            self.state.lock().exit_codes.insert(pane_id, exit_code);
            let _ = self.down_tx.send(PaneDown {
                pane_id,
                exit_code,
                reason: "exited".to_string(),
            });
        }

        pub fn writes(&self) -> Vec<RecordedWrite> {
            self.state.lock().writes.clone()
        }

        pub fn enters(&self) -> Vec<PaneId> {
            self.state.lock().enters.clone()
        }

        pub fn spawned(&self) -> Vec<PaneSpec> {
            self.state.lock().spawned.clone()
        }

        pub fn killed(&self) -> Vec<(PaneId, String)> {
            self.state.lock().killed.clone()
        }
    }

    #[async_trait]
    impl PaneHost for FakePaneHost {
        async fn spawn(&self, spec: PaneSpec, _restart_on_dead: bool) -> Result<u32, HostError> {
            let mut state = self.state.lock();
            state.offline.remove(&spec.pane_id);
            state.spawned.push(spec);
            Ok(4242)
        }

        async fn write(
            &self,
            pane_id: PaneId,
            data: &str,
            mode: WriteMode,
            _window: Option<usize>,
        ) -> Result<(WriteStatus, usize), HostError> {
            let (result, echo) = {
                let mut state = self.state.lock();
                if state.offline.contains(&pane_id) {
                    return Ok((WriteStatus::RejectedTerminalMissing, 0));
                }
                state.writes.push(RecordedWrite {
                    pane_id,
                    data: data.to_string(),
                    mode,
                });
                let scripted = state
                    .write_results
                    .get_mut(&pane_id)
                    .and_then(|queue| queue.pop_front());
                (scripted.unwrap_or((WriteStatus::Accepted, data.len())), state.echo_on_write)
            };
            if echo && result.0 == WriteStatus::Accepted {
                self.emit_data(pane_id, true, data, 0);
            }
            Ok(result)
        }

        async fn send_trusted_enter(&self, pane_id: PaneId) -> Result<EnterOutcome, HostError> {
            let mut state = self.state.lock();
            if state.offline.contains(&pane_id) {
                return Ok(EnterOutcome::Rejected);
            }
            state.enters.push(pane_id);
            Ok(*state
                .enter_outcome
                .get(&pane_id)
                .unwrap_or(&EnterOutcome::SubmittedActive))
        }

        async fn kill(&self, pane_id: PaneId, reason: &str) -> Result<bool, HostError> {
            self.state.lock().killed.push((pane_id, reason.to_string()));
            Ok(true)
        }

        async fn subscribe_data(&self, _raw: bool) -> Result<mpsc::Receiver<PaneData>, HostError> {
            let mut events = self.data_tx.subscribe();
            let (tx, rx) = mpsc::channel(256);
            tokio::spawn(async move {
                while let Ok(data) = events.recv().await {
                    if tx.send(data).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }

        async fn await_down(&self, pane_id: PaneId) -> Result<PaneDown, HostError> {
            if let Some(exit_code) = self.state.lock().exit_codes.get(&pane_id) {
                return Ok(PaneDown {
                    pane_id,
                    exit_code: *exit_code,
                    reason: "exited".to_string(),
                });
            }
            let mut down = self.down_tx.subscribe();
            while let Ok(event) = down.recv().await {
                if event.pane_id == pane_id {
                    return Ok(event);
                }
            }
            Err(HostError::Unreachable)
        }

        async fn status(&self) -> Result<Vec<PaneStatusEntry>, HostError> {
            Ok(Vec::new())
        }
    }
}
