// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Serial session to a single peripheral.
//!
//! A [`Session`] owns one connection lifecycle and, while connected, the
//! channel itself. The channel lives inside the `Connected` variant, so it
//! exists exactly when the session is connected.

use std::io;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use super::permission::PermissionGate;
use super::transport::{Channel, PeerAddress, PeerHandle, TransportProvider};
use crate::error::{LinkError, TransportError};
use crate::state::SessionState;
use crate::status::{StatusCode, StatusEvent, StatusSink};

/// Upper bound on a transport open when the caller sets none.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

enum Link {
    Idle,
    Connecting { attempt: u64 },
    Connected(Channel),
    Failed,
    Closed,
}

impl Link {
    fn state(&self) -> SessionState {
        match self {
            Link::Idle => SessionState::Idle,
            Link::Connecting { .. } => SessionState::Connecting,
            Link::Connected(_) => SessionState::Connected,
            Link::Failed => SessionState::Failed,
            Link::Closed => SessionState::Closed,
        }
    }
}

struct Inner {
    link: Link,
    attempts: u64,
}

impl Inner {
    /// Swap in a new link and publish the resulting state.
    fn replace(&mut self, link: Link, state_tx: &watch::Sender<SessionState>) -> Link {
        let previous = mem::replace(&mut self.link, link);
        state_tx.send_replace(self.link.state());
        previous
    }

    fn is_current(&self, attempt: u64) -> bool {
        matches!(self.link, Link::Connecting { attempt: a } if a == attempt)
    }
}

/// One point-to-point serial session.
pub struct Session {
    peer: PeerAddress,
    inner: Arc<Mutex<Inner>>,
    state_tx: Arc<watch::Sender<SessionState>>,
    transport: Arc<dyn TransportProvider>,
    gate: Arc<dyn PermissionGate>,
    sink: Arc<dyn StatusSink>,
    connect_timeout: Duration,
}

impl Session {
    /// Create an idle session for `peer`.
    pub fn new(
        peer: PeerAddress,
        transport: Arc<dyn TransportProvider>,
        gate: Arc<dyn PermissionGate>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            peer,
            inner: Arc::new(Mutex::new(Inner {
                link: Link::Idle,
                attempts: 0,
            })),
            state_tx: Arc::new(state_tx),
            transport,
            gate,
            sink,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bound each transport open by `timeout`.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn peer(&self) -> PeerAddress {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Whether a channel is currently held.
    pub async fn has_channel(&self) -> bool {
        matches!(self.inner.lock().await.link, Link::Connected(_))
    }

    /// Connect to the peer.
    ///
    /// Refuses without authority (no transport I/O is attempted) and while
    /// another attempt is in flight. Connecting an already connected session
    /// is a no-op. Failures are reported, never retried.
    ///
    /// The attempt runs to completion on its own task, so dropping the
    /// returned future does not leave the session in `Connecting`.
    pub async fn connect(&self) -> Result<(), LinkError> {
        if !self.gate.has_authority().await {
            warn!("No authority to open a link to {}", self.peer);
            return Err(self.report(LinkError::PermissionDenied));
        }

        let attempt = {
            let mut inner = self.inner.lock().await;
            let state = inner.link.state();
            if !state.can_connect() {
                drop(inner);
                return match state {
                    SessionState::Connected => {
                        debug!("Already connected to {}", self.peer);
                        Ok(())
                    }
                    _ => Err(self.report(LinkError::AlreadyConnecting)),
                };
            }
            inner.attempts += 1;
            let id = inner.attempts;
            inner.replace(Link::Connecting { attempt: id }, &self.state_tx);
            info!("Connecting to {} (attempt {})", self.peer, id);
            self.emit(StatusCode::Connecting, format!("Connecting to {}...", self.peer));
            Attempt {
                id,
                peer: self.peer,
                inner: self.inner.clone(),
                state_tx: self.state_tx.clone(),
                transport: self.transport.clone(),
                sink: self.sink.clone(),
                limit: self.connect_timeout,
            }
        };

        match tokio::spawn(attempt.run()).await {
            Ok(result) => result,
            Err(e) => Err(self.report(LinkError::TransportOpenFailed(
                TransportError::Aborted(e.to_string()),
            ))),
        }
    }

    /// Close the session. Idempotent.
    ///
    /// Releases the channel if one is held and cancels an in-flight connect;
    /// every call reports `Closed`.
    pub async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        match inner.replace(Link::Closed, &self.state_tx) {
            Link::Connected(channel) => {
                info!("Releasing channel to {}", self.peer);
                self.transport.close(channel).await;
            }
            Link::Connecting { attempt } => {
                info!("Teardown cancels connect attempt {}", attempt);
            }
            _ => debug!("Teardown on session without a channel"),
        }
        drop(inner);
        self.emit(StatusCode::Closed, "Disconnected");
    }

    /// Write one line while holding exclusive use of the channel.
    ///
    /// The connectivity check and the write happen under the same lock, on a
    /// worker task. A failed write moves the session to `Failed` and releases
    /// the channel. Does not report status; callers do.
    pub async fn write_line(&self, line: String) -> Result<(), LinkError> {
        let mut guard = self.inner.clone().lock_owned().await;
        let state_tx = self.state_tx.clone();
        let transport = self.transport.clone();
        let peer = self.peer;

        let task = tokio::spawn(async move {
            let written = match &mut guard.link {
                Link::Connected(channel) => write_and_flush(channel, line.as_bytes()).await,
                _ => return Err(LinkError::NotConnected),
            };

            match written {
                Ok(()) => {
                    debug!("Wrote {} bytes to {}", line.len(), peer);
                    Ok(())
                }
                Err(e) => {
                    error!("Write to {} failed: {}", peer, e);
                    if let Link::Connected(channel) = guard.replace(Link::Failed, &state_tx) {
                        transport.close(channel).await;
                    }
                    Err(LinkError::WriteFailed(e))
                }
            }
        });

        task.await.unwrap_or_else(|e| {
            Err(LinkError::WriteFailed(io::Error::new(
                io::ErrorKind::Other,
                e.to_string(),
            )))
        })
    }

    fn emit(&self, code: StatusCode, reason: impl Into<String>) {
        self.sink.on_status(StatusEvent::new(code, reason));
    }

    fn report(&self, err: LinkError) -> LinkError {
        report(self.sink.as_ref(), err)
    }
}

/// One connect attempt, detached from the caller that started it.
struct Attempt {
    id: u64,
    peer: PeerAddress,
    inner: Arc<Mutex<Inner>>,
    state_tx: Arc<watch::Sender<SessionState>>,
    transport: Arc<dyn TransportProvider>,
    sink: Arc<dyn StatusSink>,
    limit: Duration,
}

impl Attempt {
    /// Open the transport and apply the resulting transition.
    async fn run(self) -> Result<(), LinkError> {
        let result = self.open_off_thread().await;

        let mut inner = self.inner.lock().await;
        if !inner.is_current(self.id) {
            drop(inner);
            if let Ok((handle, channel)) = result {
                info!(
                    "Discarding late connection to {} after teardown",
                    handle.display_name()
                );
                self.transport.close(channel).await;
            }
            return Err(report(self.sink.as_ref(), LinkError::Cancelled));
        }

        match result {
            Ok((handle, channel)) => {
                inner.replace(Link::Connected(channel), &self.state_tx);
                info!("Connected to {}", handle.display_name());
                self.sink.on_status(StatusEvent::new(
                    StatusCode::Connected,
                    format!("Connected to {}", handle.display_name()),
                ));
                Ok(())
            }
            Err(e) => {
                inner.replace(Link::Failed, &self.state_tx);
                error!("Failed to connect to {}: {}", self.peer, e);
                Err(report(self.sink.as_ref(), e))
            }
        }
    }

    /// Resolve and open on a worker task, bounded by the connect timeout.
    async fn open_off_thread(&self) -> Result<(PeerHandle, Channel), LinkError> {
        let transport = self.transport.clone();
        let peer = self.peer;

        let task = tokio::spawn(tokio::time::timeout(self.limit, async move {
            let handle = transport.resolve(&peer).await?;
            debug!("Resolved {} -> port {}", peer, handle.port);
            let channel = transport.open(handle.clone()).await?;
            Ok::<_, TransportError>((handle, channel))
        }));

        match task.await {
            Ok(Ok(Ok(opened))) => Ok(opened),
            Ok(Ok(Err(e))) => Err(LinkError::TransportOpenFailed(e)),
            Ok(Err(_)) => Err(LinkError::TransportTimeout),
            Err(e) => Err(LinkError::TransportOpenFailed(TransportError::Aborted(
                e.to_string(),
            ))),
        }
    }
}

fn report(sink: &dyn StatusSink, err: LinkError) -> LinkError {
    sink.on_status(StatusEvent::from_error(&err));
    err
}

async fn write_and_flush(channel: &mut Channel, bytes: &[u8]) -> io::Result<()> {
    channel.write_all(bytes).await?;
    channel.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::permission::StaticGate;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder(SyncMutex<Vec<StatusCode>>);

    impl StatusSink for Recorder {
        fn on_status(&self, event: StatusEvent) {
            self.0.lock().push(event.code);
        }
    }

    enum Behavior {
        Succeed,
        Refuse,
        Deny,
        Hang,
        Slow(Duration),
    }

    struct FakeTransport {
        behavior: Behavior,
        opens: AtomicUsize,
        closes: AtomicUsize,
    }

    impl FakeTransport {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                opens: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TransportProvider for FakeTransport {
        async fn resolve(&self, address: &PeerAddress) -> Result<PeerHandle, TransportError> {
            Ok(PeerHandle {
                address: *address,
                port: 1,
                name: Some("HC-05".into()),
            })
        }

        async fn open(&self, _handle: PeerHandle) -> Result<Channel, TransportError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => {
                    let (local, _remote) = tokio::io::duplex(64);
                    Ok(Box::new(local))
                }
                Behavior::Refuse => Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "host is down",
                ))),
                Behavior::Deny => Err(TransportError::Security("not authorized".into())),
                Behavior::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Behavior::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    let (local, _remote) = tokio::io::duplex(64);
                    Ok(Box::new(local))
                }
            }
        }

        async fn close(&self, _channel: Channel) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn session(transport: Arc<FakeTransport>, granted: bool) -> (Session, Arc<Recorder>) {
        let sink = Arc::new(Recorder::default());
        let session = Session::new(
            "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            transport,
            Arc::new(StaticGate::new(granted)),
            sink.clone(),
        );
        (session, sink)
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported_not_retried() {
        let transport = FakeTransport::new(Behavior::Refuse);
        let (session, sink) = session(transport.clone(), true);

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, LinkError::TransportOpenFailed(_)));
        assert!(!err.is_security());
        assert_eq!(session.state(), SessionState::Failed);
        assert!(!session.has_channel().await);
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
        assert_eq!(
            *sink.0.lock(),
            vec![StatusCode::Connecting, StatusCode::ConnectFailed]
        );
    }

    #[tokio::test]
    async fn test_security_failure_distinguished() {
        let transport = FakeTransport::new(Behavior::Deny);
        let (session, _sink) = session(transport, true);

        let err = session.connect().await.unwrap_err();
        assert!(err.is_security());
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_fails_attempt() {
        let transport = FakeTransport::new(Behavior::Hang);
        let (session, sink) = session(transport, true);
        let session = session.with_connect_timeout(Duration::from_secs(2));

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, LinkError::TransportTimeout));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(sink.0.lock().last(), Some(&StatusCode::ConnectTimeout));
    }

    #[tokio::test]
    async fn test_retry_after_failure_and_reconnect_after_close() {
        let transport = FakeTransport::new(Behavior::Succeed);
        let (session, _sink) = session(transport.clone(), true);

        session.connect().await.unwrap();
        session.teardown().await;
        assert_eq!(session.state(), SessionState::Closed);

        session.connect().await.unwrap();
        assert!(session.is_connected());
        assert!(session.has_channel().await);
        assert_eq!(transport.opens.load(Ordering::SeqCst), 2);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_when_connected_is_noop() {
        let transport = FakeTransport::new(Behavior::Succeed);
        let (session, sink) = session(transport.clone(), true);

        session.connect().await.unwrap();
        session.connect().await.unwrap();

        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
        assert_eq!(
            *sink.0.lock(),
            vec![StatusCode::Connecting, StatusCode::Connected]
        );
    }

    #[tokio::test]
    async fn test_write_requires_connection() {
        let transport = FakeTransport::new(Behavior::Succeed);
        let (session, _sink) = session(transport, true);

        let err = session.write_line("Failed\n".into()).await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_connect_still_completes() {
        let transport = FakeTransport::new(Behavior::Slow(Duration::from_millis(100)));
        let (session, sink) = session(transport.clone(), true);

        let abandoned = tokio::time::timeout(Duration::from_millis(10), session.connect()).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.has_channel().await);

        session.connect().await.unwrap();
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
        assert_eq!(
            *sink.0.lock(),
            vec![StatusCode::Connecting, StatusCode::Connected]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_connect_then_teardown_closes_late_channel() {
        let transport = FakeTransport::new(Behavior::Slow(Duration::from_millis(100)));
        let (session, sink) = session(transport.clone(), true);

        let abandoned = tokio::time::timeout(Duration::from_millis(10), session.connect()).await;
        assert!(abandoned.is_err());
        session.teardown().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
        assert_eq!(sink.0.lock().last(), Some(&StatusCode::ConnectCancelled));

        session.connect().await.unwrap();
        assert!(session.is_connected());
    }

    /// Records whether the session lock was held when `Connected` was seen.
    #[derive(Default)]
    struct LockWitness {
        inner: std::sync::OnceLock<Arc<Mutex<Inner>>>,
        held_on_connected: SyncMutex<Option<bool>>,
    }

    impl StatusSink for LockWitness {
        fn on_status(&self, event: StatusEvent) {
            if event.code == StatusCode::Connected {
                if let Some(inner) = self.inner.get() {
                    *self.held_on_connected.lock() = Some(inner.try_lock().is_err());
                }
            }
        }
    }

    #[tokio::test]
    async fn test_connected_reported_under_lock() {
        let sink = Arc::new(LockWitness::default());
        let session = Session::new(
            "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            FakeTransport::new(Behavior::Succeed),
            Arc::new(StaticGate::new(true)),
            sink.clone(),
        );
        let _ = sink.inner.set(session.inner.clone());

        session.connect().await.unwrap();
        assert_eq!(*sink.held_on_connected.lock(), Some(true));
    }

    #[tokio::test]
    async fn test_teardown_from_idle() {
        let transport = FakeTransport::new(Behavior::Succeed);
        let (session, sink) = session(transport.clone(), true);

        session.teardown().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 0);
        assert_eq!(*sink.0.lock(), vec![StatusCode::Closed]);
    }
}
