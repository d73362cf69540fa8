//! Pairing session state machine
//!
//! A [`PairingSession`] drives one pairing attempt through three phases
//! over an abstract message channel:
//!
//! 1. **Initialization** — role-specific: the client introduces itself
//!    and both sides exchange [`Options`](crate::Options).
//! 2. **Configuration** — the client proposes the negotiated
//!    [`Configuration`](crate::Configuration), the server validates and
//!    acknowledges it.
//! 3. **Pairing** — role-symmetric challenge-response over the
//!    human-relayed secret, shared between client and server.
//!
//! The state machine is strictly forward-moving; any error during a
//! phase transitions the session to `Failed` and aborts the remaining
//! phases. Errors never escape [`PairingSession::run_pairing`] — callers
//! observe the outcome through [`PairingSession::has_succeeded`].

mod queue;
mod roles;

pub use queue::QUEUE_POLL_INTERVAL;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use ring::rand::{SecureRandom, SystemRandom};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::challenge::{extract_nonce, ChallengeResponse};
use crate::context::PairingContext;
use crate::listener::{LogLevel, PairingListener};
use crate::message::{MessageKind, MessageSink, MessageSource, PairingMessage};
use crate::options::{Configuration, DeviceRole, Options};
use crate::{Encoding, PairingError, Result};

use queue::{spawn_reader, QueuedItem, Rendezvous};
use roles::SessionKind;

/// Protocol state of a pairing session. Strictly forward-moving;
/// `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    Uninitialized = 0,
    Initializing = 1,
    Configuring = 2,
    Pairing = 3,
    Succeeded = 4,
    Failed = 5,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Uninitialized,
            1 => SessionState::Initializing,
            2 => SessionState::Configuring,
            3 => SessionState::Pairing,
            4 => SessionState::Succeeded,
            _ => SessionState::Failed,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed)
    }
}

/// State shared between the session, its handles, the reader task and
/// the user-input task.
struct Shared {
    state: AtomicU8,
    abort: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    role: Mutex<Option<DeviceRole>>,
    secret_tx: mpsc::Sender<QueuedItem>,
}

impl Shared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Advance the state, ignoring backward transitions.
    fn advance(&self, next: SessionState) {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if current >= next as u8 {
                debug!(?next, "ignoring backward state transition");
                return;
            }
            match self.state.compare_exchange(
                current,
                next as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    info!(from = ?SessionState::from_u8(current), to = ?next, "session state");
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn request_teardown(&self) {
        if !self.abort.swap(true, Ordering::SeqCst) {
            debug!("teardown requested");
            self.shutdown.notify_one();
        }
    }
}

/// Cloneable, thread-safe handle onto a running session.
///
/// Handed to [`PairingListener`] callbacks so a UI can feed the secret
/// back or abort the session from any task.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Hand a user-entered secret to the session. Non-blocking.
    ///
    /// Returns `false` — never an error — when the secret cannot be
    /// accepted: the session is not in the pairing phase, this endpoint
    /// does not play the Input role, or the rendezvous queue is full or
    /// closed.
    pub fn set_secret(&self, secret: &[u8]) -> bool {
        if self.shared.state() != SessionState::Pairing {
            warn!("set_secret outside pairing phase, ignoring");
            return false;
        }
        let role = *self.shared.role.lock().expect("role lock poisoned");
        if role != Some(DeviceRole::Input) {
            warn!("set_secret on a non-Input endpoint, ignoring");
            return false;
        }
        self.shared
            .secret_tx
            .try_send(QueuedItem::Secret(secret.to_vec()))
            .is_ok()
    }

    /// Abort the session. Idempotent and safe to call from any thread at
    /// any time; a driver blocked on the rendezvous queue observes the
    /// abort within one [`QUEUE_POLL_INTERVAL`], and the background
    /// reader stops within the same bound.
    pub fn teardown(&self) {
        self.shared.request_teardown();
    }
}

/// One pairing attempt between two endpoints.
///
/// Created per attempt via [`PairingSession::client`] or
/// [`PairingSession::server`] and driven to completion by
/// [`PairingSession::run_pairing`].
pub struct PairingSession {
    context: PairingContext,
    sink: Box<dyn MessageSink>,
    source: Option<Box<dyn MessageSource>>,
    kind: SessionKind,
    options: Options,
    configuration: Option<Configuration>,
    local_role: Option<DeviceRole>,
    service_name: Option<String>,
    peer_name: Option<String>,
    verify_secret_ack: bool,
    queue: Rendezvous,
    queue_tx: mpsc::Sender<QueuedItem>,
    shared: Arc<Shared>,
}

impl PairingSession {
    /// Create a client-side session: this endpoint opens the pairing
    /// exchange, naming the service it wants to pair with and optionally
    /// itself.
    pub fn client(
        sink: Box<dyn MessageSink>,
        source: Box<dyn MessageSource>,
        context: PairingContext,
        service_name: impl Into<String>,
        client_name: Option<String>,
    ) -> Self {
        let service_name = service_name.into();
        Self::new(
            sink,
            source,
            context,
            SessionKind::Client {
                service_name: service_name.clone(),
                client_name,
            },
            Some(service_name),
        )
    }

    /// Create a server-side session: this endpoint waits for a pairing
    /// request, optionally announcing its own name in the acknowledgment.
    pub fn server(
        sink: Box<dyn MessageSink>,
        source: Box<dyn MessageSource>,
        context: PairingContext,
        server_name: Option<String>,
    ) -> Self {
        Self::new(
            sink,
            source,
            context,
            SessionKind::Server { server_name },
            None,
        )
    }

    fn new(
        sink: Box<dyn MessageSink>,
        source: Box<dyn MessageSource>,
        context: PairingContext,
        kind: SessionKind,
        service_name: Option<String>,
    ) -> Self {
        let abort = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());
        let (queue, queue_tx) = Rendezvous::new(abort.clone());
        let shared = Arc::new(Shared {
            state: AtomicU8::new(SessionState::Uninitialized as u8),
            abort,
            shutdown,
            role: Mutex::new(None),
            secret_tx: queue_tx.clone(),
        });

        Self {
            context,
            sink,
            source: Some(source),
            kind,
            options: Options::new(),
            configuration: None,
            local_role: None,
            service_name,
            peer_name: None,
            verify_secret_ack: false,
            queue,
            queue_tx,
            shared,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Whether the session reached a terminal state.
    pub fn has_completed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Whether the session completed successfully.
    pub fn has_succeeded(&self) -> bool {
        self.state() == SessionState::Succeeded
    }

    /// The service name this session pairs with: declared locally on the
    /// client, learned from the pairing request on the server.
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// The name the peer declared for itself, if any.
    pub fn peer_name(&self) -> Option<&str> {
        self.peer_name.as_deref()
    }

    /// The negotiated configuration, available once the configuration
    /// phase has completed.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    /// This endpoint's negotiated pairing-phase role.
    pub fn local_role(&self) -> Option<DeviceRole> {
        self.local_role
    }

    /// Add a supported input encoding. Pre-start only.
    pub fn add_input_encoding(&mut self, encoding: Encoding) -> Result<()> {
        self.options.add_input_encoding(encoding)
    }

    /// Add a supported output encoding. Pre-start only.
    pub fn add_output_encoding(&mut self, encoding: Encoding) -> Result<()> {
        self.options.add_output_encoding(encoding)
    }

    /// Set the preferred pairing-phase role. Pre-start only.
    pub fn set_preferred_role(&mut self, role: DeviceRole) -> Result<()> {
        self.options.set_preferred_role(role)
    }

    /// Enable or disable verification of the SecretAck payload on the
    /// Input side. Disabled by default: known peer implementations omit
    /// the secret from the ack, and any ack that arrives at all already
    /// signals success.
    pub fn set_verify_secret_ack(&mut self, verify: bool) {
        self.verify_secret_ack = verify;
    }

    /// A cloneable handle onto this session.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
        }
    }

    /// Abort the session from the owning side. Equivalent to
    /// [`SessionHandle::teardown`].
    pub fn teardown(&self) {
        self.shared.request_teardown();
    }

    /// Run the full pairing exchange to completion.
    ///
    /// Notifies the listener of session start and end, drives the three
    /// phases, and converts any failure into the `Failed` terminal state
    /// after a best-effort error notification to the peer. Errors do not
    /// escape; inspect [`PairingSession::has_succeeded`] afterwards.
    pub async fn run_pairing(&mut self, listener: Arc<dyn PairingListener>) {
        if self.state() != SessionState::Uninitialized {
            warn!("run_pairing called on an already-driven session");
            return;
        }

        let handle = self.handle();
        listener.on_session_created(&handle).await;
        listener.on_log_message(LogLevel::Info, "pairing session started");

        // Options are immutable from here on.
        self.options.seal();

        let source = self.source.take().expect("message source present");
        let reader = spawn_reader(
            source,
            self.queue_tx.clone(),
            self.shared.shutdown.clone(),
            self.shared.abort.clone(),
        );

        match self.drive(&listener).await {
            Ok(()) => {
                info!(peer = ?self.peer_name, "pairing succeeded");
                listener.on_log_message(LogLevel::Info, "pairing succeeded");
                self.shared.advance(SessionState::Succeeded);
            }
            Err(error) => {
                warn!(%error, "pairing failed");
                listener.on_log_message(LogLevel::Error, &error.to_string());
                // Best-effort notification; the channel may already be
                // unusable and that failure is swallowed.
                if let Err(send_error) = self.sink.send_error(&error).await {
                    debug!(%send_error, "peer error notification not delivered");
                }
                self.shared.advance(SessionState::Failed);
            }
        }

        self.shared.request_teardown();
        if let Err(error) = reader.await {
            debug!(%error, "reader task join failed");
        }
        if let Err(error) = self.sink.close().await {
            debug!(%error, "sink close failed");
        }

        listener.on_session_ended(&handle).await;
    }

    async fn drive(&mut self, listener: &Arc<dyn PairingListener>) -> Result<()> {
        self.shared.advance(SessionState::Initializing);
        self.initialization_phase().await?;

        self.shared.advance(SessionState::Configuring);
        self.configuration_phase().await?;

        self.shared.advance(SessionState::Pairing);
        self.pairing_phase(listener).await
    }

    /// Record the agreed configuration and derive this endpoint's role.
    pub(super) fn install_configuration(&mut self, configuration: Configuration) {
        let role = configuration.local_role(self.context.is_server());
        debug!(?role, ?configuration, "configuration installed");
        self.configuration = Some(configuration);
        self.local_role = Some(role);
        *self.shared.role.lock().expect("role lock poisoned") = Some(role);
    }

    /// Phase 3: the role-symmetric secret exchange, shared between
    /// client and server sessions.
    async fn pairing_phase(&mut self, listener: &Arc<dyn PairingListener>) -> Result<()> {
        let configuration = self.configuration.ok_or_else(|| {
            PairingError::Protocol("pairing phase entered without a configuration".to_string())
        })?;
        let role = configuration.local_role(self.context.is_server());
        let challenge = ChallengeResponse::new(
            self.context.client_certificate(),
            self.context.server_certificate(),
        )?;
        let nonce_length = configuration.encoding.nonce_length()?;

        match role {
            DeviceRole::Input => {
                // The user-facing secret collection runs concurrently;
                // the driver only ever waits on the rendezvous queue.
                let task_listener = listener.clone();
                let task_handle = self.handle();
                let failure_tx = self.queue_tx.clone();
                let collector = tokio::spawn(async move {
                    if let Err(error) = task_listener.on_perform_input_role(&task_handle).await {
                        let _ = failure_tx.try_send(QueuedItem::Failure(error));
                    }
                });

                let result = self.input_role_exchange(&challenge).await;
                collector.abort();
                result
            }
            DeviceRole::Display => {
                let nonce = generate_nonce(nonce_length)?;
                let gamma = challenge.gamma(&nonce);
                listener
                    .on_perform_output_role(&self.handle(), &gamma)
                    .await?;

                let PairingMessage::Secret { payload } =
                    self.expect_message(MessageKind::Secret).await?
                else {
                    return Err(PairingError::Protocol("secret message expected".to_string()));
                };

                let expected = challenge.alpha(&nonce);
                if payload != expected {
                    return Err(PairingError::BadSecret);
                }

                self.sink
                    .send_message(PairingMessage::SecretAck { payload })
                    .await
            }
        }
    }

    async fn input_role_exchange(&mut self, challenge: &ChallengeResponse) -> Result<()> {
        let secret = self.wait_for_secret().await?;
        if !challenge.check_gamma(&secret) {
            return Err(PairingError::BadSecret);
        }

        let nonce = extract_nonce(&secret)?;
        let alpha = challenge.alpha(&nonce);
        self.sink
            .send_message(PairingMessage::Secret {
                payload: alpha.clone(),
            })
            .await?;

        let PairingMessage::SecretAck { payload } =
            self.expect_message(MessageKind::SecretAck).await?
        else {
            return Err(PairingError::Protocol("secret ack expected".to_string()));
        };

        if self.verify_secret_ack && payload != alpha {
            return Err(PairingError::BadSecret);
        }
        Ok(())
    }

    /// Dequeue the next item, converting an aborted queue into a
    /// terminal cancellation.
    async fn next_item(&mut self) -> Result<QueuedItem> {
        self.queue
            .next()
            .await
            .ok_or_else(|| PairingError::Cancelled("session torn down".to_string()))
    }

    /// Await an inbound message of the given kind; anything else is a
    /// protocol error.
    pub(super) async fn expect_message(&mut self, kind: MessageKind) -> Result<PairingMessage> {
        match self.next_item().await? {
            QueuedItem::Message(message) if message.kind() == kind => Ok(message),
            QueuedItem::Message(message) => Err(PairingError::Protocol(format!(
                "expected {kind}, got {}",
                message.kind()
            ))),
            QueuedItem::Secret(_) => Err(PairingError::Protocol(format!(
                "unexpected user secret while awaiting {kind}"
            ))),
            QueuedItem::Failure(error) => Err(error),
        }
    }

    /// Await the user-entered secret handed over via
    /// [`SessionHandle::set_secret`].
    async fn wait_for_secret(&mut self) -> Result<Vec<u8>> {
        match self.next_item().await? {
            QueuedItem::Secret(secret) => Ok(secret),
            QueuedItem::Message(message) => Err(PairingError::Protocol(format!(
                "unexpected {} while awaiting user secret",
                message.kind()
            ))),
            QueuedItem::Failure(error) => Err(error),
        }
    }

    pub(super) fn set_service_name(&mut self, name: String) {
        self.service_name = Some(name);
    }

    pub(super) fn set_peer_name(&mut self, name: Option<String>) {
        self.peer_name = name;
    }
}

/// Generate a fresh random nonce from the system's cryptographically
/// secure random source.
fn generate_nonce(length: usize) -> Result<Vec<u8>> {
    let mut nonce = vec![0u8; length];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| PairingError::Crypto("secure random source failed".to_string()))?;
    Ok(nonce)
}
