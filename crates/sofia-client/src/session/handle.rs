//! Session handle
//!
//! A session is one logical login on a shared device connection. It owns
//! the receiving half of its mailbox; the read loop owns the sending half.
//!
//! Only one request is outstanding per session at a time: the mailbox
//! lock is held from sending a request until its reply arrives, and the
//! reply is simply the next frame in the mailbox. Sessions do not match
//! replies to requests by message id.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use sofia_core::SessionError;
use sofia_protocol::{
    CommandReply, CommandRequest, CorrelationId, Frame, LoginRequest, LoginResponse, MessageId,
    SessionId, SystemInfo, SystemInfoReply,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::keepalive::KeepaliveHandle;
use super::state::{SessionCell, SessionState};
use crate::connection::Device;

/// Name carried by keepalive requests
const KEEPALIVE_NAME: &str = "KeepAlive";

pub(crate) struct SessionInner {
    device: Device,
    cell: Arc<SessionCell>,
    username: String,
    password: String,
    mailbox: tokio::sync::Mutex<mpsc::Receiver<Frame>>,
    /// Session id as hex text, from the login response
    session_text: Mutex<String>,
    /// Keepalive period in seconds; zero means none
    keepalive_secs: AtomicU32,
    keepalive: Mutex<Option<KeepaliveHandle>>,
    receive_timeout: Option<Duration>,
}

impl SessionInner {
    /// Send one request and wait for the next frame in the mailbox
    ///
    /// A timed-out session is closed: its reply may still arrive and would
    /// otherwise answer the next request.
    async fn exchange(&self, frame: Frame) -> Result<Frame, SessionError> {
        if self.cell.state() == SessionState::Closed {
            return Err(SessionError::Closed);
        }

        let message_id = frame.message_id;
        let mut mailbox = self.mailbox.lock().await;
        self.device.send(frame).await?;

        let reply = match self.receive_timeout {
            Some(limit) => match tokio::time::timeout(limit, mailbox.recv()).await {
                Ok(reply) => reply,
                Err(_) => {
                    warn!(
                        "No reply to {} within {:?}, closing session {}",
                        message_id, limit, self.cell.session_id()
                    );
                    self.shutdown();
                    return Err(SessionError::Timeout(limit));
                }
            },
            None => mailbox.recv().await,
        };
        reply.ok_or(SessionError::Closed)
    }

    /// Build a request frame addressed with this session's identity
    fn request(&self, name: &str, message_id: MessageId) -> Result<Frame, SessionError> {
        if self.cell.state() != SessionState::Active {
            return Err(SessionError::NotActive);
        }

        let body = CommandRequest::new(name, self.session_text.lock().clone());
        let frame = Frame::json_request(message_id, &body)
            .map_err(SessionError::MalformedPayload)?
            .with_session(self.cell.session_id())
            .with_sequence(self.cell.sequence());
        Ok(frame)
    }

    async fn command(&self, name: &str, message_id: MessageId) -> Result<Frame, SessionError> {
        let frame = self.request(name, message_id)?;
        let reply = self.exchange(frame).await?;

        if reply.message_id != message_id.response() {
            debug!(
                "{} for {} answered with {}",
                message_id, name, reply.message_id
            );
        }
        Ok(reply)
    }

    pub(crate) async fn keep_alive(&self) -> Result<(), SessionError> {
        let reply = self.command(KEEPALIVE_NAME, MessageId::KEEPALIVE_REQ).await?;
        let body: CommandReply = reply.json().map_err(SessionError::MalformedPayload)?;
        if !body.ret.is_ok() {
            return Err(SessionError::CommandFailed {
                name: KEEPALIVE_NAME.to_string(),
                ret: body.ret,
            });
        }
        debug!("Keepalive acknowledged for {}", self.cell.session_id());
        Ok(())
    }

    fn start_keepalive(self: &Arc<Self>, period: Duration) {
        let mut keepalive = self.keepalive.lock();
        if let Some(handle) = keepalive.as_ref().filter(|handle| handle.is_running()) {
            handle.set_period(period);
            return;
        }
        *keepalive = Some(KeepaliveHandle::spawn(Arc::downgrade(self), period));
    }

    fn stop_keepalive(&self) {
        if let Some(handle) = self.keepalive.lock().take() {
            handle.stop();
        }
    }

    fn shutdown(&self) {
        self.stop_keepalive();
        self.device.unregister(&self.cell);
        if self.cell.close() {
            debug!("Session {} closed", self.cell.correlation_id());
        }
    }
}

/// One logical login on a device connection
///
/// Dropping the session closes it.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub(crate) fn new(
        device: Device,
        cell: Arc<SessionCell>,
        username: String,
        password: String,
        mailbox: mpsc::Receiver<Frame>,
    ) -> Self {
        let receive_timeout = device.config().response_timeout;
        Self {
            inner: Arc::new(SessionInner {
                device,
                cell,
                username,
                password,
                mailbox: tokio::sync::Mutex::new(mailbox),
                session_text: Mutex::new(String::new()),
                keepalive_secs: AtomicU32::new(0),
                keepalive: Mutex::new(None),
                receive_timeout,
            }),
        }
    }

    pub fn device(&self) -> &Device {
        &self.inner.device
    }

    pub fn username(&self) -> &str {
        &self.inner.username
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.inner.cell.correlation_id()
    }

    /// Device-assigned id; unassigned until login succeeds
    pub fn session_id(&self) -> SessionId {
        self.inner.cell.session_id()
    }

    /// Session id as hex text from the login response, e.g. `0x0000000B`
    pub fn session_text(&self) -> String {
        self.inner.session_text.lock().clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.cell.state()
    }

    /// Current value of the per-session sequence counter
    pub fn sequence(&self) -> u8 {
        self.inner.cell.sequence()
    }

    /// Keepalive period, zero when no keepalive is scheduled
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.inner.keepalive_secs.load(Ordering::Acquire)))
    }

    pub fn is_keepalive_running(&self) -> bool {
        self.inner
            .keepalive
            .lock()
            .as_ref()
            .is_some_and(KeepaliveHandle::is_running)
    }

    /// Log in with this session's credentials
    ///
    /// On success the session is active, records the device's session id
    /// and starts sending keepalives at the advised interval. A rejected
    /// login closes the session; create a new one to try again. An
    /// unreadable login response leaves the session as routing left it,
    /// without a keepalive.
    pub async fn login(&self) -> Result<LoginResponse, SessionError> {
        match self.state() {
            SessionState::Pending => {}
            SessionState::Active => return Err(SessionError::AlreadyLoggedIn),
            SessionState::Closed => return Err(SessionError::Closed),
        }

        let request = LoginRequest::new(self.inner.username.as_str(), self.inner.password.as_str());
        let frame = Frame::json_request(MessageId::LOGIN_REQ2, &request)
            .map_err(SessionError::MalformedPayload)?
            .with_session(SessionId::UNASSIGNED)
            .with_sequence(0)
            .with_correlation(self.correlation_id());

        let reply = self.inner.exchange(frame).await?;
        let response: LoginResponse = reply.json().map_err(|e| {
            warn!("Unreadable login response for {}: {}", self.inner.username, e);
            SessionError::MalformedPayload(e)
        })?;

        if !response.ret.is_success() {
            warn!("Login as {} rejected: {}", self.inner.username, response.ret);
            self.inner.shutdown();
            return Err(SessionError::LoginRejected(response.ret));
        }

        *self.inner.session_text.lock() = response.session_id.clone();
        self.inner
            .keepalive_secs
            .store(response.alive_interval, Ordering::Release);

        info!(
            "Logged in as {} on {} ({}, keepalive {}s)",
            self.inner.username,
            self.inner.device.address(),
            self.session_id(),
            response.alive_interval
        );

        if response.alive_interval > 0 {
            self.inner
                .start_keepalive(Duration::from_secs(u64::from(response.alive_interval)));
        }
        Ok(response)
    }

    /// Send a named command and return the raw reply payload
    pub async fn command(&self, name: &str, message_id: MessageId) -> Result<Bytes, SessionError> {
        let reply = self.inner.command(name, message_id).await?;
        Ok(reply.payload)
    }

    /// Send a named command and parse the reply, failing on a non-OK code
    pub async fn command_json(
        &self,
        name: &str,
        message_id: MessageId,
    ) -> Result<CommandReply, SessionError> {
        self.typed_command(name, message_id, |reply: &CommandReply| reply.ret)
            .await
    }

    async fn typed_command<T, F>(
        &self,
        name: &str,
        message_id: MessageId,
        ret: F,
    ) -> Result<T, SessionError>
    where
        T: DeserializeOwned,
        F: FnOnce(&T) -> sofia_protocol::ReturnCode,
    {
        let reply = self.inner.command(name, message_id).await?;
        let body: T = reply.json().map_err(SessionError::MalformedPayload)?;
        let code = ret(&body);
        if !code.is_ok() {
            return Err(SessionError::CommandFailed {
                name: name.to_string(),
                ret: code,
            });
        }
        Ok(body)
    }

    /// Hardware and firmware description
    pub async fn system_info(&self) -> Result<SystemInfo, SessionError> {
        let reply = self
            .typed_command("SystemInfo", MessageId::SYSINFO_REQ, |r: &SystemInfoReply| {
                r.ret
            })
            .await?;
        Ok(reply.system_info)
    }

    /// Supported feature flags
    pub async fn abilities(&self) -> Result<CommandReply, SessionError> {
        self.command_json("SystemFunction", MessageId::ABILITY_GET)
            .await
    }

    /// Vendor information
    pub async fn oem_info(&self) -> Result<CommandReply, SessionError> {
        self.command_json("OEMInfo", MessageId::SYSINFO_REQ).await
    }

    /// Permissions available to this user
    pub async fn authority_list(&self) -> Result<CommandReply, SessionError> {
        self.command_json("AuthorityList", MessageId::AUTHORITY_LIST_REQ)
            .await
    }

    /// A named configuration section, e.g. `General.General`
    pub async fn config(&self, name: &str) -> Result<CommandReply, SessionError> {
        self.command_json(name, MessageId::CONFIG_GET).await
    }

    /// Change the keepalive period
    ///
    /// A running keepalive picks up the new period without restarting;
    /// zero stops it.
    pub fn set_keepalive_interval(&self, seconds: u32) -> Result<(), SessionError> {
        if self.state() != SessionState::Active {
            return Err(SessionError::NotActive);
        }

        self.inner.keepalive_secs.store(seconds, Ordering::Release);
        if seconds == 0 {
            self.inner.stop_keepalive();
        } else {
            self.inner
                .start_keepalive(Duration::from_secs(u64::from(seconds)));
        }
        Ok(())
    }

    /// Tell the device the session is ending, then close it
    ///
    /// The session is closed even if the device does not answer.
    pub async fn logout(&self) -> Result<(), SessionError> {
        if self.state() != SessionState::Active {
            self.close();
            return Ok(());
        }

        self.inner.stop_keepalive();
        let result = self.inner.command("", MessageId::LOGOUT_REQ).await;
        self.close();

        match result {
            Ok(_) | Err(SessionError::Closed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Stop keepalives and drop the session from routing
    pub fn close(&self) {
        self.inner.shutdown();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("correlation_id", &self.correlation_id())
            .field("session_id", &self.session_id())
            .field("state", &self.state())
            .finish()
    }
}
