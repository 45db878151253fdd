// Socket lifecycle: connect, join on open, best-effort sends, reconnect on close.
//
// The socket itself lives behind `Transport`: a real WebSocket in the console client, a thin
// request queue in the browser (where JS owns the socket). Callbacks are delivered by the driver,
// which also calls `tick` regularly so that scheduled reconnects fire.

use std::fmt;
use std::time::Duration;

use instant::Instant;
use url::Url;

use crate::config::ReconnectPolicy;
use crate::event::{ClientEvent, ServerEvent};
use crate::force::Force;
use crate::network::{self, Decoded};


#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TransportError {
    Open(String),
    Send(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Open(err) => write!(f, "cannot open socket: {err}"),
            TransportError::Send(err) => write!(f, "cannot send: {err}"),
        }
    }
}

pub trait Transport {
    // Starts connecting. Completion is reported through `Connection::on_open` or
    // `Connection::on_close`.
    fn open(&mut self, url: &Url) -> Result<(), TransportError>;
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    fn close(&mut self);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    WaitingToReconnect { reconnect_at: Instant },
    Terminated,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SendOutcome {
    Sent,
    Dropped,
}

pub struct Connection<T: Transport> {
    transport: T,
    url: Url,
    name: String,
    color_hint: Option<Force>,
    policy: ReconnectPolicy,
    state: ConnectionState,
    // Delay before the next reconnect attempt. `None` until the first failure.
    next_delay: Option<Duration>,
}

impl<T: Transport> Connection<T> {
    pub fn new(
        transport: T, url: Url, name: String, color_hint: Option<Force>, policy: ReconnectPolicy,
    ) -> Self {
        Connection {
            transport,
            url,
            name,
            color_hint,
            policy,
            state: ConnectionState::Idle,
            next_delay: None,
        }
    }

    pub fn url(&self) -> &Url { &self.url }
    pub fn state(&self) -> ConnectionState { self.state }
    pub fn is_open(&self) -> bool { self.state == ConnectionState::Open }
    pub fn transport(&self) -> &T { &self.transport }
    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    // Sent with the next `join`. Does not rejoin by itself.
    pub fn set_color_hint(&mut self, color: Option<Force>) { self.color_hint = color; }

    pub fn connect(&mut self, now: Instant) {
        if self.state == ConnectionState::Terminated {
            return;
        }
        log::info!("Connecting to {}", self.url);
        self.state = ConnectionState::Connecting;
        if let Err(err) = self.transport.open(&self.url) {
            log::warn!("{err}");
            self.on_close(now);
        }
    }

    pub fn on_open(&mut self, _now: Instant) {
        if self.state == ConnectionState::Terminated {
            return;
        }
        log::info!("Connected to {}", self.url);
        self.state = ConnectionState::Open;
        self.next_delay = None;
        self.send(&ClientEvent::Join {
            name: self.name.clone(),
            color: self.color_hint,
        });
    }

    // Unknown and malformed frames are dropped here. Newer servers may send things we do not
    // understand yet.
    pub fn on_message(&mut self, raw: &str) -> Option<ServerEvent> {
        match network::decode(raw) {
            Decoded::Message(event) => Some(event),
            Decoded::Ignored(err) => {
                log::debug!("Ignoring server frame: {err}");
                None
            }
        }
    }

    pub fn on_close(&mut self, now: Instant) {
        match self.state {
            ConnectionState::Terminated | ConnectionState::WaitingToReconnect { .. } => return,
            ConnectionState::Idle | ConnectionState::Connecting | ConnectionState::Open => {}
        }
        match self.policy {
            ReconnectPolicy::Reconnect { initial_delay, max_delay, multiplier } => {
                let delay = self.next_delay.unwrap_or(initial_delay).min(max_delay);
                self.next_delay = Some(grow_delay(delay, multiplier, max_delay));
                log::info!("Disconnected, reconnecting in {delay:?}");
                self.state = ConnectionState::WaitingToReconnect { reconnect_at: now + delay };
            }
            ReconnectPolicy::Terminate => {
                log::info!("Disconnected");
                self.state = ConnectionState::Terminated;
            }
        }
    }

    // Browsers follow every error with a close, so errors are only reported.
    pub fn on_error(&mut self, err: &str) {
        log::warn!("Socket error: {err}");
    }

    pub fn tick(&mut self, now: Instant) {
        if let ConnectionState::WaitingToReconnect { reconnect_at } = self.state {
            if now >= reconnect_at {
                self.connect(now);
            }
        }
    }

    // Fire-and-forget: nothing is queued while the socket is not open.
    pub fn send(&mut self, event: &ClientEvent) -> SendOutcome {
        if !self.is_open() {
            log::debug!("Socket is not open, dropping {event:?}");
            return SendOutcome::Dropped;
        }
        match self.transport.send_text(network::encode(event)) {
            Ok(()) => SendOutcome::Sent,
            Err(err) => {
                log::debug!("{err}, dropping {event:?}");
                SendOutcome::Dropped
            }
        }
    }

    pub fn teardown(&mut self) {
        if self.state != ConnectionState::Terminated {
            self.state = ConnectionState::Terminated;
            self.transport.close();
        }
    }
}

fn grow_delay(delay: Duration, multiplier: f64, max_delay: Duration) -> Duration {
    if multiplier.is_nan() || multiplier < 1.0 {
        return delay;
    }
    Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier)
        .unwrap_or(max_delay)
        .min(max_delay)
}
