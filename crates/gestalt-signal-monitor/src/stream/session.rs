/*
[INPUT]:  Commands, auth gate changes, external triggers, tagged transport events, timer firings
[OUTPUT]: Effects for the runtime to execute (open/send/close/arm/cancel/publish)
[POS]:    Stream layer - connection lifecycle state machine (pure, no I/O)
[UPDATE]: When changing lifecycle transitions, retry rules, or stale-event handling
*/

use std::time::Duration;

use gestalt_signal_adapter::{ClientMessage, TransportEvent};
use tracing::{debug, info, trace, warn};

use super::dispatch::{DEFAULT_HISTORY_LIMIT, Dispatcher};
use super::policy::{BackoffConfig, ReconnectPolicy, ReconnectSchedule};
use super::state::{AttemptId, CloseKind, ConnectionState, Status, StreamFault, StreamView};
use super::triggers::ExternalTrigger;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub force_reconnect_grace: Duration,
    pub history_limit: usize,
    pub backoff: BackoffConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            // Below the usual 30s idle cutoff of proxies and load balancers.
            heartbeat_interval: Duration::from_secs(25),
            force_reconnect_grace: Duration::from_millis(100),
            history_limit: DEFAULT_HISTORY_LIMIT,
            backoff: BackoffConfig::default(),
        }
    }
}

/// The three timer handles a session owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    ConnectTimeout,
    Reconnect,
    Heartbeat,
}

/// A timer tagged with whatever armed it, so a late firing can be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    ConnectTimeout(AttemptId),
    Reconnect(u64),
    Heartbeat(AttemptId),
}

impl Timer {
    pub fn slot(self) -> TimerSlot {
        match self {
            Timer::ConnectTimeout(_) => TimerSlot::ConnectTimeout,
            Timer::Reconnect(_) => TimerSlot::Reconnect,
            Timer::Heartbeat(_) => TimerSlot::Heartbeat,
        }
    }

    /// The input delivered when this timer fires.
    pub fn fired(self) -> Input {
        match self {
            Timer::ConnectTimeout(attempt) => Input::ConnectTimeout(attempt),
            Timer::Reconnect(token) => Input::ReconnectDue(token),
            Timer::Heartbeat(attempt) => Input::HeartbeatDue(attempt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Coded close (1000, "Client cleanup"); the server sees a deliberate disconnect.
    Cleanup,
    /// Drop the socket without a coded close.
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Open(AttemptId),
    Send {
        attempt: AttemptId,
        message: ClientMessage,
    },
    Close {
        attempt: AttemptId,
        mode: CloseMode,
    },
    Arm {
        timer: Timer,
        after: Duration,
    },
    Cancel(TimerSlot),
    Publish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start,
    Stop,
    ForceReconnect,
    Auth(bool),
    Trigger(ExternalTrigger),
    Transport {
        attempt: AttemptId,
        event: TransportEvent,
    },
    ConnectTimeout(AttemptId),
    ReconnectDue(u64),
    HeartbeatDue(AttemptId),
}

/// Connection lifecycle for one mounted client.
///
/// Every input is processed to completion before the next; all I/O is
/// described as [`Effect`]s. Events and timers carry the attempt or schedule
/// token that produced them and are dropped unless it is still current.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    policy: ReconnectPolicy,
    schedule: ReconnectSchedule,
    dispatcher: Dispatcher,
    state: ConnectionState,
    status: Status,
    error: Option<StreamFault>,
    current: Option<AttemptId>,
    last_attempt: u64,
    pending_reconnect: Option<u64>,
    last_token: u64,
    authenticated: bool,
    wanted: bool,
    terminating: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            policy: ReconnectPolicy::new(config.backoff.clone()),
            dispatcher: Dispatcher::new(config.history_limit),
            config,
            schedule: ReconnectSchedule::default(),
            state: ConnectionState::Idle,
            status: Status::Idle,
            error: None,
            current: None,
            last_attempt: 0,
            pending_reconnect: None,
            last_token: 0,
            authenticated: false,
            wanted: false,
            terminating: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.current
    }

    pub fn schedule(&self) -> ReconnectSchedule {
        self.schedule
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    pub fn view(&self) -> StreamView {
        StreamView {
            connected: self.state == ConnectionState::Open,
            state: self.state,
            status: self.status,
            error: self.error.clone(),
            snapshot: self.dispatcher.snapshot(),
            history: self.dispatcher.history(),
        }
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let mut fx = Vec::new();
        match input {
            Input::Start => self.start(&mut fx),
            Input::Stop => self.stop(&mut fx),
            Input::ForceReconnect => self.force_reconnect(&mut fx),
            Input::Auth(authenticated) => self.on_auth(authenticated, &mut fx),
            Input::Trigger(trigger) => self.on_trigger(trigger, &mut fx),
            Input::Transport { attempt, event } => self.on_transport(attempt, event, &mut fx),
            Input::ConnectTimeout(attempt) => self.on_connect_timeout(attempt, &mut fx),
            Input::ReconnectDue(token) => self.on_reconnect_due(token, &mut fx),
            Input::HeartbeatDue(attempt) => self.on_heartbeat_due(attempt, &mut fx),
        }
        fx
    }

    fn start(&mut self, fx: &mut Vec<Effect>) {
        if self.terminating {
            debug!("start ignored: session stopped");
            return;
        }
        self.wanted = true;

        if !self.authenticated {
            if self.status != Status::AwaitingAuth {
                self.status = Status::AwaitingAuth;
                fx.push(Effect::Publish);
            }
            debug!("start deferred until authenticated");
            return;
        }

        if self.state.is_in_flight() {
            trace!(state = ?self.state, "start ignored: attempt already in flight");
            return;
        }

        self.cancel_reconnect(fx);
        if let Some(stale) = self.current.take() {
            fx.push(Effect::Close {
                attempt: stale,
                mode: CloseMode::Abandon,
            });
        }

        self.last_attempt += 1;
        let attempt = AttemptId(self.last_attempt);
        self.current = Some(attempt);
        self.state = ConnectionState::Connecting;
        self.status = Status::Connecting;
        self.error = None;

        info!(%attempt, attempt_count = self.schedule.attempt_count, "connecting");
        fx.push(Effect::Open(attempt));
        fx.push(Effect::Arm {
            timer: Timer::ConnectTimeout(attempt),
            after: self.config.connect_timeout,
        });
        fx.push(Effect::Publish);
    }

    fn stop(&mut self, fx: &mut Vec<Effect>) {
        if self.terminating {
            debug!("stop ignored: already stopped");
            return;
        }
        self.terminating = true;
        self.wanted = false;
        self.pending_reconnect = None;

        fx.push(Effect::Cancel(TimerSlot::ConnectTimeout));
        fx.push(Effect::Cancel(TimerSlot::Reconnect));
        fx.push(Effect::Cancel(TimerSlot::Heartbeat));
        self.release_current(fx);

        self.state = ConnectionState::Closed(CloseKind::Intentional);
        self.status = Status::Disconnected;
        info!("stream stopped");
        fx.push(Effect::Publish);
    }

    fn force_reconnect(&mut self, fx: &mut Vec<Effect>) {
        if self.terminating {
            debug!("force reconnect ignored: session stopped");
            return;
        }
        if !self.authenticated {
            self.start(fx);
            return;
        }
        self.wanted = true;

        info!(attempt = ?self.current, "forced reconnect");
        self.schedule.reset();
        fx.push(Effect::Cancel(TimerSlot::ConnectTimeout));
        fx.push(Effect::Cancel(TimerSlot::Heartbeat));
        self.release_current(fx);
        self.state = ConnectionState::Closed(CloseKind::Intentional);

        // Reuses the reconnect slot, replacing any pending backoff timer.
        let token = self.next_token();
        self.pending_reconnect = Some(token);
        fx.push(Effect::Arm {
            timer: Timer::Reconnect(token),
            after: self.config.force_reconnect_grace,
        });

        self.status = Status::Connecting;
        self.error = None;
        fx.push(Effect::Publish);
    }

    fn on_auth(&mut self, authenticated: bool, fx: &mut Vec<Effect>) {
        if self.authenticated == authenticated {
            return;
        }
        self.authenticated = authenticated;
        if self.terminating {
            return;
        }

        if authenticated {
            info!("authentication gate opened");
            if self.wanted && !self.state.is_in_flight() {
                self.start(fx);
            }
            return;
        }

        info!("authentication gate closed; disconnecting");
        self.pending_reconnect = None;
        fx.push(Effect::Cancel(TimerSlot::ConnectTimeout));
        fx.push(Effect::Cancel(TimerSlot::Reconnect));
        fx.push(Effect::Cancel(TimerSlot::Heartbeat));
        self.release_current(fx);
        self.schedule.reset();
        self.state = ConnectionState::Idle;
        self.status = Status::AwaitingAuth;
        fx.push(Effect::Publish);
    }

    fn on_trigger(&mut self, trigger: ExternalTrigger, fx: &mut Vec<Effect>) {
        if self.terminating || !self.wanted {
            trace!(?trigger, "trigger ignored");
            return;
        }

        match trigger {
            ExternalTrigger::VisibilityRegained | ExternalTrigger::ConnectivityRegained => {
                match self.state {
                    ConnectionState::Open => return,
                    ConnectionState::Connecting => {
                        if self.status == Status::Offline {
                            self.status = Status::Connecting;
                            fx.push(Effect::Publish);
                        }
                        return;
                    }
                    _ => {}
                }
                info!(?trigger, state = ?self.state, "recovering immediately");
                self.schedule.reset();
                self.start(fx);
            }
            ExternalTrigger::ConnectivityLost => {
                // Status only: the environment already severed the socket.
                // A handshake in flight keeps its deadline.
                warn!("network connectivity lost");
                fx.push(Effect::Cancel(TimerSlot::Heartbeat));
                if self.state != ConnectionState::Connecting {
                    self.state = ConnectionState::Closed(CloseKind::Lost);
                }
                self.status = Status::Offline;
                fx.push(Effect::Publish);
            }
        }
    }

    fn on_transport(&mut self, attempt: AttemptId, event: TransportEvent, fx: &mut Vec<Effect>) {
        if self.terminating || self.current != Some(attempt) {
            trace!(%attempt, current = ?self.current, ?event, "stale transport event dropped");
            return;
        }

        match event {
            TransportEvent::Opened => self.on_open(attempt, fx),
            TransportEvent::Frame(text) => {
                if self.state != ConnectionState::Open {
                    trace!(%attempt, state = ?self.state, "frame outside open state dropped");
                    return;
                }
                match self.dispatcher.handle_frame(&text) {
                    Ok(true) => fx.push(Effect::Publish),
                    Ok(false) => {}
                    Err(fault) => debug!(%attempt, error = %fault, "frame discarded"),
                }
            }
            TransportEvent::Closed(info) => {
                let kind = if info.is_client_cleanup() {
                    CloseKind::Intentional
                } else {
                    CloseKind::Lost
                };
                let fault = StreamFault::Lost {
                    code: info.code,
                    reason: info.reason,
                };
                self.on_closed(attempt, kind, fault, fx);
            }
            TransportEvent::Failed(error) => {
                self.on_closed(attempt, CloseKind::Lost, StreamFault::Transport(error), fx);
            }
        }
    }

    fn on_open(&mut self, attempt: AttemptId, fx: &mut Vec<Effect>) {
        fx.push(Effect::Cancel(TimerSlot::ConnectTimeout));
        self.state = ConnectionState::Open;
        self.schedule.reset();
        self.error = None;
        self.status = Status::Connected;

        info!(%attempt, "connected");
        fx.push(Effect::Arm {
            timer: Timer::Heartbeat(attempt),
            after: self.config.heartbeat_interval,
        });
        fx.push(Effect::Publish);
    }

    fn on_closed(
        &mut self,
        attempt: AttemptId,
        kind: CloseKind,
        fault: StreamFault,
        fx: &mut Vec<Effect>,
    ) {
        fx.push(Effect::Cancel(TimerSlot::Heartbeat));
        fx.push(Effect::Cancel(TimerSlot::ConnectTimeout));
        self.current = None;
        self.state = ConnectionState::Closed(kind);

        if kind == CloseKind::Intentional {
            info!(%attempt, "connection closed by client");
            self.status = Status::Disconnected;
            fx.push(Effect::Publish);
            return;
        }

        warn!(%attempt, error = %fault, "connection lost");
        self.error = Some(fault);
        self.schedule_reconnect(fx);
    }

    fn on_connect_timeout(&mut self, attempt: AttemptId, fx: &mut Vec<Effect>) {
        if self.terminating
            || self.current != Some(attempt)
            || self.state != ConnectionState::Connecting
        {
            trace!(%attempt, "stale connect timeout dropped");
            return;
        }

        let after = self.config.connect_timeout;
        warn!(%attempt, timeout_ms = after.as_millis() as u64, "connection attempt timed out");
        fx.push(Effect::Close {
            attempt,
            mode: CloseMode::Abandon,
        });
        self.current = None;
        self.state = ConnectionState::Closed(CloseKind::Lost);
        self.error = Some(StreamFault::Timeout { after });
        self.schedule_reconnect(fx);
    }

    fn on_reconnect_due(&mut self, token: u64, fx: &mut Vec<Effect>) {
        if self.terminating || self.pending_reconnect != Some(token) {
            trace!(token, "stale reconnect timer dropped");
            return;
        }
        self.pending_reconnect = None;
        self.start(fx);
    }

    fn on_heartbeat_due(&mut self, attempt: AttemptId, fx: &mut Vec<Effect>) {
        if self.terminating
            || self.current != Some(attempt)
            || self.state != ConnectionState::Open
        {
            trace!(%attempt, "stale heartbeat dropped");
            return;
        }
        fx.push(Effect::Send {
            attempt,
            message: ClientMessage::Ping,
        });
        fx.push(Effect::Arm {
            timer: Timer::Heartbeat(attempt),
            after: self.config.heartbeat_interval,
        });
    }

    fn schedule_reconnect(&mut self, fx: &mut Vec<Effect>) {
        if self.terminating || !self.authenticated {
            fx.push(Effect::Publish);
            return;
        }

        let delay = self.schedule.advance(&self.policy);
        let token = self.next_token();
        self.pending_reconnect = Some(token);
        self.status = Status::Reconnecting { delay };

        info!(
            attempt_count = self.schedule.attempt_count,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        fx.push(Effect::Arm {
            timer: Timer::Reconnect(token),
            after: delay,
        });
        fx.push(Effect::Publish);
    }

    fn cancel_reconnect(&mut self, fx: &mut Vec<Effect>) {
        if self.pending_reconnect.take().is_some() {
            fx.push(Effect::Cancel(TimerSlot::Reconnect));
        }
    }

    /// Detach the current attempt; a live one gets a coded close.
    fn release_current(&mut self, fx: &mut Vec<Effect>) {
        if let Some(attempt) = self.current.take() {
            let mode = if self.state.is_in_flight() {
                CloseMode::Cleanup
            } else {
                CloseMode::Abandon
            };
            fx.push(Effect::Close { attempt, mode });
        }
    }

    fn next_token(&mut self) -> u64 {
        self.last_token += 1;
        self.last_token
    }
}
