/*
[INPUT]:  StreamClient commands, auth gate, trigger broadcasts, transport events, timers
[OUTPUT]: Executed session effects and a watch channel of StreamView
[POS]:    Stream layer - tokio driver around the pure Session
[UPDATE]: When changing how effects map to tasks, sockets, or timers
*/

use std::collections::HashMap;

use gestalt_signal_adapter::{
    AuthGate, CLIENT_CLEANUP_CODE, CLIENT_CLEANUP_REASON, TransportEvent, TransportHandle,
    spawn_transport,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::session::{CloseMode, Effect, Input, Session, SessionConfig, Timer, TimerSlot};
use super::state::{AttemptId, StreamView};
use super::triggers::{ExternalTrigger, TriggerSource};

#[derive(Debug)]
enum Command {
    Start,
    ForceReconnect,
    Stop(Option<oneshot::Sender<()>>),
}

/// Handle to a running stream session.
///
/// All session work happens on one worker task; this handle only sends
/// commands and reads the published [`StreamView`].
#[derive(Debug)]
pub struct StreamClient {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<StreamView>,
    worker: JoinHandle<()>,
}

impl StreamClient {
    /// Mount a session for `url`. Nothing connects until [`Self::start`].
    pub fn spawn(
        url: impl Into<String>,
        config: SessionConfig,
        gate: &dyn AuthGate,
        triggers: &dyn TriggerSource,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(StreamView::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (timers_tx, timers_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            url: url.into(),
            session: Session::new(config),
            transport: None,
            timers: HashMap::new(),
            events_tx,
            timers_tx,
            view_tx,
        };
        let task = tokio::spawn(worker.run(
            commands_rx,
            events_rx,
            timers_rx,
            gate.watch(),
            triggers.subscribe(),
        ));

        Self {
            commands: commands_tx,
            view: view_rx,
            worker: task,
        }
    }

    /// Begin connecting. No-op while an attempt is in flight or after stop.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Drop the current attempt and reconnect after the grace period, skipping backoff.
    pub fn force_reconnect(&self) {
        self.send(Command::ForceReconnect);
    }

    /// Tear down for good.
    ///
    /// Returns once timers are cancelled, the transport is detached and
    /// trigger subscriptions are dropped. Later calls return immediately.
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Stop(Some(ack_tx))).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamView> {
        self.view.clone()
    }

    pub fn view(&self) -> StreamView {
        self.view.borrow().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.worker.is_finished()
    }

    fn send(&self, command: Command) {
        if let Err(err) = self.commands.send(command) {
            debug!(command = ?err.0, "stream client already stopped");
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Stop(None));
    }
}

struct Worker {
    url: String,
    session: Session,
    transport: Option<(AttemptId, TransportHandle)>,
    timers: HashMap<TimerSlot, JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<(AttemptId, TransportEvent)>,
    timers_tx: mpsc::UnboundedSender<Input>,
    view_tx: watch::Sender<StreamView>,
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<(AttemptId, TransportEvent)>,
        mut timers: mpsc::UnboundedReceiver<Input>,
        mut gate: watch::Receiver<bool>,
        mut triggers: broadcast::Receiver<ExternalTrigger>,
    ) {
        let authenticated = *gate.borrow_and_update();
        self.apply(Input::Auth(authenticated));

        let mut gate_open = true;
        let mut triggers_open = true;

        let ack = loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Start) => self.apply(Input::Start),
                    Some(Command::ForceReconnect) => self.apply(Input::ForceReconnect),
                    Some(Command::Stop(ack)) => break ack,
                    None => break None,
                },
                Some((attempt, event)) = events.recv() => self.on_transport(attempt, event),
                Some(input) = timers.recv() => self.apply(input),
                changed = gate.changed(), if gate_open => match changed {
                    Ok(()) => {
                        let authenticated = *gate.borrow_and_update();
                        self.apply(Input::Auth(authenticated));
                    }
                    Err(_) => {
                        debug!("auth gate dropped");
                        gate_open = false;
                    }
                },
                trigger = triggers.recv(), if triggers_open => match trigger {
                    Ok(trigger) => self.apply(Input::Trigger(trigger)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "stream client lagged behind triggers");
                    }
                    Err(RecvError::Closed) => {
                        debug!("trigger source closed");
                        triggers_open = false;
                    }
                },
            }
        };

        self.apply(Input::Stop);
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        drop(triggers);
        drop(gate);
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
        debug!("stream worker exited");
    }

    fn on_transport(&mut self, attempt: AttemptId, event: TransportEvent) {
        if event.is_terminal()
            && self
                .transport
                .as_ref()
                .is_some_and(|(current, _)| *current == attempt)
        {
            self.transport = None;
        }
        self.apply(Input::Transport { attempt, event });
    }

    fn apply(&mut self, input: Input) {
        for effect in self.session.handle(input) {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Open(attempt) => {
                if let Some((previous, handle)) = self.transport.take() {
                    warn!(%previous, %attempt, "replacing live transport");
                    handle.abandon();
                }
                let handle = spawn_transport(&self.url, attempt, self.events_tx.clone());
                self.transport = Some((attempt, handle));
            }
            Effect::Send { attempt, message } => match &self.transport {
                Some((current, handle)) if *current == attempt => {
                    if let Err(err) = handle.send(&message) {
                        debug!(%attempt, error = %err, "outbound frame dropped");
                    }
                }
                _ => trace!(%attempt, "send skipped: transport gone"),
            },
            Effect::Close { attempt, mode } => {
                let Some((current, handle)) = self.transport.take() else {
                    return;
                };
                if current != attempt {
                    self.transport = Some((current, handle));
                    return;
                }
                match mode {
                    CloseMode::Cleanup => handle.close(CLIENT_CLEANUP_CODE, CLIENT_CLEANUP_REASON),
                    CloseMode::Abandon => handle.abandon(),
                }
            }
            Effect::Arm { timer, after } => self.arm(timer, after),
            Effect::Cancel(slot) => {
                if let Some(handle) = self.timers.remove(&slot) {
                    handle.abort();
                }
            }
            Effect::Publish => {
                self.view_tx.send_replace(self.session.view());
            }
        }
    }

    fn arm(&mut self, timer: Timer, after: std::time::Duration) {
        let tx = self.timers_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(timer.fired());
        });
        if let Some(previous) = self.timers.insert(timer.slot(), handle) {
            previous.abort();
        }
    }
}
