/*
[INPUT]:  WebSocket URL, a caller-chosen attempt tag, and an event channel
[OUTPUT]: One ordered TransportEvent stream per connection attempt
[POS]:    WebSocket layer - single-connection transport task
[UPDATE]: When changing connect, close, or frame forwarding behavior
*/

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace};

use super::message::{ClientMessage, CloseInfo};
use crate::http::{GestaltError, Result};

const OUTBOUND_CAPACITY: usize = 32;

/// Events reported by one transport, in order:
/// `Opened`, any number of `Frame`s, then exactly one of `Closed` / `Failed`.
///
/// A transport that fails to connect reports `Failed` without `Opened`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Closed(CloseInfo),
    Failed(String),
}

impl TransportEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Closed(_) | TransportEvent::Failed(_))
    }
}

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close(CloseInfo),
}

/// Owning handle to a spawned transport task.
///
/// Dropping the handle abandons the connection: the task sends a bare close
/// frame and exits.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::Sender<Outbound>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Queue a client frame.
    pub fn send(&self, message: &ClientMessage) -> Result<()> {
        self.outbound
            .try_send(Outbound::Text(message.to_json()))
            .map_err(|err| GestaltError::WebSocket(format!("send queue unavailable: {err}")))
    }

    /// Close with an explicit code and reason; the task reports `Closed` with the same pair.
    pub fn close(self, code: u16, reason: &str) {
        let _ = self
            .outbound
            .try_send(Outbound::Close(CloseInfo::new(code, reason)));
    }

    /// Drop the connection without a coded close.
    pub fn abandon(self) {
        drop(self.outbound);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a transport task for one connection attempt.
///
/// Every event is tagged with `tag` so the consumer can discard events from
/// attempts it no longer cares about.
pub fn spawn_transport<T>(
    url: &str,
    tag: T,
    events: mpsc::UnboundedSender<(T, TransportEvent)>,
) -> TransportHandle
where
    T: Copy + Send + std::fmt::Debug + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let url = url.to_string();
    let task = tokio::spawn(async move {
        let terminal = run_transport(&url, tag, outbound_rx, &events).await;
        debug!(?tag, event = ?terminal, "ws transport finished");
        let _ = events.send((tag, terminal));
    });

    TransportHandle {
        outbound: outbound_tx,
        task,
    }
}

async fn run_transport<T>(
    url: &str,
    tag: T,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    events: &mpsc::UnboundedSender<(T, TransportEvent)>,
) -> TransportEvent
where
    T: Copy + Send + std::fmt::Debug + 'static,
{
    let connect = tokio::select! {
        result = connect_async(url) => result,
        outbound = outbound_rx.recv() => {
            // Cancelled before the handshake finished.
            return match outbound {
                Some(Outbound::Close(info)) => TransportEvent::Closed(info),
                _ => TransportEvent::Closed(CloseInfo::default()),
            };
        }
    };

    let ws_stream = match connect {
        Ok((ws_stream, _response)) => ws_stream,
        Err(err) => return TransportEvent::Failed(err.to_string()),
    };

    if events.send((tag, TransportEvent::Opened)).is_err() {
        return TransportEvent::Closed(CloseInfo::default());
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(Outbound::Text(text)) => {
                        if let Err(err) = write.send(WsMessage::Text(text.into())).await {
                            return TransportEvent::Failed(err.to_string());
                        }
                    }
                    Some(Outbound::Close(info)) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(info.code.unwrap_or(1000)),
                            reason: info.reason.clone().into(),
                        };
                        let _ = write.send(WsMessage::Close(Some(frame))).await;
                        return TransportEvent::Closed(info);
                    }
                    None => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return TransportEvent::Closed(CloseInfo::default());
                    }
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        if events.send((tag, TransportEvent::Frame(text.to_string()))).is_err() {
                            return TransportEvent::Closed(CloseInfo::default());
                        }
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => {
                            if events.send((tag, TransportEvent::Frame(text))).is_err() {
                                return TransportEvent::Closed(CloseInfo::default());
                            }
                        }
                        Err(_) => trace!(?tag, "dropping non-utf8 binary frame"),
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        let info = frame
                            .map(|frame| CloseInfo::new(u16::from(frame.code), frame.reason.as_str()))
                            .unwrap_or_default();
                        let _ = write.send(WsMessage::Close(None)).await;
                        return TransportEvent::Closed(info);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return TransportEvent::Failed(err.to_string()),
                    None => return TransportEvent::Closed(CloseInfo::default()),
                }
            }
        }
    }
}
