//! Transport-neutral WebSocket plumbing.
//!
//! The telephony socket is an `axum` server socket while the agent socket is a
//! `tokio-tungstenite` client, and their message types differ. Both are bridged
//! onto a [`Connection`]: a pair of bounded channels serviced by a reader and a
//! writer task. The relay logic only ever sees [`WireFrame`]s.

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

/// A WebSocket data or close frame. Pings and pongs are handled by the
/// underlying libraries and never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Bytes),
    Close,
}

/// Conversion between a library's message type and [`WireFrame`].
pub trait WsMessage: Sized + Send + 'static {
    fn into_frame(self) -> Option<WireFrame>;
    fn from_frame(frame: WireFrame) -> Self;
}

impl WsMessage for axum::extract::ws::Message {
    fn into_frame(self) -> Option<WireFrame> {
        use axum::extract::ws::Message;
        match self {
            Message::Text(text) => Some(WireFrame::Text(text.as_str().to_owned())),
            Message::Binary(data) => Some(WireFrame::Binary(data)),
            Message::Close(_) => Some(WireFrame::Close),
            Message::Ping(_) | Message::Pong(_) => None,
        }
    }

    fn from_frame(frame: WireFrame) -> Self {
        use axum::extract::ws::Message;
        match frame {
            WireFrame::Text(text) => Message::Text(text.into()),
            WireFrame::Binary(data) => Message::Binary(data),
            WireFrame::Close => Message::Close(None),
        }
    }
}

impl WsMessage for tokio_tungstenite::tungstenite::Message {
    fn into_frame(self) -> Option<WireFrame> {
        use tokio_tungstenite::tungstenite::Message;
        match self {
            Message::Text(text) => Some(WireFrame::Text(text.as_str().to_owned())),
            Message::Binary(data) => Some(WireFrame::Binary(data)),
            Message::Close(_) => Some(WireFrame::Close),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
        }
    }

    fn from_frame(frame: WireFrame) -> Self {
        use tokio_tungstenite::tungstenite::Message;
        match frame {
            WireFrame::Text(text) => Message::Text(text.into()),
            WireFrame::Binary(data) => Message::Binary(data),
            WireFrame::Close => Message::Close(None),
        }
    }
}

/// One side of a bidirectional frame channel.
///
/// `rx` yields `None` once the peer is gone; a received [`WireFrame::Close`]
/// is always the last frame delivered.
#[derive(Debug)]
pub struct Connection {
    pub tx: mpsc::Sender<WireFrame>,
    pub rx: mpsc::Receiver<WireFrame>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    /// Two in-memory connections wired to each other.
    pub fn pair() -> (Connection, Connection) {
        let (a_tx, b_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (b_tx, a_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Connection {
                tx: a_tx,
                rx: a_rx,
                writer: None,
                reader: None,
            },
            Connection {
                tx: b_tx,
                rx: b_rx,
                writer: None,
                reader: None,
            },
        )
    }

    /// Spawns reader and writer tasks that pump `socket` through channels.
    pub fn spawn<S, M, E>(socket: S, label: &'static str) -> Connection
    where
        S: Stream<Item = Result<M, E>> + Sink<M> + Send + 'static,
        <S as Sink<M>>::Error: Display + Send + 'static,
        M: WsMessage,
        E: Display + Send + 'static,
    {
        let (mut sink, mut stream) = socket.split::<M>();
        let (out_tx, mut out_rx) = mpsc::channel::<WireFrame>(CHANNEL_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<WireFrame>(CHANNEL_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let closing = frame == WireFrame::Close;
                if let Err(e) = sink.send(M::from_frame(frame)).await {
                    warn!(socket = label, error = %e, "Failed to write WebSocket frame");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
            debug!(socket = label, "Writer finished");
        });

        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let frame = match message {
                    Ok(message) => match message.into_frame() {
                        Some(frame) => frame,
                        None => continue,
                    },
                    Err(e) => {
                        warn!(socket = label, error = %e, "Failed to read WebSocket frame");
                        break;
                    }
                };
                let closing = frame == WireFrame::Close;
                if in_tx.send(frame).await.is_err() || closing {
                    break;
                }
            }
            debug!(socket = label, "Reader finished");
        });

        Connection {
            tx: out_tx,
            rx: in_rx,
            writer: Some(writer),
            reader: Some(reader),
        }
    }

    /// Sends a close frame and gives the writer at most `grace` to flush it.
    pub async fn shutdown(mut self, grace: Duration) {
        let _ = self.tx.try_send(WireFrame::Close);
        drop(self.tx);
        self.rx.close();

        if let Some(mut writer) = self.writer.take() {
            if tokio::time::timeout(grace, &mut writer).await.is_err() {
                warn!(?grace, "Writer did not finish within the grace period, aborting");
                writer.abort();
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
