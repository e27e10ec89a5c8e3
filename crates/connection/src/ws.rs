/// WebSocket transport. The session identifier resolves to a socket address
/// both parties know; claiming it binds a listener there, connecting dials
/// it.
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{Channel, ConnectionError, Envelope, Result, SessionId, Transport};

pub struct WsTransport;

impl WsTransport {
    fn resolve(session: &SessionId) -> Result<SocketAddr> {
        session
            .0
            .parse()
            .map_err(|_| ConnectionError::InvalidSession(session.0.clone()))
    }
}

pub struct WsChannel {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    type Channel = WsChannel;

    async fn connect(&self, session: &SessionId, timeout: Duration) -> Result<Self::Channel> {
        let addr = Self::resolve(session)?;
        let url = format!("ws://{addr}");
        debug!(%url, "dialing session");

        match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str())).await {
            Err(_) => Err(ConnectionError::ConnectionTimeout(timeout)),
            Ok(Err(e)) => Err(ConnectionError::Transport(e.to_string())),
            Ok(Ok((inner, _response))) => {
                info!(%addr, "connected as guest");
                Ok(WsChannel { inner })
            }
        }
    }

    async fn claim(&self, session: &SessionId) -> Result<Self::Channel> {
        let addr = Self::resolve(session)?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                ConnectionError::IdentifierTaken
            } else {
                ConnectionError::Transport(e.to_string())
            }
        })?;
        info!(%addr, "claimed session identifier, waiting for peer");

        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        let inner = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        info!(%peer, "peer arrived");
        Ok(WsChannel { inner })
    }
}

#[async_trait]
impl Channel for WsChannel {
    async fn send(&mut self, envelope: Envelope) -> Result<()> {
        let json = envelope.encode()?;
        self.inner
            .send(Message::Text(json))
            .await
            .map_err(|e| ConnectionError::PeerTerminated(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<Envelope>> {
        while let Some(frame) = self.inner.next().await {
            match frame {
                Ok(Message::Text(text)) => match Envelope::decode(&text) {
                    Ok(envelope) => return Ok(Some(envelope)),
                    Err(e) => warn!(error = %e, "dropping malformed frame"),
                },
                Ok(Message::Ping(payload)) => {
                    let _ = self.inner.send(Message::Pong(payload)).await;
                }
                Ok(Message::Close(_)) => return Ok(None),
                Ok(_) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(None),
                Err(e) => return Err(ConnectionError::PeerTerminated(e.to_string())),
            }
        }
        Ok(None)
    }
}
