use futures_util::{Sink, SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::control::{Command, ServerMessage};
use crate::error::AppResult;

const EVENT_BUFFER: usize = 256;

pub type CommandSender = mpsc::UnboundedSender<Command>;
pub type CommandReceiver = mpsc::UnboundedReceiver<Command>;
pub type EventSender = broadcast::Sender<ServerMessage>;

pub fn create_command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}

pub fn create_event_channel() -> EventSender {
    broadcast::channel(EVENT_BUFFER).0
}

/// Accepts UI clients. Every client may send commands; every client gets
/// every event the controller publishes.
pub async fn start_websocket_server(
    addr: SocketAddr,
    command_tx: CommandSender,
    events: EventSender,
) -> AppResult<()> {
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "WebSocket server listening");

    while let Ok((stream, peer_addr)) = listener.accept().await {
        tracing::info!(%peer_addr, "new WebSocket connection");
        let tx = command_tx.clone();
        let rx = events.subscribe();
        tokio::spawn(handle_connection(stream, peer_addr, tx, rx));
    }

    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    command_tx: CommandSender,
    mut events: broadcast::Receiver<ServerMessage>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(%peer_addr, "WebSocket handshake failed: {e}");
            return;
        }
    };

    tracing::debug!(%peer_addr, "WebSocket handshake completed");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Everyone gets a fresh snapshot when a client joins.
    if command_tx.send(Command::Status).is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Command>(&text) {
                        Ok(command) => {
                            tracing::debug!(%peer_addr, ?command, "received command");
                            if let Err(e) = command_tx.send(command) {
                                tracing::error!("failed to forward command: {e}");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(%peer_addr, "failed to parse message: {e}");
                            let reply = ServerMessage::Error {
                                message: format!("Parse error: {e}"),
                            };
                            if send_json(&mut ws_sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    },
                    Ok(Message::Close(_)) => {
                        tracing::debug!(%peer_addr, "WebSocket connection closed by peer");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                            tracing::warn!(%peer_addr, "failed to send pong: {e}");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(%peer_addr, "WebSocket error: {e}");
                        break;
                    }
                }
            }
            event = events.recv() => match event {
                Ok(message) => {
                    if send_json(&mut ws_sender, &message).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(%peer_addr, skipped, "client fell behind; dropping events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::info!(%peer_addr, "WebSocket connection terminated");
}

async fn send_json<S>(sender: &mut S, message: &ServerMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("failed to encode server message: {e}");
            return Ok(());
        }
    };
    sender.send(Message::Text(json)).await.map_err(|e| {
        tracing::warn!("failed to send WebSocket message: {e}");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::AppPhase;

    #[tokio::test]
    async fn clients_send_commands_and_receive_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (command_tx, mut command_rx) = create_command_channel();
        let events = create_event_channel();
        let server_events = events.clone();
        tokio::spawn(async move {
            let _ = start_websocket_server(addr, command_tx, server_events).await;
        });

        let url = format!("ws://{addr}");
        let mut client = None;
        for _ in 0..50 {
            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((stream, _)) => {
                    client = Some(stream);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
            }
        }
        let mut client = client.expect("server should accept connections");

        assert_eq!(command_rx.recv().await, Some(Command::Status));

        client
            .send(Message::Text(
                r#"{"type":"lifecycle","phase":"background"}"#.to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(
            command_rx.recv().await,
            Some(Command::Lifecycle {
                phase: AppPhase::Background
            })
        );

        events
            .send(ServerMessage::MinuteTick { minute: 7 })
            .unwrap();
        let reply = client.next().await.unwrap().unwrap();
        assert_eq!(
            reply.into_text().unwrap(),
            r#"{"type":"minute_tick","minute":7}"#
        );

        client
            .send(Message::Text("not json".to_string()))
            .await
            .unwrap();
        let reply = client.next().await.unwrap().unwrap().into_text().unwrap();
        assert!(reply.contains("\"type\":\"error\""));
    }
}
