use chrono::Local;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub enum ChatCommand {
    Send { body: String, message_id: String },
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    Connected,
    Disconnected,
    Message(ChatWireMessage),
    Error(String),
}

/// One chat line as relayed between clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatWireMessage {
    pub id: String,
    pub room: String,
    pub author: String,
    pub body: String,
    pub timestamp: String,
}

/// Decode a relayed frame. Messages for other rooms are `Ok(None)`.
pub fn decode_inbound(text: &str, room: &str) -> Result<Option<ChatWireMessage>, serde_json::Error> {
    let msg: ChatWireMessage = serde_json::from_str(text)?;
    Ok((msg.room == room).then_some(msg))
}

/// The relay scopes connections to the room named in the path.
pub fn room_url(base: &str, room: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), room)
}

/// Keeps a websocket connection to the chat relay open, forwarding commands
/// out and room messages in. Reconnects after any failure; sends that fail
/// are retried once the connection is back.
#[derive(Debug)]
pub struct ChatWorker {
    pub url: String,
    pub room: String,
    pub username: String,
    pub commands: mpsc::Receiver<ChatCommand>,
    pub events: mpsc::Sender<ChatEvent>,
}

impl ChatWorker {
    pub async fn run(mut self) {
        let mut pending: Vec<ChatCommand> = Vec::new();
        let url = room_url(&self.url, &self.room);
        loop {
            match connect_async(url.as_str()).await {
                Ok((stream, _)) => {
                    info!("connected to chat relay {url} as {}", self.username);
                    let _ = self.events.send(ChatEvent::Connected).await;
                    let (mut write, mut read) = stream.split();

                    for cmd in pending.drain(..) {
                        if let Err(e) = send_command(&mut write, &self.room, &self.username, cmd).await {
                            let _ = self.events.send(ChatEvent::Error(format!("chat send failed: {e}"))).await;
                        }
                    }

                    loop {
                        tokio::select! {
                            maybe_cmd = self.commands.recv() => {
                                let Some(cmd) = maybe_cmd else {
                                    return;
                                };
                                if let Err(e) = send_command(&mut write, &self.room, &self.username, cmd.clone()).await {
                                    pending.push(cmd);
                                    let _ = self.events.send(ChatEvent::Error(format!("chat send failed: {e}"))).await;
                                    let _ = self.events.send(ChatEvent::Disconnected).await;
                                    break;
                                }
                            }
                            inbound = read.next() => {
                                match inbound {
                                    Some(Ok(Message::Text(text))) => match decode_inbound(&text, &self.room) {
                                        Ok(Some(msg)) => {
                                            let _ = self.events.send(ChatEvent::Message(msg)).await;
                                        }
                                        Ok(None) => debug!("ignoring message for another room"),
                                        Err(e) => {
                                            let _ = self.events.send(ChatEvent::Error(format!("chat parse error: {e}"))).await;
                                        }
                                    },
                                    Some(Ok(Message::Close(_))) | None => {
                                        let _ = self.events.send(ChatEvent::Disconnected).await;
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => {
                                        let _ = self.events.send(ChatEvent::Error(format!("chat read failed: {e}"))).await;
                                        let _ = self.events.send(ChatEvent::Disconnected).await;
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("chat connect to {url} failed: {e}");
                    let _ = self.events.send(ChatEvent::Disconnected).await;
                }
            }

            loop {
                match self.commands.try_recv() {
                    Ok(cmd) => pending.push(cmd),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => return,
                }
            }
            sleep(RECONNECT_DELAY).await;
        }
    }
}

fn wire_message(room: &str, username: &str, body: String, message_id: String) -> ChatWireMessage {
    ChatWireMessage {
        id: message_id,
        room: room.to_string(),
        author: username.to_string(),
        body,
        timestamp: Local::now().format("%H:%M").to_string(),
    }
}

async fn send_command<S>(
    write: &mut S,
    room: &str,
    username: &str,
    cmd: ChatCommand,
) -> Result<(), String>
where
    S: futures_util::sink::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    match cmd {
        ChatCommand::Send { body, message_id } => {
            let payload = wire_message(room, username, body, message_id);
            let text = serde_json::to_string(&payload).map_err(|e| e.to_string())?;
            write
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| e.to_string())
        }
    }
}
