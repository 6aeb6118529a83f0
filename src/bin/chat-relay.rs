use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use std::env;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// Only the room of a chat message matters to the relay.
#[derive(Debug, Deserialize)]
struct Envelope {
    room: String,
}

#[derive(Debug, Clone)]
struct Relayed {
    room: String,
    text: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = env::var("PICKEMS_CHAT_BIND").unwrap_or_else(|_| "0.0.0.0:8787".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("chat relay listening on {addr}");
    serve(listener).await
}

/// `/pickems` joins room `pickems`. A bare `/` observes every room.
fn room_from_path(path: &str) -> Option<String> {
    let room = path.trim_matches('/');
    (!room.is_empty()).then(|| room.to_owned())
}

fn frame_room(text: &str) -> Option<String> {
    serde_json::from_str::<Envelope>(text).ok().map(|e| e.room)
}

fn delivers_to(client_room: Option<&str>, message_room: &str) -> bool {
    client_room.is_none_or(|room| room == message_room)
}

async fn serve(listener: TcpListener) -> anyhow::Result<()> {
    let (tx, _rx) = broadcast::channel::<Relayed>(512);
    loop {
        let (stream, peer) = listener.accept().await?;
        let tx = tx.clone();
        let rx = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, tx, rx).await {
                warn!("client {peer} disconnected: {e}");
            }
        });
    }
}

/// Rebroadcast the client's messages to its room, the sender included, and
/// forward the room's traffic back. Observers only receive.
async fn handle_client(
    stream: TcpStream,
    tx: broadcast::Sender<Relayed>,
    mut rx: broadcast::Receiver<Relayed>,
) -> anyhow::Result<()> {
    let mut room = None;
    let ws = accept_hdr_async(stream, |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        room = room_from_path(req.uri().path());
        Ok(resp)
    })
    .await?;
    match &room {
        Some(room) => debug!("client joined room {room}"),
        None => debug!("observer connected"),
    }
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match frame_room(&text) {
                        Some(target) if room.as_deref() == Some(target.as_str()) => {
                            let _ = tx.send(Relayed { room: target, text: text.to_string() });
                        }
                        Some(target) => warn!("dropping message for room {target} from {room:?}"),
                        None => warn!("dropping frame that is not a chat message"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
            outbound = rx.recv() => {
                match outbound {
                    Ok(msg) if delivers_to(room.as_deref(), &msg.room) => {
                        write.send(Message::Text(msg.text.into())).await?;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("client lagged, dropped {skipped} messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}
