mod chat;
mod commands;
mod config;
mod webhook;

use crate::chat::{ChatCommand, ChatEvent, ChatWireMessage, ChatWorker};
use crate::config::Args;
use crate::webhook::WebhookState;
use chrono::Utc;
use clap::Parser;
use log::{debug, error, info, warn};
use pickems_api::User;
use pickems_api::client::{LiquipediaApi, LiquipediaSource, MatchSource};
use pickems_api::service::Pickems;
use pickems_api::store::{SqliteStore, Store};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logger(args.log_level);

    let api = LiquipediaApi::new(args.api_key.clone(), args.wiki.clone());
    let source = LiquipediaSource::new(api, args.page(), args.optional_params.clone());
    let store = SqliteStore::open(&args.store).await?;
    info!("using store {}", args.store.display());
    let service = Arc::new(Pickems::new(store, source, args.tournament_name.clone(), args.round.clone()));

    // Commands report NotPopulated until a later refresh succeeds.
    if let Err(e) = service.populate(args.schedule_only).await {
        error!("initial population of {} failed: {e}", args.page());
    }

    let hook = WebhookState {
        service: Arc::clone(&service),
        wiki: args.wiki.clone(),
        base_page: args.tournament_page.trim_end_matches('/').to_owned(),
    };
    let bind = args.bind;
    let webhook_task = tokio::spawn(async move {
        if let Err(e) = webhook::serve(bind, hook).await {
            error!("webhook server stopped: {e}");
        }
    });

    let (chat_cmd_tx, chat_cmd_rx) = mpsc::channel::<ChatCommand>(100);
    let (chat_evt_tx, chat_evt_rx) = mpsc::channel::<ChatEvent>(100);
    let chat_worker = ChatWorker {
        url: args.chat_url.clone(),
        room: args.chat_room.clone(),
        username: args.bot_name.clone(),
        commands: chat_cmd_rx,
        events: chat_evt_tx,
    };
    let chat_task = tokio::spawn(chat_worker.run());

    bot_loop(&service, &args.bot_name, chat_evt_rx, chat_cmd_tx).await;

    webhook_task.abort();
    chat_task.abort();
    Ok(())
}

fn init_logger(level: Option<log::LevelFilter>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

/// Handle room messages one at a time until the chat worker goes away.
async fn bot_loop<S: Store, M: MatchSource>(
    service: &Pickems<S, M>,
    bot_name: &str,
    mut events: mpsc::Receiver<ChatEvent>,
    replies: mpsc::Sender<ChatCommand>,
) {
    let mut sent: u64 = 0;
    while let Some(event) = events.recv().await {
        match event {
            ChatEvent::Connected => info!("bot is online as {bot_name}"),
            ChatEvent::Disconnected => debug!("chat disconnected, waiting for reconnect"),
            ChatEvent::Error(message) => warn!("{message}"),
            ChatEvent::Message(msg) => {
                let Some(body) = handle_message(service, bot_name, &msg).await else {
                    continue;
                };
                sent += 1;
                let reply = ChatCommand::Send { body, message_id: format!("{bot_name}-{sent}") };
                if replies.send(reply).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn handle_message<S: Store, M: MatchSource>(
    service: &Pickems<S, M>,
    bot_name: &str,
    msg: &ChatWireMessage,
) -> Option<String> {
    if msg.author == bot_name {
        return None;
    }
    let command = commands::parse(&msg.body)?;
    debug!("{} issued {command:?}", msg.author);
    // The relay has no account ids, so the author name is the identity.
    let user = User::new(msg.author.clone(), msg.author.clone());
    Some(commands::respond(&command, &user, service, Utc::now().timestamp()).await)
}
