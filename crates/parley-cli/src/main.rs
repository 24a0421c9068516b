//! Parley terminal client.
//!
//! Joins one room over WebSocket and maps stdin lines to messenger
//! operations. Events are reported through `tracing`.
//!
//! # Usage
//!
//! ```bash
//! parley --url ws://localhost:8080 --room room-123 --user user-1 --name Alice --role patient
//! ```

mod command;

use clap::Parser;
use command::Command;
use parley_client::{
    ClientConfig, ClientError, EventHandlers, Messenger, Participant,
    transport::{self, MessengerHandle, RuntimeConfig, SystemEnv, TransportError},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley terminal client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Line-oriented terminal client for Parley rooms")]
#[command(version)]
struct Args {
    /// WebSocket server URL
    #[arg(long, default_value = "ws://localhost:8080")]
    url: String,

    /// Room to join on start
    #[arg(short, long, default_value = "lobby")]
    room: String,

    /// Participant id
    #[arg(short, long)]
    user: String,

    /// Display name (defaults to the participant id)
    #[arg(short, long)]
    name: Option<String>,

    /// Role tag, e.g. patient or staff
    #[arg(long, default_value = "member")]
    role: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let name = args.name.unwrap_or_else(|| args.user.clone());
    let me = Participant::new(args.user, name, args.role);

    let (handle, task) = transport::spawn(
        SystemEnv::new(),
        ClientConfig::default(),
        me.clone(),
        RuntimeConfig::new(&args.url),
    );

    handle.set_event_handlers(event_handlers()).await?;
    handle.join(&args.room, me.clone()).await??;
    info!(url = %args.url, room = %args.room, "joined");
    info!("commands: {}", command::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match command::parse(&line) {
            None => {},
            Some(Command::Quit) => break,
            Some(cmd) => execute(&handle, &me, cmd).await?,
        }
    }

    handle.destroy().await?;
    task.await?;
    Ok(())
}

fn event_handlers() -> EventHandlers {
    EventHandlers::new()
        .on_message(|m| info!("{}", command::render(m)))
        .on_message_update(|m| info!("updated {}", command::render(m)))
        .on_typing(|t| {
            if t.is_typing {
                info!(room = %t.room_id, "{} is typing...", t.user_name);
            }
        })
        .on_read_receipt(|r| info!(message = %r.message_id, user = %r.user_id, "read"))
        .on_presence(|p| info!(user = %p.user_id, online = p.online, "presence"))
        .on_connection_state(|state| info!(%state, "connection"))
}

async fn execute(
    handle: &MessengerHandle<SystemEnv>,
    me: &Participant,
    cmd: Command,
) -> Result<(), TransportError> {
    match cmd {
        Command::Message { content } => report(handle.send_message(content).await?),
        Command::Join { room_id } => report(handle.join(room_id, me.clone()).await?),
        Command::Leave => report(handle.with(Messenger::leave).await?),
        Command::Typing { is_typing } => report(handle.send_typing(is_typing).await?),
        Command::Read { message_id } => handle.mark_as_read(message_id).await?,
        Command::Edit { message_id, content } => {
            let edited = handle.with(move |m| m.edit_message(&message_id, content)).await?;
            if edited.is_none() {
                warn!("only your own, undeleted messages can be edited");
            }
        },
        Command::Delete { message_id } => {
            if handle.with(move |m| m.delete_message(&message_id)).await?.is_none() {
                warn!("only your own messages can be deleted");
            }
        },
        Command::React { message_id, emoji } => {
            if handle.with(move |m| m.add_reaction(&message_id, emoji)).await?.is_none() {
                warn!("no such message");
            }
        },
        Command::Unreact { message_id } => {
            if handle.with(move |m| m.remove_reaction(&message_id)).await?.is_none() {
                warn!("no reaction to remove");
            }
        },
        Command::History => {
            let lines = handle
                .with(|m| {
                    let room = m.active_room()?;
                    Some(m.history(room).iter().map(command::render).collect::<Vec<_>>())
                })
                .await?;
            match lines {
                Some(lines) => lines.iter().for_each(|line| info!("{line}")),
                None => warn!("not in a room"),
            }
        },
        Command::Search { query } => {
            let found = handle
                .with(move |m| {
                    m.search(&query, None).into_iter().map(command::render).collect::<Vec<_>>()
                })
                .await?;
            info!(matches = found.len(), "search");
            found.iter().for_each(|line| info!("{line}"));
        },
        Command::Usage { usage } => warn!("usage: {usage}"),
        Command::Unknown { input } => warn!(%input, "unknown command"),
        Command::Quit => {},
    }
    Ok(())
}

fn report<T>(result: Result<T, ClientError>) {
    if let Err(e) = result {
        warn!(error = %e, "command failed");
    }
}
