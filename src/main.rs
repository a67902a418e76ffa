// Gridpot entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open the record store
// 4. Load the session file
// 5. Open a room: the command-line verb, or the room left open last time
// 6. Run the background reconciliation loop until Ctrl+C
//
// Verbs:
//   gridpot games                  list games offered by the roster provider
//   gridpot create <game-id>       create a room from a listed game
//   gridpot join <CODE> <name>     join a room by code
//   gridpot watch <CODE>           attach as admin without taking a seat
//   gridpot                        reopen the last room from the session file

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::Mutex;
use tracing::info;

use gridpot::config::{self, BuyInPolicy, Config, RosterSource};
use gridpot::roster::{self, EspnProvider, RosterProvider, StaticProvider};
use gridpot::session::SessionManager;
use gridpot::store::RecordStore;
use gridpot::sync::{self, SyncEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("gridpot starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: ante={}, buy_in={}, poll={}ms",
        config.game.default_ante, config.game.buy_in, config.sync.poll_interval_ms
    );

    // 3. Open the record store
    let store = Arc::new(
        RecordStore::open_with_timeout(&config.store.path, config.sync.store_timeout_ms)
            .context("failed to open record store")?,
    );
    info!("Record store opened at {}", config.store.path);

    // 4. Load the session file
    let mut session = SessionManager::load_default().context("failed to load session file")?;

    let provider = build_provider(&config);

    // 5. Open a room per the command line, or reopen the last one
    let args: Vec<String> = std::env::args().skip(1).collect();
    let engine = match args.iter().map(String::as_str).collect::<Vec<_>>()[..] {
        ["games"] => {
            let games = provider.list_games().await.context("listing games failed")?;
            for game in &games {
                println!("{}  {}  [{}]", game.id, game.label, game.status);
            }
            return Ok(());
        }
        ["create", game_id] => {
            let games = provider.list_games().await.context("listing games failed")?;
            let game = games
                .iter()
                .find(|g| g.id == game_id)
                .with_context(|| format!("no game with id {game_id}"))?;
            let rosters = roster::import_game_rosters(provider.as_ref(), &game.home, &game.away)
                .await
                .context("roster import failed")?;

            let engine = SyncEngine::create_room(
                Arc::clone(&store),
                gridpot::game::room::SidePair::new(game.home.clone(), game.away.clone()),
                rosters,
                config.game.default_ante,
                config.sync.create_room_attempts,
            )?;
            println!("Room created: {}", engine.room().code);
            session.establish(&engine.room().code, None, true)?;
            engine
        }
        ["join", code, name] => {
            let remembered = session.identity_for(code).map(|i| i.participant_id);
            let starting_balance = match config.game.buy_in_policy {
                BuyInPolicy::Fixed => config.game.buy_in,
                BuyInPolicy::Zero => 0,
            };
            let engine = SyncEngine::join_room(
                Arc::clone(&store),
                code,
                name,
                starting_balance,
                remembered.flatten(),
                false,
            )?;
            session.establish(code, engine.actor().participant_id, false)?;
            engine
        }
        ["watch", code] => {
            let engine = SyncEngine::attach_admin(Arc::clone(&store), code)?;
            session.establish(code, None, true)?;
            engine
        }
        [] => match session.last_room() {
            Some(code) => {
                let code = code.to_string();
                let identity = session
                    .identity_for(&code)
                    .cloned()
                    .context("session has a room but no identity for it")?;
                info!(code = %code, "reopening last room");
                let reopened = match identity.participant_id {
                    // A seatless admin reattaches as an observer.
                    None => SyncEngine::attach_admin(Arc::clone(&store), &code),
                    Some(id) => {
                        SyncEngine::resume_seat(Arc::clone(&store), &code, id, identity.is_admin)
                    }
                };
                match reopened {
                    Ok(engine) => engine,
                    Err(sync::SyncError::Game(gridpot::game::GameError::RoomNotFound)) => {
                        // The room is gone; drop the stale pointer.
                        session.forget_room(&code)?;
                        bail!("room {code} no longer exists");
                    }
                    Err(sync::SyncError::Game(gridpot::game::GameError::ParticipantNotFound)) => {
                        session.forget_room(&code)?;
                        bail!("your seat in room {code} is gone; rejoin with `gridpot join {code} <name>`");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => {
                eprintln!(
                    "usage: gridpot [games | create <game-id> | join <CODE> <name> | watch <CODE>]"
                );
                return Ok(());
            }
        },
        _ => {
            eprintln!(
                "usage: gridpot [games | create <game-id> | join <CODE> <name> | watch <CODE>]"
            );
            return Ok(());
        }
    };

    info!(
        code = %engine.room().code,
        phase = engine.room().phase.as_str(),
        "room open"
    );

    // 6. Background reconciliation until Ctrl+C
    let engine = Arc::new(Mutex::new(engine));
    let poll_handle = tokio::spawn(sync::run_poll_loop(
        Arc::clone(&engine),
        Duration::from_millis(config.sync.poll_interval_ms),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    poll_handle.abort();

    info!("gridpot shut down cleanly");
    Ok(())
}

fn build_provider(config: &Config) -> Arc<dyn RosterProvider> {
    match config.roster.source {
        RosterSource::Espn => {
            let base = config
                .roster
                .base_url
                .clone()
                .unwrap_or_else(|| roster::DEFAULT_BASE_URL.to_string());
            Arc::new(EspnProvider::new(base))
        }
        RosterSource::Static => Arc::new(StaticProvider),
    }
}

/// Initialize tracing to log to a file (keeps stdout clean for the
/// command output).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gridpot.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gridpot=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
