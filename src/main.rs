//! chronochess — a real-time, simultaneous-move chess variant server.
//!
//! Both players act concurrently on a shared board; every piece carries an
//! independent cooldown, every player a regenerating energy budget. Games
//! can be started ad hoc through short-code rooms or matched by rating.
//!
//! ```bash
//! chronochess serve
//! chronochess serve --port 3000
//! ```

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::{Parser, Subcommand};

use chronochess::game_manager::GameManager;
use chronochess::matchmaking::MatchmakingManager;
use chronochess::persistence::{MemoryStore, Store};
use chronochess::rooms::RoomManager;
use chronochess::session::SessionHub;
use chronochess::ws::{self, AppState};

/// chronochess — a real-time chess variant server.
#[derive(Parser, Debug)]
#[command(name = "chronochess")]
#[command(about = "Real-time simultaneous-move chess variant server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the WebSocket game server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Host address to bind to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Reserved for a future durable persistence adapter; the bundled
        /// in-memory store ignores it.
        #[arg(long, default_value = "data")]
        data_dir: String,
    },
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port, host, data_dir } => {
            log::debug!("data_dir={data_dir} (unused by the in-memory persistence adapter)");
            run_server(&host, port).await
        }
    }
}

async fn run_server(host: &str, port: u16) -> std::io::Result<()> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let game_manager = Arc::new(GameManager::new(store.clone()));
    let room_manager = Arc::new(RoomManager::new(store.clone(), game_manager.clone()));
    let matchmaking = Arc::new(MatchmakingManager::new(store.clone(), game_manager.clone()));
    let sessions = SessionHub::new();

    {
        let sessions = sessions.clone();
        matchmaking
            .on_match_found(move |found| {
                let sessions = sessions.clone();
                let found = found.clone();
                tokio::spawn(async move {
                    let payload = serde_json::json!({"event": "matchFound", "gameId": found.game_id});
                    sessions.send_to_user(&found.white_id, payload.clone()).await;
                    sessions.send_to_user(&found.black_id, payload).await;
                });
            })
            .await;
    }

    {
        let game_manager = game_manager.clone();
        tokio::spawn(async move { game_manager.run_tick_loop().await });
    }
    {
        let matchmaking = matchmaking.clone();
        tokio::spawn(async move { matchmaking.run_match_loop().await });
    }
    {
        let room_manager = room_manager.clone();
        tokio::spawn(async move { room_manager.run_sweep_loop().await });
    }

    let app_state = web::Data::new(AppState { game_manager, room_manager, matchmaking, sessions });

    log::info!("starting chronochess server on {host}:{port}");
    log::info!("WebSocket endpoint: ws://{host}:{port}/ws");

    HttpServer::new(move || {
        let cors = Cors::default().allow_any_origin().allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .route("/ws", web::get().to(ws::ws_connect))
    })
    .bind((host, port))?
    .run()
    .await
}
