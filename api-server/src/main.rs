mod auth;
mod config;
mod handlers;
mod jobs;
mod leaderboard;
mod rate_limit;
mod response;
mod session;
mod store;
mod types;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use config::{
    data_dir, read_env_optional_usize, read_env_string, read_env_u64, read_env_usize, AppState,
    ServerPolicy, DEFAULT_BIND_ADDR, DEFAULT_JSON_LIMIT_BYTES, DEFAULT_SWEEP_SECS,
};
use handlers::{end_session, get_leaderboard, health, start_session, update_progress};
use store::GameStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let bind_addr =
        read_env_string("API_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let json_limit = read_env_usize("JSON_LIMIT_BYTES", DEFAULT_JSON_LIMIT_BYTES);
    let sweep_secs = read_env_u64("SWEEP_SECS", DEFAULT_SWEEP_SECS);
    let http_workers = read_env_optional_usize("HTTP_WORKERS");
    let api_key = read_env_string("API_KEY");
    let policy = ServerPolicy::from_env();
    let data_dir = data_dir();

    let store = GameStore::open(&data_dir).map_err(std::io::Error::other)?;

    tracing::info!(
        "starting catch api: bind_addr={} data_dir={} user_rate_limit={} ip_rate_limit={} window_secs={} idle_timeout_secs={} auth_required={}",
        bind_addr,
        data_dir.display(),
        policy.user_rate_limit,
        policy.ip_rate_limit,
        policy.rate_limit_window_secs,
        policy.session_idle_timeout_secs,
        api_key.is_some()
    );

    let mut state = AppState::new(store, policy, api_key);
    state.http_workers = http_workers;
    jobs::spawn_sweeper(state.clone(), sweep_secs);

    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::JsonConfig::default().limit(json_limit))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(health))
            .route("/api/sessions", web::post().to(start_session))
            .route(
                "/api/sessions/{session_id}/progress",
                web::post().to(update_progress),
            )
            .route("/api/sessions/{session_id}/end", web::post().to(end_session))
            .route("/api/leaderboards/{scope}", web::get().to(get_leaderboard))
    });
    if let Some(workers) = http_workers {
        server = server.workers(workers);
    }

    server.bind(bind_addr)?.run().await
}
