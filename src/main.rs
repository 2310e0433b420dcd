use actix_web::{web, App, HttpServer};
use direct_chat_service::{
    config, error, logging, presence::PresenceRegistry, routes, state::AppState, storage::PgStore,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let store = Arc::new(PgStore::connect(&cfg.database_url)?);
    store
        .ensure_schema()
        .await
        .map_err(|e| error::AppError::StartServer(format!("schema: {e}")))?;

    let state = AppState {
        conversations: store.clone(),
        messages: store.clone(),
        directory: store.clone(),
        presence: PresenceRegistry::new(),
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting direct-chat-service");

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(routes::threads::list_threads)
            .service(routes::messages::send_message)
            .service(routes::messages::get_messages)
            .service(routes::wsroute::ws_handler)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run: {e}")))
}
