//! # Backup server
//! The webserver that manages backups of the site database.
//!

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::{fs, path::PathBuf, sync::Arc};

use backup_server::{
    BackupService, Config,
    auth::TokenAuthorizer,
    http::{AppState, router},
    server::serve,
};
use mimalloc::MiMalloc;
use shared::{Failure, init_logger};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    // Initialize config if args include 'init'.
    if std::env::args().any(|arg| arg.eq("init")) {
        let config = Config::default();
        let contents =
            toml::to_string_pretty(&config).or_log_and_panic("Could not serialize config file");
        fs::write("config.toml", contents).or_log_and_panic("Could not create config file");
        return;
    }

    // Load config
    let mut config =
        Config::load_toml(PathBuf::from("./config.toml")).or_log_and_panic("Could not load config");

    let _logger = init_logger(&config.log_directory).or_log_and_panic("Could not create logger");

    config.apply_environment();

    let authorizer = TokenAuthorizer::new(config.auth.admin_tokens);
    if authorizer.is_empty() {
        warn!("No admin tokens are configured, every request will be rejected");
    }

    info!("Storing backups in {:?}", config.backup_directory);
    let service = BackupService::new(config.backup_directory, config.database);

    let state = Arc::new(AppState {
        service: Arc::new(service),
        authorizer: Arc::new(authorizer),
    });

    serve(router(state), config.socket_address)
        .await
        .or_log_and_panic("Could not serve");
}
