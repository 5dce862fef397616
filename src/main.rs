use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use fieldnote::auth::jwt::JwtService;
use fieldnote::config::AppConfig;
use fieldnote::mailer::{LogMailer, Mailer, SmtpMailer};
use fieldnote::pdf::BasicPdfRenderer;
use fieldnote::routes;
use fieldnote::state::AppState;
use fieldnote::storage::S3Storage;
use fieldnote::store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        server_host = %config.server_host,
        server_port = config.server_port,
        s3_bucket = %config.s3_bucket,
        smtp_enabled = config.smtp_host.is_some(),
        cross_tenant_access = ?config.cross_tenant_access,
        "loaded configuration"
    );

    let store = Arc::new(MemoryStore::new());
    let storage = Arc::new(S3Storage::connect(&config).await?);
    let mailer: Arc<dyn Mailer> = match SmtpMailer::from_config(&config)? {
        Some(smtp) => Arc::new(smtp),
        None => {
            tracing::warn!("SMTP not configured, outgoing email will only be logged");
            Arc::new(LogMailer)
        }
    };
    let jwt = JwtService::from_config(&config)?;

    let state = AppState::new(
        store,
        storage,
        mailer,
        Arc::new(BasicPdfRenderer),
        jwt,
        config,
    );
    let listen_addr: SocketAddr = {
        let config = state.config.clone();
        format!("{}:{}", config.server_host, config.server_port).parse()?
    };
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
