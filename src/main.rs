//! envision-site: Envision conference website
//!
//! Configuration comes from a TOML file (default `envision.toml`), with
//! command-line flags and environment variables (or a `.env` file) layered
//! on top. Secrets are only ever read from the environment or flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal::ctrl_c;
use tracing::{error, info, warn};

use envision_site::auth::hash_password;
use envision_site::captcha::RecaptchaVerifier;
use envision_site::content::SiteContent;
use envision_site::mail::{ApiMailer, Mailer};
use envision_site::{create_router, AppState, Config};

#[derive(Parser)]
#[command(name = "envision-site")]
#[command(about = "Envision conference website")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "envision.toml", env = "ENVISION_CONFIG")]
    config: String,

    /// Listen address (overrides config file)
    #[arg(short, long, env = "ENVISION_LISTEN")]
    listen: Option<SocketAddr>,

    /// Data directory for the tracking store and response log
    #[arg(short, long, env = "ENVISION_DATA_DIR")]
    data_dir: Option<String>,

    /// reCAPTCHA server secret
    #[arg(long, env = "RECAPTCHA_SECRET_KEY", hide_env_values = true)]
    recaptcha_secret_key: Option<String>,

    /// reCAPTCHA site key embedded in the index page
    #[arg(long, env = "RECAPTCHA_SITE_KEY")]
    recaptcha_site_key: Option<String>,

    /// Transactional mail API key
    #[arg(long, env = "MAIL_API_KEY", hide_env_values = true)]
    mail_api_key: Option<String>,

    /// Argon2 hash of the admin password
    #[arg(long, env = "ADMIN_PASSWORD_HASH", hide_env_values = true)]
    admin_password_hash: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print an Argon2 hash to use as ADMIN_PASSWORD_HASH
    HashPassword {
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("envision_site=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(Command::HashPassword { password }) = &cli.command {
        println!("{}", hash_password(password)?);
        return Ok(());
    }

    info!("Starting envision-site");
    info!("Config file: {}", cli.config);

    let mut config = Config::load_or_default(&cli.config)?;

    // Apply CLI / environment overrides
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(data_dir) = cli.data_dir {
        config.server.data_dir = PathBuf::from(data_dir);
    }
    if cli.recaptcha_secret_key.is_some() {
        config.captcha.secret_key = cli.recaptcha_secret_key;
    }
    if cli.recaptcha_site_key.is_some() {
        config.captcha.site_key = cli.recaptcha_site_key;
    }
    if cli.mail_api_key.is_some() {
        config.mail.api_key = cli.mail_api_key;
    }
    if cli.admin_password_hash.is_some() {
        config.admin.password_hash = cli.admin_password_hash;
    }

    config.validate()?;

    info!("Data dir: {}", config.server.data_dir.display());
    info!("Tracking store: {}", config.tracking_path().display());

    if config.captcha.secret_key.is_none() {
        warn!("RECAPTCHA_SECRET_KEY is not set, every form submission will be rejected");
    }
    if config.admin.password_hash.is_none() {
        warn!("ADMIN_PASSWORD_HASH is not set, admin login is disabled");
    }

    let content = SiteContent::load_or_builtin(config.site.content_file.as_deref())?;
    info!(
        speakers = content.speakers.len(),
        team = content.team.len(),
        "Site content loaded"
    );

    let captcha = Arc::new(RecaptchaVerifier::new(&config.captcha));
    let mailer = ApiMailer::from_config(&config.mail).map(|m| Arc::new(m) as Arc<dyn Mailer>);
    if mailer.is_none() {
        info!("Confirmation mail disabled");
    }

    if !Path::new(&config.site.schedule_pdf).exists() {
        warn!(
            path = %config.site.schedule_pdf.display(),
            "Schedule PDF not found, /schedule will return 404"
        );
    }

    let listen = config.server.listen;
    let state = Arc::new(AppState::new(config, content, captcha, mailer));
    let app = create_router(state);

    info!("Listening on http://{}", listen);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
