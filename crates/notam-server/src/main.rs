//! notam-server - flight advisory server binary.
//!
//! Loads the NOTAM database, then accepts station connections and answers
//! flight submissions until interrupted.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use notam_advisory::{
    FlightEvaluator, HttpWeatherSource, NotamIndex, StaticWeatherSource, WeatherConfig,
    WeatherSource,
};
use notam_server::{AdvisoryServer, ServerConfig, DEFAULT_NOTAM_FILE};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "notam-server")]
#[command(about = "Flight advisory server: NOTAM, weather and fuel checks")]
#[command(version)]
struct Cli {
    /// NOTAM database file
    #[arg(short = 'f', long, env = "NOTAM_FILE", default_value = DEFAULT_NOTAM_FILE)]
    notam_file: PathBuf,

    /// Listening port
    #[arg(short, long, env = "NOTAM_PORT", default_value_t = notam_server::DEFAULT_PORT)]
    port: u16,

    /// Listening address
    #[arg(long, env = "NOTAM_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Maximum number of admitted clients
    #[arg(long, env = "NOTAM_MAX_CONNECTIONS", default_value_t = notam_server::DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,

    /// Seconds of silence before a session is closed
    #[arg(long, env = "NOTAM_IDLE_TIMEOUT_SECS", default_value_t = 300)]
    idle_timeout_secs: u64,

    /// Weather service endpoint
    #[arg(long, env = "WEATHER_URL", default_value = notam_advisory::weather::DEFAULT_WEATHER_URL)]
    weather_url: String,

    /// Weather service API key
    #[arg(long, env = "WEATHER_API_KEY", default_value = "")]
    weather_api_key: String,

    /// Use fixed fair weather instead of the weather service
    #[arg(long, env = "NOTAM_OFFLINE")]
    offline: bool,

    /// Emit logs as JSON
    #[arg(long, env = "NOTAM_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    let config = ServerConfig::new(SocketAddr::new(cli.bind, cli.port))
        .with_max_connections(cli.max_connections)
        .with_idle_timeout(Duration::from_secs(cli.idle_timeout_secs))
        .with_notam_file(&cli.notam_file)
        .with_weather(WeatherConfig::new(cli.weather_api_key).with_base_url(cli.weather_url));

    let notams = NotamIndex::load_or_empty(&config.notam_file);

    if cli.offline {
        info!("Offline mode: using fixed fair weather");
        run(config, FlightEvaluator::new(notams, StaticWeatherSource::fair())).await
    } else {
        if config.weather.api_key.is_empty() {
            warn!("No weather API key set; weather lookups will likely fail");
        }
        let source = HttpWeatherSource::new(config.weather.clone())?;
        run(config, FlightEvaluator::new(notams, source)).await
    }
}

async fn run<S: WeatherSource>(
    config: ServerConfig,
    evaluator: FlightEvaluator<S>,
) -> anyhow::Result<()> {
    info!(
        addr = %config.bind_addr,
        notam_file = %config.notam_file.display(),
        "Starting notam-server"
    );

    let mut server = AdvisoryServer::new(config, evaluator);
    tokio::select! {
        result = server.serve() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted");
        }
    }
    Ok(())
}
