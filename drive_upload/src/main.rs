//! drive_upload CLI - Upload files to Google Drive.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use drive_upload::{cli, Config};

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr so they never mix with upload results.
    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .from_env_lossy();
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);
    tracing_subscriber::registry().with(stderr_layer).init();

    let code = cli::run(std::env::args_os(), Config::default()).await;
    std::process::exit(code);
}
