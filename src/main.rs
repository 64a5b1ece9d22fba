use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use docqa::{api, config, logging, pipeline::PipelineService};
use tokio::net::TcpListener;

/// Retrieval-augmented question answering over a folder of local documents.
#[derive(Debug, Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Folder of documents to ingest at startup (overrides `DOCS_DIR`).
    #[arg(long)]
    docs_dir: Option<PathBuf>,
    /// Port to listen on (overrides `SERVER_PORT`).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    let service = Arc::new(PipelineService::new());

    let docs_dir = cli
        .docs_dir
        .or_else(|| config::get_config().docs_dir.clone().map(PathBuf::from));
    if let Some(folder) = docs_dir {
        match service.build_corpus(&folder).await {
            Ok(outcome) => tracing::info!(
                documents = outcome.documents,
                skipped = outcome.skipped_documents,
                chunks = outcome.chunks,
                "Startup corpus build complete"
            ),
            // The server still comes up; the corpus can be built later via POST /ingest.
            Err(error) => tracing::error!(error = %error, "Startup corpus build failed"),
        }
    } else {
        tracing::warn!("No document folder configured; waiting for POST /ingest");
    }

    let app = api::create_router(service);
    let (listener, port) = bind_listener(cli.port)
        .await
        .expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.unwrap();
}

async fn bind_listener(cli_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = cli_port.or(config.server_port) {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8100..=8199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8100-8199",
    ))
}
