mod api;
mod app;
mod flow;
mod util;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::api::ApiClient;
use crate::flow::{FlowLevel, FlowMode};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the claim statistics backend.
    #[arg(long, default_value = "http://127.0.0.1:8000/api")]
    api_url: String,

    /// Flow granularity to open with.
    #[arg(long, value_enum, default_value_t = FlowLevel::Process)]
    level: FlowLevel,

    /// Claim counting mode to open with.
    #[arg(long, value_enum, default_value_t = FlowMode::Detailed)]
    mode: FlowMode,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FLOWLENS_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let client = match ApiClient::new(&args.api_url) {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, url = %args.api_url, "invalid API base URL");
            std::process::exit(2);
        }
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "flowlens",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::FlowLensApp::new(
                cc,
                client,
                args.level,
                args.mode,
            )))
        }),
    )
}
