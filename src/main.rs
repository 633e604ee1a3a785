use anyhow::Context;
use clap::Parser;

use photo_organizer::app::OrganizerApp;
use photo_organizer::config::Cli;

fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("photo_organizer=info".parse().context("invalid log directive")?),
        )
        .init();

    let mut app = OrganizerApp::new(&config)?;
    app.run()
}
