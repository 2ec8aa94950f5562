use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use playlist_progress::config::Config;
use playlist_progress::dom::{Document, SharedDocument};
use playlist_progress::replay::{HostPage, Script};
use playlist_progress::Coordinator;

/// Print the widget state, only if output changes.
fn print_status(coordinator: &Coordinator, last_output: &mut String) -> Result<()> {
    let json_output = match coordinator.view() {
        Some(view) => serde_json::to_string(&view)?,
        None => serde_json::json!({"phase": format!("{:?}", coordinator.phase())}).to_string(),
    };
    if *last_output != json_output {
        println!("{}", json_output);
        *last_output = json_output;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::parse();

    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = config.settings()?;
    let page = fs::read_to_string(&config.page)
        .with_context(|| format!("Failed to read page fixture: {}", config.page.display()))?;
    let doc = SharedDocument::new(
        Document::from_json(&page)
            .with_context(|| format!("Failed to load page fixture: {}", config.page.display()))?,
    );
    let script = match &config.script {
        Some(path) => Script::load(path)
            .with_context(|| format!("Failed to load replay script: {}", path.display()))?,
        None => Script::default(),
    };

    let host = HostPage::new(doc.clone(), &settings.selectors)?;
    let coordinator = Coordinator::new(doc, settings.clone())?;
    let mut last_output = String::new();

    // Initial pass after the settle delay
    coordinator.start().await?;
    print_status(&coordinator, &mut last_output)?;

    for step in &script.steps {
        host.play(step).await?;
        print_status(&coordinator, &mut last_output)?;
    }

    // Let refreshes scheduled by the last step land
    tokio::time::sleep(settings.timing.navigation_delay() + settings.timing.active_debounce()).await;
    print_status(&coordinator, &mut last_output)?;
    Ok(())
}
