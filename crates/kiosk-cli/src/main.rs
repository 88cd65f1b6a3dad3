//! CLI entry point - the composition root.
//!
//! Type what the citizen says. `~text` is an interim result, `!kill` makes
//! the recognizer die silently, `!end` and `!error <kind>` end it loudly,
//! `/status` prints the session, `/stop` and `/start` toggle voice mode.

use clap::Parser;
use kiosk_cli::console::{ConsoleInput, render_event, spawn_line_reader};
use kiosk_cli::{Cli, bootstrap};
use kiosk_voice::VoiceController;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kiosk_voice=info,kiosk_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = bootstrap(&cli)?;

    let (mut controller, mut events) = VoiceController::new(app.config.clone(), app.deps.clone());
    controller.activate(app.activation.clone()).await?;

    let mut lines = spawn_line_reader()?;
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                let input = ConsoleInput::parse(&line);
                if app.capture.feed(&input) {
                    continue;
                }
                match input {
                    ConsoleInput::Quit => break,
                    ConsoleInput::Status => {
                        let snapshot = controller.status();
                        println!("{}", serde_json::to_string_pretty(&snapshot)?);
                        println!("screen: {:?}", app.host.screen());
                    }
                    ConsoleInput::Stop => controller.deactivate().await,
                    ConsoleInput::Start => {
                        if let Err(e) = controller.activate(app.activation.clone()).await {
                            println!("{e}");
                        }
                    }
                    _ => {}
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(line) = render_event(&event) {
                    println!("{line}");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.deactivate().await;
    Ok(())
}
