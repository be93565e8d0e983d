//! Waybill terminal host - composition root.
//!
//! Embeds one assistant widget in a line-oriented terminal "page":
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Load the knowledge catalog (built-in or custom file)
//! 3. Build the widget with the route as identity signal and the
//!    `--section` flags as the visible page sections
//! 4. Read commands from stdin until `/quit`, EOF or Ctrl-C

mod cli;
mod console;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use waybill_assistant::{
    AssistantError, AssistantWidget, KnowledgeBase, PendingReply, StaticIdentity,
};
use waybill_core::{QuickOption, TurnKind, WaybillConfig};

use cli::CliArgs;
use console::{Command, ConsoleTarget, PageSections, HELP};

/// Apply one command to the widget, returning the reply it scheduled.
fn dispatch(
    widget: &AssistantWidget,
    page: &PageSections,
    command: Command,
) -> Result<Option<PendingReply>, AssistantError> {
    match command {
        Command::Open => widget.open(),
        Command::Close => {
            widget.close();
            Ok(None)
        }
        Command::Navigate(sections) => {
            page.replace(sections);
            widget.notify_navigation();
            Ok(None)
        }
        Command::Choose(n) => {
            let options = latest_options(widget);
            match n.checked_sub(1).and_then(|i| options.get(i)) {
                Some(option) => widget.choose(option).map(Some),
                None => {
                    println!("no option {} in the latest reply", n);
                    Ok(None)
                }
            }
        }
        Command::Say(text) => widget.submit_text(&text).map(Some),
        Command::Help => {
            println!("{}", HELP);
            Ok(None)
        }
        Command::Blank | Command::Quit => Ok(None),
    }
}

/// Options of the latest assistant turn. A reply without options leaves
/// nothing to click, even if an earlier reply had some.
fn latest_options(widget: &AssistantWidget) -> Vec<QuickOption> {
    widget
        .transcript()
        .into_iter()
        .rev()
        .find_map(|turn| match turn.kind {
            TurnKind::Assistant { options, .. } => Some(options),
            _ => None,
        })
        .unwrap_or_default()
}

/// Open the panel first when the user types into a closed widget, so the
/// greeting precedes their question.
async fn ensure_open(widget: &AssistantWidget) -> Result<(), AssistantError> {
    if widget.is_open() {
        return Ok(());
    }
    if let Some(greeting) = widget.open()? {
        greeting.revealed().await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = WaybillConfig::load_or_default(&config_file);

    // Tracing. Logs go to stderr so they do not interleave with the transcript.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(args.resolve_log_level(&config))
            }),
        )
        .init();

    tracing::info!("Starting Waybill v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Knowledge catalog.
    let knowledge = match args.resolve_knowledge_path(&config) {
        Some(path) => KnowledgeBase::load(&path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to load knowledge catalog");
            e
        })?,
        None => KnowledgeBase::builtin(),
    };

    // Widget.
    let page = Arc::new(PageSections::new(args.sections.clone()));
    let widget = AssistantWidget::new(
        config.assistant.clone(),
        Arc::new(knowledge),
        Arc::new(StaticIdentity(args.route.clone())),
        page.clone(),
        Arc::new(ConsoleTarget::stdout()),
    )?;
    tracing::info!(
        widget = %widget.id(),
        role = %widget.role(),
        context = %widget.context(),
        "Widget ready"
    );
    println!("Waybill assistant ({}). Type /help for commands.", widget.role());

    // === Prompt loop ===

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        if matches!(command, Command::Say(_) | Command::Choose(_)) {
            if let Err(e) = ensure_open(&widget).await {
                tracing::warn!(error = %e, "Failed to open widget");
                continue;
            }
        }

        match dispatch(&widget, &page, command) {
            Ok(Some(pending)) => {
                pending.revealed().await;
            }
            Ok(None) => {}
            // Rejected submissions are dropped without a visible reply.
            Err(e) => tracing::debug!(error = %e, "Input ignored"),
        }
    }

    tracing::info!("Waybill shut down");
    Ok(())
}
