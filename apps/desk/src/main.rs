use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    CollectingNotifier, HttpServiceDesk, IncidentDialog, ServiceDeskApi, SyncController,
};
use shared::domain::{Category, Module, Priority};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod render;
mod settings;

use render::{render_notification, render_view};
use settings::{load_settings, DEFAULT_SETTINGS_FILE};

type Controller = SyncController<CollectingNotifier>;

#[derive(Parser, Debug)]
#[command(name = "desk", about = "Console front-end for the service desk")]
struct Cli {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Overrides `api_base_url` from the settings file and environment.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List modules and the resources each one loads.
    Modules,
    /// Load a module once and print it.
    Show { module: Module },
    CreateIncident {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "Medium")]
        priority: Priority,
        #[arg(long)]
        category: Option<Category>,
    },
    /// Read commands from stdin until `quit`.
    Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InteractiveCommand {
    Select(Module),
    Refresh,
    Create { priority: Priority, title: String },
    Help,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Command::Modules = cli.command {
        print_modules();
        return Ok(());
    }

    let mut settings = load_settings(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    if let Some(url) = cli.api_url {
        settings.api_base_url = url;
    }
    info!(api = %settings.api_base_url, route_style = ?settings.route_style, "desk starting");

    let api = HttpServiceDesk::with_options(
        &settings.api_base_url,
        settings.route_style,
        settings.request_timeout(),
    )?;
    let api: Arc<dyn ServiceDeskApi> = Arc::new(api);
    let mut controller = SyncController::new(api, CollectingNotifier::new());

    match cli.command {
        Command::Modules => {}
        Command::Show { module } => {
            controller.select_module(module).await;
            flush_notifications(&controller);
            print!("{}", render_view(controller.state()));
        }
        Command::CreateIncident {
            title,
            description,
            priority,
            category,
        } => {
            controller.select_module(Module::Incidents).await;
            let mut dialog = IncidentDialog::new();
            dialog.open();
            {
                let form = dialog.form_mut()?;
                form.title = title;
                form.description = description;
                form.priority = priority;
                form.category = category;
            }
            let created = controller.submit_dialog(&mut dialog).await?;
            flush_notifications(&controller);
            print!("{}", render_view(controller.state()));
            if !created {
                anyhow::bail!("incident was not created");
            }
        }
        Command::Interactive => run_interactive(&mut controller).await?,
    }
    Ok(())
}

fn print_modules() {
    for module in Module::ALL {
        let resources = module
            .required_resources()
            .iter()
            .map(|r| r.name())
            .collect::<Vec<_>>();
        let needs = if resources.is_empty() {
            "-".to_string()
        } else {
            resources.join(", ")
        };
        println!("{:<14} {:<14} {needs}", module.as_str(), module.title());
    }
}

fn flush_notifications(controller: &Controller) {
    for notification in controller.notifier().drain() {
        println!("{}", render_notification(&notification));
    }
}

async fn run_interactive(controller: &mut Controller) -> Result<()> {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    controller.begin_detached(Module::Dashboard, events_tx.clone());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(InteractiveCommand::Quit) => break,
                    Ok(InteractiveCommand::Help) => print_help(),
                    Ok(InteractiveCommand::Select(module)) => {
                        controller.begin_detached(module, events_tx.clone());
                        if !controller.state().loading() {
                            print!("{}", render_view(controller.state()));
                        }
                    }
                    Ok(InteractiveCommand::Refresh) => {
                        controller.refresh_detached(events_tx.clone());
                    }
                    Ok(InteractiveCommand::Create { priority, title }) => {
                        let mut dialog = IncidentDialog::new();
                        dialog.open();
                        {
                            let form = dialog.form_mut()?;
                            form.title = title;
                            form.priority = priority;
                        }
                        match controller.submit_dialog(&mut dialog).await {
                            Ok(_) => print!("{}", render_view(controller.state())),
                            Err(err) => println!("[error] {err}"),
                        }
                        flush_notifications(controller);
                    }
                    Err(message) => println!("{message}"),
                }
            }
            Some(event) = events.recv() => {
                let applied = controller.handle_event(event);
                flush_notifications(controller);
                if applied && !controller.state().loading() {
                    print!("{}", render_view(controller.state()));
                } else if !applied {
                    debug!("ignored result of superseded cycle");
                }
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("commands: <module> | refresh | create [priority] <title> | help | quit");
    let names = Module::ALL
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    println!("modules: {names}");
}

fn parse_command(line: &str) -> Result<InteractiveCommand, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match head {
        "quit" | "exit" => Ok(InteractiveCommand::Quit),
        "help" | "?" => Ok(InteractiveCommand::Help),
        "refresh" => Ok(InteractiveCommand::Refresh),
        "create" => {
            let (priority, title) = match rest.split_once(char::is_whitespace) {
                Some((first, tail)) => match first.parse::<Priority>() {
                    Ok(priority) => (priority, tail.trim()),
                    Err(_) => (Priority::default(), rest),
                },
                None => (Priority::default(), rest),
            };
            Ok(InteractiveCommand::Create {
                priority,
                title: title.to_string(),
            })
        }
        other => other
            .parse::<Module>()
            .map(InteractiveCommand::Select)
            .map_err(|_| format!("unknown command '{other}', try 'help'")),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
