use std::fs::OpenOptions;
use std::io::Read as _;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;

use workplan::api::{LocalApi, TaskApi};
use workplan::board::{Board, Notice};
use workplan::client::HttpApi;
use workplan::config::ClientConfig;
use workplan::model::{Direction, NewTask, Task, TaskPatch};
use workplan::transfer::{Export, ImportMode};
use workplan::{db, output, paths, server, tui};

mod cli;

use cli::{Cli, Command, ConfigAction};

/// Where the board's tasks come from.
enum Source {
    Local(String),
    Remote(String),
}

impl Source {
    fn resolve(cli: &Cli, config: &ClientConfig) -> Self {
        match cli.server.clone().or_else(|| config.server.clone()) {
            Some(url) => Source::Remote(url),
            None => Source::Local(cli.db.clone().unwrap_or_else(paths::db_path)),
        }
    }

    fn open(&self) -> Result<Box<dyn TaskApi + Send>> {
        Ok(match self {
            Source::Local(path) => {
                paths::ensure_parent_dir(path)?;
                Box::new(LocalApi::open(path)?)
            }
            Source::Remote(url) => Box::new(HttpApi::new(url)?),
        })
    }
}

/// One-shot commands log warnings to stderr; `RUST_LOG` overrides.
fn setup_cli_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
}

/// The board owns the terminal, so it logs to a file instead.
fn setup_file_logging(log_path: &str) -> Result<()> {
    paths::ensure_parent_dir(log_path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {log_path}"))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_secs()
        .init();
    Ok(())
}

fn setup_server_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();
}

fn connect(source: &Source) -> Result<Board> {
    Board::connect(source.open()?, Duration::ZERO, Instant::now())
}

/// Tasks the server created, in the order it answered.
fn created(notices: Vec<Notice>) -> Vec<Task> {
    notices
        .into_iter()
        .filter_map(|notice| match notice {
            Notice::Created(task) => Some(task),
            _ => None,
        })
        .collect()
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = PathBuf::from(cli.config.clone().unwrap_or_else(paths::config_path));
    let mut config = ClientConfig::load_from(&config_path)?;
    let source = Source::resolve(&cli, &config);

    match cli.command {
        Command::List { column, json } => {
            setup_cli_logging();
            let board = connect(&source)?;
            let columns: Vec<String> = match column {
                Some(c) => vec![c],
                None => board.columns(),
            };
            let grouped: Vec<(String, Vec<&Task>)> = columns
                .into_iter()
                .map(|c| {
                    let tasks = board.tasks_in_column(&c);
                    (c, tasks)
                })
                .collect();
            if json {
                let tasks: Vec<&Task> = grouped.iter().flat_map(|(_, t)| t.iter().copied()).collect();
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                print!("{}", output::format_board(&grouped));
            }
        }

        Command::Show { id, json } => {
            setup_cli_logging();
            let board = connect(&source)?;
            let task = board.store().require(id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(task)?);
            } else {
                print!("{}", output::format_task_detail(task));
            }
        }

        Command::Add {
            title,
            column,
            desc,
            followup,
        } => {
            setup_cli_logging();
            let mut board = connect(&source)?;
            let new = NewTask {
                title,
                description: desc,
                followup,
                column_id: column,
            };
            board.add_task(new)?;
            for task in created(board.settle()?) {
                println!("{}", task.id);
                eprintln!("Added task {} '{}' to {}", task.id, task.title, task.column_id);
            }
        }

        Command::AddMany { column } => {
            setup_cli_logging();
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            let mut board = connect(&source)?;
            board.add_many(&column, &text)?;
            let tasks = created(board.settle()?);
            for task in &tasks {
                println!("{}", task.id);
            }
            eprintln!("Added {} tasks to {column}", tasks.len());
        }

        Command::Edit {
            id,
            title,
            desc,
            followup,
        } => {
            setup_cli_logging();
            let patch = TaskPatch {
                title,
                description: desc,
                followup,
                ..TaskPatch::default()
            };
            if patch.is_empty() {
                bail!("nothing to change: pass --title, --desc or --followup");
            }
            let mut board = connect(&source)?;
            board.edit_task(id, patch)?;
            board.settle()?;
            eprintln!("Updated task {id}");
        }

        Command::Mv { id, column, index } => {
            setup_cli_logging();
            let mut board = connect(&source)?;
            let changes = board.move_task(id, &column, index.unwrap_or(usize::MAX))?;
            board.settle()?;
            if changes.is_empty() {
                eprintln!("Task {id} is already there");
            } else {
                eprintln!("Moved task {id} to {column}");
            }
        }

        Command::Nudge { id, direction } => {
            setup_cli_logging();
            let direction = Direction::parse(&direction)?;
            let mut board = connect(&source)?;
            let moved = board.nudge(id, direction)?;
            board.settle()?;
            match moved {
                Some(_) => eprintln!("Moved task {id} {direction}"),
                None => eprintln!("Task {id} can't move {direction}"),
            }
        }

        Command::Archive { id } => {
            setup_cli_logging();
            let mut board = connect(&source)?;
            let changes = board.archive(id)?;
            board.settle()?;
            if changes.is_empty() {
                eprintln!("Task {id} is already archived");
            } else {
                eprintln!("Archived task {id}");
            }
        }

        Command::Restore { id, column } => {
            setup_cli_logging();
            let mut board = connect(&source)?;
            let changes = board.restore(id, &column)?;
            board.settle()?;
            if changes.is_empty() {
                bail!("task {id} is not archived");
            }
            eprintln!("Restored task {id} to {column}");
        }

        Command::Rm { id } => {
            setup_cli_logging();
            let mut board = connect(&source)?;
            let task = board.delete_task(id)?;
            board.settle()?;
            eprintln!("Deleted task {id} '{}'", task.title);
        }

        Command::Export { output } => {
            setup_cli_logging();
            let board = connect(&source)?;
            let export = board.export();
            let json = export.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json + "\n")
                        .with_context(|| format!("failed to write {path}"))?;
                    eprintln!("Exported {} tasks to {path}", export.tasks.len());
                }
                None => println!("{json}"),
            }
        }

        Command::Import { file, mode } => {
            setup_cli_logging();
            let mode = ImportMode::parse(&mode)?;
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {file}"))?;
            // Validate before touching the board.
            let export = Export::parse(&json).with_context(|| format!("cannot import {file}"))?;
            let mut board = connect(&source)?;
            let count = board.import(&export, mode)?;
            eprintln!("Imported {count} tasks");
        }

        Command::Config { action } => {
            match action {
                ConfigAction::Interval { seconds } => {
                    config.set_sync_interval(Duration::from_secs(seconds));
                    save_config(&config, &config_path)?;
                }
                ConfigAction::Show { column } => {
                    config.set_visible(&column, true);
                    save_config(&config, &config_path)?;
                }
                ConfigAction::Hide { column } => {
                    config.set_visible(&column, false);
                    save_config(&config, &config_path)?;
                }
                ConfigAction::Print => {}
            }
            print!("{}", format_config(&config, &source));
        }

        Command::Board => {
            setup_file_logging(&paths::log_path())?;
            let board = Board::connect(source.open()?, config.sync_interval(), Instant::now())?;
            let watch_path = match &source {
                Source::Local(path) => Some(path.as_str()),
                Source::Remote(_) => None,
            };
            tui::run(board, config, config_path, watch_path)?;
        }

        Command::Serve { port, bind } => {
            setup_server_logging();
            let Source::Local(db_path) = &source else {
                bail!("serve runs against a local database; drop --server");
            };
            paths::ensure_parent_dir(db_path)?;
            let conn = db::open(db_path)?;
            db::init(&conn)?;
            let addr: SocketAddr = format!("{bind}:{port}")
                .parse()
                .with_context(|| format!("invalid bind address {bind}:{port}"))?;
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime.block_on(server::serve(addr, conn))?;
        }
    }

    Ok(())
}

fn save_config(config: &ClientConfig, path: &Path) -> Result<()> {
    config.save_to(path)?;
    eprintln!("Saved {}", path.display());
    Ok(())
}

fn format_config(config: &ClientConfig, source: &Source) -> String {
    let mut out = String::new();
    match source {
        Source::Local(path) => out.push_str(&format!("database:      {path}\n")),
        Source::Remote(url) => out.push_str(&format!("server:        {url}\n")),
    }
    let interval = config.sync_interval().as_secs();
    if interval == 0 {
        out.push_str("sync interval: off\n");
    } else {
        out.push_str(&format!("sync interval: {interval}s\n"));
    }
    let hidden: Vec<&str> = config
        .columns
        .iter()
        .filter(|(_, visible)| !**visible)
        .map(|(c, _)| c.as_str())
        .collect();
    if !hidden.is_empty() {
        out.push_str(&format!("hidden:        {}\n", hidden.join(", ")));
    }
    out
}
