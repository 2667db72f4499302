use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use knigi_inventory::{
    DiagnosticSink, InventoryLine, InventoryRepository, InventorySummary, Isbn, LineRejection,
    Store, TracingSink, parse_sale, parse_shipment,
};

/// Command-line arguments for knigi
#[derive(Parser, Debug)]
#[command(name = "knigi")]
#[command(about = "Bookstore inventory tracker")]
#[command(version)]
pub struct Cli {
    /// Database URL, overrides KNIGI_DATABASE_URL
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Manage stores
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Receive a shipment (JSON file, or - for stdin)
    Receive {
        #[arg(long)]
        store: String,
        payload: PathBuf,
    },
    /// Sell books (JSON file, or - for stdin)
    Sell {
        #[arg(long)]
        store: String,
        payload: PathBuf,
    },
    /// Show a store's inventory
    Inventory {
        #[arg(long)]
        store: String,
    },
    /// Assign an ISBN to a catalogued book
    Isbn {
        #[arg(long)]
        title: String,
        isbn: String,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum StoreAction {
    /// Register a new store
    Add { name: String },
    /// List all stores
    List,
}

/// Outcome of a batch, printed on stdout.
#[derive(Debug, Serialize)]
struct BatchReport {
    store: String,
    lines: usize,
    rejected: Vec<String>,
}

#[derive(Debug, Serialize)]
struct InventoryReport {
    store: String,
    summary: InventorySummary,
    lines: Vec<InventoryLine>,
}

/// Logs each rejection and keeps its message for the report.
#[derive(Debug, Default)]
struct ReportingSink {
    log: TracingSink,
    messages: Vec<String>,
}

impl DiagnosticSink for ReportingSink {
    fn report(&mut self, rejection: LineRejection) {
        self.messages.push(rejection.to_string());
        self.log.report(rejection);
    }
}

pub fn run<R>(command: Command, repo: &R, out: &mut impl Write) -> Result<()>
where
    R: InventoryRepository + ?Sized,
{
    match command {
        Command::Store { action: StoreAction::Add { name } } => {
            let store = repo
                .create_store(&name)
                .with_context(|| format!("failed to create store '{name}'"))?;
            tracing::info!(store = store.name(), id = %store.id_typed(), "store created");
            write_json(out, &store)
        }
        Command::Store { action: StoreAction::List } => write_json(out, &repo.list_stores()?),
        Command::Receive { store, payload } => {
            let json = read_payload(&payload)?;
            receive(repo, &store, &json, out)
        }
        Command::Sell { store, payload } => {
            let json = read_payload(&payload)?;
            sell(repo, &store, &json, out)
        }
        Command::Inventory { store } => inventory(repo, &store, out),
        Command::Isbn { title, isbn } => {
            let isbn = Isbn::parse(isbn).context("invalid ISBN")?;
            let book = repo
                .set_isbn(&title, isbn)
                .with_context(|| format!("failed to set ISBN of '{title}'"))?;
            write_json(out, &book)
        }
    }
}

fn receive<R>(repo: &R, store: &str, json: &str, out: &mut impl Write) -> Result<()>
where
    R: InventoryRepository + ?Sized,
{
    let lines = parse_shipment(json).context("failed to parse shipment")?;
    let store = store_named(repo, store)?;

    let mut sink = ReportingSink::default();
    store.receive_shipment(repo, &lines, &mut sink)?;

    write_json(
        out,
        &BatchReport {
            store: store.name().to_string(),
            lines: lines.len(),
            rejected: sink.messages,
        },
    )
}

fn sell<R>(repo: &R, store: &str, json: &str, out: &mut impl Write) -> Result<()>
where
    R: InventoryRepository + ?Sized,
{
    let lines = parse_sale(json).context("failed to parse sale")?;
    let store = store_named(repo, store)?;

    let mut sink = ReportingSink::default();
    store.sell_books(repo, &lines, &mut sink)?;

    write_json(
        out,
        &BatchReport {
            store: store.name().to_string(),
            lines: lines.len(),
            rejected: sink.messages,
        },
    )
}

fn inventory<R>(repo: &R, store: &str, out: &mut impl Write) -> Result<()>
where
    R: InventoryRepository + ?Sized,
{
    let store = store_named(repo, store)?;
    let lines = repo.list_inventory(store.id_typed())?;

    write_json(
        out,
        &InventoryReport {
            store: store.name().to_string(),
            summary: InventorySummary::from_lines(&lines),
            lines,
        },
    )
}

fn store_named<R>(repo: &R, name: &str) -> Result<Store>
where
    R: InventoryRepository + ?Sized,
{
    repo.find_store_by_name(name)?
        .with_context(|| format!("unknown store '{name}'"))
}

fn read_payload(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read payload from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to write output")?;
    writeln!(out).context("failed to write output")?;
    Ok(())
}
