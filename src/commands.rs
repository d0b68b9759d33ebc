//! Command-line surface over the encoder, renderer and history manager.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    encoder::{self, Symbology},
    history::{LogSink, ObservabilitySink, Operation},
    models::{BarcodeEntry, EntryDraft},
    render::{print_sheet, save_png, Renderer},
    settings::{PrintDefaults, SettingsStore},
    store::decode_entries,
    App,
};

/// Vertical gap between copies on a print sheet, in pixels.
const SHEET_GAP: u32 = 24;

/// Generate retail barcodes and keep a synchronized history.
#[derive(Parser)]
#[command(name = "barcodegen", version, long_about = None)]
pub(crate) struct Cli {
    /// Directory holding the database, settings and history snapshots
    #[arg(
        long,
        env = "BARCODEGEN_DATA_DIR",
        default_value = ".barcodegen",
        global = true
    )]
    data_dir: PathBuf,

    /// Scope history to this user id instead of the generated session id
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random value, save it to history and optionally render it.
    Generate(GenerateArgs),

    /// Check a value against a symbology.
    Validate {
        value: String,

        #[arg(short, long, default_value = "UPC_A")]
        symbology: Symbology,

        /// Also verify the check digit
        #[arg(long)]
        strict: bool,
    },

    /// List history, optionally filtered by a case-insensitive query.
    History { query: Option<String> },

    /// Write the history to a JSON file.
    Export { path: PathBuf },

    /// Replace the history with the contents of an exported JSON file.
    Import { path: PathBuf },

    /// Generate a fresh entry pre-filled from an existing one.
    Reprint {
        id: i64,

        /// Write the rendered print sheet to this file or directory
        #[arg(long)]
        png: Option<PathBuf>,
    },

    /// Show or update the defaults used by `generate`.
    Defaults {
        #[arg(long)]
        label_size: Option<String>,

        #[arg(long)]
        copies: Option<u32>,

        #[arg(short, long)]
        symbology: Option<Symbology>,
    },
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(short, long)]
    symbology: Option<Symbology>,

    /// Display name stored with the entry
    #[arg(short, long)]
    name: Option<String>,

    #[arg(long)]
    label_size: Option<String>,

    #[arg(short, long)]
    copies: Option<u32>,

    /// Write the rendered print sheet to this file or directory
    #[arg(long)]
    png: Option<PathBuf>,
}

/// Logs like [`LogSink`] and also tells the user when an entry was saved.
/// Failures stay in the log only.
#[derive(Default)]
pub(crate) struct NoticeSink {
    log: LogSink,
}

impl ObservabilitySink for NoticeSink {
    fn failed(&self, operation: Operation, error: &dyn fmt::Display) {
        self.log.failed(operation, error);
    }

    fn saved(&self, entry: &BarcodeEntry) {
        self.log.saved(entry);
        eprintln!("Saved {} to history", entry.value());
    }
}

/// Commands that need the database opened and history loaded.
enum AppCommand {
    Generate(GenerateArgs),
    History(Option<String>),
    Export(PathBuf),
    Import(PathBuf),
    Reprint { id: i64, png: Option<PathBuf> },
}

pub(crate) async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        data_dir,
        user,
        command,
    } = cli;

    let command = match command {
        Commands::Validate {
            value,
            symbology,
            strict,
        } => return validate(&value, symbology, strict),
        Commands::Defaults {
            label_size,
            copies,
            symbology,
        } => {
            let settings = SettingsStore::new(data_dir.join("settings.json"))?;
            return defaults(&settings, label_size, copies, symbology);
        }
        Commands::Generate(args) => AppCommand::Generate(args),
        Commands::History { query } => AppCommand::History(query),
        Commands::Export { path } => AppCommand::Export(path),
        Commands::Import { path } => AppCommand::Import(path),
        Commands::Reprint { id, png } => AppCommand::Reprint { id, png },
    };

    let mut app = App::open(&data_dir, user.as_deref()).await?;
    let result = run_with_app(&mut app, command).await;
    app.history.flush().await;
    result
}

async fn run_with_app(app: &mut App, command: AppCommand) -> Result<()> {
    match command {
        AppCommand::Generate(args) => generate(app, args).await,
        AppCommand::History(query) => {
            list_history(app, query.as_deref().unwrap_or(""));
            Ok(())
        }
        AppCommand::Export(path) => export(app, &path),
        AppCommand::Import(path) => import(app, &path).await,
        AppCommand::Reprint { id, png } => reprint(app, id, png).await,
    }
}

fn validate(value: &str, symbology: Symbology, strict: bool) -> Result<()> {
    if !encoder::validate(value, symbology) {
        bail!("'{value}' is not a valid {symbology} value");
    }
    if strict && !encoder::has_valid_check_digit(value, symbology) {
        bail!("'{value}' has the shape of {symbology} but a wrong check digit");
    }
    println!("{value} is a valid {symbology} value");
    Ok(())
}

async fn generate(app: &mut App, args: GenerateArgs) -> Result<()> {
    let defaults = app.settings.defaults();
    let symbology = args.symbology.unwrap_or(defaults.symbology);

    let draft = EntryDraft::new(encoder::generate(symbology), symbology)
        .with_display_name(args.name)
        .with_label_size(Some(args.label_size.unwrap_or(defaults.label_size)))
        .with_copies(Some(i64::from(args.copies.unwrap_or(defaults.copies))));

    commit(app, draft, args.png.as_deref()).await
}

async fn reprint(app: &mut App, id: i64, png: Option<PathBuf>) -> Result<()> {
    match app.history.reprint(id) {
        Some(draft) => commit(app, draft, png.as_deref()).await,
        None => {
            println!("No history entry with id {id}");
            Ok(())
        }
    }
}

/// Render the print sheet if asked, append the entry, then wait for the
/// remote confirmation. An entry whose sheet cannot be built is not appended.
async fn commit(app: &mut App, draft: EntryDraft, png: Option<&Path>) -> Result<()> {
    let entry = app.history.new_entry(draft)?;

    let sheet = match png {
        Some(target) => {
            let label = app.renderer.render(entry.value(), entry.symbology())?;
            let sheet = print_sheet(&label, entry.copies(), SHEET_GAP)?;
            let path = if target.is_dir() {
                target.join(format!("barcode-{}.png", entry.value()))
            } else {
                target.to_path_buf()
            };
            Some((sheet, path))
        }
        None => None,
    };

    let pending = app.history.append(entry.clone());
    if let Some((sheet, path)) = sheet {
        save_png(&sheet, &path)?;
        println!("Wrote {}", path.display());
    }

    println!("{}", format_entry(&entry));
    pending.confirmed().await;
    Ok(())
}

fn list_history(app: &App, query: &str) {
    let hits = app.history.search(query);
    if hits.is_empty() {
        println!("No history entries");
        return;
    }
    for entry in hits {
        println!("{}", format_entry(entry));
    }
}

fn export(app: &App, path: &Path) -> Result<()> {
    match app.history.export_snapshot() {
        Some(archive) => {
            archive.write_to(path)?;
            println!("Exported {} entries to {}", archive.entries().len(), path.display());
        }
        None => println!("History is empty; nothing exported"),
    }
    Ok(())
}

async fn import(app: &mut App, path: &Path) -> Result<()> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let entries = decode_entries(payload)?;

    let count = entries.len();
    app.history.replace_all(entries).confirmed().await;
    println!("Imported {} of {count} entries", app.history.len());
    Ok(())
}

fn defaults(
    settings: &SettingsStore,
    label_size: Option<String>,
    copies: Option<u32>,
    symbology: Option<Symbology>,
) -> Result<()> {
    let current = settings.defaults();
    if label_size.is_some() || copies.is_some() || symbology.is_some() {
        let updated = PrintDefaults {
            label_size: label_size.unwrap_or(current.label_size),
            copies: copies.filter(|&count| count > 0).unwrap_or(current.copies),
            symbology: symbology.unwrap_or(current.symbology),
        };
        settings.update_defaults(updated)?;
    }

    let shown = settings.defaults();
    println!(
        "symbology={} labelSize={} copies={} scope={}",
        shown.symbology,
        shown.label_size,
        shown.copies,
        settings.scope()
    );
    Ok(())
}

fn format_entry(entry: &BarcodeEntry) -> String {
    format!(
        "{:>15}  {:<8} {:<14} x{:<3} {:<6} {}  {}",
        entry.id(),
        entry.symbology(),
        entry.value(),
        entry.copies(),
        entry.label_size().unwrap_or("-"),
        entry.created_at().format("%Y-%m-%d %H:%M"),
        entry.display_name().unwrap_or(""),
    )
}
