use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{error, warn};
use vertical_tabs::common::config::{Config, config_file};
use vertical_tabs::common::log;
use vertical_tabs::engine::{SortStrategyName, TabEngine};
use vertical_tabs::model::host::{GroupId, LeafId};
use vertical_tabs::model::store::FileStore;
use vertical_tabs::model::workspace::{Workspace, WorkspaceSnapshot};

#[derive(Parser)]
#[command(about = "Inspect and rearrange the tabs of a saved workspace")]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Persistent store holding group order and sort strategy.
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Workspace snapshot (JSON) to operate on.
    #[arg(long, value_name = "FILE")]
    workspace: PathBuf,

    /// Write the modified workspace back to its file.
    #[arg(long)]
    write: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the groups in display order.
    Show,
    /// List the available sort strategies.
    Strategies,
    /// Select a sort strategy ("none" clears it) and apply it.
    Sort { name: String },
    /// Close duplicate tabs across the workspace.
    Dedup {
        /// Only treat tabs of the same group as duplicates.
        #[arg(long)]
        same_group: bool,
    },
    /// Move a leaf to the position of another leaf.
    MoveLeaf { source: String, target: String },
    /// Move a leaf to the end of a group.
    MoveToEnd { leaf: String, group: String },
    /// Split a leaf off into a new group.
    Split { leaf: String },
    /// Exchange two groups in the display order.
    SwapGroups { a: String, b: String },
    /// Move a group to the end of the display order.
    GroupToEnd { group: String },
    /// Toggle the pin of a leaf.
    Pin { leaf: String },
    /// Close every unpinned leaf of a leaf's group except that leaf.
    CloseOthers { leaf: String },
}

fn main() {
    let opt = Cli::parse();
    log::init_logging();
    if let Err(e) = run(opt) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// Persistence failures never stop a command; a broken document is replaced
/// on the next write.
fn open_store(path: &Path) -> FileStore {
    FileStore::open(path).unwrap_or_else(|e| {
        error!(error = %e, "starting from an empty store");
        FileStore::empty(path)
    })
}

fn read_workspace(path: &Path) -> anyhow::Result<Workspace> {
    let buf = std::fs::read_to_string(path)
        .with_context(|| format!("reading workspace {}", path.display()))?;
    let snapshot: WorkspaceSnapshot = serde_json::from_str(&buf)
        .with_context(|| format!("parsing workspace {}", path.display()))?;
    Ok(Workspace::from_snapshot(snapshot))
}

fn write_workspace(path: &Path, ws: &Workspace) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(&ws.to_snapshot())?;
    std::fs::write(path, body).with_context(|| format!("writing workspace {}", path.display()))
}

fn run(opt: Cli) -> anyhow::Result<()> {
    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let config = Config::read_or_default(&config_path)?;
    for issue in config.validate() {
        warn!("{}: {issue}", config_path.display());
    }
    let store_path = opt.store.clone().unwrap_or_else(|| config.settings.store_path());
    let store = open_store(&store_path);

    let mut settings = config.settings.clone();
    if let Commands::Dedup { same_group: true } = opt.command {
        settings.dedup_same_group_only = true;
    }
    let mut ws = read_workspace(&opt.workspace)?;
    let mut engine = TabEngine::new(settings, store);
    engine.reconcile(&mut ws);

    match &opt.command {
        Commands::Show => {}
        Commands::Strategies => {
            for name in SortStrategyName::all() {
                let marker = if engine.sort_strategy() == Some(name) { " *" } else { "" };
                println!("{name}{marker}");
            }
            return Ok(());
        }
        Commands::Sort { name } => {
            let strategy = match name.as_str() {
                "none" => None,
                other => match other.parse::<SortStrategyName>() {
                    Ok(s) => Some(s),
                    Err(_) => bail!("unknown sort strategy `{other}`, see `vtabs strategies`"),
                },
            };
            let changed = engine.set_sort_strategy(&mut ws, strategy);
            println!("reordered {changed} group(s)");
        }
        Commands::Dedup { .. } => {
            let closed: usize =
                engine.deduplicate_existing_tabs(&mut ws).iter().map(|o| o.closed.len()).sum();
            println!("closed {closed} duplicate tab(s)");
        }
        Commands::MoveLeaf { source, target } => {
            let moved = engine.move_leaf(&mut ws, &LeafId::new(source), &LeafId::new(target));
            report(moved, "move")?
        }
        Commands::MoveToEnd { leaf, group } => {
            let moved = engine.move_leaf_to_end(&mut ws, &LeafId::new(leaf), &GroupId::new(group));
            report(moved, "move")?
        }
        Commands::Split { leaf } => match engine.move_leaf_to_new_group(&mut ws, &LeafId::new(leaf))
        {
            Some(g) => println!("new group {g}"),
            None => bail!("could not split {leaf}"),
        },
        Commands::SwapGroups { a, b } => {
            report(engine.swap_group(&GroupId::new(a), &GroupId::new(b)), "swap")?
        }
        Commands::GroupToEnd { group } => {
            report(engine.move_group_to_end(&GroupId::new(group)), "move")?
        }
        Commands::Pin { leaf } => match engine.toggle_pin(&mut ws, &LeafId::new(leaf)) {
            Some(pinned) => println!("{leaf} {}", if pinned { "pinned" } else { "unpinned" }),
            None => bail!("no leaf {leaf}"),
        },
        Commands::CloseOthers { leaf } => {
            let closed = engine.close_others(&mut ws, &LeafId::new(leaf));
            println!("closed {} tab(s)", closed.len());
        }
    }

    print!("{}", engine.draw_tree(&ws));
    if opt.write {
        write_workspace(&opt.workspace, &ws)?;
    }
    Ok(())
}

fn report(applied: bool, what: &str) -> anyhow::Result<()> {
    if !applied {
        bail!("nothing to {what}: unknown or stale id");
    }
    Ok(())
}
