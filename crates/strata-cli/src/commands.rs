use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use strata_add::{AddOptions, AddSession, Adder, InputNode};
use strata_gc::{GarbageCollector, GcError, GcEvent, GcStats};
use strata_node::config::CONFIG_FILE;
use strata_node::{Node, NodeConfig};
use strata_pin::PinMode;
use strata_types::Key;
use tokio_util::sync::CancellationToken;

use crate::cli::*;
use crate::report::{render_removed, AddReporter};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let repo = cli.repo;
    let format = cli.format;
    match cli.command {
        Command::Init(args) => cmd_init(repo, args).await,
        Command::Add(args) => cmd_add(&repo, format, args).await,
        Command::Cat(args) => cmd_cat(&repo, args).await,
        Command::Ls(args) => cmd_ls(&repo, format, args).await,
        Command::Pin(args) => cmd_pin(&repo, format, args).await,
        Command::Gc(args) => cmd_gc(&repo, format, args).await,
    }
}

async fn open_node(repo: &Path) -> anyhow::Result<Node> {
    Node::open_repo(repo)
        .await
        .with_context(|| format!("cannot open repository at {}", repo.display()))
}

fn parse_key(s: &str) -> anyhow::Result<Key> {
    s.parse().with_context(|| format!("invalid key {s:?}"))
}

async fn cmd_init(repo: PathBuf, args: InitArgs) -> anyhow::Result<()> {
    let mut config = NodeConfig::with_repo(&repo);
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    let node = Node::init(config).await?;
    println!(
        "{} Initialized repository in {}",
        "✓".green().bold(),
        repo.display().to_string().bold()
    );
    println!("  Chunk size: {}", node.config().chunk_size);
    Ok(())
}

async fn cmd_add(repo: &Path, format: OutputFormat, args: AddArgs) -> anyhow::Result<()> {
    // Hash-only adds work without a repository.
    let node = if args.only_hash && !repo.join(CONFIG_FILE).exists() {
        Node::in_memory(NodeConfig::default())
    } else {
        open_node(repo).await?
    };

    let inputs = args
        .paths
        .iter()
        .map(|path| {
            if path.as_os_str() == "-" {
                Ok(InputNode::reader("", tokio::io::stdin()))
            } else {
                InputNode::from_path(path).with_context(|| format!("cannot read {}", path.display()))
            }
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let options = AddOptions {
        recursive: args.recursive,
        trickle: args.trickle,
        hidden: args.hidden,
        only_hash: args.only_hash,
        wrap_with_directory: args.wrap_with_directory,
        ignore: args.ignore,
        quiet: args.quiet,
        progress: args.progress,
        ..AddOptions::default()
    };
    let AddSession { events, handle } = Adder::new(Arc::new(node), options)?.spawn(inputs);
    let reporter = AddReporter::new(format, args.quiet, args.progress);
    reporter.run(events).await?;
    handle.await??;
    Ok(())
}

async fn cmd_cat(repo: &Path, args: CatArgs) -> anyhow::Result<()> {
    let node = open_node(repo).await?;
    let key = parse_key(&args.key)?;
    node.dag().write_to(&key, &mut tokio::io::stdout()).await?;
    Ok(())
}

async fn cmd_ls(repo: &Path, format: OutputFormat, args: LsArgs) -> anyhow::Result<()> {
    let node = open_node(repo).await?;
    let key = parse_key(&args.key)?;
    let links = node.dag().list(&key).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&links)?),
        OutputFormat::Text => {
            for link in &links {
                println!("{} {:>10} {}", link.key.to_hex().yellow(), link.size, link.name);
            }
        }
    }
    Ok(())
}

async fn cmd_pin(repo: &Path, format: OutputFormat, args: PinArgs) -> anyhow::Result<()> {
    let node = open_node(repo).await?;
    let pinner = node.pinner();
    match args.action {
        PinAction::Add { key, direct } => {
            let key = parse_key(&key)?;
            let mode = if direct { PinMode::Direct } else { PinMode::Recursive };
            let _data_guard = node.data().add_lock().await;
            let _state_guard = node.state().add_lock().await;
            pinner.pin(key, mode).await?;
            pinner.flush().await?;
            println!("{} pinned {} {}", "✓".green(), key.to_hex().yellow(), mode);
        }
        PinAction::Rm { key, recursive } => {
            let key = parse_key(&key)?;
            let _state_guard = node.state().add_lock().await;
            pinner.unpin(&key, recursive)?;
            pinner.flush().await?;
            println!("{} unpinned {}", "✓".green(), key.to_hex().yellow());
        }
        PinAction::Ls { kind } => {
            let mut pins = Vec::new();
            if kind != PinFilter::Direct {
                pins.extend(pinner.recursive_keys().into_iter().map(|k| (k, PinMode::Recursive)));
            }
            if kind != PinFilter::Recursive {
                pins.extend(pinner.direct_keys().into_iter().map(|k| (k, PinMode::Direct)));
            }
            for (key, mode) in pins {
                match format {
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::json!({ "key": key.to_hex(), "type": mode.to_string() })
                    ),
                    OutputFormat::Text => println!("{} {}", key.to_hex().yellow(), mode),
                }
            }
        }
    }
    Ok(())
}

async fn cmd_gc(repo: &Path, format: OutputFormat, args: GcArgs) -> anyhow::Result<()> {
    let node = Arc::new(open_node(repo).await?);
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut events = GarbageCollector::new(node).collect_async(cancel.clone());
    let mut stats = GcStats::default();
    let mut failure = None;
    while let Some(event) = events.recv().await {
        match event {
            GcEvent::Removed(removed) => {
                stats.record(&removed);
                if !args.quiet {
                    println!("{}", render_removed(format, &removed)?);
                }
            }
            GcEvent::Error(e) => failure = Some(e),
        }
    }
    interrupt.abort();

    if let Some(e) = failure {
        return Err(e.into());
    }
    if cancel.is_cancelled() {
        return Err(GcError::Cancelled.into());
    }
    if !args.quiet && format == OutputFormat::Text {
        println!(
            "{} GC: {} blocks removed ({} data, {} state)",
            "✓".green(),
            stats.total(),
            stats.data_removed,
            stats.state_removed
        );
    }
    Ok(())
}
