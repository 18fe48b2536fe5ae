use anyhow::{anyhow, bail};
use clap::ArgMatches;
use commands::command_argument_builder;
use matchgraph_core::checkpoint::checkpoint_status;
use matchgraph_core::crawl::{CrawlOptions, execute_crawl, parse_riot_id};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("matchgraph=info,matchgraph_core=info,matchgraph_crawler=info")),
        )
        .init();

    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => {
            if let Err(e) = handle_crawl(primary_command, quiet).await {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(("status", primary_command)) => handle_status(primary_command),
        None => {
            let _ = command_argument_builder().print_help();
        }
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

async fn handle_crawl(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let (game_name, tag_line) = match args.get_one::<String>("riot-id") {
        Some(riot_id) => parse_riot_id(riot_id)
            .ok_or_else(|| anyhow!("Riot ID must look like Name#Tag, got {:?}", riot_id))?,
        None => match (
            std::env::var("SEED_GAME_NAME").ok(),
            std::env::var("SEED_TAG_LINE").ok(),
        ) {
            (Some(name), Some(tag)) => (name, tag),
            _ => bail!("Provide --riot-id or set SEED_GAME_NAME and SEED_TAG_LINE"),
        },
    };

    let api_key = match args.get_one::<String>("api-key") {
        Some(key) => key.clone(),
        None => std::env::var("RIOT_API_KEY")
            .map_err(|_| anyhow!("Provide --api-key or set RIOT_API_KEY"))?,
    };

    let data_dir = expand_path(args.get_one::<String>("data-dir").unwrap());

    // Ctrl-C flips the shutdown flag; the engine finishes the node it is
    // on, flushes the pending batch and both sets, then returns.
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, flushing checkpoint before exit");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let mut options = CrawlOptions::new(game_name, tag_line, api_key, data_dir);
    options.region = args.get_one::<String>("region").unwrap().clone();
    options.queue = *args.get_one::<u32>("queue").unwrap();
    options.page_size = *args.get_one::<u32>("page-size").unwrap();
    options.concurrency = *args.get_one::<usize>("concurrency").unwrap();
    options.max_depth = *args.get_one::<usize>("max-depth").unwrap();
    options.save_interval = *args.get_one::<usize>("save-interval").unwrap();
    options.file_interval = *args.get_one::<usize>("file-interval").unwrap();
    options.show_progress = !quiet;

    let summary = execute_crawl(options, shutdown).await?;

    if !quiet {
        println!();
        println!("Players expanded:  {}", summary.nodes_expanded);
        println!(
            "Matches collected: {} this run ({} in total)",
            summary.records_collected, summary.total_collected
        );
        println!("Batches flushed:   {}", summary.batches_flushed);
        if summary.nodes_skipped > 0 || summary.records_skipped > 0 {
            println!(
                "Skipped:           {} matches, {} players",
                summary.records_skipped, summary.nodes_skipped
            );
        }
        if summary.interrupted {
            println!("Run was interrupted; checkpoint saved, rerun to resume.");
        }
    }

    Ok(())
}

fn handle_status(args: &ArgMatches) {
    let data_dir = expand_path(args.get_one::<String>("data-dir").unwrap());
    match checkpoint_status(&data_dir) {
        Ok(status) => {
            println!("Data directory:    {}", data_dir.display());
            println!("Visited players:   {}", status.visited_players);
            println!("Collected matches: {}", status.collected_matches);
            println!(
                "Active shard:      matches_{:04}.json ({} records)",
                status.shard_index, status.shard_count
            );
        }
        Err(e) => {
            eprintln!("Failed to read checkpoint at {}: {}", data_dir.display(), e);
            std::process::exit(1);
        }
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}
