use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("matchgraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("matchgraph")
        .arg(arg!(-q --"quiet" "Suppress the progress spinner and the run summary").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl the match graph outward from a seed player, resuming from any \
                existing checkpoint in the data directory.",
                )
                .arg(
                    arg!(-s --"riot-id" <RIOT_ID>)
                        .required(false)
                        .help("Seed player as Name#Tag (falls back to $SEED_GAME_NAME and $SEED_TAG_LINE)"),
                )
                .arg(
                    arg!(-k --"api-key" <KEY>)
                        .required(false)
                        .help("API credential (falls back to $RIOT_API_KEY)"),
                )
                .arg(
                    arg!(-r --"region" <REGION>)
                        .required(false)
                        .default_value("asia")
                        .help("Regional routing value for the API host"),
                )
                .arg(
                    arg!(-d --"data-dir" <PATH>)
                        .required(false)
                        .default_value("./data")
                        .help("Directory holding checkpoint sets and match shards"),
                )
                .arg(
                    arg!(--"queue" <ID>)
                        .required(false)
                        .default_value("450")
                        .value_parser(clap::value_parser!(u32))
                        .help("Queue id the match lists are filtered to"),
                )
                .arg(
                    arg!(--"max-depth" <N>)
                        .required(false)
                        .default_value("4")
                        .value_parser(clap::value_parser!(usize))
                        .help("Maximum hop distance from the seed player"),
                )
                .arg(
                    arg!(--"concurrency" <N>)
                        .required(false)
                        .default_value("10")
                        .value_parser(clap::value_parser!(usize))
                        .help("Maximum in-flight API requests"),
                )
                .arg(
                    arg!(--"page-size" <N>)
                        .required(false)
                        .default_value("100")
                        .value_parser(clap::value_parser!(u32))
                        .help("Match ids requested per player (single page)"),
                )
                .arg(
                    arg!(--"save-interval" <N>)
                        .required(false)
                        .default_value("100")
                        .value_parser(clap::value_parser!(usize))
                        .help("Records buffered in memory before a flush"),
                )
                .arg(
                    arg!(--"file-interval" <N>)
                        .required(false)
                        .default_value("1000")
                        .value_parser(clap::value_parser!(usize))
                        .help("Records per output file before rolling to the next index"),
                ),
        )
        .subcommand(
            command!("status")
                .about("Report checkpoint set sizes and the active shard for a data directory")
                .arg(
                    arg!(-d --"data-dir" <PATH>)
                        .required(false)
                        .default_value("./data")
                        .help("Directory holding checkpoint sets and match shards"),
                ),
        )
}
