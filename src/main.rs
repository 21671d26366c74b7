use std::{env, path::Path, sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use dotenv::dotenv;
use eyre::eyre;
use futures_util::StreamExt;
use matquery::{
    config::Config,
    query::{
        self, Queried, QueryOptions,
        protocols::{ProtocolRegistry, Response},
        targets::Target,
    },
    terminal_colors::*,
    tracing::init_tracing,
};
use serde::Serialize;
use tracing::{info, warn};

const USAGE: &str = "usage: matquery [config.toml] | matquery query <host[:port]> [protocol]";

/// One line of output per target.
#[derive(Serialize)]
struct Report<'a> {
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    queried_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<&'a Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    let args = env::args().collect::<Box<[String]>>();
    let config = if args.get(1).map(String::as_str) == Some("query") {
        let target = args.get(2).ok_or_else(|| eyre!(USAGE))?;
        Config::single(target.clone(), args.get(3).cloned())
    } else {
        // first command line argument is the location of the config file
        let config_file = args.get(1).cloned().unwrap_or("config.toml".to_string());
        if config_file == "-h" || config_file == "--help" {
            eprintln!("{USAGE}");
            return Ok(());
        }
        let config_file_path = Path::new(&config_file).canonicalize()?;
        eprintln!("parsing config at {}", config_file_path.display());
        Config::load(&config_file_path)?
    };

    init_tracing(&config);
    info!("Logging initialized");

    let targets = config.parsed_targets()?;
    let registry = Arc::new(ProtocolRegistry::new());
    let options = Arc::new(QueryOptions {
        protocol: config.protocol.clone(),
        timeout: config.timeout(),
    });

    // fail early on a typo instead of once per target
    if let Some(name) = &options.protocol {
        query::select_protocol(&registry, Some(name.as_str()), None)?;
    }

    let target_count = targets.len();
    let start_time = Instant::now();

    // every query gets its own socket and session id on a blocking thread
    let results = futures_util::stream::iter(targets)
        .map(|target| {
            let registry = registry.clone();
            let options = options.clone();
            async move {
                let queried_at = Utc::now();
                let task_target = target.clone();
                let result = tokio::task::spawn_blocking(move || {
                    query::query_target(&registry, &task_target, &options)
                })
                .await;
                let result = match result {
                    Ok(result) => result,
                    Err(err) => Err(eyre::Report::new(err)),
                };
                (target, queried_at, result)
            }
        })
        .buffer_unordered(config.concurrency());
    futures_util::pin_mut!(results);

    let mut succeeded = 0;
    let mut failed = 0;
    while let Some((target, queried_at, result)) = results.next().await {
        match &result {
            Ok(queried) => {
                succeeded += 1;
                print_summary(&target, queried);
            }
            Err(err) => {
                failed += 1;
                warn!("query to {target} failed: {err:#}");
                eprintln!("{RED}failed{RESET} {BOLD}{target}{RESET}: {err:#}");
            }
        }

        let report = build_report(&target, queried_at, &result);
        let json = if config.output.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        println!("{json}");
    }

    let elapsed = start_time.elapsed();
    eprintln!(
        "queried {BOLD}{target_count}{RESET} targets in {elapsed:.2?} ({GREEN}{succeeded} ok{RESET}, {RED}{failed} failed{RESET})"
    );
    info!("Queried {target_count} targets in {elapsed:?}, {succeeded} ok, {failed} failed");

    Ok(())
}

fn build_report<'a>(
    target: &Target,
    queried_at: DateTime<Utc>,
    result: &'a eyre::Result<Queried>,
) -> Report<'a> {
    let (address, response, error) = match result {
        Ok(queried) => (
            Some(queried.address.to_string()),
            Some(&queried.response),
            None,
        ),
        Err(err) => (None, None, Some(format!("{err:#}"))),
    };
    Report {
        target: target.to_string(),
        address,
        queried_at: queried_at.to_rfc3339(),
        response,
        error,
    }
}

fn print_summary(target: &Target, queried: &Queried) {
    let address = queried.address;
    match &queried.response {
        Response::MinecraftUdp(stat) => {
            let motd = stat.plain_hostname();
            let (num_players, max_players) = (stat.num_players, stat.max_players);
            let version = &stat.version;
            eprintln!(
                "{GREEN}ok{RESET} {BOLD}{target}{RESET} {GRAY}({address}){RESET} {motd} {YELLOW}{num_players}/{max_players}{RESET} players, version {version}"
            );
            if !stat.players.is_empty() {
                eprintln!("   {BLUE}{}{RESET}", stat.players.join(", "));
            }
        }
    }
}
