use anyhow::Result;
use aos_reconcile::EntityKind;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "aos")]
#[command(about = "Order sync operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run one sync against the configured database and print the response
    Sync {
        #[command(subcommand)]
        cmd: SyncCmd,
    },

    /// Inspect stored entities
    Entity {
        #[command(subcommand)]
        cmd: EntityCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity, entity table presence and row counts
    Status,

    /// Apply SQL migrations
    Migrate,
}

#[derive(Subcommand)]
enum SyncCmd {
    Advertiser {
        #[command(flatten)]
        input: PayloadArgs,
    },
    Order {
        #[command(flatten)]
        input: PayloadArgs,
    },
}

#[derive(clap::Args)]
struct PayloadArgs {
    /// Payload JSON string
    #[arg(long, conflicts_with = "payload_file")]
    payload: Option<String>,

    /// Path to a payload JSON file
    #[arg(long = "payload-file", conflicts_with = "payload")]
    payload_file: Option<String>,
}

#[derive(Subcommand)]
enum EntityCmd {
    /// Print the highest surrogate id of one kind
    MaxId {
        #[arg(long, value_parser = parse_kind)]
        kind: EntityKind,
    },

    /// Print one stored record as JSON
    Show {
        #[arg(long, value_parser = parse_kind)]
        kind: EntityKind,

        #[arg(long)]
        id: i64,
    },
}

fn parse_kind(raw: &str) -> Result<EntityKind, String> {
    EntityKind::parse(raw)
        .ok_or_else(|| format!("unknown kind '{raw}'. expected one of: advertiser | order | lineitem"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = commands::connect_configured().await?;
            match cmd {
                DbCmd::Status => {
                    let s = aos_db::status(&pool).await?;
                    println!("db_ok={} has_entity_tables={}", s.ok, s.has_entity_tables());
                    for t in &s.missing_tables {
                        println!("missing_table={t}");
                    }
                    if s.has_entity_tables() {
                        for kind in EntityKind::ALL {
                            let n = aos_db::count_entities(&pool, kind).await?;
                            println!("rows_{}={}", kind.table(), n);
                        }
                    }
                }
                DbCmd::Migrate => {
                    aos_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
            pool.close().await;
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = aos_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Sync { cmd } => match cmd {
            SyncCmd::Advertiser { input } => {
                commands::sync::run(EntityKind::Advertiser, input.payload, input.payload_file).await?
            }
            SyncCmd::Order { input } => {
                commands::sync::run(EntityKind::Order, input.payload, input.payload_file).await?
            }
        },

        Commands::Entity { cmd } => match cmd {
            EntityCmd::MaxId { kind } => commands::entity::max_id(kind).await?,
            EntityCmd::Show { kind, id } => commands::entity::show(kind, id).await?,
        },
    }

    Ok(())
}
