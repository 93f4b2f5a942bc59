use std::env;
use std::path::PathBuf;
use clap::{Parser, Subcommand};
use docvault::db::{root::DEFAULT_ROOT_NAME, Collection, Root};
use docvault::{Operation, Response};
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory (env: DOCVAULT_ROOT, default: ./docvault_data)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Hex-encoded 32-byte key for encrypted collections (env: DOCVAULT_KEY)
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    Info,
    CreateDb { db: String },
    DropDb { db: String },
    Insert { db: String, collection: String, document: String },
    Find {
        db: String,
        collection: String,
        #[arg(default_value = "{}")]
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        count: bool,
    },
    Delete {
        db: String,
        collection: String,
        query: String,
        #[arg(long)]
        sort: Option<String>,
    },
    Aggregate { db: String, collection: String, pipeline: String },
}

fn print<T: Serialize>(response: &Response<T>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

fn parse_json(arg: &str) -> anyhow::Result<Value> {
    serde_json::from_str(arg).map_err(|e| anyhow::anyhow!("invalid JSON argument {:?}: {}", arg, e))
}

async fn open_collection(root: &Root, db: &str, name: &str, key: Option<&[u8]>) -> docvault::Result<Collection> {
    root.database(db).await?.collection(name, key).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let root_dir = cli
        .root
        .or_else(|| env::var("DOCVAULT_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_NAME));
    let name = root_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid root directory {}", root_dir.display()))?
        .to_string();
    let parent = match root_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let key = match cli.key.or_else(|| env::var("DOCVAULT_KEY").ok()) {
        Some(hex_key) => Some(hex::decode(hex_key.trim())?),
        None => None,
    };
    let key = key.as_deref();

    let root = Root::open(&parent, &name).await?;

    match cli.command {
        Commands::Info => print(&Response::from(root.info().await))?,
        Commands::CreateDb { db } => {
            let res = root.create_database(&db).await.map(|d| d.path().to_path_buf());
            print(&Response::from(res))?
        }
        Commands::DropDb { db } => print(&Response::from(root.delete_database(&db).await))?,
        Commands::Insert { db, collection, document } => {
            let document = parse_json(&document)?;
            let collection = root.create_database(&db).await?.create_collection(&collection, key).await?;
            print(&collection.insert(document)?.respond().await)?
        }
        Commands::Find { db, collection, query, limit, skip, sort, project, count } => {
            let collection = open_collection(&root, &db, &collection, key).await?;
            let mut reader = collection.find(parse_json(&query)?)?.limit(limit).skip(skip).set_count(count);
            if let Some(sort) = sort {
                reader = reader.sort(parse_json(&sort)?)?;
            }
            if let Some(project) = project {
                reader = reader.set_project(parse_json(&project)?)?;
            }
            print(&reader.respond().await)?
        }
        Commands::Delete { db, collection, query, sort } => {
            let collection = open_collection(&root, &db, &collection, key).await?;
            let mut delete = collection.delete_one(parse_json(&query)?)?;
            if let Some(sort) = sort {
                delete = delete.sort(parse_json(&sort)?)?;
            }
            print(&delete.respond().await)?
        }
        Commands::Aggregate { db, collection, pipeline } => {
            let collection = open_collection(&root, &db, &collection, key).await?;
            print(&collection.aggregate(parse_json(&pipeline)?)?.respond().await)?
        }
    }

    Ok(())
}
