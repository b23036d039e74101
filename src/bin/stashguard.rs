//! stashguard: operator CLI for the block rule database and the record cache.

use clap::{Parser, Subcommand};
use stashguard::codec::{self, FieldValue, RawRecord};
use stashguard::{BlockRule, CacheStore, Category, Config, RuleStore};
use std::fs;
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "stashguard")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Manage block rules and inspect the record cache", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, env = "STASHGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage block rules
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Evaluate the current rules against a subject and texts
    Check {
        /// Subject (author) id
        #[arg(short, long)]
        user: i64,

        /// Texts scanned by keyword rules
        texts: Vec<String>,
    },

    /// Inspect and maintain the record cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand)]
enum RulesCommand {
    /// List all rules
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Add a keyword rule
    AddKeyword {
        text: String,

        /// Allow instead of block
        #[arg(long)]
        whitelist: bool,

        /// Treat the text as a regular expression
        #[arg(long)]
        regex: bool,
    },

    /// Add or update a user rule
    AddUser {
        uid: i64,

        /// Display name of the user
        #[arg(long)]
        name: Option<String>,

        /// Allow instead of block
        #[arg(long)]
        whitelist: bool,
    },

    /// Remove a rule by id
    Remove { id: i64 },

    /// Remove all rules
    Clear,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Decode a cache file without modifying it
    Inspect { path: PathBuf },

    /// Delete one namespace, or the whole cache when none is given
    Purge { namespace: Option<String> },

    /// Print the total size of the cache
    Usage,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult {
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Rules { command } => run_rules(command, &config),
        Commands::Check { user, texts } => check(&config, user, &texts),
        Commands::Cache { command } => run_cache(command, &config),
    }
}

fn open_rules(config: &Config) -> Result<RuleStore, stashguard::Error> {
    let store = RuleStore::from_config(&config.rules)?;
    store.initialize()?;
    Ok(store)
}

fn category(whitelist: bool) -> Category {
    if whitelist {
        Category::Whitelist
    } else {
        Category::Blacklist
    }
}

fn run_rules(command: RulesCommand, config: &Config) -> CliResult {
    let store = open_rules(config)?;

    match command {
        RulesCommand::List { json } => {
            let rules = store.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
            } else if rules.is_empty() {
                println!("No rules");
            } else {
                for rule in &rules {
                    println!("{}", rule);
                }
            }
        }
        RulesCommand::AddKeyword {
            text,
            whitelist,
            regex,
        } => {
            let rule = if regex {
                BlockRule::pattern(&text, category(whitelist))?
            } else {
                BlockRule::keyword(text, category(whitelist))?
            };
            let rule = store.upsert(rule)?;
            println!("Saved {}", rule);
        }
        RulesCommand::AddUser {
            uid,
            name,
            whitelist,
        } => {
            let mut rule = BlockRule::user(uid, category(whitelist));
            rule.label = name;
            let rule = store.upsert(rule)?;
            println!("Saved {}", rule);
        }
        RulesCommand::Remove { id } => {
            if store.snapshot().get(id).is_none() {
                return Err(stashguard::Error::RuleNotFound(id).into());
            }
            store.remove(id)?;
            println!("Removed rule #{}", id);
        }
        RulesCommand::Clear => {
            let count = store.snapshot().len();
            store.clear()?;
            println!("Removed {} rules", count);
        }
    }
    Ok(())
}

fn check(config: &Config, user: i64, texts: &[String]) -> CliResult {
    let store = open_rules(config)?;
    let texts: Vec<&str> = texts.iter().map(String::as_str).collect();

    if store.should_block(user, &texts) {
        println!("blocked");
    } else {
        println!("visible");
    }
    Ok(())
}

fn run_cache(command: CacheCommand, config: &Config) -> CliResult {
    let cache = CacheStore::from_config(&config.cache);

    match command {
        CacheCommand::Inspect { path } => inspect(&path)?,
        CacheCommand::Purge { namespace: Some(namespace) } => {
            let removed = cache.purge_namespace(&namespace)?;
            println!("Removed {} entries from {}", removed, namespace);
        }
        CacheCommand::Purge { namespace: None } => {
            cache.clear()?;
            println!("Cleared {}", cache.root().display());
        }
        CacheCommand::Usage => {
            let bytes = cache.disk_usage()?;
            println!("{} bytes in {}", bytes, cache.root().display());
        }
    }
    Ok(())
}

/// Print a cache file as a sequence if it is framed as one, else as a
/// single record. Reads the bytes directly so a corrupt file is not deleted.
fn inspect(path: &Path) -> CliResult {
    let bytes = fs::read(path)?;
    let modified = fs::metadata(path)?.modified()?;
    println!("{} ({} bytes, modified {:?})", path.display(), bytes.len(), modified);

    if let Ok(records) = codec::decode_sequence::<RawRecord>(&bytes) {
        if !records.is_empty() {
            println!("sequence of {} records", records.len());
            for (i, record) in records.iter().enumerate() {
                println!("[{}]", i);
                print_record(record, "  ");
            }
            return Ok(());
        }
    }

    let record: RawRecord = codec::decode(&bytes)?;
    print_record(&record, "");
    Ok(())
}

fn print_record(record: &RawRecord, indent: &str) {
    for (field, value) in &record.fields {
        match value {
            FieldValue::Varint(v) => println!("{}{}: varint {}", indent, field, v),
            FieldValue::Fixed64(v) => println!("{}{}: fixed64 {:#018x}", indent, field, v),
            FieldValue::Fixed32(v) => println!("{}{}: fixed32 {:#010x}", indent, field, v),
            FieldValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => println!("{}{}: string {:?}", indent, field, text),
                Err(_) => println!("{}{}: bytes {}", indent, field, hex::encode(bytes)),
            },
        }
    }
}
