//! mnemo CLI — every subcommand is one full unit of work against the
//! store; there is no daemon.

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mnemo::embed::{EmbedClient, Embedder};
use mnemo::error::MnemoError;
use mnemo::ops::{self, RememberInput, RememberOutcome};
use mnemo::project;
use mnemo::retrieve;
use mnemo::store::{ListFilter, Memory, MemoryStore, SimilarityCandidate, TagFilter, KINDS, PROJECT_TAG_PREFIX};
use mnemo::util;
use mnemo::SharedStore;

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Project-scoped persistent memory for agents")]
struct Cli {
    /// SQLite database path
    #[arg(long, default_value = "mnemo.db", env = "MNEMO_DB", global = true)]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the full-text index
    Init,
    /// Store a memory (types: fact, learned, preference, context)
    Remember {
        #[arg(value_name = "TYPE")]
        kind: String,
        /// Memory text; multiple words are joined with spaces
        #[arg(required = true)]
        content: Vec<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Save even if a duplicate is detected
        #[arg(long)]
        force: bool,
    },
    /// Full-text search over memory content
    Recall {
        query: String,
        #[arg(default_value_t = 10)]
        limit: usize,
    },
    /// Semantic search
    Similar {
        query: String,
        /// Restrict results to the current project
        #[arg(long)]
        here: bool,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Show memories for the current project
    Context {
        #[arg(default_value_t = 10)]
        limit: usize,
    },
    /// List memories with optional filters
    List {
        /// Filter by type
        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<String>,
        /// Filter by tag; a trailing '*' matches any tag with that prefix
        #[arg(long)]
        tag: Option<String>,
        /// Filter by project name
        #[arg(long)]
        project: Option<String>,
        /// Shorthand for --project <current>
        #[arg(long)]
        here: bool,
    },
    /// Show one memory in full
    Get { id: String },
    /// Replace a memory's content
    Update {
        id: String,
        #[arg(required = true)]
        content: Vec<String>,
    },
    /// Add a tag to a memory
    Tag { id: String, tag: String },
    /// Find memories similar to an existing one
    Related {
        id: String,
        #[arg(default_value_t = 5)]
        limit: usize,
    },
    /// Delete a memory
    Forget { id: String },
    /// Merge the second memory into the first
    Merge {
        id1: String,
        id2: String,
        /// Optional replacement content for the merged memory
        content: Vec<String>,
    },
    /// Find stale memories (dry run unless --delete)
    Prune {
        /// Age threshold in days
        #[arg(long, default_value_t = 30)]
        days: i64,
        /// Actually delete the candidates
        #[arg(long)]
        delete: bool,
    },
    /// Recompute every memory's embedding from scratch
    Reindex,
    /// Memory counts by type
    Stats,
    /// Projects with memory counts
    Projects,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), MnemoError> {
    let store: SharedStore = Arc::new(MemoryStore::open(&cli.db)?);
    let embed = EmbedClient::from_env();

    match cli.command {
        Command::Init => {
            let n = store.rebuild_index()?;
            println!("Index rebuilt ({n} memories).");
        }

        Command::Remember { kind, content, tags, force } => {
            let content = content.join(" ");
            let project = project::current_project();
            let input = RememberInput { kind, content, tags, project, force };
            match ops::remember(&store, &embed, input).await? {
                RememberOutcome::Blocked(report) => {
                    for c in &report.duplicates {
                        println!(
                            "Duplicate: [{}] ({:.0}%) {}",
                            c.memory.id,
                            c.score * 100.0,
                            c.memory.content
                        );
                    }
                    for c in &report.similar {
                        print_similar(c);
                    }
                    for m in &report.text_matches {
                        println!("Duplicate: [{}] (text match) {}", m.id, m.content);
                    }
                    println!();
                    println!(
                        "Skipping - use --force to save anyway, or 'mnemo update <id>' to edit the existing memory."
                    );
                }
                RememberOutcome::Created { memory, similar } => {
                    for c in &similar {
                        print_similar(c);
                    }
                    println!("Remembered [{}]: {}", memory.id, memory.content);
                }
            }
        }

        Command::Recall { query, limit } => {
            let memos = store.text_search(&query, limit)?;
            println!("{} results found\n", memos.len());
            for m in memos {
                println!("[{}] ({}) {}", m.id, m.kind, m.content);
            }
        }

        Command::Similar { query, here, limit } => {
            let project = here.then(project::current_project);
            match &project {
                Some(p) => println!("Searching for: {query} (project: {p})"),
                None => println!("Searching for: {query}"),
            }

            let vector = embed.embed_query(&query).await?;
            let results = retrieve::similar(&store, &vector, limit, project.as_deref())?;

            println!();
            if results.is_empty() {
                println!("No matching memories found.");
            }
            for c in results {
                println!(
                    "[{}] ({:.0}%) ({}) {}",
                    c.memory.id,
                    c.score * 100.0,
                    c.memory.kind,
                    c.memory.content
                );
            }
        }

        Command::Context { limit } => {
            let project = project::current_project();
            println!("Context for project: {project}");
            println!("================================\n");

            let memos = store.context(&project, limit)?;
            if memos.is_empty() {
                println!("No memories found for this project.\n");
                println!("Start remembering with:");
                println!("  mnemo remember fact \"something important\"");
            }
            for m in memos {
                println!("[{}] ({}) {}", m.id, m.kind, m.content);
            }
        }

        Command::List { kind, tag, project, here } => {
            let project = if here { Some(project::current_project()) } else { project };
            // A project filter without an explicit tag pre-filters on the
            // project prefix; exact project membership is checked per row
            // below, where the display name is extracted anyway.
            let tag = match (&tag, &project) {
                (Some(t), _) => Some(TagFilter::parse(t)),
                (None, Some(_)) => Some(TagFilter::Prefix(PROJECT_TAG_PREFIX.into())),
                (None, None) => None,
            };
            let filter = ListFilter { kind, tag };
            let mut memos = store.list(&filter, 100)?;
            if let Some(ref p) = project {
                memos.retain(|m| m.project() == Some(p.as_str()));
            }

            println!("{} memories\n", memos.len());
            for m in &memos {
                println!(
                    "[{}] ({}) [{}] {}",
                    m.id,
                    m.kind,
                    m.project().unwrap_or("?"),
                    m.content
                );
            }
        }

        Command::Get { id } => {
            let m = store.fetch(&id)?;
            println!("ID:       {}", m.id);
            println!("Type:     {}", m.kind);
            println!("Content:  {}", m.content);
            println!("Tags:     {}", m.tags.join(", "));
            println!("Created:  {}", m.created);
            println!("Accessed: {}", m.accessed);
            println!("Access#:  {}", m.access_count);
        }

        Command::Update { id, content } => {
            let content = content.join(" ");
            ops::update(&store, &embed, &id, &content)?;
            println!("Updated [{id}]: {content}");
        }

        Command::Tag { id, tag } => {
            store.add_tag(&id, &tag)?;
            println!("Tagged [{id}] with: {tag}");
        }

        Command::Related { id, limit } => {
            let results = retrieve::related(&store, &id, limit)?;
            println!("Related to [{id}]:\n");
            for c in results {
                println!(
                    "[{}] ({:.0}%) ({}) {}",
                    c.memory.id,
                    c.score * 100.0,
                    c.memory.kind,
                    c.memory.content
                );
            }
        }

        Command::Forget { id } => {
            store.delete(&id)?;
            println!("Forgot: {id}");
        }

        Command::Merge { id1, id2, content } => {
            let override_content =
                if content.is_empty() { None } else { Some(content.join(" ")) };
            let merged = ops::merge(&store, &embed, &id1, &id2, override_content).await?;
            println!("Merged [{id1}] + [{id2}] -> [{id1}]: {}", merged.content);
        }

        Command::Prune { days, delete } => {
            let report = ops::prune(&store, days, delete)?;
            if report.candidates.is_empty() {
                println!("No stale memories found (access_count=0, older than {days} days).");
                return Ok(());
            }

            if delete {
                for m in &report.candidates {
                    println!("Pruned [{}]: {}", m.id, m.content);
                }
                println!("\nPruned {} memories.", report.deleted);
            } else {
                println!("Stale memories (access_count=0, older than {days} days):\n");
                for m in &report.candidates {
                    println!(
                        "[{}] ({}) [{}] ({} accesses, {} old) {}",
                        m.id,
                        m.kind,
                        m.project().unwrap_or("?"),
                        m.access_count,
                        age_of(m),
                        m.content
                    );
                }
                println!("\n{} candidates. Use --delete to remove them.", report.candidates.len());
            }
        }

        Command::Reindex => {
            println!("Reindexing all memories...");
            let n = ops::reindex(&store, &embed).await?;
            println!("Indexed {n} memories.");
        }

        Command::Stats => {
            println!("Memory Statistics");
            println!("=================");
            let s = store.stats()?;
            for (kind, n) in KINDS.iter().zip([s.fact, s.learned, s.preference, s.context]) {
                println!("{:<12} {}", format!("{kind}:"), n);
            }
            println!("\nTotal: {}", s.total);
        }

        Command::Projects => {
            let projects = store.projects()?;
            if projects.is_empty() {
                println!("No projects with memories yet.");
                return Ok(());
            }
            println!("Projects");
            println!("========");
            for (name, count) in projects {
                println!("{name:<20} {count} memories");
            }
        }
    }

    Ok(())
}

fn print_similar(c: &SimilarityCandidate) {
    println!(
        "Similar:   [{}] ({:.0}%) {}",
        c.memory.id,
        c.score * 100.0,
        c.memory.content
    );
}

fn age_of(m: &Memory) -> String {
    match util::parse_ts(&m.created) {
        Ok(created) => format!("{}d", (Utc::now() - created).num_days()),
        Err(_) => "?".into(),
    }
}
