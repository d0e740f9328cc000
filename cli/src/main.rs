use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::json;

use db::analysis::{self, Summary};
use db::catalog;
use db::config::DEFAULT_PATH;
use db::models::{Age, EntryForm, Reference, TimelineEntry};
use db::reconcile::DELETE_MARKER;
use db::{
    run_migrations, ChildOutcome, Config, Dashboard, DbError, DeleteOutcome, EditSession,
    Provision, Provisioner, QueryCache, SaveOutcome, Table,
};

mod render;

#[derive(Parser)]
#[command(name = "scripture-study")]
#[command(about = "Timeline, query explorer and editor for a scripture study database")]
#[command(version)]
struct Cli {
    /// Secrets file with the SSH and database settings
    #[arg(long, short, env = "SCRIPTURE_CONFIG", default_value = DEFAULT_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or upgrade the database schema
    Migrate,

    /// List timeline events, oldest first
    Timeline {
        /// Only show events of these ages (BC, AD)
        #[arg(long = "age")]
        ages: Vec<String>,
        #[arg(long)]
        json: bool,
    },

    /// Events per year and per century
    Chart {
        #[arg(long)]
        json: bool,
    },

    /// Headline figures and the doctrine distribution
    Summary {
        /// Only count events of these ages (BC, AD)
        #[arg(long = "age")]
        ages: Vec<String>,
        #[arg(long)]
        json: bool,
    },

    /// List scripture entries
    Scriptures {
        #[arg(long)]
        json: bool,
    },

    /// List the available queries
    Queries,

    /// Run a query by name
    Query {
        /// Query name, as listed by `queries`
        name: String,
        /// Maximum number of rows, 0 for all
        #[arg(long, default_value_t = 100)]
        limit: u32,
        /// Print the SQL before the result
        #[arg(long)]
        show_sql: bool,
        #[arg(long)]
        json: bool,
    },

    /// Add a scripture entry
    Add(AddArgs),

    /// Change a scripture entry
    Edit {
        /// Entry ID
        id: i32,
        #[arg(long)]
        volume: Option<String>,
        #[arg(long)]
        book: Option<String>,
        #[arg(long)]
        chapter: Option<String>,
        #[arg(long)]
        verse: Option<String>,
    },

    /// Delete scripture entries, with their years and doctrines
    Delete {
        /// Entry IDs
        #[arg(required = true)]
        ids: Vec<i32>,
    },
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    volume: String,
    /// Reference such as "Alma 32:21-23", instead of --book/--chapter/--verse
    #[arg(long, conflicts_with_all = ["book", "chapter", "verse"])]
    reference: Option<String>,
    #[arg(long, required_unless_present = "reference")]
    book: Option<String>,
    #[arg(long)]
    chapter: Option<String>,
    #[arg(long)]
    verse: Option<String>,
    /// Year of the event, e.g. 4000
    #[arg(long, requires = "age")]
    year: Option<String>,
    /// BC or AD
    #[arg(long, requires = "year")]
    age: Option<String>,
    #[arg(long)]
    doctrine: Option<String>,
}

impl AddArgs {
    fn form(&self) -> Result<EntryForm, DbError> {
        let form = match &self.reference {
            Some(reference) => {
                let reference: Reference = reference.parse()?;
                EntryForm::from_reference(&*self.volume, &reference)
            }
            None => EntryForm::new(
                &*self.volume,
                self.book.as_deref().unwrap_or_default(),
                self.chapter.as_deref().unwrap_or_default(),
                self.verse.as_deref().unwrap_or_default(),
            ),
        };

        Ok(EntryForm {
            year_of_event: self.year.clone(),
            age: self.age.clone(),
            doctrine_name: self.doctrine.clone(),
            ..form
        })
    }
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn connect(config: &Path) -> Result<Dashboard<Provisioner>, DbError> {
    let config = Config::load(config)?;
    Ok(Dashboard::with_cache(
        Provisioner::new(config),
        QueryCache::shared(),
    ))
}

fn run(cli: Cli) -> Result<(), DbError> {
    let Cli { config, command } = cli;

    match command {
        Command::Migrate => {
            let dashboard = connect(&config)?;
            let mut session = dashboard.provisioner().acquire()?;
            let applied = run_migrations(session.connection())?;
            println!("Applied {} migrations", applied);
        }
        Command::Timeline { ages, json } => {
            let dashboard = connect(&config)?;
            let ages = parse_ages(&ages)?;
            let entries = dashboard.timeline()?;
            let entries = analysis::filter_by_age(&entries, &ages);

            if json {
                print_json(&entries)?;
            } else {
                for entry in entries {
                    println!("{:>6}  {}", entry.timeline_year, timeline_line(entry));
                }
            }
        }
        Command::Chart { json } => {
            let dashboard = connect(&config)?;
            let entries = dashboard.timeline()?;
            let per_year = analysis::events_per_year(&entries);
            let per_century = analysis::century_counts(&entries);

            if json {
                print_json(&json!({ "per_year": per_year, "per_century": per_century }))?;
            } else {
                println!("Events per year");
                for (year, count) in &per_year {
                    println!("{:>6}  {:>3}  {}", year, count, render::bar(*count));
                }
                println!();
                println!("Events per century");
                for (century, count) in &per_century {
                    println!("{:>6}  {:>3}  {}", century, count, render::bar(*count));
                }
            }
        }
        Command::Summary { ages, json } => {
            let dashboard = connect(&config)?;
            let ages = parse_ages(&ages)?;
            let entries = dashboard.timeline()?;
            let entries = analysis::filter_by_age(&entries, &ages);
            let summary = Summary::of(entries.iter().copied());
            let doctrines = analysis::doctrine_distribution(entries.iter().copied());

            if json {
                print_json(&json!({ "summary": summary, "doctrines": doctrines }))?;
            } else {
                println!("Total scriptures  {}", summary.total);
                println!("Books             {}", summary.books);
                println!("Doctrines         {}", summary.doctrines);
                println!();
                for (doctrine, count) in &doctrines {
                    println!("{:>3}  {}", count, doctrine);
                }
            }
        }
        Command::Scriptures { json } => {
            let dashboard = connect(&config)?;
            let table = dashboard.load_scriptures()?;
            print_table(&table, json)?;
        }
        Command::Queries => {
            for name in catalog::names() {
                println!("{}", name);
            }
        }
        Command::Query {
            name,
            limit,
            show_sql,
            json,
        } => {
            let dashboard = connect(&config)?;
            if show_sql {
                if let Some(query) = catalog::find(&name) {
                    println!("{}\n", query.sql);
                }
            }
            let outcome = dashboard.run_query(&name, Some(limit))?;
            print_table(&outcome.table, json)?;
            if !json {
                println!("({} rows)", outcome.row_count);
            }
        }
        Command::Add(args) => {
            let dashboard = connect(&config)?;
            let outcome = dashboard.insert_row(&args.form()?)?;
            println!("Added entry #{}", outcome.scripture_id);
            report_child("year", &outcome.year_info);
            report_child("doctrine", &outcome.doctrine);
        }
        Command::Edit {
            id,
            volume,
            book,
            chapter,
            verse,
        } => {
            let dashboard = connect(&config)?;
            let mut session = EditSession::load(&dashboard)?;
            let mut edited = session.editor_table();
            let row = row_of(&edited, id)?;

            for (column, value) in [
                ("volume", volume),
                ("book", book),
                ("chapter", chapter),
                ("verse", verse),
            ] {
                if let Some(value) = value {
                    edited.set(row, column, value)?;
                }
            }

            match session.save(&dashboard, &edited)? {
                SaveOutcome::Unchanged => println!("No changes to save"),
                SaveOutcome::Saved { rows_written } => println!("Saved {} rows", rows_written),
            }
        }
        Command::Delete { ids } => {
            let dashboard = connect(&config)?;
            let ids: BTreeSet<i32> = ids.into_iter().collect();
            let mut session = EditSession::load(&dashboard)?;
            let mut edited = session.editor_table();
            for id in &ids {
                let row = row_of(&edited, *id)?;
                edited.set(row, DELETE_MARKER, true)?;
            }

            match session.delete_marked(&dashboard, &edited)? {
                DeleteOutcome::NothingSelected => println!("Nothing selected"),
                DeleteOutcome::Deleted(count) => println!("Deleted {} entries", count),
            }
        }
    }

    Ok(())
}

fn parse_ages(raw: &[String]) -> Result<Vec<Age>, DbError> {
    if raw.is_empty() {
        return Ok(vec![Age::Bc, Age::Ad]);
    }
    raw.iter().map(|age| age.parse()).collect()
}

fn timeline_line(entry: &TimelineEntry) -> String {
    match &entry.doctrine_name {
        Some(doctrine) => format!("{}  [{}]  {}", entry.label(), entry.volume, doctrine),
        None => format!("{}  [{}]", entry.label(), entry.volume),
    }
}

/// Position of the entry with `id` in a `scripture_study` table.
fn row_of(table: &Table, id: i32) -> Result<usize, DbError> {
    table
        .iter()
        .find(|row| row.integer("id").ok() == Some(i64::from(id)))
        .map(|row| row.index())
        .ok_or_else(|| DbError::InvalidEntry {
            reason: format!("there is no entry #{}", id),
        })
}

fn report_child(what: &str, outcome: &ChildOutcome) {
    match outcome {
        ChildOutcome::Inserted => println!("  with {}", what),
        ChildOutcome::Skipped => {}
        ChildOutcome::Failed(e) => println!("  without {}: {}", what, e),
    }
}

fn print_table(table: &Table, json: bool) -> Result<(), DbError> {
    if json {
        print_json(table)
    } else {
        print!("{}", render::table(table));
        Ok(())
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), DbError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| DbError::Query {
        cause: e.to_string(),
    })?;
    println!("{}", text);
    Ok(())
}
