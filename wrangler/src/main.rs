//! TMDB Wrangler CLI - clean, enrich and analyze the TMDB movie export
//!
//! # Commands
//!
//! ```bash
//! tmdb-wrangler run tmdb-movies.csv -o report.json    # Full pipeline + analysis report
//! tmdb-wrangler clean tmdb-movies.csv -o clean.csv    # Cleaned table with derived columns
//! tmdb-wrangler explode tmdb-movies.csv --column cast # One row per cast member
//! tmdb-wrangler describe tmdb-movies.csv              # Numeric summaries
//! tmdb-wrangler example-config                        # Default options as JSON
//! ```
//!
//! The options file can also be given through `TMDB_WRANGLER_CONFIG`
//! (environment or `.env`).

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tmdb_wrangler::logs::set_quiet;
use tmdb_wrangler::{
    analyze, clean_and_derive, describe_all, explode, load_path, run_path, PipelineOptions, Table,
};

#[derive(Parser)]
#[command(name = "tmdb-wrangler")]
#[command(about = "Clean, enrich and analyze the TMDB movie export", long_about = None)]
struct Cli {
    /// Silence progress output on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Input CSV file
    input: PathBuf,

    /// Options JSON file
    #[arg(short, long, env = "TMDB_WRANGLER_CONFIG")]
    config: Option<PathBuf>,

    /// CSV delimiter (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: load, clean, derive, explode and analyze
    Run {
        #[command(flatten)]
        args: InputArgs,

        /// Output file for the JSON report (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run the explosions in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Clean and derive, then write the table as CSV
    Clean {
        #[command(flatten)]
        args: InputArgs,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Explode one multi-valued column and write the view as CSV
    Explode {
        #[command(flatten)]
        args: InputArgs,

        /// Column to explode (genres, cast, director...)
        #[arg(long)]
        column: String,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summary statistics of every numeric column, as JSON
    Describe {
        #[command(flatten)]
        args: InputArgs,
    },

    /// Show the default options
    ExampleConfig,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    set_quiet(cli.quiet);

    let result = match cli.command {
        Commands::Run { args, output, parallel } => cmd_run(&args, output.as_deref(), parallel),
        Commands::Clean { args, output } => cmd_clean(&args, output.as_deref()),
        Commands::Explode { args, column, output } => cmd_explode(&args, &column, output.as_deref()),
        Commands::Describe { args } => cmd_describe(&args),
        Commands::ExampleConfig => cmd_example_config(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn load_options(args: &InputArgs) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
    let mut options = match &args.config {
        Some(path) => {
            eprintln!("⚙️  Options: {}", path.display());
            PipelineOptions::from_file(path)?
        }
        None => PipelineOptions::default(),
    };
    if args.delimiter.is_some() {
        options.delimiter = args.delimiter;
    }
    Ok(options)
}

fn cmd_run(args: &InputArgs, output: Option<&Path>, parallel: bool) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", args.input.display());

    let mut options = load_options(args)?;
    options.parallel_explode |= parallel;

    let result = run_path(&args.input, &options)?;
    let report = analyze(&result, &options)?;

    eprintln!("   Encoding: {}", result.load_info.encoding);
    eprintln!("   Rows: {} → {}", result.load_info.row_count, result.table.row_count());
    for view in &result.views {
        let distinct = view.table.unique_count(&view.target_column)?;
        eprintln!("   {}: {} rows, {} distinct", view.target_column, view.row_count(), distinct);
    }

    let json = serde_json::to_string_pretty(&report)?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_clean(args: &InputArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🧹 Cleaning: {}", args.input.display());

    let options = load_options(args)?;
    let loaded = load_path(&args.input, &options)?;
    let (table, clean_report, _) = clean_and_derive(loaded, &options)?;

    eprintln!("   Rows: {} → {}", clean_report.rows_in, clean_report.rows_out);
    write_csv(&table, output)
}

fn cmd_explode(args: &InputArgs, column: &str, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✂️  Exploding '{}' in: {}", column, args.input.display());

    let options = load_options(args)?;
    let spec = options
        .explode
        .iter()
        .find(|s| s.source == column)
        .ok_or_else(|| {
            let configured: Vec<&str> = options.explode.iter().map(|s| s.source.as_str()).collect();
            format!("No explode spec for '{}' (configured: {})", column, configured.join(", "))
        })?;

    let loaded = load_path(&args.input, &options)?;
    let (table, _, _) = clean_and_derive(loaded, &options)?;
    let view = explode(&table, spec)?;

    eprintln!("   Rows: {} → {}", table.row_count(), view.row_count());
    write_csv(&view.table, output)
}

fn cmd_describe(args: &InputArgs) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📊 Describing: {}", args.input.display());

    let options = load_options(args)?;
    let loaded = load_path(&args.input, &options)?;
    let (table, _, _) = clean_and_derive(loaded, &options)?;

    let json = serde_json::to_string_pretty(&describe_all(&table))?;
    println!("{}", json);
    Ok(())
}

fn cmd_example_config() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", PipelineOptions::default().to_json()?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn write_csv(table: &Table, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            table.write_csv(fs::File::create(p)?)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            table.write_csv(&mut stdout)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
