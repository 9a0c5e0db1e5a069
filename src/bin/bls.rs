use anyhow::Result;
use bls_explorer::config::Settings;
use bls_explorer::query::{RawFields, build_query};
use bls_explorer::snippet::{SnippetLanguage, SnippetOptions, render};
use bls_explorer::storage::{self, ExportOptions};
use bls_explorer::{BlsClient, ShapedTable, run_query};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bls",
    version,
    about = "Search, fetch & export U.S. Bureau of Labor Statistics series"
)]
struct Cli {
    /// BLS registration key (overrides BLS_API_KEY and the config file).
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Read settings from this JSON file instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search series by keyword (survey name, abbreviation or series title).
    Search(SearchArgs),
    /// Fetch observations for one or more series.
    Get(GetArgs),
    /// List the surveys (datasets) the API offers.
    Surveys {
        /// Only show surveys whose name or abbreviation contains this text.
        #[arg(long)]
        filter: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Lang {
    Python,
    Rust,
    Curl,
}

impl From<Lang> for SnippetLanguage {
    fn from(l: Lang) -> Self {
        match l {
            Lang::Python => SnippetLanguage::Python,
            Lang::Rust => SnippetLanguage::Rust,
            Lang::Curl => SnippetLanguage::Curl,
        }
    }
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Save results to this file, or into this directory under a dated default name.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Prefix CSV text cells that look like spreadsheet formulas with a quote.
    #[arg(long, default_value_t = false)]
    safe_csv: bool,
    /// Print a code snippet reproducing the request.
    #[arg(long, value_enum)]
    snippet: Option<Lang>,
    /// Only print the snippet; do not call the API.
    #[arg(long, default_value_t = false, requires = "snippet")]
    snippet_only: bool,
    /// Embed the API key in the snippet instead of a placeholder.
    #[arg(long, default_value_t = false)]
    show_key: bool,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Keyword, e.g. "unemployment" or a survey abbreviation like "CU".
    keyword: String,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// Series ids separated by comma, semicolon or space (e.g., LNS14000000,CUUR0000SA0)
    #[arg(short, long)]
    series: String,
    /// First year of the range (YYYY)
    #[arg(long, conflicts_with = "year")]
    start: Option<String>,
    /// Last year of the range (YYYY)
    #[arg(long, conflicts_with = "year")]
    end: Option<String>,
    /// Single year (YYYY); shorthand for --start YYYY --end YYYY
    #[arg(short = 'y', long)]
    year: Option<String>,
    #[command(flatten)]
    output: OutputArgs,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(p) => {
            let mut s = Settings::from_file(p)?;
            s.apply_env(|k| std::env::var(k).ok());
            s
        }
        None => Settings::load()?,
    };
    if let Some(k) = cli.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        settings.api_key = Some(k.trim().to_string());
    }

    match cli.cmd {
        Command::Search(args) => run(&settings, RawFields::search(args.keyword), &args.output),
        Command::Get(args) => {
            let (start, end) = match args.year {
                Some(y) => (y.clone(), y),
                None => (args.start.unwrap_or_default(), args.end.unwrap_or_default()),
            };
            let fields = RawFields {
                mode: None,
                series: args.series,
                start,
                end,
                ..Default::default()
            };
            run(&settings, fields, &args.output)
        }
        Command::Surveys { filter } => cmd_surveys(&settings, filter.as_deref()),
    }
}

fn run(settings: &Settings, fields: RawFields, out: &OutputArgs) -> Result<()> {
    let rules = settings.validation_rules()?;

    let snippet_opts = out.snippet.map(|lang| SnippetOptions {
        language: lang.into(),
        api_key: if out.show_key {
            settings.api_key.clone()
        } else {
            None
        },
    });

    if out.snippet_only {
        let query = build_query(&fields, &rules)?;
        if let Some(opts) = &snippet_opts {
            print!("{}", render(&query, opts));
        }
        return Ok(());
    }

    let client = BlsClient::new(settings)?;
    let outcome = run_query(&client, &rules, &fields)?;

    for m in &outcome.messages {
        eprintln!("note: {}", m);
    }
    print_table(&outcome.table);

    if let Some(path) = out.out.as_ref() {
        let fmt = match out.format {
            Some(OutFormat::Csv) => "csv",
            Some(OutFormat::Json) => "json",
            None if path.is_dir() => "csv",
            None => path.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
        }
        .to_ascii_lowercase();
        let path = if path.is_dir() {
            let today = chrono::Local::now().date_naive();
            path.join(storage::default_file_name_as(&outcome.query, today, &fmt))
        } else {
            path.clone()
        };
        match fmt.as_str() {
            "csv" => storage::save_csv_with(
                &outcome.table,
                &path,
                ExportOptions {
                    sanitize_formulas: out.safe_csv,
                },
            )?,
            "json" => storage::save_json(&outcome.table, &path)?,
            other => anyhow::bail!("unsupported format: {}", other),
        }
        eprintln!("Saved {} rows to {}", outcome.table.len(), path.display());
    }

    if let Some(opts) = &snippet_opts {
        println!();
        print!("{}", render(&outcome.query, opts));
    }

    Ok(())
}

fn cmd_surveys(settings: &Settings, filter: Option<&str>) -> Result<()> {
    let client = BlsClient::new(settings)?;
    let needle = filter.map(|f| f.trim().to_lowercase());
    let mut surveys = client.surveys()?;
    surveys.sort_by(|a, b| a.abbreviation.cmp(&b.abbreviation));
    for s in surveys {
        if let Some(n) = &needle
            && !s.abbreviation.to_lowercase().contains(n)
            && !s.name.to_lowercase().contains(n)
        {
            continue;
        }
        println!("{:<4} {}", s.abbreviation, s.name);
    }
    Ok(())
}

fn print_table(table: &ShapedTable) {
    if table.is_empty() {
        eprintln!("No rows returned.");
        return;
    }
    let fields = table.fields();
    let rows = table.rows();
    let mut widths: Vec<usize> = fields.iter().map(|f| f.len()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    println!("{}", line(fields.clone()));
    for row in &rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
}
