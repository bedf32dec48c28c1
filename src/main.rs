use ads_harvest::analysis::{
    corpus_words, merge_top_words, top_keywords, Corpus, FrequencyReport, TextCleaner,
};
use ads_harvest::client::{AdsClient, BulkOptions, CatalogueReport};
use ads_harvest::config::{default_config_path, load_config, save_config, Config};
use ads_harvest::models::{Document, Field, FieldList, Harvest, Query, PAGE_CAP};
use ads_harvest::print_status;
use ads_harvest::ui::{
    document_table, format_number, frequency_table, is_terminal, print_divider,
    print_harvest_summary, print_section, truncate_with_ellipsis, ProgressSink, Spinner, Status,
};
use ads_harvest::utils::{Checkpoint, CheckpointPlan, DEFAULT_COLUMN};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ADS Harvest - bulk retrieval and word-frequency analysis for the NASA ADS search API
#[derive(Parser, Debug)]
#[command(name = "ads-harvest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bulk retrieval and word-frequency analysis for the NASA ADS search API", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log line format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Table if stdout is a terminal, JSON otherwise
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

/// Field a search term applies to
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SearchField {
    Title,
    Abstract,
    Full,
    Author,
    Year,
}

impl From<SearchField> for Field {
    fn from(field: SearchField) -> Self {
        match field {
            SearchField::Title => Field::Title,
            SearchField::Abstract => Field::Abstract,
            SearchField::Full => Field::Full,
            SearchField::Author => Field::Author,
            SearchField::Year => Field::Year,
        }
    }
}

/// Which texts to count words in
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CorpusArg {
    Titles,
    Abstracts,
    Both,
}

impl CorpusArg {
    fn corpora(self) -> &'static [Corpus] {
        match self {
            CorpusArg::Titles => &[Corpus::Titles],
            CorpusArg::Abstracts => &[Corpus::Abstracts],
            CorpusArg::Both => &[Corpus::Titles, Corpus::Abstracts],
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the API token and connectivity with a one-row query
    Check,

    /// Show every field of one paper
    Paper {
        /// Bibcode of the paper
        bibcode: String,
    },

    /// Show the abstract of one paper
    Abstract {
        /// Bibcode of the paper
        bibcode: String,
    },

    /// Search and page through every matching record
    #[command(alias = "s")]
    Search {
        /// Search expression, or the term when --field is given
        query: String,

        /// Scope the term to one field
        #[arg(long, short, value_enum)]
        field: Option<SearchField>,

        /// Exact-match the term (=field:"term"); requires --field
        #[arg(long, requires = "field")]
        exact: bool,

        /// Comma-separated fields to return
        #[arg(long, default_value = "bibcode,title,abstract")]
        fields: String,

        /// Maximum number of records
        #[arg(long, short, default_value_t = 100)]
        max: usize,

        /// Write the records to a JSON file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Papers similar to a given bibcode
    Similar {
        bibcode: String,

        #[arg(long, default_value = "bibcode,title,abstract")]
        fields: String,

        #[arg(long, short, default_value_t = 100)]
        max: usize,

        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Look up many bibcodes in batches
    Bulk {
        /// Bibcodes to look up
        bibcodes: Vec<String>,

        /// Read bibcodes from a file, one per line
        #[arg(long, short)]
        file: Option<PathBuf>,

        /// Bibcodes per request, 1 to 2000 (defaults to config)
        #[arg(long, short, value_parser = parse_batch_size)]
        batch_size: Option<usize>,

        #[arg(long, default_value = "bibcode,title,abstract")]
        fields: String,

        /// Save a checkpoint file while running
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Checkpoint every N batches (defaults to config)
        #[arg(long, requires = "checkpoint")]
        checkpoint_every: Option<usize>,

        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Download titles and abstracts for every bibcode in a CSV catalogue
    Catalogue {
        /// CSV file with a bibcode column
        csv: PathBuf,

        /// Output JSON file
        #[arg(value_name = "OUTPUT")]
        destination: PathBuf,

        /// Name of the bibcode column
        #[arg(long, default_value = DEFAULT_COLUMN)]
        column: String,

        /// Skip bibcodes already present in the output file
        #[arg(long)]
        resume: bool,

        #[arg(long, short, value_parser = parse_batch_size)]
        batch_size: Option<usize>,

        #[arg(long)]
        checkpoint_every: Option<usize>,
    },

    /// Count words in the titles or abstracts of a downloaded catalogue
    Wordfreq {
        /// Output file of `catalogue`
        input: PathBuf,

        #[arg(long, value_enum, default_value_t = CorpusArg::Both)]
        corpus: CorpusArg,

        /// Number of words to keep
        #[arg(long, short, default_value_t = 100)]
        top: usize,

        /// Minimum word length
        #[arg(long, default_value_t = 3)]
        min_length: usize,

        /// Additional stopwords
        #[arg(long = "stopword")]
        stopwords: Vec<String>,

        /// Directory for `<corpus>_word_frequencies.json` reports
        #[arg(long, short = 'd', default_value = ".")]
        output_dir: PathBuf,
    },

    /// Pick search keywords from title and abstract frequency reports
    Keywords {
        titles: PathBuf,
        abstracts: PathBuf,

        #[arg(long, short, default_value_t = 20)]
        top: usize,

        /// Keep broad research terms like "model" or "survey"
        #[arg(long)]
        include_generic: bool,

        /// Also list the union of the top N words of both reports
        #[arg(long)]
        merge: Option<usize>,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Target path (defaults to the user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let loaded = load_config(cli.config.as_deref());
    init_tracing(&cli, loaded.as_ref().ok());

    let output = cli.output.resolve();
    let quiet = cli.quiet;

    let command = match cli.command {
        Commands::Config { command } => return run_config(command, loaded),
        Commands::Wordfreq {
            input,
            corpus,
            top,
            min_length,
            stopwords,
            output_dir,
        } => {
            let cleaner = TextCleaner::new()
                .min_word_length(min_length)
                .extra_stopwords(stopwords);
            return run_wordfreq(&input, corpus, top, &cleaner, &output_dir, output);
        }
        Commands::Keywords {
            titles,
            abstracts,
            top,
            include_generic,
            merge,
        } => return run_keywords(&titles, &abstracts, top, !include_generic, merge, output),
        other => other,
    };

    let config = loaded.context("Failed to load configuration")?;
    let client = build_client(&config, quiet)?;

    match command {
        Commands::Check => {
            let spinner = (!quiet && is_terminal()).then(|| Spinner::new("Contacting ADS..."));
            let result = client.test_connection().await;
            if let Some(spinner) = spinner {
                spinner.finish();
            }
            let report = result.context("Connection check failed")?;

            print_status!(Status::Success, "Connected to {}", report.endpoint);
            println!("  Test query matched {} records", format_number(report.total_found as usize));
            if let Some(remaining) = report.rate_limit_remaining {
                println!("  Requests remaining today: {}", format_number(remaining as usize));
            }
        }

        Commands::Paper { bibcode } => match client.get_paper(&bibcode).await? {
            Some(document) => output_paper(&document, output)?,
            None => {
                print_status!(Status::Warning, "No paper found for {}", bibcode);
                std::process::exit(1);
            }
        },

        Commands::Abstract { bibcode } => match client.get_abstract(&bibcode).await? {
            Some(text) => {
                if output == OutputFormat::Json {
                    let value = serde_json::json!({ "bibcode": bibcode, "abstract": text });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                } else {
                    print_section(&bibcode);
                    println!("{}", text);
                }
            }
            None => {
                print_status!(Status::Warning, "No abstract available for {}", bibcode);
                std::process::exit(1);
            }
        },

        Commands::Search {
            query,
            field,
            exact,
            fields,
            max,
            save,
        } => {
            let query = match field {
                Some(field) if exact => Query::exact(field.into(), &query),
                Some(field) => Query::term(field.into(), &query),
                None => Query::raw(query),
            };
            tracing::info!("Searching: {}", query);
            let harvest = client.search(&query, &FieldList::parse(&fields), max).await;
            finish_harvest(&harvest, save.as_deref(), output)?;
        }

        Commands::Similar {
            bibcode,
            fields,
            max,
            save,
        } => {
            let harvest = client.similar(&bibcode, &FieldList::parse(&fields), max).await;
            finish_harvest(&harvest, save.as_deref(), output)?;
        }

        Commands::Bulk {
            bibcodes,
            file,
            batch_size,
            fields,
            checkpoint,
            checkpoint_every,
            save,
        } => {
            let mut identifiers = bibcodes;
            if let Some(path) = &file {
                identifiers.extend(read_identifier_file(path)?);
            }
            if identifiers.is_empty() {
                bail!("No bibcodes given; pass them as arguments or with --file");
            }

            let options = bulk_options(
                &client,
                &config,
                batch_size,
                &fields,
                checkpoint,
                checkpoint_every,
            );
            let harvest = client.fetch_bulk(&identifiers, &options).await?;
            finish_harvest(&harvest, save.as_deref(), output)?;
        }

        Commands::Catalogue {
            csv,
            destination,
            column,
            resume,
            batch_size,
            checkpoint_every,
        } => {
            let mut job = client.catalogue_job(csv, destination);
            job.column = column;
            job.resume = resume;
            if let Some(size) = batch_size {
                job.batch_size = size;
            }
            if let Some(every) = checkpoint_every {
                job.checkpoint_every = every;
            }

            let report = client
                .download_catalogue(&job)
                .await
                .with_context(|| format!("Catalogue download from {} failed", job.csv_path.display()))?;
            output_catalogue_report(&report, output)?;
            if report.harvest.partial {
                std::process::exit(2);
            }
        }

        Commands::Config { .. } | Commands::Wordfreq { .. } | Commands::Keywords { .. } => {}
    }

    Ok(())
}

/// Install the tracing subscriber, writing to stderr
fn init_tracing(cli: &Cli, config: Option<&Config>) {
    let configured = config.map(|c| c.logging.level.as_str()).unwrap_or("info");
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => configured,
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let json = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.is_some_and(|c| c.logging.format.eq_ignore_ascii_case("json")),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ads_harvest={}", log_level)),
        ))
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Client with a progress bar on interactive terminals and plain log lines otherwise
fn build_client(config: &Config, quiet: bool) -> Result<AdsClient> {
    let mut builder = AdsClient::builder(config);
    if !quiet && std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        builder = builder.events(Arc::new(ProgressSink::new()));
    }
    builder.build().with_context(|| {
        format!(
            "Could not create the ADS client (set ADS_API_TOKEN or api.token in {})",
            default_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "the config file".to_string())
        )
    })
}

fn bulk_options(
    client: &AdsClient,
    config: &Config,
    batch_size: Option<usize>,
    fields: &str,
    checkpoint: Option<PathBuf>,
    checkpoint_every: Option<usize>,
) -> BulkOptions {
    let mut options = client.bulk_options().fields(FieldList::parse(fields));
    if let Some(size) = batch_size {
        options = options.batch_size(size);
    }
    if let Some(path) = checkpoint {
        let every = checkpoint_every.unwrap_or(config.batch.checkpoint_every);
        options = options.checkpoint(CheckpointPlan::new(path, every));
    }
    options
}

/// `--batch-size` must fit in one page of results
fn parse_batch_size(value: &str) -> Result<usize, String> {
    let size: usize = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if (1..=PAGE_CAP).contains(&size) {
        Ok(size)
    } else {
        Err(format!("must be between 1 and {}", PAGE_CAP))
    }
}

/// Bibcodes from a text file: one per line, blank lines and `#` comments skipped
fn read_identifier_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bibcode list {}", path.display()))?;
    Ok(parse_identifier_lines(&content))
}

fn parse_identifier_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Print (and optionally save) a run's records, then exit 2 if it was incomplete
fn finish_harvest(harvest: &Harvest, save: Option<&Path>, format: OutputFormat) -> Result<()> {
    if let Some(path) = save {
        let json = serde_json::to_string_pretty(&harvest.documents)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Saved {} records to {}", harvest.len(), path.display());
    }

    output_harvest(harvest, format)?;
    if harvest.partial {
        std::process::exit(2);
    }
    Ok(())
}

fn output_harvest(harvest: &Harvest, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "total_found": harvest.total_found,
                "partial": harvest.partial,
                "stats": harvest.stats,
                "failures": harvest.failures,
                "rate_limit_remaining": harvest.rate_limit_remaining,
                "documents": harvest.documents,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            if harvest.is_empty() {
                print_status!(Status::Info, "No records found");
            } else {
                println!("{}", document_table(&harvest.documents));
            }
            print_harvest_summary(harvest);
        }
    }
    Ok(())
}

fn output_paper(document: &Document, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(document)?);
        return Ok(());
    }

    print_section(document.bibcode().unwrap_or("paper"));
    if let Some(title) = document.title() {
        println!("  Title:   {}", title);
    }
    let authors = document.authors();
    if !authors.is_empty() {
        println!("  Authors: {}", truncate_with_ellipsis(&authors.join("; "), 200));
    }
    if let Some(year) = document.year() {
        println!("  Year:    {}", year);
    }
    if let Some(publication) = document.publication() {
        println!("  Journal: {}", publication);
    }
    if let Some(pdf) = document.pdf_link() {
        println!("  PDF:     {}", pdf);
    }
    if let Some(text) = document.abstract_text() {
        print_divider();
        println!("{}", text);
    }
    Ok(())
}

fn output_catalogue_report(report: &CatalogueReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "output": report.output,
            "total_bibcodes": report.total_bibcodes,
            "duplicates_removed": report.duplicates_removed,
            "already_present": report.already_present,
            "papers_saved": report.papers_saved,
            "papers_with_abstracts": report.papers_with_abstracts,
            "partial": report.harvest.partial,
            "stats": report.harvest.stats,
            "failures": report.harvest.failures,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_section("Catalogue");
    println!("  Unique bibcodes: {}", format_number(report.total_bibcodes));
    if report.duplicates_removed > 0 {
        println!("  Duplicates removed: {}", format_number(report.duplicates_removed));
    }
    if report.already_present > 0 {
        println!("  Already downloaded: {}", format_number(report.already_present));
    }
    print_harvest_summary(&report.harvest);

    let saved = report.papers_saved.max(1);
    println!();
    print_status!(
        Status::Save,
        "{} papers saved to {} ({} with abstracts, {:.1}%)",
        format_number(report.papers_saved),
        report.output.display(),
        format_number(report.papers_with_abstracts),
        report.papers_with_abstracts as f64 / saved as f64 * 100.0
    );
    Ok(())
}

fn run_wordfreq(
    input: &Path,
    corpus: CorpusArg,
    top: usize,
    cleaner: &TextCleaner,
    output_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    let checkpoint = Checkpoint::load(input)
        .with_context(|| format!("Failed to read downloaded papers from {}", input.display()))?;
    if checkpoint.papers.is_empty() {
        bail!("{} contains no papers", input.display());
    }

    let mut reports = serde_json::Map::new();
    for &section in corpus.corpora() {
        let words = corpus_words(&checkpoint, section, cleaner);
        let report = FrequencyReport::from_words(&words, top);
        let path = output_dir.join(format!("{}_word_frequencies.json", section.as_str()));
        report.save(&path)?;
        tracing::info!("Saved {} frequency report to {}", section.as_str(), path.display());

        if format == OutputFormat::Json {
            reports.insert(section.as_str().to_string(), serde_json::to_value(&report)?);
        } else {
            print_section(&format!("Most common words in {}", section.as_str()));
            println!(
                "  {} words, {} distinct",
                format_number(report.metadata.total_words as usize),
                format_number(report.metadata.unique_words)
            );
            println!("{}", frequency_table(&report.word_frequencies, top.min(25)));
            print_status!(Status::Save, "Report written to {}", path.display());
        }
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}

fn run_keywords(
    titles: &Path,
    abstracts: &Path,
    top: usize,
    exclude_generic: bool,
    merge: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let titles = FrequencyReport::load(titles)?;
    let abstracts = FrequencyReport::load(abstracts)?;

    let keywords = top_keywords(
        &titles.word_frequencies,
        &abstracts.word_frequencies,
        top,
        exclude_generic,
    );
    let merged = merge.map(|n| merge_top_words(&titles.word_frequencies, &abstracts.word_frequencies, n));
    let query = Query::any_of(keywords.iter().map(|k| Query::exact(Field::Abstract, k)));

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "keywords": keywords,
            "merged": merged,
            "query": query.as_ref().map(Query::as_str),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_section("Keywords");
    for (rank, keyword) in keywords.iter().enumerate() {
        println!("  {:>3}. {}", rank + 1, keyword);
    }
    if let Some(merged) = merged {
        print_section("Merged top words");
        println!("  {}", merged.join(", "));
    }
    if let Some(query) = query {
        print_section("Exact-match query");
        println!("  {}", query);
    }
    Ok(())
}

fn run_config(command: ConfigCommands, loaded: Result<Config, ads_harvest::config::ConfigError>) -> Result<()> {
    match command {
        ConfigCommands::Init { path, force } => {
            let path = path
                .or_else(default_config_path)
                .context("Could not determine a config directory; pass --path")?;
            if path.exists() && !force {
                bail!("{} already exists; use --force to overwrite", path.display());
            }
            save_config(&Config::default(), &path)?;
            print_status!(Status::Success, "Wrote default configuration to {}", path.display());
        }
        ConfigCommands::Show => {
            let mut config = loaded.context("Failed to load configuration")?;
            if config.api.token.is_some() {
                config.api.token = Some("***".to_string());
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from(["ads-harvest", "check"]);
        assert!(matches!(cli.command, Commands::Check));
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Auto);
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "ads-harvest",
            "-vv",
            "--log-format",
            "json",
            "--config",
            "/path/to/config.toml",
            "paper",
            "2019Natur.568..284H",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
        match cli.command {
            Commands::Paper { bibcode } => assert_eq!(bibcode, "2019Natur.568..284H"),
            _ => panic!("Expected Paper command"),
        }
    }

    #[test]
    fn test_cli_search_defaults() {
        let cli = Cli::parse_from(["ads-harvest", "search", "contact binary"]);
        match cli.command {
            Commands::Search {
                query,
                field,
                exact,
                fields,
                max,
                save,
            } => {
                assert_eq!(query, "contact binary");
                assert_eq!(field, None);
                assert!(!exact);
                assert_eq!(fields, "bibcode,title,abstract");
                assert_eq!(max, 100);
                assert!(save.is_none());
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_exact_field() {
        let cli = Cli::parse_from([
            "ads-harvest", "s", "W UMa", "--field", "abstract", "--exact", "--max", "5000",
        ]);
        match cli.command {
            Commands::Search {
                field, exact, max, ..
            } => {
                assert_eq!(field, Some(SearchField::Abstract));
                assert!(exact);
                assert_eq!(max, 5000);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_exact_requires_field() {
        assert!(Cli::try_parse_from(["ads-harvest", "search", "x", "--exact"]).is_err());
    }

    #[test]
    fn test_cli_bulk() {
        let cli = Cli::parse_from([
            "ads-harvest",
            "bulk",
            "A",
            "B",
            "--batch-size",
            "20",
            "--checkpoint",
            "ckpt.json",
            "--checkpoint-every",
            "2",
        ]);
        match cli.command {
            Commands::Bulk {
                bibcodes,
                batch_size,
                checkpoint,
                checkpoint_every,
                ..
            } => {
                assert_eq!(bibcodes, vec!["A", "B"]);
                assert_eq!(batch_size, Some(20));
                assert_eq!(checkpoint, Some(PathBuf::from("ckpt.json")));
                assert_eq!(checkpoint_every, Some(2));
            }
            _ => panic!("Expected Bulk command"),
        }
    }

    #[test]
    fn test_cli_batch_size_bounded_by_page_cap() {
        assert!(Cli::try_parse_from(["ads-harvest", "bulk", "A", "--batch-size", "2001"]).is_err());
        assert!(Cli::try_parse_from(["ads-harvest", "bulk", "A", "--batch-size", "0"]).is_err());
        assert!(
            Cli::try_parse_from(["ads-harvest", "catalogue", "c.csv", "o.json", "-b", "5000"]).is_err()
        );

        let cli = Cli::parse_from(["ads-harvest", "bulk", "A", "--batch-size", "2000"]);
        assert!(matches!(
            cli.command,
            Commands::Bulk {
                batch_size: Some(2000),
                ..
            }
        ));
    }

    #[test]
    fn test_cli_catalogue() {
        let cli = Cli::parse_from(["ads-harvest", "catalogue", "cat.csv", "out.json", "--resume"]);
        match cli.command {
            Commands::Catalogue {
                csv,
                destination,
                column,
                resume,
                ..
            } => {
                assert_eq!(csv, PathBuf::from("cat.csv"));
                assert_eq!(destination, PathBuf::from("out.json"));
                assert_eq!(column, "Bibcode");
                assert!(resume);
            }
            _ => panic!("Expected Catalogue command"),
        }
    }

    #[test]
    fn test_cli_wordfreq_and_keywords() {
        let cli = Cli::parse_from([
            "ads-harvest",
            "wordfreq",
            "papers.json",
            "--corpus",
            "titles",
            "--stopword",
            "binary",
            "--stopword",
            "star",
        ]);
        match cli.command {
            Commands::Wordfreq {
                corpus, stopwords, top, ..
            } => {
                assert_eq!(corpus, CorpusArg::Titles);
                assert_eq!(stopwords, vec!["binary", "star"]);
                assert_eq!(top, 100);
            }
            _ => panic!("Expected Wordfreq command"),
        }

        let cli = Cli::parse_from(["ads-harvest", "keywords", "t.json", "a.json", "--merge", "50"]);
        assert!(matches!(
            cli.command,
            Commands::Keywords {
                merge: Some(50),
                include_generic: false,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_config_init() {
        let cli = Cli::parse_from(["ads-harvest", "config", "init", "--force"]);
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Init { force: true, .. }
            }
        ));
    }

    #[test]
    fn test_corpus_arg() {
        assert_eq!(CorpusArg::Both.corpora(), &[Corpus::Titles, Corpus::Abstracts]);
        assert_eq!(CorpusArg::Abstracts.corpora(), &[Corpus::Abstracts]);
    }

    #[test]
    fn test_parse_identifier_lines() {
        let ids = parse_identifier_lines("# bibcodes\n2020ApJ...1A\n\n  2021AJ....2B  \n");
        assert_eq!(ids, vec!["2020ApJ...1A", "2021AJ....2B"]);
    }

    #[test]
    fn test_output_format_resolve() {
        assert_eq!(OutputFormat::Json.resolve(), OutputFormat::Json);
        assert_eq!(OutputFormat::Table.resolve(), OutputFormat::Table);
    }
}
