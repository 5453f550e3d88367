use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::info;

use quote_extractor::config::Settings;
use quote_extractor::diagnostics::{CollectingSink, Diagnostic, DiagnosticsSink, TracingSink};
use quote_extractor::error::ParseFailure;
use quote_extractor::output::{JsonLinesWriter, QuoteRecord, ResultConsumer};
use quote_extractor::parser::{self, QuoteExtractor};
use quote_extractor::source::{self, Post};

#[derive(Parser)]
#[command(name = "quote_extractor", about = "Extract attributed quotes from blog post HTML")]
struct Cli {
    /// Config file (default: ./quotes.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract quotes from saved HTML pages as JSON lines
    Extract {
        /// HTML files, each holding one or more posts
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Write JSON lines here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Fail if any post yields no quotes (page layout probably changed)
        #[arg(long)]
        fail_on_empty: bool,
    },
    /// Print the text lines each post flattens to
    Flatten {
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let extractor = parser::build_extractor(&settings).context("Invalid extractor settings")?;

    match cli.command {
        Commands::Extract {
            files,
            output,
            fail_on_empty,
        } => {
            let posts = load_all(&files, &settings)?;
            if posts.is_empty() {
                info!("No posts matched `{}`.", settings.source.post_selector);
                return Ok(());
            }

            let writer: Box<dyn Write> = match &output {
                Some(path) => Box::new(
                    fs::File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?,
                ),
                None => Box::new(io::stdout().lock()),
            };
            let mut consumer = JsonLinesWriter::new(BufWriter::new(writer));

            let counts = extract_posts(&extractor, &posts, &mut consumer)?;
            let written = consumer.written();
            consumer.finish().context("Failed to flush output")?;

            info!(
                "Extracted {} quotes from {} posts ({} empty); dropped {} blocks without attribution, {} with empty body in {:.1}s",
                written,
                posts.len(),
                counts.empty_posts.len(),
                counts.no_attribution,
                counts.empty_body,
                t0.elapsed().as_secs_f64()
            );

            if fail_on_empty && !counts.empty_posts.is_empty() {
                bail!(
                    "{} posts yielded no quotes: {}",
                    counts.empty_posts.len(),
                    counts.empty_posts.join(", ")
                );
            }
            Ok(())
        }
        Commands::Flatten { file } => {
            let posts = load_file(&file, &settings)?;
            let flattener = extractor.flattener();
            for post in &posts {
                println!("== {}", post.id);
                for line in flattener.flatten_fragment(&post.root) {
                    println!("{}", line);
                }
                println!();
            }
            Ok(())
        }
    }
}

fn load_file(path: &Path, settings: &Settings) -> anyhow::Result<Vec<Post>> {
    let html =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let posts = source::load_posts(&html, &settings.source)?;
    info!("{}: {} posts", path.display(), posts.len());
    Ok(posts)
}

fn load_all(files: &[PathBuf], settings: &Settings) -> anyhow::Result<Vec<Post>> {
    let mut posts = Vec::new();
    for path in files {
        posts.extend(load_file(path, settings)?);
    }
    Ok(posts)
}

struct ExtractCounts {
    empty_posts: Vec<String>,
    no_attribution: usize,
    empty_body: usize,
}

/// What one post produced.
struct PostOutcome {
    records: Vec<QuoteRecord>,
    diagnostics: Vec<Diagnostic>,
}

/// Extract all posts in parallel, then hand records to the consumer and
/// replay diagnostics in input order.
fn extract_posts(
    extractor: &QuoteExtractor,
    posts: &[Post],
    consumer: &mut impl ResultConsumer,
) -> anyhow::Result<ExtractCounts> {
    let pb = ProgressBar::new(posts.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );
    let outcomes = extract_parallel(extractor, posts, &pb);
    pb.finish_and_clear();

    let mut counts = ExtractCounts {
        empty_posts: Vec::new(),
        no_attribution: 0,
        empty_body: 0,
    };

    for (post, outcome) in posts.iter().zip(outcomes) {
        if outcome.records.is_empty() {
            counts.empty_posts.push(post.id.clone());
        }
        consumer
            .consume(&outcome.records)
            .context("Failed to write quotes")?;

        for d in outcome.diagnostics {
            match d.failure {
                ParseFailure::NoAttributionLine => counts.no_attribution += 1,
                ParseFailure::EmptyQuoteBody => counts.empty_body += 1,
                ParseFailure::UnknownFormat => {}
            }
            TracingSink.report(d);
        }
    }

    Ok(counts)
}

/// One outcome per post, at the post's index. Each post reports into its
/// own sink, so posts sharing a title keep their diagnostics apart.
fn extract_parallel(extractor: &QuoteExtractor, posts: &[Post], pb: &ProgressBar) -> Vec<PostOutcome> {
    posts
        .par_iter()
        .map(|post| {
            let sink = CollectingSink::new();
            let records = parser::process_post(extractor, post, &sink);
            pb.inc(1);
            PostOutcome {
                records,
                diagnostics: sink.take(),
            }
        })
        .collect()
}
