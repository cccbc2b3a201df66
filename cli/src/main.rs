//! pdflingo CLI - PDF text layer reconstruction and translation tool

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdflingo::service::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use pdflingo::{
    load_pages_file, AnnotationSession, AnnotatorOptions, Document, DocumentStore, JsonFormat,
    LayoutOptions, LoadState, PageSelection, ParagraphStore, RenderOptions, ServiceConfig,
    StoreEvent,
};

#[derive(Parser)]
#[command(name = "pdflingo")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Reconstruct paragraphs from PDF text runs and translate them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct paragraphs and print them as JSON
    Layout {
        /// Input JSON file of raw text items per page
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Line-break threshold in layout units
        #[arg(long, default_value = "6.0")]
        line_threshold: f32,
    },

    /// Translate the paragraphs of selected pages
    Translate {
        /// Input JSON file of raw text items per page
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Also detect object/complement spans
        #[arg(long)]
        spans: bool,

        /// Output JSON instead of text
        #[arg(long)]
        json: bool,

        /// API key for the language service
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Model identifier
        #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
        model: String,

        /// Responses API endpoint
        #[arg(long, env = "OPENAI_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Maximum concurrent translation requests
        #[arg(long, default_value = "10")]
        concurrency: usize,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show layout statistics
    Info {
        /// Input JSON file of raw text items per page
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Layout {
            input,
            output,
            compact,
            line_threshold,
        }) => cmd_layout(&input, output.as_deref(), compact, line_threshold),
        Some(Commands::Translate {
            input,
            output,
            pages,
            spans,
            json,
            api_key,
            model,
            endpoint,
            concurrency,
            timeout,
        }) => {
            let mut config = ServiceConfig::new(api_key.unwrap_or_default())
                .with_model(model)
                .with_endpoint(endpoint);
            if let Some(secs) = timeout {
                config = config.with_timeout(Duration::from_secs(secs));
            }
            let options = AnnotatorOptions::new()
                .with_translation_concurrency(concurrency)
                .with_prefetch(false);
            cmd_translate(
                &input,
                output.as_deref(),
                pages.as_deref(),
                spans,
                json,
                config,
                options,
            )
        }
        Some(Commands::Info { input }) => cmd_info(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!("{}", "Usage: pdflingo <COMMAND> <FILE>".yellow());
            println!("       pdflingo --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn write_output(output: Option<&Path>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn parse_selection(pages: Option<&str>) -> Result<PageSelection, String> {
    match pages {
        Some(p) => PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e)),
        None => Ok(PageSelection::All),
    }
}

fn cmd_layout(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
    line_threshold: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = LayoutOptions::new().with_line_threshold(line_threshold);
    let doc = pdflingo::layout_file(input, &options)?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let json = pdflingo::render::to_json(&doc, format)?;

    write_output(output, &json)
}

fn cmd_translate(
    input: &Path,
    output: Option<&Path>,
    pages: Option<&str>,
    spans: bool,
    json: bool,
    config: ServiceConfig,
    options: AnnotatorOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if !config.has_credential() {
        return Err("No API key configured; pass --api-key or set OPENAI_API_KEY".into());
    }
    let page_selection = parse_selection(pages)?;
    let min_line_count = options.min_line_count;

    let raw_pages = load_pages_file(input)?;
    let session = AnnotationSession::new(config, options);
    session.set_span_detection(spans);
    let doc = session.load_document(&raw_pages, &LayoutOptions::default());

    let selected: Vec<u32> = doc
        .pages
        .iter()
        .map(|p| p.number)
        .filter(|n| page_selection.includes(*n))
        .collect();
    let total = eligible_count(&doc, &page_selection, min_line_count);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message("Translating...");

    let stop = Arc::new(AtomicBool::new(false));
    let tracker = spawn_progress(Arc::clone(session.store()), pb.clone(), Arc::clone(&stop));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        for number in &selected {
            session.controller().mark_page_visible(*number);
        }
        session.translate_all().await;
        session.flush().await;
    });

    stop.store(true, Ordering::Relaxed);
    let _ = tracker.join();
    pb.finish_with_message("Done!");

    if let LoadState::Error { message } = session.store().load_state() {
        return Err(message.into());
    }

    let doc = session.document();
    let failed = doc
        .pages
        .iter()
        .flat_map(|p| p.paragraphs.iter())
        .filter(|p| p.status == pdflingo::TranslationStatus::Error)
        .count();
    if failed > 0 {
        eprintln!("{} {} paragraphs failed", "Warning:".yellow().bold(), failed);
    }

    let render_options = RenderOptions::new()
        .with_pages(page_selection)
        .with_min_line_count(min_line_count);
    let content = if json {
        pdflingo::render::to_json_with_options(&doc, JsonFormat::Pretty, &render_options)?
    } else {
        pdflingo::render::to_text(&doc, &render_options)?
    };

    write_output(output, &content)
}

/// Count settled paragraphs from the store's change feed.
fn spawn_progress(
    store: Arc<DocumentStore>,
    pb: ProgressBar,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    let events = store.subscribe();
    thread::spawn(move || {
        let mut settled = HashSet::new();
        loop {
            match events.recv_timeout(Duration::from_millis(100)) {
                Ok(StoreEvent::ParagraphUpdated {
                    page_number,
                    paragraph_id,
                }) => {
                    let done = store
                        .paragraph(page_number, &paragraph_id)
                        .is_some_and(|p| p.status.is_terminal());
                    if done && settled.insert(paragraph_id) {
                        pb.set_position(settled.len() as u64);
                    }
                }
                Ok(_) => {}
                Err(_) if stop.load(Ordering::Relaxed) => break,
                Err(_) => {}
            }
        }
    })
}

fn eligible_count(doc: &Document, selection: &PageSelection, min_line_count: u32) -> usize {
    doc.pages
        .iter()
        .filter(|p| selection.includes(p.number))
        .flat_map(|p| p.paragraphs.iter())
        .filter(|p| p.is_eligible(min_line_count))
        .count()
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let doc = pdflingo::layout_file(input, &LayoutOptions::default())?;
    let min_line_count = AnnotatorOptions::default().min_line_count;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), doc.page_count());
    println!("{}: {}", "Paragraphs".bold(), doc.paragraph_count());

    println!();
    println!("{}", "Layout Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let paragraphs: Vec<_> = doc.pages.iter().flat_map(|p| p.paragraphs.iter()).collect();
    let eligible = eligible_count(&doc, &PageSelection::All, min_line_count);
    let math = paragraphs.iter().filter(|p| p.is_math_like).count();
    let merge_groups = paragraphs
        .iter()
        .filter(|p| p.merge_index() == Some(0))
        .count();
    let tokens: usize = paragraphs.iter().map(|p| p.token_positions.len()).sum();

    println!("{}: {}", "Translatable".bold(), eligible);
    println!("{}: {}", "Formula-like".bold(), math);
    println!("{}: {}", "Column merge groups".bold(), merge_groups);
    println!("{}: {}", "Tokens".bold(), tokens);
    println!("{}: {}", "Characters".bold(), doc.plain_text().chars().count());

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdflingo".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF text layer reconstruction and translation tool");
    println!();
    println!(
        "Repository: {}",
        "https://github.com/iyulab/pdflingo".dimmed()
    );
    println!("License: MIT");
}
