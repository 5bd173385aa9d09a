use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pedimento_core::{
    DocumentProcessor, ExtractionReport, ExtractionStrategy, PipelineConfig, PipelineError,
    RecordedTranscriber, Severity,
};

#[derive(Parser)]
#[command(name = "pedimento")]
#[command(about = "Extracts Mexican customs declarations from page text and checks them for compliance")]
struct Args {
    /// Path to the page text file (pages separated by form feeds)
    #[arg(short, long, default_value = "pedimento-core/test_fixtures/pedimento_normal.txt")]
    input: String,

    /// Path to custom config file (YAML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Output format: report, record, findings, or summary
    #[arg(short = 'f', long, default_value = "report")]
    format: String,

    /// Output file path (if not specified, auto-generated based on input)
    #[arg(short, long)]
    output: Option<String>,

    /// Extraction strategy: deterministic, transcription, or hybrid (overrides config)
    #[arg(short, long)]
    strategy: Option<ExtractionStrategy>,

    /// Directory of recorded transcription responses (chunk_000.json, ...)
    #[arg(long)]
    fragments_dir: Option<String>,

    /// Pages per transcription chunk (overrides config)
    #[arg(long)]
    pages_per_chunk: Option<usize>,

    /// Enable detailed profiling of all pipeline steps
    #[arg(long)]
    profile: bool,

    /// Exit with status 2 when any ERROR finding is reported
    #[arg(long)]
    strict: bool,

    /// Show available config options and exit
    #[arg(long)]
    show_configs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    println!("🦀 Pedimento Extractor");

    if args.show_configs {
        show_help();
        return Ok(());
    }

    if !Path::new(&args.input).exists() {
        println!("⚠️  Input not found at: {}", args.input);
        println!("   Please check the file path.");
        return Ok(());
    }

    let mut config = PipelineConfig::load_with_fallback(args.config.as_deref());
    if let Some(config_path) = &args.config {
        println!("📋 Loaded config from: {}", config_path);
    } else {
        println!("📋 Using default config");
    }

    // CLI overrides
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(pages_per_chunk) = args.pages_per_chunk {
        config.chunking.pages_per_chunk = pages_per_chunk;
    }

    info!(
        strategy = config.strategy.as_str(),
        pages_per_chunk = config.chunking.pages_per_chunk,
        policy = config.validation.policy.version.as_str(),
        "pipeline configured"
    );
    let processor = create_processor(&args, config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Interrupted, cancelling in-flight work");
            on_interrupt.cancel();
        }
    });

    println!(
        "📄 Processing: {} ({})",
        args.input,
        processor.config().strategy.as_str()
    );

    match processor.process_document(Path::new(&args.input), &cancel).await {
        Ok(report) => {
            println!("✅ Successfully processed pedimento");
            print_summary(&report);

            let output_path = args.output.clone().unwrap_or_else(|| default_output_path(&args));
            report
                .save_with_format(&output_path, &args.format)
                .with_context(|| format!("failed to write {output_path}"))?;
            println!("💾 {} format saved to: {}", args.format, output_path);

            if args.strict && report.record.count_findings(Severity::Error) > 0 {
                std::process::exit(2);
            }
        }
        Err(PipelineError::Cancelled) => {
            eprintln!("🛑 Processing cancelled, no record produced");
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("❌ Processing failed: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn create_processor(args: &Args, config: PipelineConfig) -> Result<DocumentProcessor> {
    let needs_transcriber = config.strategy.needs_transcriber();
    let mut processor = DocumentProcessor::new(config)?.with_profiling(args.profile);

    match &args.fragments_dir {
        Some(dir) => {
            println!("🔧 Replaying transcriptions from: {}", dir);
            processor = processor.with_transcriber(Arc::new(RecordedTranscriber::new(dir)));
        }
        None if needs_transcriber => {
            anyhow::bail!(
                "strategy '{}' needs recorded transcriptions: pass --fragments-dir",
                processor.config().strategy.as_str()
            );
        }
        None => {}
    }
    Ok(processor)
}

fn default_output_path(args: &Args) -> String {
    let input_name = Path::new(&args.input)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let config_suffix = args
        .config
        .as_ref()
        .and_then(|p| Path::new(p).file_stem())
        .and_then(|s| s.to_str())
        .map(|s| format!("_{s}"))
        .unwrap_or_default();
    format!("{input_name}{config_suffix}_{}.json", args.format)
}

fn print_summary(report: &ExtractionReport) {
    let summary = report.summary();
    println!("📊 Pedimento:");
    println!(
        "   - Number: {}",
        summary.pedimento_no.as_deref().unwrap_or("(unknown)")
    );
    println!("   - Kind: {:?}", summary.kind);
    println!(
        "   - Document key: {}",
        summary.document_key.as_deref().unwrap_or("(unknown)")
    );
    println!("   - Items: {}", summary.items);
    if summary.failed_chunks > 0 {
        println!("   - ⚠️  Unreadable chunks: {}", summary.failed_chunks);
    }
    println!(
        "🔎 Findings: {} errors, {} warnings, {} info (policy {})",
        summary.errors, summary.warnings, summary.infos, summary.policy_version
    );
    for finding in report.findings() {
        let marker = match finding.severity {
            Severity::Error => "❌",
            Severity::Warning => "⚠️ ",
            Severity::Info => "ℹ️ ",
        };
        println!("   {} [{}] {}: {}", marker, finding.rule, finding.field, finding.message);
    }
}

fn show_help() {
    println!("\n📋 Available Configuration Options:");
    println!("  --config <path>           Load custom config file");
    println!("  --input <path>            Page text file to process");
    println!("  --output <path>           Output file path (auto-generated if not specified)");
    println!("  --format <fmt>            Output format: report, record, findings, or summary");
    println!("  --strategy <name>         deterministic, transcription, or hybrid");
    println!("  --fragments-dir <path>    Recorded transcription responses to replay");
    println!("  --pages-per-chunk <n>     Pages per transcription chunk");
    println!("  --profile                 Log per-step timings");
    println!("  --strict                  Exit with status 2 on ERROR findings");

    println!("\n📄 Output Formats:");
    println!("  report    - Record, chunk outcomes and provenance digests (default)");
    println!("  record    - The normalized pedimento record with findings");
    println!("  findings  - Only the compliance findings");
    println!("  summary   - Counts and key header fields");

    println!("\n📁 Example config files in ./configs/:");
    println!("  default.yaml  - Default tolerances, rule selection and compliance policy");

    println!("\n📝 Usage Examples:");
    println!("  cargo run -- -i pedimento.txt");
    println!("  cargo run -- -i pedimento.txt -f findings -o findings.json");
    println!("  cargo run -- -i pedimento.txt -s hybrid --fragments-dir recordings/");
    println!("\n🔊 Logging: set RUST_LOG (e.g. RUST_LOG=pedimento_core=debug)");
}
