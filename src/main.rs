//! lexcanon CLI: ingest legal-document PDFs into evidence-linked chunks.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{miette, IntoDiagnostic, Result};
use rayon::prelude::*;

use lexcanon::chunk::DocumentType;
use lexcanon::extract::{ExtractionMode, NativeExtractor};
use lexcanon::pipeline::{
    canonical_artifact, offsets_artifact, IngestRequest, IngestResult, IngestStatus, Pipeline,
};

#[derive(Parser)]
#[command(name = "lexcanon", version, about = "Deterministic legal-document ingestion")]
struct Cli {
    /// Path to the Pdfium dynamic library (overrides LEXCANON_PDFIUM_PATH).
    #[arg(long, global = true)]
    pdfium_path: Option<PathBuf>,

    /// Skip page rasterization (faster; no inspection images).
    #[arg(long, global = true)]
    no_render: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a single document and write its artifacts.
    Ingest {
        /// Path to the PDF, or an http(s) URL with --url.
        source: String,

        /// Treat the source as a URL.
        #[arg(long)]
        url: bool,

        /// Document id, e.g. "LEI 14133/2021" (normalized automatically).
        #[arg(long)]
        document_id: String,

        /// Document type: LEI, DECRETO, IN, LC, ACORDAO, SUMULA.
        #[arg(long, default_value = "LEI")]
        document_type: String,

        /// Norm number, e.g. "14133".
        #[arg(long)]
        number: String,

        /// Publication year.
        #[arg(long)]
        year: i32,

        /// Check article coverage against the expected range.
        #[arg(long)]
        validate_articles: bool,

        #[arg(long)]
        expected_first_article: Option<u32>,

        #[arg(long)]
        expected_last_article: Option<u32>,

        /// Output directory for canonical.md, offsets.json, chunks.json.
        #[arg(long, short, default_value = "out")]
        output: PathBuf,
    },

    /// Ingest every PDF in a directory, in parallel. File names must follow
    /// "<TYPE>-<number>-<year>.pdf".
    Batch {
        /// Directory of PDFs.
        dir: PathBuf,

        /// Output directory root (one subdirectory per document).
        #[arg(long, short, default_value = "out")]
        output: PathBuf,
    },

    /// Ingest a document and print the inspection snapshot (no artifacts).
    Inspect {
        source: PathBuf,

        #[arg(long)]
        document_id: String,

        #[arg(long, default_value = "LEI")]
        document_type: String,

        #[arg(long)]
        number: String,

        #[arg(long)]
        year: i32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lexcanon=info")),
        )
        .init();

    let cli = Cli::parse();
    let pipeline = build_pipeline(&cli);

    match cli.command {
        Commands::Ingest {
            source,
            url,
            document_id,
            document_type,
            number,
            year,
            validate_articles,
            expected_first_article,
            expected_last_article,
            output,
        } => {
            let document_type = parse_type(&document_type)?;
            let mut request =
                IngestRequest::new(Vec::new(), &document_id, document_type, &number, year);
            request.validate_articles = validate_articles;
            request.expected_first_article = expected_first_article;
            request.expected_last_article = expected_last_article;

            let result = if url {
                pipeline.ingest_url(&source, request)
            } else {
                pipeline.ingest_file(PathBuf::from(&source).as_path(), request)
            };
            report(&result);
            if result.status == IngestStatus::Completed {
                write_artifacts(&result, &output)?;
            }
            exit_for(&result)
        }

        Commands::Batch { dir, output } => {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
                .into_diagnostic()?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "pdf"))
                .collect();
            entries.sort();

            // Between-document parallelism only; each document runs its own
            // sequential pipeline against the shared immutable instance.
            let results: Vec<(PathBuf, IngestResult)> = entries
                .par_iter()
                .map(|path| {
                    let result = match request_from_filename(path) {
                        Ok(request) => pipeline.ingest_file(path, request),
                        Err(message) => {
                            eprintln!("skipping {}: {message}", path.display());
                            return None;
                        }
                    };
                    Some((path.clone(), result))
                })
                .filter_map(|r| r)
                .collect();

            let mut failures = 0usize;
            for (_path, result) in &results {
                report(result);
                if result.status == IngestStatus::Completed {
                    let sub = output.join(&result.document_id);
                    write_artifacts(result, &sub)?;
                } else {
                    failures += 1;
                }
            }
            if failures > 0 {
                Err(miette!("{failures} of {} documents failed", results.len()))
            } else {
                Ok(())
            }
        }

        Commands::Inspect {
            source,
            document_id,
            document_type,
            number,
            year,
        } => {
            let document_type = parse_type(&document_type)?;
            let request =
                IngestRequest::new(Vec::new(), &document_id, document_type, &number, year);
            let result = pipeline.ingest_file(&source, request);
            println!(
                "{}",
                serde_json::to_string_pretty(&result.inspection_snapshot).into_diagnostic()?
            );
            exit_for(&result)
        }
    }
}

fn build_pipeline(cli: &Cli) -> Pipeline {
    let mut native = NativeExtractor::new();
    if let Some(path) = &cli.pdfium_path {
        native = native.with_library_path(path);
    }
    if cli.no_render {
        native = native.without_rendering();
    }
    Pipeline::new().with_native_extractor(native)
}

fn parse_type(raw: &str) -> Result<DocumentType> {
    DocumentType::parse(raw)
        .ok_or_else(|| miette!("unknown document type \"{raw}\" (LEI, DECRETO, IN, LC, ACORDAO, SUMULA)"))
}

/// "LEI-14133-2021.pdf" → an ingest request.
fn request_from_filename(path: &std::path::Path) -> std::result::Result<IngestRequest, String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "unreadable file name".to_string())?;
    let parts: Vec<&str> = stem.rsplitn(3, '-').collect();
    if parts.len() != 3 {
        return Err(format!("file name \"{stem}\" is not <TYPE>-<number>-<year>"));
    }
    let (year, number, type_raw) = (parts[0], parts[1], parts[2]);
    let document_type = DocumentType::parse(type_raw)
        .ok_or_else(|| format!("unknown document type in file name: {type_raw}"))?;
    let year: i32 = year
        .parse()
        .map_err(|_| format!("bad year in file name: {year}"))?;
    Ok(IngestRequest::new(
        Vec::new(),
        stem,
        document_type,
        number,
        year,
    ))
}

fn report(result: &IngestResult) {
    match result.status {
        IngestStatus::Completed => {
            println!(
                "{}: {} chunks, hash {}",
                result.document_id,
                result.total_chunks,
                &result.canonical_hash[..12.min(result.canonical_hash.len())]
            );
            if let Some(validation) = &result.validation {
                println!(
                    "  coverage: {:?} ({:.1}%), missing {:?}",
                    validation.status, validation.coverage_percent, validation.missing_articles
                );
            }
        }
        IngestStatus::Failed => {
            let error = result.error.as_ref();
            eprintln!(
                "{}: FAILED — {}",
                result.document_id,
                error.map(|e| e.message.as_str()).unwrap_or("unknown error")
            );
        }
    }
}

/// Write canonical.md, offsets.json, and chunks.json.
fn write_artifacts(result: &IngestResult, output: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(output).into_diagnostic()?;

    std::fs::write(output.join("canonical.md"), canonical_artifact(result))
        .into_diagnostic()?;
    std::fs::write(
        output.join("offsets.json"),
        serde_json::to_vec_pretty(&offsets_artifact(&result.chunks, ExtractionMode::NativeRegex))
            .into_diagnostic()?,
    )
    .into_diagnostic()?;
    std::fs::write(
        output.join("chunks.json"),
        serde_json::to_vec_pretty(&result.chunks).into_diagnostic()?,
    )
    .into_diagnostic()?;
    Ok(())
}

fn exit_for(result: &IngestResult) -> Result<()> {
    match result.status {
        IngestStatus::Completed => Ok(()),
        IngestStatus::Failed => Err(miette!(
            "{}",
            result
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "ingestion failed".into())
        )),
    }
}
