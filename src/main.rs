use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use oilsplit_lib::ocr::TesseractEngine;
use oilsplit_lib::ollama::OllamaOracle;
use oilsplit_lib::pdf_writer::{read_record_from_pdf, LopdfWriter};
use oilsplit_lib::render::PdftoppmRenderer;
use oilsplit_lib::{load_settings, save_settings, AppResult, DocumentProcessor, Settings, Workspace};

#[derive(Parser)]
#[command(name = "oilsplit")]
#[command(version, about = "Split scanned oil-trading PDFs into named documents", long_about = None)]
struct Cli {
    /// Directory holding page images, OCR output, chunk files and split PDFs
    #[arg(long, short, global = true, default_value = "data")]
    workdir: PathBuf,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Per-invocation overrides of the saved settings
#[derive(Args)]
struct Overrides {
    #[arg(long, global = true)]
    model: Option<String>,
    #[arg(long, global = true)]
    ollama_url: Option<String>,
    #[arg(long, global = true)]
    dpi: Option<u32>,
    /// Pause after each successful model call, in milliseconds
    #[arg(long, global = true)]
    pacing_ms: Option<u64>,
    /// Give up on a model call after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

impl Overrides {
    fn apply(self, settings: &mut Settings) {
        if let Some(model) = self.model {
            settings.model = model;
        }
        if let Some(url) = self.ollama_url {
            settings.ollama_url = url;
        }
        if let Some(dpi) = self.dpi {
            settings.dpi = dpi;
        }
        if let Some(ms) = self.pacing_ms {
            settings.pacing_delay_ms = ms;
        }
        if self.timeout_secs.is_some() {
            settings.timeout_secs = self.timeout_secs;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render every page of the PDF to a PNG
    Render { pdf: PathBuf },
    /// OCR the rendered pages
    Ocr,
    /// Group OCR'd pages into document chunks
    Chunk,
    /// Extract fields from each chunk with the model
    Parse,
    /// Write one PDF per parsed chunk
    Split { pdf: PathBuf },
    /// Run every stage in order
    Run { pdf: PathBuf },
    /// Show the effective settings, optionally saving them
    Config {
        #[arg(long)]
        save: bool,
    },
    /// Print the record stored in a split PDF
    Inspect { pdf: PathBuf },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let mut settings = load_settings();
    cli.overrides.apply(&mut settings);
    let workspace = Workspace::new(&cli.workdir);
    let processor = |pdf: PathBuf| DocumentProcessor::new(pdf, workspace.clone(), settings.clone());

    match cli.command {
        Commands::Render { pdf } => {
            let renderer = PdftoppmRenderer::new(&settings.pdftoppm_cmd, settings.dpi);
            processor(pdf).convert_pdf_to_images(&renderer)?;
        }
        Commands::Ocr => {
            let engine = TesseractEngine::new(&settings.tesseract_cmd);
            processor(PathBuf::new()).perform_ocr(&engine)?;
        }
        Commands::Chunk => {
            processor(PathBuf::new()).chunk_documents()?;
        }
        Commands::Parse => {
            let oracle = OllamaOracle::new(&settings.ollama_url, &settings.model);
            let outcome = processor(PathBuf::new()).parse_chunks(oracle).await?;
            if !outcome.failures.is_empty() {
                log::warn!(
                    "{} chunks failed, see {}",
                    outcome.failures.len(),
                    workspace.failed_log_path().display()
                );
            }
        }
        Commands::Split { pdf } => {
            let writer = LopdfWriter::open(&pdf)?;
            processor(pdf).split_pdf(&writer)?;
        }
        Commands::Run { pdf } => {
            let report = processor(pdf).run_all().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config { save } => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            if save {
                let path = save_settings(&settings)?;
                log::info!("Settings saved to {}", path.display());
            }
        }
        Commands::Inspect { pdf } => match read_record_from_pdf(&pdf) {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("No record stored in {}", pdf.display()),
        },
    }
    Ok(())
}
