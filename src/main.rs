mod config;
mod error;
mod extraction;
mod layout;
mod nomor_aju;
mod pipeline;
mod postprocess;
mod projector;
mod serial_store;
#[cfg(test)]
mod test_support;
mod typefix;
mod workbook;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use extraction::DocumentExtractor;
use extraction::llm::LlmExtractor;
use pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fill PIB customs declarations from invoice and packing list PDFs")]
struct Cli {
    /// Configuration file
    #[arg(long, env = "PIB_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, project, post-process and type-fix in one go
    Run(RunArgs),
    /// Extract the two PDFs into a JSON sheet document
    Extract(ExtractArgs),
    /// Project, post-process and type-fix an existing extraction JSON
    Finish(JsonArgs),
    /// Only populate the template from an extraction JSON
    Project(JsonArgs),
    /// Apply business rules to a populated workbook in place
    Postprocess { workbook: PathBuf },
    /// Force the code columns of a workbook to text in place
    Fix { workbook: PathBuf },
    /// Print the next serial offered to operators
    Serial,
}

#[derive(Args, Debug)]
struct RunArgs {
    invoice: PathBuf,
    packing_list: PathBuf,
    /// Use this serial instead of the next stored one
    #[arg(long)]
    serial: Option<u64>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    invoice: PathBuf,
    packing_list: PathBuf,
    /// Directory for the JSON (defaults to the configured work dir)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct JsonArgs {
    json: PathBuf,
    #[arg(long)]
    serial: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = config::Config::load_or_default(&cli.config)?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    match cli.command {
        Command::Run(args) => {
            let extractor = LlmExtractor::new(&cfg.llm)?;
            let pipeline = Pipeline::new(cfg, extractor);
            let output = pipeline
                .run(&args.invoice, &args.packing_list, args.serial)
                .await?;
            println!("{}", output.display());
        }
        Command::Extract(args) => {
            let extractor = LlmExtractor::new(&cfg.llm)?;
            let doc = extractor.extract(&args.invoice, &args.packing_list).await?;
            let dir = args.out.unwrap_or_else(|| cfg.work_dir());
            let path = extraction::save_extraction(&doc, &dir)?;
            println!("{}", path.display());
        }
        Command::Finish(args) => {
            let pipeline = Pipeline::new(cfg, ());
            let output = pipeline.run_from_json(&args.json, args.serial)?;
            println!("{}", output.display());
        }
        Command::Project(args) => {
            let pipeline = Pipeline::new(cfg, ());
            let mut serials = pipeline.open_serials()?;
            let cfg = pipeline.config();
            let output = projector::project(
                &args.json,
                &cfg.template(),
                &cfg.output_dir(),
                &mut serials,
                args.serial,
            )?;
            println!("{}", output.display());
        }
        Command::Postprocess { workbook } => {
            let output = postprocess::postprocess(
                &workbook,
                &cfg.customer_reference(),
                &cfg.hs_reference(),
                &cfg.postprocess,
            )?;
            println!("{}", output.display());
        }
        Command::Fix { workbook } => {
            let output = typefix::fix_text_columns(&workbook)?;
            println!("{}", output.display());
        }
        Command::Serial => {
            let pipeline = Pipeline::new(cfg, ());
            let next = pipeline.open_serials()?.next_display()?;
            info!(next = %next, "Next serial");
            println!("{next}");
        }
    }

    Ok(())
}
