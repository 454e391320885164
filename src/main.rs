use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};

mod address;
mod aggregate;
mod config;
mod emit;
mod error;
mod identifier;
mod pipeline;
mod records;

use config::{Args, OutputFormat, PipelineConfig};
use emit::{write_address_map, CsvSummaryWriter, JsonLinesWriter, SummaryWriter};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = PipelineConfig::from(&args);
    log::info!(
        "rolling up {} (postcode prefix {:?}, {} ids, {} worker(s))",
        args.input.display(),
        config.postcode_filter.prefix(),
        config.id_width,
        config.workers,
    );

    let input = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    // The CSV reader buffers internally.
    let output = pipeline::run(input, &config)?;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let sink = BufWriter::new(sink);

    let mut writer: Box<dyn SummaryWriter> = match args.format {
        OutputFormat::Jsonl => Box::new(JsonLinesWriter::new(sink, config.output_fields)),
        OutputFormat::Csv => Box::new(CsvSummaryWriter::new(sink, config.output_fields)),
    };
    pipeline::emit(&output.summaries, writer.as_mut())?;
    log::info!("wrote {} address summaries", output.stats.groups_emitted);

    if let Some(path) = &args.address_map {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        write_address_map(file, &output.summaries)
            .with_context(|| format!("failed to write address map {}", path.display()))?;
        log::info!("wrote {} address ids to {}", output.summaries.len(), path.display());
    }

    Ok(())
}
