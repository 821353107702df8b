use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use dlxc::commandline::{BackendOptions, Operation, Options};
use dlxc::opt::PassSet;

fn main() -> Result<()> {
    let options = Options::parse();
    stderrlog::new()
        .verbosity(options.verbose)
        .init()
        .context("failed to initialise logging")?;

    match options.operation {
        Operation::Compile {
            file,
            backend,
            output,
        } => compile(&file, &backend, output),
        Operation::Dot { file, backend } => {
            let source = read(&file)?;
            let passes = PassSet::parse(&backend.optimisations)?;
            print!("{}", dlxc::dot(&source, passes)?);
            Ok(())
        }
    }
}

fn compile(file: &str, backend: &BackendOptions, output: Option<String>) -> Result<()> {
    let source = read(file)?;
    let passes = PassSet::parse(&backend.optimisations)?;
    let image = dlxc::compile(&source, passes, backend.registers)?;

    let output = output.unwrap_or_else(|| {
        Path::new(file)
            .with_extension("dlx")
            .to_string_lossy()
            .into_owned()
    });
    let bytes: Vec<u8> = image.iter().flat_map(|word| word.to_le_bytes()).collect();
    fs::write(&output, bytes).with_context(|| format!("failed to write '{}'", output))?;
    info!("wrote {} words to {}", image.len(), output);
    Ok(())
}

fn read(file: &str) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("failed to read '{}'", file))
}
