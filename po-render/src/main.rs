#![cfg_attr(coverage, feature(coverage_attribute))]
mod bundle;
mod render;

use std::path::PathBuf;

use clap::Parser;
use po_core::logging;
use po_core::prelude::*;
use tracing::*;

use crate::bundle::Bundle;

#[derive(Parser)]
#[command(
    about = "render the configuration file of a Prometheus or PrometheusAgent from a bundle of resources",
    version
)]
struct Options {
    #[arg(long, help = "YAML file containing the workload and the resources it may select")]
    bundle: PathBuf,

    #[arg(long, help = "where to write the configuration; defaults to prometheus.yaml.gz (or prometheus.yaml)")]
    output: Option<PathBuf>,

    #[arg(long, help = "write uncompressed YAML instead of gzip")]
    plain: bool,

    #[arg(short, long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> EmptyResult {
    let args = Options::parse();
    logging::setup(&args.verbosity);

    let bundle = Bundle::load(&args.bundle)?;
    let data = render::cmd(&bundle, args.plain).await?;

    let output = args.output.unwrap_or_else(|| match args.plain {
        true => PathBuf::from("prometheus.yaml"),
        false => PathBuf::from(CONFIG_FILENAME),
    });
    std::fs::write(&output, &data)?;
    info!("wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests;
