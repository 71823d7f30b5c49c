use anyhow::{Context, Result};
use clap::Parser;
use extraitgen::{
    pipeline::{run, InputSet},
    progress::LogReporter,
};
use std::{fs, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Generates one legal extract per claim record and packages the results"
)]
struct Args {
    /// Individual claimants table (CSV)
    #[arg(long)]
    indiv: Option<PathBuf>,

    /// Collective claimants table (CSV)
    #[arg(long)]
    coll: Option<PathBuf>,

    /// Individual parcel coordinates (CSV)
    #[arg(long)]
    coord_pi: Option<PathBuf>,

    /// Collective parcel coordinates (CSV)
    #[arg(long)]
    coord_pc: Option<PathBuf>,

    /// DOCX template for individual extracts
    #[arg(long)]
    tpl_indiv: Option<PathBuf>,

    /// DOCX template for collective extracts
    #[arg(long)]
    tpl_coll: Option<PathBuf>,

    /// Where to write the output archive
    #[arg(long, default_value = "Extraits_Generes.zip")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    let args = Args::parse();
    let inputs = InputSet {
        individual: args.indiv,
        collective: args.coll,
        coords_individual: args.coord_pi,
        coords_collective: args.coord_pc,
        template_individual: args.tpl_indiv,
        template_collective: args.tpl_coll,
    };

    let mut reporter = LogReporter;
    match run(&inputs, &mut reporter).await {
        Ok(archive) => {
            fs::write(&args.out, &archive)
                .with_context(|| format!("writing {}", args.out.display()))?;
            info!("archive written to {}", args.out.display());
            Ok(())
        }
        Err(err) => {
            error!("generation failed: {err}");
            Err(err.into())
        }
    }
}
