use anyhow::Context;
use article_images::pipeline::{self, Config, Outcome, PipelineError};
use clap::Parser;
use std::process::ExitCode;

/// Downloads every image of a blog article into a directory named
/// after the article title
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Article URL, e.g. https://www.cnblogs.com/wintersun/p/19390629
    url: String,
}

/// Status to exit with, or `None` when the error should leave `main`.
/// Only a missing scheme is a failure; a run that fetched nothing, found
/// nothing or lost some images still exits 0.
fn exit_status(result: &pipeline::Result<Outcome>) -> Option<u8> {
    match result {
        Ok(_) => Some(0),
        Err(PipelineError::InvalidScheme(_)) => Some(1),
        Err(_) => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .without_time()
        .with_target(false)
        .init();

    let args = Args::parse();

    let result = pipeline::run(&args.url, &Config::default()).await;

    let Some(status) = exit_status(&result) else {
        return result
            .map(|_| ExitCode::FAILURE)
            .with_context(|| format!("Can't save images of {}", args.url));
    };

    match &result {
        Err(e) => tracing::error!("{}", e),
        Ok(Outcome::FetchFailed(_)) => tracing::info!("Nothing fetched, exiting"),
        Ok(_) => {}
    }

    Ok(ExitCode::from(status))
}
