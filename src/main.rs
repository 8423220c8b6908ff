use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

use postbot::asana::AsanaClient;
use postbot::config;
use postbot::social::SocialRouter;
use postbot::workflow;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Poll Asana for approved posts and relay the due ones to social platforms"
)]
struct Args {
    /// Keep polling on a fixed cadence instead of running once
    #[arg(long)]
    watch: bool,

    /// Seconds between polling cycles in watch mode
    #[arg(long, default_value = "300")]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::from_env()?;

    let asana = AsanaClient::from_config(&cfg.asana);
    let router = SocialRouter::from_config(&cfg);
    let fields = &cfg.asana.fields;

    if args.watch {
        let interval = Duration::from_secs(args.interval_secs);
        info!(interval_secs = args.interval_secs, "starting watch loop");
        loop {
            let now = chrono::Utc::now().naive_utc();
            let report = workflow::execute(&asana, &router, fields, now).await;
            if report.status == 200 {
                info!(status = report.status, "{}", report.message);
            } else {
                error!(status = report.status, "{}", report.message);
            }
            tokio::time::sleep(interval).await;
        }
    }

    let now = chrono::Utc::now().naive_utc();
    let report = workflow::execute(&asana, &router, fields, now).await;
    info!(status = report.status, "{}", report.message);
    if report.status != 200 {
        std::process::exit(1);
    }
    Ok(())
}
