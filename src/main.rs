use std::{path::PathBuf, process::ExitCode};

use anyhow::bail;
use clap::Parser;
use env_logger::Env;
use synapse::{
    configuration::get_configuration,
    domain::{
        mission::MissionRequest,
        site::{build_craigslist_url, CraigslistCategory},
    },
    startup::{deliver, launch, select_proxy},
};

/// Extracts listings from a results page and mails them as CSV.
#[derive(Parser, Debug)]
#[command(name = "synapse")]
struct Args {
    /// Results page to start from. Omit to build a Craigslist search from --city.
    url: Option<String>,

    /// Where the report is mailed
    #[arg(short, long)]
    recipient: String,

    /// Number of result pages to walk
    #[arg(short, long, default_value = "1")]
    pages: u32,

    /// Comma separated field names to extract
    #[arg(short, long, default_value = "Title,Link")]
    fields: String,

    /// Proxy as host:port or user:pass@host:port
    #[arg(long)]
    proxy: Option<String>,

    /// Directory for the CSV and JSON exports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Craigslist city subdomain, e.g. bakersfield
    #[arg(long)]
    city: Option<String>,

    /// Craigslist category: jobs, gigs or for-sale
    #[arg(long, default_value = "jobs")]
    category: String,

    /// Craigslist search terms
    #[arg(long, default_value = "")]
    query: String,
}

impl Args {
    fn target_url(&self) -> anyhow::Result<String> {
        match (&self.url, &self.city) {
            (Some(url), _) => Ok(url.clone()),
            (None, Some(city)) => {
                let category = self.category.parse::<CraigslistCategory>()?;
                Ok(build_craigslist_url(city, category, &self.query))
            }
            (None, None) => bail!("Give either a URL or --city"),
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = get_configuration()?;

    let request = MissionRequest::new(&args.target_url()?, args.pages, &args.fields)?;
    let proxy = select_proxy(args.proxy.as_deref(), &settings.proxies)?;
    if let Some(proxy) = &proxy {
        log::info!("Routing browser through proxy {}", proxy.endpoint());
    }

    let report = launch(&settings, &request, proxy.as_ref()).await?;

    let output_dir = args
        .output_dir
        .unwrap_or_else(|| PathBuf::from(&settings.mission.output_dir));
    deliver(&settings, &request, report, &args.recipient, &output_dir).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("CRITICAL: mission aborted: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
