use std::{future::Future, io, path::Path};

use anyhow::{anyhow, Context};
use rand::seq::SliceRandom;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::{
    configuration::Settings,
    domain::{
        mission::{MissionReport, MissionRequest},
        proxy::ProxySpec,
        table::ListingTable,
    },
    services::{
        report_body, report_subject, Attachment, Droid, Mailer, MissionRunner, OpenaiClient,
        StructuralExtractor,
    },
};

/// An explicit proxy wins, otherwise one is drawn from the configured pool.
pub fn select_proxy(explicit: Option<&str>, pool: &[String]) -> anyhow::Result<Option<ProxySpec>> {
    let chosen = match explicit {
        Some(proxy) => Some(proxy),
        None => pool
            .choose(&mut rand::thread_rng())
            .map(|proxy| proxy.as_str()),
    };

    chosen.map(|proxy| proxy.parse::<ProxySpec>()).transpose()
}

/// Waits for `signal`. A handler that could not be installed never fires.
async fn wait_for<F>(signal: F, name: &str)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        log::warn!("Could not listen for {}: {:?}", name, e);
        std::future::pending::<()>().await;
    }
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
pub async fn shutdown_signal() {
    let interrupt = wait_for(tokio::signal::ctrl_c(), "Ctrl-C");

    #[cfg(unix)]
    let terminate = wait_for(
        async {
            let mut term = signal(SignalKind::terminate())?;
            term.recv().await;
            Ok::<(), io::Error>(())
        },
        "SIGTERM",
    );
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => log::warn!("Interrupted, shutting down"),
        _ = terminate => log::warn!("Terminated, shutting down"),
    }
}

async fn until_shutdown<W, S>(work: W, shutdown: S) -> anyhow::Result<W::Output>
where
    W: Future,
    S: Future<Output = ()>,
{
    tokio::select! {
        out = work => Ok(out),
        _ = shutdown => Err(anyhow!("Mission interrupted")),
    }
}

/// Runs one mission inside a fresh browser session. The session is closed
/// on every path out, including Ctrl-C and SIGTERM.
pub async fn launch(
    settings: &Settings,
    request: &MissionRequest,
    proxy: Option<&ProxySpec>,
) -> anyhow::Result<MissionReport> {
    let model = OpenaiClient::new(&settings.openai);
    let structural = StructuralExtractor::craigslist()?;

    let droid = Droid::new(&settings.browser, proxy)
        .await
        .context("Could not start a browser session")?;

    let outcome = {
        let runner = MissionRunner::new(&droid, &model, settings, structural);
        until_shutdown(runner.run(request), shutdown_signal()).await
    };

    droid.quit().await;
    outcome
}

/// Writes the table to disk and mails it. Empty tables are neither exported
/// nor sent.
pub async fn deliver(
    settings: &Settings,
    request: &MissionRequest,
    report: MissionReport,
    recipient: &str,
    output_dir: &Path,
) -> anyhow::Result<Option<ListingTable>> {
    for (page, reason) in report.failures() {
        log::warn!("Page {} produced no data: {}", page, reason);
    }

    let records = report.into_records();
    let table = ListingTable::from_records(&records, &request.blueprint.fields);
    if table.is_empty() {
        log::warn!("Mission returned no data, nothing to send");
        return Ok(None);
    }

    let stem = format!("extraction_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let (csv_path, json_path) = table.export(output_dir, &stem)?;
    log::info!(
        "Saved {} rows to {} and {}",
        table.len(),
        csv_path.display(),
        json_path.display()
    );

    let mailer = Mailer::new(settings.email.clone());
    mailer
        .send_report(
            recipient,
            &report_subject(table.len(), &request.url),
            &report_body(table.len(), &request.url),
            Some(Attachment::csv(table.to_csv()?)),
        )
        .await?;

    Ok(Some(table))
}
