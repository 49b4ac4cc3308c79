use crate::configuration::ScrollSettings;

use super::PageSession;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollTermination {
    /// Height stopped growing between two checks.
    Converged,
    /// Ran out of iterations while the page was still growing.
    IterationCap,
    /// The browser refused a scroll or measurement script.
    ScriptFailure,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollOutcome {
    pub item_count: usize,
    pub steps: u32,
    pub termination: ScrollTermination,
}

/// Scrolls in fixed increments until the document height stops growing or
/// `max_iterations` is hit, then reports how many `item_selector` matches the
/// page holds. Never fails: a broken script just ends the loop early.
pub async fn converge_scroll<P: PageSession + ?Sized>(
    session: &P,
    settings: &ScrollSettings,
    item_selector: &str,
) -> ScrollOutcome {
    let check_every = settings.check_every.max(1);

    let mut last_height = match session.document_height().await {
        Ok(height) => height,
        Err(e) => {
            log::warn!("Could not measure page height: {:?}", e);
            return ScrollOutcome {
                item_count: 0,
                steps: 0,
                termination: ScrollTermination::ScriptFailure,
            };
        }
    };
    let mut item_count = session.count_elements(item_selector).await.unwrap_or(0);

    for step in 1..=settings.max_iterations {
        if let Err(e) = session.scroll_by(settings.increment_px).await {
            log::warn!("Scroll step {} failed: {:?}", step, e);
            return ScrollOutcome {
                item_count,
                steps: step - 1,
                termination: ScrollTermination::ScriptFailure,
            };
        }
        tokio::time::sleep(settings.settle()).await;

        if step % check_every != 0 {
            continue;
        }

        let height = match session.document_height().await {
            Ok(height) => height,
            Err(e) => {
                log::warn!("Could not measure page height: {:?}", e);
                return ScrollOutcome {
                    item_count,
                    steps: step,
                    termination: ScrollTermination::ScriptFailure,
                };
            }
        };
        item_count = session
            .count_elements(item_selector)
            .await
            .unwrap_or(item_count);
        log::debug!(
            "Scroll step {}: height {} -> {}, {} items",
            step,
            last_height,
            height,
            item_count
        );

        if height <= last_height {
            if let Err(e) = session.scroll_to_bottom().await {
                log::warn!("Final scroll failed: {:?}", e);
            }
            tokio::time::sleep(settings.settle()).await;
            item_count = session
                .count_elements(item_selector)
                .await
                .unwrap_or(item_count);

            return ScrollOutcome {
                item_count,
                steps: step,
                termination: ScrollTermination::Converged,
            };
        }
        last_height = height;
    }

    log::info!(
        "Page still growing after {} scroll steps, taking {} items",
        settings.max_iterations,
        item_count
    );

    ScrollOutcome {
        item_count,
        steps: settings.max_iterations,
        termination: ScrollTermination::IterationCap,
    }
}
