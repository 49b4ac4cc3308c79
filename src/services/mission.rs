use crate::{
    configuration::Settings,
    domain::{
        extraction::ExtractionResult,
        mission::{MissionReport, MissionRequest, MissionState},
        site::SiteFamily,
    },
};

use super::{
    converge_scroll, extract_with_model, is_sparse, normalize, pagination, CompletionModel,
    PageAdvance, PageSession, StructuralExtractor,
};

// Rough proxy for "repeating things" on pages we have no selectors for.
const GENERIC_ITEM_SELECTOR: &str =
    "article, li, [class*='result'], [class*='listing'], [class*='item']";

pub struct MissionRunner<'a, P: ?Sized, M: ?Sized> {
    session: &'a P,
    model: &'a M,
    settings: &'a Settings,
    structural: StructuralExtractor,
}

impl<'a, P, M> MissionRunner<'a, P, M>
where
    P: PageSession + ?Sized,
    M: CompletionModel + ?Sized,
{
    pub fn new(
        session: &'a P,
        model: &'a M,
        settings: &'a Settings,
        structural: StructuralExtractor,
    ) -> Self {
        MissionRunner {
            session,
            model,
            settings,
            structural,
        }
    }

    /// Scans up to `request.pages` pages in order. A failing page counts as
    /// zero items; only running out of pages stops the loop early.
    pub async fn run(&self, request: &MissionRequest) -> MissionReport {
        log::info!(
            "Starting mission for {} ({} pages, fields: {})",
            request.url,
            request.pages,
            request.blueprint.as_prompt_list()
        );

        let mut state = MissionState::new(&request.url);
        let mut navigate = true;

        for page_index in 0..request.pages {
            log::info!(
                "Scanning page {}/{}: {}",
                state.page_number,
                request.pages,
                state.current_url
            );

            match self.scan_page(&state.current_url, navigate, request).await {
                Ok((result, detected)) => {
                    state.items_detected = detected;
                    match &result {
                        ExtractionResult::Success(records) => log::info!(
                            "Page {}: {} items extracted, {} detected",
                            state.page_number,
                            records.len(),
                            detected
                        ),
                        ExtractionResult::Failure(reason) => log::error!(
                            "Page {}: extraction failed: {}",
                            state.page_number,
                            reason
                        ),
                    }
                    state.record_page(result);
                }
                Err(e) => {
                    log::error!("Page {} skipped: {:?}", state.page_number, e);
                    state.record_page(ExtractionResult::Success(vec![]));
                }
            }

            if page_index + 1 == request.pages {
                break;
            }

            match pagination::advance(
                self.session,
                &self.settings.pagination,
                &request.url,
                request.site,
                page_index + 1,
            )
            .await
            {
                PageAdvance::Clicked(url) => {
                    navigate = false;
                    state.advance(url);
                }
                PageAdvance::Synthesized(url) => {
                    navigate = true;
                    state.advance(url);
                }
                PageAdvance::Exhausted => break,
            }
        }

        let report = state.into_report();
        log::info!(
            "Mission finished: {} items over {} pages",
            report.item_count(),
            report.pages.len()
        );
        report
    }

    async fn scan_page(
        &self,
        url: &str,
        navigate: bool,
        request: &MissionRequest,
    ) -> anyhow::Result<(ExtractionResult, usize)> {
        if navigate {
            self.session.open(url).await?;
        }
        tokio::time::sleep(self.settings.browser.page_load_wait()).await;

        let item_selector = match request.site {
            SiteFamily::Craigslist => self.structural.item_selector(),
            SiteFamily::Generic => GENERIC_ITEM_SELECTOR.to_string(),
        };
        let scroll = converge_scroll(self.session, &self.settings.scroll, &item_selector).await;
        log::debug!("Scroll finished: {:?}", scroll);

        let html = self.session.page_source().await?;
        let page_url = self
            .session
            .current_url()
            .await
            .unwrap_or_else(|_| url.to_string());

        let result = match request.site {
            SiteFamily::Craigslist => {
                let records = self.structural.extract(&html, &page_url);
                if is_sparse(records.len(), scroll.item_count) {
                    log::warn!(
                        "Only {} of {} detected items extracted from {}",
                        records.len(),
                        scroll.item_count,
                        page_url
                    );
                }

                match records.is_empty() && self.settings.mission.model_fallback {
                    true => {
                        log::warn!("No listings matched known markup, asking the model");
                        self.extract_generative(&html, request).await
                    }
                    false => ExtractionResult::Success(records),
                }
            }
            SiteFamily::Generic => self.extract_generative(&html, request).await,
        };

        Ok((result, scroll.item_count))
    }

    async fn extract_generative(&self, html: &str, request: &MissionRequest) -> ExtractionResult {
        let text = normalize(html, self.settings.openai.max_input_chars);
        extract_with_model(self.model, &request.blueprint, &text).await
    }
}
