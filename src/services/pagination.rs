use crate::{configuration::PaginationSettings, domain::site::SiteFamily};

use super::PageSession;

const OFFSET_PARAM: &str = "s";

#[derive(Debug, Clone, PartialEq)]
pub enum PageAdvance {
    /// A "next" control was clicked; the browser is already on the new page.
    Clicked(String),
    /// No control, but the site paginates by result offset.
    Synthesized(String),
    /// No more pages.
    Exhausted,
}

/// Sets the result offset query parameter (`s`) to `page_index * page_size`,
/// keeping any fragment after the query.
pub fn synthesize_offset_url(original: &str, page_index: u32, page_size: u32) -> String {
    let offset = format!("{}={}", OFFSET_PARAM, page_index.saturating_mul(page_size));

    let (without_fragment, fragment) = match original.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (original, None),
    };
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, query),
        None => (without_fragment, ""),
    };

    let mut pairs: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some(OFFSET_PARAM))
        .collect();
    pairs.push(&offset);

    let mut url = format!("{}?{}", path, pairs.join("&"));
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }

    url
}

/// Moves to page `next_page_index` (0-based) by clicking a "next" link, or by
/// offset for sites that support it.
pub async fn advance<P: PageSession + ?Sized>(
    session: &P,
    settings: &PaginationSettings,
    original_url: &str,
    site: SiteFamily,
    next_page_index: u32,
) -> PageAdvance {
    let clicked = session
        .click_link(&settings.next_link_text, settings.wait(), settings.poll())
        .await
        .unwrap_or_else(|e| {
            log::warn!("Clicking `{}` failed: {:?}", settings.next_link_text, e);
            false
        });

    if clicked {
        tokio::time::sleep(settings.settle()).await;
        match session.current_url().await {
            Ok(url) => {
                log::info!("Followed next link to {}", url);
                return PageAdvance::Clicked(url);
            }
            Err(e) => log::warn!("Lost track of URL after clicking next: {:?}", e),
        }
    }

    match site.is_known() {
        true => {
            let url = synthesize_offset_url(original_url, next_page_index, settings.page_size);
            log::info!("No next link, jumping by offset to {}", url);
            PageAdvance::Synthesized(url)
        }
        false => {
            log::info!("No next link found, pagination finished");
            PageAdvance::Exhausted
        }
    }
}
