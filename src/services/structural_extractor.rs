use anyhow::{anyhow, bail};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::domain::listing::{
    ListingRecord, DESCRIPTION, LINK, LOCATION, POSTED, PREVIEW_IMAGE, PRICE, TITLE,
};

const SPARSE_EXTRACTED_BELOW: usize = 10;
const SPARSE_DETECTED_ABOVE: usize = 20;

// Lazy loaders keep the real address in data attributes until the image scrolls in.
const IMAGE_ATTRIBUTES: [&str; 3] = ["src", "data-src", "data-lazy"];
const TIME_ATTRIBUTES: [&str; 2] = ["datetime", "title"];

/// CSS selectors for one generation of listing markup.
pub struct SelectorStrategy {
    pub name: &'static str,
    pub container: &'static str,
    pub title_link: &'static str,
    pub title_text: Option<&'static str>,
    pub price: &'static str,
    pub location: &'static str,
    pub posted: &'static str,
    pub image: &'static str,
    pub description: &'static str,
}

pub const CRAIGSLIST_STRATEGIES: [SelectorStrategy; 2] = [
    SelectorStrategy {
        name: "current",
        container: "li.cl-search-result, div.cl-search-result, li.cl-static-search-result",
        title_link: "a.posting-title, a.cl-app-anchor, a.main, a[href]",
        title_text: Some(".label, .title"),
        price: ".priceinfo, .price",
        location: ".location, .supertitle, .result-location",
        posted: "time, .meta span[title], .date",
        image: "img",
        description: ".meta, .details",
    },
    SelectorStrategy {
        name: "legacy",
        container: "li.result-row",
        title_link: "a.result-title, div.title a, a.hdrlnk",
        title_text: None,
        price: ".result-price",
        location: ".result-hood",
        posted: "time.result-date, time",
        image: "img",
        description: ".result-meta",
    },
];

struct CompiledStrategy {
    name: &'static str,
    container_css: &'static str,
    container: Selector,
    title_link: Selector,
    title_text: Option<Selector>,
    price: Selector,
    location: Selector,
    posted: Selector,
    image: Selector,
    description: Selector,
}

fn compile(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Bad selector `{}`: {:?}", css, e))
}

impl CompiledStrategy {
    fn new(strategy: &SelectorStrategy) -> anyhow::Result<Self> {
        Ok(CompiledStrategy {
            name: strategy.name,
            container_css: strategy.container,
            container: compile(strategy.container)?,
            title_link: compile(strategy.title_link)?,
            title_text: strategy.title_text.map(compile).transpose()?,
            price: compile(strategy.price)?,
            location: compile(strategy.location)?,
            posted: compile(strategy.posted)?,
            image: compile(strategy.image)?,
            description: compile(strategy.description)?,
        })
    }
}

pub struct StructuralExtractor {
    strategies: Vec<CompiledStrategy>,
}

impl StructuralExtractor {
    /// Strategies are tried in order; the first one that matches any
    /// container is used for the whole page.
    pub fn new(strategies: &[SelectorStrategy]) -> anyhow::Result<Self> {
        let strategies = strategies
            .iter()
            .map(CompiledStrategy::new)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(StructuralExtractor { strategies })
    }

    pub fn craigslist() -> anyhow::Result<Self> {
        StructuralExtractor::new(&CRAIGSLIST_STRATEGIES)
    }

    /// Selector matching containers of every strategy, for counting items in
    /// the live page.
    pub fn item_selector(&self) -> String {
        self.strategies.iter().map(|s| s.container_css).join(", ")
    }

    pub fn extract(&self, html: &str, page_url: &str) -> Vec<ListingRecord> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        for strategy in self.strategies.iter() {
            let containers: Vec<ElementRef> = document.select(&strategy.container).collect();
            if containers.is_empty() {
                log::debug!("No containers for `{}` markup", strategy.name);
                continue;
            }

            log::info!(
                "Found {} containers with `{}` markup",
                containers.len(),
                strategy.name
            );

            return containers
                .into_iter()
                .enumerate()
                .filter_map(
                    |(i, container)| match extract_item(container, strategy, base.as_ref()) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            log::debug!("Skipping item {}: {}", i, e);
                            None
                        }
                    },
                )
                .collect();
        }

        vec![]
    }
}

/// Few rows out of many detected items usually means the markup changed.
pub fn is_sparse(extracted: usize, detected: usize) -> bool {
    extracted < SPARSE_EXTRACTED_BELOW && detected > SPARSE_DETECTED_ABOVE
}

fn extract_item(
    container: ElementRef,
    strategy: &CompiledStrategy,
    base: Option<&Url>,
) -> anyhow::Result<ListingRecord> {
    let mut record = ListingRecord::new();

    let link = container.select(&strategy.title_link).next();
    let title = strategy
        .title_text
        .as_ref()
        .and_then(|sel| first_text(container, sel))
        .or_else(|| link.map(text_of).filter(|t| !t.is_empty()));
    let href = link
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve(base, href));

    record.insert_or_sentinel(TITLE, title);
    record.insert_or_sentinel(LINK, href);
    record.insert_or_sentinel(PRICE, first_text(container, &strategy.price));
    record.insert_or_sentinel(LOCATION, first_text(container, &strategy.location));
    record.insert_or_sentinel(POSTED, posted(container, &strategy.posted));
    record.insert_or_sentinel(PREVIEW_IMAGE, image_url(container, &strategy.image, base));
    record.insert_or_sentinel(DESCRIPTION, first_text(container, &strategy.description));

    if record.is_blank() {
        bail!("container holds no listing data");
    }

    Ok(record)
}

fn text_of(element: ElementRef) -> String {
    element.text().flat_map(|t| t.split_whitespace()).join(" ")
}

fn first_text(container: ElementRef, selector: &Selector) -> Option<String> {
    container
        .select(selector)
        .map(text_of)
        .find(|t| !t.is_empty())
}

fn posted(container: ElementRef, selector: &Selector) -> Option<String> {
    let element = container.select(selector).next()?;

    TIME_ATTRIBUTES
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| Some(text_of(element)).filter(|t| !t.is_empty()))
}

fn image_url(container: ElementRef, selector: &Selector, base: Option<&Url>) -> Option<String> {
    let image = container.select(selector).next()?;

    IMAGE_ATTRIBUTES
        .iter()
        .filter_map(|attr| image.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty() && !v.starts_with("data:"))
        .map(|v| resolve(base, v))
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::SENTINEL;

    const PAGE_URL: &str = "https://bakersfield.craigslist.org/search/jjj#search=1~list~0";

    const CURRENT_MARKUP: &str = r#"
        <html><body><ol>
          <li class="cl-search-result" data-pid="1">
            <a class="posting-title" href="/kern/jjj/d/line-cook/1.html">
              <span class="label">Line   Cook</span>
            </a>
            <span class="priceinfo">$18</span>
            <div class="meta"><span title="Mon Oct 19 2026">2h ago</span> Bakersfield</div>
            <span class="location">Bakersfield</span>
            <img src="data:image/gif;base64,R0lGOD" data-src="https://images.craigslist.org/a.jpg">
          </li>
          <li class="cl-search-result" data-pid="2">
            <a class="posting-title" href="https://bakersfield.craigslist.org/kern/jjj/d/driver/2.html">
              <span class="label">Delivery Driver</span>
            </a>
          </li>
          <li class="cl-search-result" data-pid="3"></li>
        </ol></body></html>
    "#;

    const LEGACY_MARKUP: &str = r#"
        <html><body><ul class="rows">
          <li class="result-row">
            <a href="/apa/1.html" class="result-image"><img data-lazy="/img/1.jpg"></a>
            <div class="result-info">
              <time class="result-date" datetime="2026-10-18 09:15">Oct 18</time>
              <a class="result-title hdrlnk" href="/apa/1.html">Sunny studio</a>
              <span class="result-meta">
                <span class="result-price">$950</span>
                <span class="result-hood"> (Oildale) </span>
              </span>
            </div>
          </li>
        </ul></body></html>
    "#;

    #[test]
    fn all_strategies_compile() {
        let extractor = StructuralExtractor::craigslist().unwrap();
        assert_eq!(extractor.strategies.len(), 2);
        assert!(extractor.item_selector().ends_with("li.result-row"));
    }

    #[test]
    fn extracts_current_markup_in_dom_order() {
        let extractor = StructuralExtractor::craigslist().unwrap();

        let records = extractor.extract(CURRENT_MARKUP, PAGE_URL);

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.get(TITLE), Some("Line Cook"));
        assert_eq!(
            first.get(LINK),
            Some("https://bakersfield.craigslist.org/kern/jjj/d/line-cook/1.html")
        );
        assert_eq!(first.get(PRICE), Some("$18"));
        assert_eq!(first.get(LOCATION), Some("Bakersfield"));
        assert_eq!(first.get(POSTED), Some("Mon Oct 19 2026"));
        assert_eq!(
            first.get(PREVIEW_IMAGE),
            Some("https://images.craigslist.org/a.jpg")
        );
        assert_eq!(first.get(DESCRIPTION), Some("2h ago Bakersfield"));

        assert_eq!(records[1].get(TITLE), Some("Delivery Driver"));
    }

    #[test]
    fn missing_fields_are_sentineled_not_dropped() {
        let extractor = StructuralExtractor::craigslist().unwrap();

        let records = extractor.extract(CURRENT_MARKUP, PAGE_URL);
        let second = &records[1];

        for field in [PRICE, LOCATION, POSTED, PREVIEW_IMAGE, DESCRIPTION] {
            assert_eq!(second.get(field), Some(SENTINEL), "{}", field);
        }
        assert_eq!(second.len(), 7);
    }

    #[test]
    fn falls_back_to_legacy_markup() {
        let extractor = StructuralExtractor::craigslist().unwrap();

        let records = extractor.extract(LEGACY_MARKUP, PAGE_URL);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get(TITLE), Some("Sunny studio"));
        assert_eq!(
            record.get(LINK),
            Some("https://bakersfield.craigslist.org/apa/1.html")
        );
        assert_eq!(record.get(PRICE), Some("$950"));
        assert_eq!(record.get(LOCATION), Some("(Oildale)"));
        assert_eq!(record.get(POSTED), Some("2026-10-18 09:15"));
        assert_eq!(
            record.get(PREVIEW_IMAGE),
            Some("https://bakersfield.craigslist.org/img/1.jpg")
        );
    }

    #[test]
    fn no_containers_gives_empty_result() {
        let extractor = StructuralExtractor::craigslist().unwrap();

        let records = extractor.extract("<html><body><p>No results</p></body></html>", PAGE_URL);

        assert!(records.is_empty());
    }

    #[test]
    fn sparse_extraction_threshold() {
        assert!(is_sparse(5, 40));
        assert!(!is_sparse(10, 40));
        assert!(!is_sparse(5, 20));
    }
}
