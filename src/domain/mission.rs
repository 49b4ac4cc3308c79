use anyhow::bail;

use super::{
    extraction::ExtractionResult,
    listing::ListingRecord,
    site::{is_valid_target_url, SiteFamily},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub fields: Vec<String>,
}

impl Blueprint {
    /// Comma separated field names. Blank entries and repeats are dropped.
    pub fn parse(raw: &str) -> Self {
        let mut fields: Vec<String> = vec![];
        for field in raw.split(',').map(|f| f.trim()).filter(|f| !f.is_empty()) {
            if !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }

        Blueprint { fields }
    }

    pub fn as_prompt_list(&self) -> String {
        self.fields.join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MissionRequest {
    pub url: String,
    pub pages: u32,
    pub blueprint: Blueprint,
    pub site: SiteFamily,
}

impl MissionRequest {
    pub fn new(url: &str, pages: u32, blueprint: &str) -> anyhow::Result<Self> {
        let url = url.trim();
        if !is_valid_target_url(url) {
            bail!("`{}` is not a valid http(s) URL", url);
        }
        if pages == 0 {
            bail!("Page count must be at least 1");
        }

        let blueprint = Blueprint::parse(blueprint);
        if blueprint.is_empty() {
            bail!("Blueprint must name at least one field");
        }

        Ok(MissionRequest {
            url: url.to_string(),
            pages,
            blueprint,
            site: SiteFamily::from_url(url),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub page_number: u32,
    pub url: String,
    pub result: ExtractionResult,
}

/// Per mission bookkeeping threaded through the page loop.
#[derive(Debug)]
pub struct MissionState {
    pub page_number: u32,
    pub current_url: String,
    pub items_detected: usize,
    pub pages: Vec<PageResult>,
}

impl MissionState {
    pub fn new(url: &str) -> Self {
        MissionState {
            page_number: 1,
            current_url: url.to_string(),
            items_detected: 0,
            pages: vec![],
        }
    }

    pub fn record_page(&mut self, result: ExtractionResult) {
        self.pages.push(PageResult {
            page_number: self.page_number,
            url: self.current_url.clone(),
            result,
        });
    }

    pub fn advance(&mut self, next_url: String) {
        self.page_number += 1;
        self.current_url = next_url;
        self.items_detected = 0;
    }

    pub fn into_report(self) -> MissionReport {
        MissionReport { pages: self.pages }
    }
}

#[derive(Debug, Default)]
pub struct MissionReport {
    pub pages: Vec<PageResult>,
}

impl MissionReport {
    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|p| p.result.item_count()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (u32, &str)> {
        self.pages.iter().filter_map(|p| match &p.result {
            ExtractionResult::Failure(reason) => Some((p.page_number, reason.as_str())),
            ExtractionResult::Success(_) => None,
        })
    }

    /// All rows in page order, failures included as error rows.
    pub fn into_records(self) -> Vec<ListingRecord> {
        self.pages
            .into_iter()
            .flat_map(|p| p.result.into_records())
            .collect()
    }
}
