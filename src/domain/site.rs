use std::str::FromStr;

use anyhow::anyhow;
use itertools::Itertools;
use url::{form_urlencoded, Url};

const CRAIGSLIST_HOST: &str = "craigslist.org";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SiteFamily {
    Craigslist,
    Generic,
}

impl SiteFamily {
    pub fn from_url(url: &str) -> Self {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()));

        match host {
            Some(h) if h == CRAIGSLIST_HOST || h.ends_with(".craigslist.org") => {
                SiteFamily::Craigslist
            }
            _ => SiteFamily::Generic,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, SiteFamily::Craigslist)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CraigslistCategory {
    Jobs,
    Gigs,
    ForSale,
}

impl CraigslistCategory {
    pub fn code(&self) -> &'static str {
        match self {
            CraigslistCategory::Jobs => "jjj",
            CraigslistCategory::Gigs => "ggg",
            CraigslistCategory::ForSale => "sss",
        }
    }
}

impl FromStr for CraigslistCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jobs" | "jjj" => Ok(CraigslistCategory::Jobs),
            "gigs" | "ggg" => Ok(CraigslistCategory::Gigs),
            "for-sale" | "forsale" | "sale" | "sss" => Ok(CraigslistCategory::ForSale),
            other => Err(anyhow!("Unknown category `{}`, expected jobs, gigs or for-sale", other)),
        }
    }
}

pub fn build_craigslist_url(city: &str, category: CraigslistCategory, query: &str) -> String {
    let city = city.trim().to_lowercase();
    let query: String =
        form_urlencoded::byte_serialize(query.split_whitespace().join(" ").as_bytes()).collect();

    match query.is_empty() {
        true => format!(
            "https://{}.craigslist.org/search/{}#search=1~list~0",
            city,
            category.code()
        ),
        false => format!(
            "https://{}.craigslist.org/search/{}?query={}#search=1~list~0",
            city,
            category.code(),
            query
        ),
    }
}

/// Only absolute http(s) URLs with a host are accepted as mission targets.
pub fn is_valid_target_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}
