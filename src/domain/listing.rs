use serde::{ser::SerializeMap, Serialize, Serializer};

pub const SENTINEL: &str = "N/A";

pub const TITLE: &str = "Title";
pub const LINK: &str = "Link";
pub const PRICE: &str = "Price";
pub const LOCATION: &str = "Location";
pub const POSTED: &str = "Posted";
pub const PREVIEW_IMAGE: &str = "Preview_Image";
pub const DESCRIPTION: &str = "Description";
pub const ERROR: &str = "Error";

/// One extracted listing. Keys keep insertion order so that columns come out
/// in the order fields were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingRecord {
    fields: Vec<(String, String)>,
}

impl ListingRecord {
    pub fn new() -> Self {
        ListingRecord::default()
    }

    pub fn error(reason: &str) -> Self {
        let mut record = ListingRecord::new();
        record.insert(ERROR, reason);
        record
    }

    /// Inserts or replaces a field. Blank values are stored as the sentinel.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let value = match value.trim().is_empty() {
            true => SENTINEL.to_string(),
            false => value,
        };

        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn insert_or_sentinel(&mut self, key: &str, value: Option<String>) {
        self.insert(key, value.unwrap_or_else(|| SENTINEL.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value for a column, falling back to the sentinel.
    pub fn value_or_sentinel(&self, key: &str) -> &str {
        self.get(key).unwrap_or(SENTINEL)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.get(ERROR).is_some()
    }

    /// True when every field holds the sentinel.
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, v)| v == SENTINEL)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ListingRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in self.fields.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
