use super::listing::ListingRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Success(Vec<ListingRecord>),
    Failure(String),
}

impl ExtractionResult {
    pub fn failure(reason: impl ToString) -> Self {
        ExtractionResult::Failure(reason.to_string())
    }

    /// Number of real listings carried by this result.
    pub fn item_count(&self) -> usize {
        match self {
            ExtractionResult::Success(records) => records.len(),
            ExtractionResult::Failure(_) => 0,
        }
    }

    /// Flattens into rows. A failure becomes a single `{"Error": reason}` row.
    pub fn into_records(self) -> Vec<ListingRecord> {
        match self {
            ExtractionResult::Success(records) => records,
            ExtractionResult::Failure(reason) => vec![ListingRecord::error(&reason)],
        }
    }
}
