pub mod droid;
pub mod generative_extractor;
pub mod mailer;
pub mod mission;
pub mod normalizer;
pub mod openai_client;
pub mod pagination;
pub mod scroller;
pub mod session;
pub mod structural_extractor;

pub use droid::Droid;
pub use generative_extractor::{build_prompt, extract_with_model, parse_items};
pub use mailer::*;
pub use mission::MissionRunner;
pub use normalizer::normalize;
pub use openai_client::{CompletionModel, OpenaiClient};
pub use pagination::{advance, synthesize_offset_url, PageAdvance};
pub use scroller::*;
pub use session::PageSession;
pub use structural_extractor::{is_sparse, SelectorStrategy, StructuralExtractor, CRAIGSLIST_STRATEGIES};
