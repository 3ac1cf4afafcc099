pub mod extractor;
pub mod identity;
pub mod page_fetcher;

pub use extractor::{Extraction, Extractor};
pub use identity::{IdentityRotatingSession, SessionIdentity};
pub use page_fetcher::{DirectSession, PageFetcher};
