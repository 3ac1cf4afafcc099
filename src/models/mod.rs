pub mod fact;
pub mod taxonomy;

pub use fact::{normalize_value, Fact};
pub use taxonomy::{FieldCategory, FieldTaxonomy, TabularTrait};
