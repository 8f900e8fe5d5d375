pub mod object;
pub mod variant;

pub use object::{normalize_format, ObjectDescriptor};
pub use variant::{MediaKind, VariantResult};
