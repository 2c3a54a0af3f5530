//! Repository traits for metadata operations.

pub mod objects;
pub mod rates;
pub mod retention;

pub use objects::ObjectRepo;
pub use rates::RateRepo;
pub use retention::RetentionRepo;
