pub mod pagination;
pub mod request;
pub mod serialization;

pub use pagination::{ListSpec, Pagination, PaginationMeta};
pub use request::{parse_id, FieldErrors, Validate, ValidJson};
