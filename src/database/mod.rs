pub mod entity;
pub mod manager;
pub mod memory;
pub mod models;
pub mod options;
pub mod pipeline;
pub mod postgres;
pub mod query_builder;
pub mod repository;
pub mod store;

pub use entity::{Entity, EntityMeta, Population};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use options::{
    CreateManyOptions, CreateOptions, DatabaseOptions, ExistsOptions, FindAllOptions, FindOneOptions, JoinOption,
    ManyOptions, UpdateOptions,
};
pub use postgres::PgStore;
pub use repository::{Repository, RepositoryError};
pub use store::{Document, DocumentStore, Session, StoreError};
