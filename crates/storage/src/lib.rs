#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    GenerationUsageRepository, InMemoryRepository, SessionStoreRepository, Storage, StorageError,
};
