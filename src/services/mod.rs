pub mod audit;
pub mod listing;
pub mod media_source;
pub mod mutation;
pub mod object_store;
pub mod path_model;
pub mod sqlite_store;
pub mod thumbnail;
pub mod upload;

#[cfg(test)]
pub mod memory_store;
