pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod feed;
pub mod mutation;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;
