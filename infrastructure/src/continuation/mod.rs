//! Persistence for continuation state.

mod file_store;

pub use file_store::FileContinuationStore;
