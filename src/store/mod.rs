pub mod store;

pub use store::{
    FileStore, KeyValueStore, StoreError, StoreResult, load_completed_cycles, load_duration,
    save_completed_cycles, save_duration,
};

#[cfg(test)]
pub use store::MemoryStore;
