pub mod store;

pub use store::PendingStore;
