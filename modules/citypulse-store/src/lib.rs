pub mod doc_store;
pub mod warehouse;

pub use doc_store::DocStore;
pub use warehouse::Warehouse;
