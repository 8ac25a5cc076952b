pub mod clustering;
pub mod enrichment;
pub mod gateway;
pub mod grouping;
pub mod heuristics;
pub mod persistence;
pub mod pipeline;
pub mod synthesis;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use gateway::{Classification, ClassificationGateway, ClaudeGateway, TaskLabel};
pub use persistence::{DocumentStore, WarehouseSink};
pub use pipeline::{Pipeline, PipelineConfig};
