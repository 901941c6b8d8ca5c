pub mod aggregate;
pub mod chart;
pub mod errors;
pub mod fetch;
pub mod input_set;
pub mod issuers;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod shape;
pub mod table;

pub use errors::{FedTrackError, FedTrackResult};
