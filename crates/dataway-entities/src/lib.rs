//! Persisted record shapes read by the core: data sources, datasets and
//! their request/response parameter lists.

pub mod dataset;
pub mod datasource;
pub mod params;

pub use dataset::Dataset;
pub use datasource::DataSource;
pub use params::{ConvertType, ParamLocation, ParamType, RequestParam, ResponseParam};

/// Generate a new record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
