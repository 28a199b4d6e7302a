//! Core types shared across all dataway crates: the error taxonomy, the
//! pagination model, the structured filter clause model and the API envelope.

pub mod api;
pub mod condition;
pub mod error;
pub mod pagination;

pub use api::{ApiResponse, Dict};
pub use condition::{Clause, ClauseError, Combinator, Op};
pub use error::{ServiceError, ServiceResult};
pub use pagination::{Pagination, Row};
