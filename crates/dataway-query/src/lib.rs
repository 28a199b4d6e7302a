//! Uniform query capability over heterogeneous data backends.
//!
//! An [`Adapter`] wraps one live backend connection pool; the
//! [`AdapterRegistry`] keeps the live instance per data-source id and the
//! [`FactoryRegistry`] maps backend type tags to constructors. The [`sql`]
//! module compiles structured filter clauses into parameterized SQL
//! fragments per dialect.

pub mod error;
pub mod registry;
pub mod sql;
pub mod traits;

pub use error::{DataError, Result};
pub use registry::{AdapterRegistry, FactoryRegistry};
pub use sql::{SqlDialect, MYSQL, POSTGRES};
pub use traits::{Adapter, AdapterFactory, Column, Table};
