pub mod containment;
pub mod executor;
pub mod geometry;
pub mod resolver;
pub mod transport;
pub mod well_septic;

pub use crate::domain::model::{ParcelQuery, UtilityProfile};
pub use crate::domain::ports::Transport;
pub use crate::utils::error::Result;
pub use executor::{QueryExecutor, RetryPolicy};
pub use resolver::UtilityResolver;
pub use transport::HttpTransport;
