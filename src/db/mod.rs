pub mod connection;
pub mod schema;
pub mod queries;
pub mod seed;
pub mod store;

pub use connection::*;
pub use schema::*;
pub use queries::*;
pub use seed::{ImportSummary, RosterSeed, import};
pub use store::SurrealEnrollmentStore;
