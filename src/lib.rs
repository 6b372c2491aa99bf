pub mod db;

pub mod constants;
pub mod costing;
pub mod equipment;
pub mod errors;
pub mod fx;
pub mod proposals;
pub mod schema;
pub mod utils;

pub use db::{create_pool, get_connection, init, run_migrations, DbConnection, DbPool};
pub use errors::{Error, Result};
