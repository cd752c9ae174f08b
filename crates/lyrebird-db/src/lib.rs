//! Lyrebird-DB: Catalog schema, migrations, and query operations
//!
//! This crate is the persistence port of the library synchronizer. It stores
//! the file catalog, extracted track metadata, artwork freshness records and
//! scan-run bookkeeping in SQLite using rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//! - `timestamp` - Fixed-width timestamp encoding
//!
//! # Example
//!
//! ```no_run
//! use lyrebird_db::pool::{init_pool, get_conn};
//! use lyrebird_db::queries::catalog;
//!
//! let pool = init_pool("/var/lib/lyrebird/lyrebird.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let counts = catalog::counts(&conn).unwrap();
//! println!("{} files in {} folders", counts.files, counts.folders);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod timestamp;
