//! Queue schema
//!
//! The DDL in `schema.sql` is idempotent and runs on every open. The version
//! it describes is recorded in `schema_migrations`.

/// Tables and indexes created on every open
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Version of the layout in `SCHEMA_SQL`
pub const SCHEMA_VERSION: i32 = 1;
