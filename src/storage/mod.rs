// Storage module: the offer store behind ingestion and discount queries.

pub mod sqlite;

pub use sqlite::SqliteStorage;
