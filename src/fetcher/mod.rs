// Fetcher module: obtains one raw vendor payload per ingestion run.

pub mod file;
pub mod http;
pub mod traits;

pub use file::FileSource;
pub use http::HttpSource;
pub use traits::PayloadSource;
