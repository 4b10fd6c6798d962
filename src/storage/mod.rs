pub mod images;
pub mod json_file;
pub mod sqlite;

pub use images::ImageStore;
pub use sqlite::SqliteStorage;
