//! Local collaborators of the sync engine: backup files and content parsers.

mod backup;
mod format;

pub use backup::{BackupStore, FileBackup};
pub use format::{CONTENT_KEY, ConfigFileFormat, ContentParser, FormatParsers, StructuredParser};
