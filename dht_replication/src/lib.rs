pub mod backup;

pub use backup::BackupStore;
