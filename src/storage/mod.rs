pub mod checkpoint;
pub mod file_lock;
pub mod layout;
pub mod segment;
pub mod wal;
