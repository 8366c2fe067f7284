pub mod local;
pub mod remote;

// Re-export
pub use local::{load_or_initial, FileLocalStore, LocalStore};
pub use remote::{detect_directory_mirror, DirectoryMirror, MemoryMirror, RemoteMirror, RemoteRow};
