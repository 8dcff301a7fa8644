pub mod sync;

pub use sync::{run_sync, SyncReport};
