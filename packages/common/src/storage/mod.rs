mod error;
mod key;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use key::{ObjectKey, sanitize_segment};
pub use traits::{BlobStore, BoxReader, StoredBlob};
