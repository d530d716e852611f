//! lockbox-storage: where encrypted blobs and their metadata records live
//!
//! - `ObjectStore`: opaque encrypted bytes keyed by storage name (OpenDAL:
//!   S3, local fs, or memory)
//! - `MetadataStore`: `FileRecord` rows (JSON file or memory)

pub mod health;
pub mod json_store;
pub mod metadata;
pub mod object;
pub mod operator;

pub use health::ping;
pub use json_store::JsonMetadataStore;
pub use metadata::{MemoryMetadataStore, MetadataStore};
pub use object::{ObjectStore, OpendalObjectStore};
pub use operator::{build_fs_operator, build_memory_operator, build_operator, S3Config};
