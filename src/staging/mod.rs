mod object_store;
mod publisher;

pub use object_store::{FsObjectStore, ObjectStore, StagingLocation};
pub use publisher::{staging_object_name, to_ndjson, StagingPublisher};
