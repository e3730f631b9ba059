pub mod imgur;
pub mod object_storage;

pub use imgur::ImgurHost;
pub use object_storage::ObjectStorageHost;
