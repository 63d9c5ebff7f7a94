pub mod credentials;
pub mod entry;
pub mod firebase;
pub mod hash;
pub mod storage;
pub mod store;

pub use credentials::{DEFAULT_TOKEN_URI, ServiceAccount, TokenSource};
pub use entry::{CacheEntry, MISSING_RESPONSE, response_key};
pub use firebase::{FirebaseAuth, FirebaseStore};
pub use hash::{ContentId, content_id, content_id_from_reader};
pub use storage::LocalFileStore;
pub use store::ResponseStore;
