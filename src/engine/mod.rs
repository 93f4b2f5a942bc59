pub mod converter;
pub mod folder;
pub mod lock;
pub mod persistence;
pub mod vault;

pub use lock::{LockGuard, LockTable};
pub use persistence::Persistence;
pub use vault::Codec;
