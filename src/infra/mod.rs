pub mod assets;
pub mod config;
pub mod runtime_client;

pub use assets::{AssetStore, DirAssetStore};
pub use runtime_client::{RuntimeClient, RuntimeConfig};
