//! Rust client for the SkillConnect media object store
//!
//! Uploads post media to a bucket-style object store and hands back the
//! publicly retrievable reference that gets attached to a post.
//!
//! # Example
//!
//! ```rust,no_run
//! use skillconnect_storage_client::{object_path, ObjectStore, StorageClient, StorageConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StorageClient::new(StorageConfig {
//!     base_url: "https://storage.example.com".into(),
//!     bucket: "skillconnect".into(),
//!     api_key: Some("anon-key".into()),
//!     ..Default::default()
//! })?;
//!
//! let path = object_path("42", "holiday.mp4");
//! let stored = client.upload(&path, b"...".to_vec(), "video/mp4").await?;
//! println!("public url: {}", stored.public_url);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod path;
pub mod store;
pub mod types;

// Re-export main types
pub use client::StorageClient;
pub use error::{Result, StorageError};
pub use path::object_path;
pub use store::{MemoryObjectStore, ObjectStore};
pub use types::*;
