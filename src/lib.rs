//! # treekv
//!
//! A minimal key-value store that uses a directory tree as its storage
//! medium:
//! - Keys are slash-separated path strings, one regular file each
//! - Containers (directories) group related keys
//! - Values are opaque bytes, optionally stored gzip-compressed
//! - Write-capable opens take a non-blocking advisory lock
//! - Every path is sandboxed to the store root
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Store (facade)                        │
//! │      key/container CRUD · traversal · rename · lifecycle    │
//! └───────┬──────────────┬──────────────┬──────────────┬────────┘
//!         │              │              │              │
//!         ▼              ▼              ▼              ▼
//!  ┌────────────┐ ┌─────────────┐ ┌───────────┐ ┌─────────────┐
//!  │  Resolver  │ │ Maintenance │ │   Lock    │ │    Codec    │
//!  │ (sandbox)  │ │ (mkdir/prune│ │ (advisory │ │ (gzip pass- │
//!  │            │ │   empty)    │ │ exclusive)│ │  through)   │
//!  └────────────┘ └─────────────┘ └───────────┘ └─────────────┘
//!         │              │              │              │
//!         └──────────────┴──────┬───────┴──────────────┘
//!                               ▼
//!                     directory tree on disk
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use treekv::{create_store, drop_store};
//!
//! # fn main() -> treekv::Result<()> {
//! let (location, db) = create_store(None)?;
//!
//! db.put("level1/key/value", b"ifInOctets 134184170.0 342031\n")?;
//! db.append("level1/key/value", b"ifInOctets 134184189.0 342342\n")?;
//! assert_eq!(
//!     db.get("level1/key/value")?,
//!     b"ifInOctets 134184170.0 342031\nifInOctets 134184189.0 342342\n"
//! );
//!
//! for key in db.find(".*", Some("level1"), true)? {
//!     println!("{}", key?);
//! }
//!
//! db.delete("level1/key/value")?;
//! db.clean()?;
//! drop_store(&location)?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codec;
pub mod config;
pub mod error;
pub mod store;

mod lock;
mod maintenance;
mod resolver;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use codec::{CodecOptions, ValueHandle};
pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::{Result, StoreError};
pub use store::{create_store, drop_store, open_store, Find, OpenMode, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of treekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
