// gtc-common - Shared utility helpers for the GTC workspace
//
// Filesystem predicates, slice/string membership, digests and lenient
// boolean parsing. Nothing here talks to the network.

pub mod boolean;
pub mod error;
pub mod fs;
pub mod hash;
pub mod strings;

// Re-export for convenience
pub use boolean::*;
pub use error::*;
pub use fs::*;
pub use hash::*;
pub use strings::*;
