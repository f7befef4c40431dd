//! Host document model
//!
//! - `node.rs` - Document over an ego_tree of scraper nodes, NodeId slots
//! - `html.rs` - HTML import (scraper) and serialization
//! - `selector.rs` - scraper selectors compiled from catalog strings
//! - `transaction.rs` - Invertible overlay transactions
//! - `patch.rs` - Patch journal for hosts, host mutation records

pub mod node;
pub mod html;
pub mod selector;
pub mod transaction;
pub mod patch;

pub use node::*;
pub use patch::*;
pub use selector::*;
pub use transaction::*;
