//! ipcc - IP-Range-to-Country-Code Lookup Engine
//!
//! ipcc maintains disjoint, mergeable IP address ranges tagged with a
//! two-letter country code and serializes them into compact binary sorted
//! tables (one per address family) that a query-time process searches by
//! bisection, without ever rebuilding a tree.
//!
//! # Quick Start
//!
//! ```rust
//! use ipcc::{CodeWord, RangeTree, Record, SortedTable, V4Record};
//! use ipcc::table::write_table;
//!
//! // Ingestion: build a balanced tree of ranges, merging as we go
//! let us: CodeWord = "US".parse()?;
//! let ca: CodeWord = "CA".parse()?;
//! let mut tree = RangeTree::new();
//! tree.add(u32::from(std::net::Ipv4Addr::new(10, 0, 0, 0)),
//!          u32::from(std::net::Ipv4Addr::new(10, 0, 0, 255)), us);
//! tree.add(u32::from(std::net::Ipv4Addr::new(10, 0, 1, 0)),
//!          u32::from(std::net::Ipv4Addr::new(10, 0, 1, 255)), us);
//! assert_eq!(tree.len(), 1); // adjacent same-country ranges merge
//! tree.add(u32::from(std::net::Ipv4Addr::new(172, 16, 0, 0)),
//!          u32::from(std::net::Ipv4Addr::new(172, 16, 255, 255)), ca);
//!
//! // Serialize the in-order traversal to a flat sorted table
//! let mut bytes = Vec::new();
//! write_table::<V4Record>(&tree, &mut bytes)?;
//! let path = std::env::temp_dir().join("ipcc_doctest.v4");
//! std::fs::write(&path, bytes)?;
//!
//! // Query: mmap the table and bisect, no tree in sight
//! let table = SortedTable::<V4Record>::open(&path)?.expect("table exists");
//! let hit = table.lookup(u32::from(std::net::Ipv4Addr::new(10, 0, 1, 7)));
//! assert_eq!(hit.map(|r| r.code()), Some(us));
//! # std::fs::remove_file(&path)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ingestion pass                          query pass
//! ┌─────────────────────────┐            ┌──────────────────────────┐
//! │ RangeTree (interval AVL)│            │ SortedTable (mmap)       │
//! │  add → merge/split      │  .v4/.v6   │  bisection search        │
//! │  in-order serialization ├───────────▶│  subnet decomposition    │
//! └─────────────────────────┘            └──────────────────────────┘
//! ```
//!
//! One tree engine serves three key shapes: 32-bit IPv4 bounds, 128-bit
//! IPv6 bounds ([`U128`]), and country code-words (exact-match point
//! intervals inside [`CodeTable`]'s hash buckets).

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
/// Country code-words and the bucket table of per-code values
pub mod country;
/// Error types for ipcc operations
pub mod error;
/// Balanced search tree over address ranges
pub mod range_tree;
/// Subnet (CIDR) decomposition of ranges
pub mod subnet;
/// Binary sorted table serialization, loading and bisection
pub mod table;
/// Two-limb 128-bit unsigned arithmetic
pub mod wide;

// Re-exports for the common path

pub use crate::country::{offset_value, CodeTable, CodeWord};
pub use crate::error::{Error, Result};
pub use crate::range_tree::{Range, RangeKey, RangeTree};
pub use crate::subnet::subnets;
pub use crate::table::{Record, SortedTable, V4Record, V6Record};
pub use crate::wide::U128;

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
