// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bundled collection and watermark stores.
//!
//! | Store | Implements | Durable |
//! |-------|------------|---------|
//! | [`memory::MemoryCollection`] | `Collection` | No |
//! | [`sqlite::SqliteSyncMetadata`] | `CollectionSyncMetadata` | Yes (WAL) |
//! | [`json_file::JsonFileSyncMetadata`] | `CollectionSyncMetadata` | Yes |

pub mod json_file;
pub mod memory;
pub mod sqlite;
