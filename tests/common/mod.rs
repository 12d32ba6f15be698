// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared test utilities for integration and property tests.
//!
//! This module provides:
//! - Mock `Collection` recording calls, with failure injection
//! - Item and timestamp builders

#![allow(dead_code)]

pub mod mock_collection;

pub use mock_collection::*;

use chrono::{Duration, TimeZone, Utc};
use collection_sync::{SyncItem, Timestamp};

/// Midnight UTC on the given date.
pub fn date(year: i32, month: u32, day: u32) -> Timestamp {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// `days` after 2020-01-01.
pub fn day(days: i64) -> Timestamp {
    date(2020, 1, 1) + Duration::days(days)
}

/// A person document, as stored by the example collections.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Person {
    pub name: String,
    pub age: u32,
}

impl Person {
    pub fn new(name: &str, age: u32) -> Self {
        Self {
            name: name.to_string(),
            age,
        }
    }
}

pub fn person(id: &str, name: &str, at: Timestamp) -> SyncItem<Person> {
    SyncItem::new(id, Person::new(name, 30), at)
}

pub fn numbered(id: i64, at: Timestamp) -> SyncItem<Person> {
    SyncItem::new(id, Person::new(&format!("person {}", id), 20), at)
}
