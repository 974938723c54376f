//! Scheduled cache of cryptocurrency market data.
//!
//! Background tasks pull market, global, trending, metadata and news data on
//! independent cadences and publish each category as an atomically swapped
//! snapshot in a [`cache::CacheStore`]. Readers only ever see the last
//! successfully committed value of a category.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod refresh;
pub mod scheduler;
pub mod sparkline;
pub mod storage;
pub mod time_util;
