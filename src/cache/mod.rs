//! Client-side query cache
//!
//! Generic key-value store the todo client builds on. Values are cached
//! under hierarchical `QueryKey`s together with freshness metadata,
//! in-flight fetch claims and subscriber lists.
//!
//! # Entry States
//!
//! | State | `read` | `is_stale` | Description |
//! |-------|--------|------------|-------------|
//! | Missing | `None` | true | Never fetched, removed, or collected |
//! | Fresh | value | false | Written within `stale_time` |
//! | Stale | value | true | Invalidated or older than `stale_time` |
//! | Fetching | unchanged | unchanged | Claimed by a `FetchTicket` |

mod gc;
mod key;
mod store;
mod subscription;

pub use gc::spawn_gc;
pub use key::QueryKey;
pub use store::{Batch, CacheStore, FetchTicket};
pub use subscription::Subscription;
