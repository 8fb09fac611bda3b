//! State module for tracking crawl progress
//!
//! This module provides the transient state of a single crawl attempt.
//!
//! # Components
//!
//! - `TraversalState`: Where the traversal engine is in its page loop
//! - `SeenIndex`: Registration numbers already in the store, rebuilt per attempt

mod seen_index;
mod traversal_state;

// Re-export main types
pub use seen_index::SeenIndex;
pub use traversal_state::TraversalState;
