//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `QueueStatus`: the lifecycle of one crawl queue row

mod queue_status;

pub use queue_status::QueueStatus;
