//! Telehealth Session Core
//!
//! Shared state for a two-party doctor/patient session: the data model, the
//! typed event bus, the observable session store and the splat status
//! reconciler that merges push and poll signals about the 3D reconstruction job.

pub mod config;
pub mod events;
pub mod model;
pub mod notify;
pub mod splat;
pub mod store;

/// Text a client sends to its peer after a successful image upload.
pub const UPLOAD_ANNOUNCEMENT: &str = "I've uploaded images for 3D modeling";
