//! Splat Job Tracking
//!
//! The 3D reconstruction job is only observable through a tri-state status.
//! Two uncoordinated signals report on it: in-band push notifications on the
//! transport and a periodic poll of the artifact resource. This module merges
//! them into the store's `splat_status` field.
//!
//! - `reconciler`: the forward-only transition rules and the ready notification.
//! - `source`: the poll resource client and response classification.
//! - `upload`: the image upload trigger.
//! - `poller`: the interval task driving the source.

pub mod poller;
pub mod reconciler;
pub mod source;
pub mod upload;

pub use poller::{PollerHandle, spawn_poller};
pub use reconciler::{Signal, SplatReconciler, next_status};
pub use source::{HttpStatusSource, PollError, PollOutcome, SplatStatusSource};
pub use upload::{HttpUploader, SplatUploader, UploadError};

use crate::model::SplatStatus;
use chrono::{DateTime, Utc};

pub const GET_SPLAT_PATH: &str = "/api/get-splat";
pub const UPLOAD_PATH: &str = "/api/splat";

/// Joins the API base and a path without doubling the separator.
pub(crate) fn endpoint(api_base_url: &str, path: &str) -> String {
    format!("{}{}", api_base_url.trim_end_matches('/'), path)
}

/// URL the 3D viewer should load, or `None` while no model is ready. The
/// timestamp parameter defeats caches so a regenerated model is refetched.
pub fn model_url(api_base_url: &str, status: SplatStatus, at: DateTime<Utc>) -> Option<String> {
    match status {
        SplatStatus::Done => Some(format!(
            "{}?t={}",
            endpoint(api_base_url, GET_SPLAT_PATH),
            at.timestamp_millis()
        )),
        SplatStatus::Unavailable | SplatStatus::Processing => None,
    }
}
