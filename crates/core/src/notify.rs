//! User-visible notifications raised by the core.

use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The 3D model finished processing and can be displayed.
    SplatReady,
    /// The image upload request failed.
    UploadFailed(String),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::SplatReady => write!(f, "3D model is now available"),
            Notification::UploadFailed(reason) => write!(f, "Failed to upload images: {}", reason),
        }
    }
}

/// Surface for toasts, banners or whatever the hosting UI uses.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log. Used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::SplatReady => info!(%notification, "Notification"),
            Notification::UploadFailed(_) => warn!(%notification, "Notification"),
        }
    }
}
