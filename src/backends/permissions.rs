// SPDX-License-Identifier: GPL-3.0-only

//! Camera and microphone access
//!
//! Requests are asynchronous; the session worker never blocks waiting for
//! the user to answer a prompt.

use futures::future::{self, BoxFuture, FutureExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Granted,
    Denied,
}

impl AccessStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessStatus::Granted)
    }
}

impl From<bool> for AccessStatus {
    fn from(granted: bool) -> Self {
        if granted {
            AccessStatus::Granted
        } else {
            AccessStatus::Denied
        }
    }
}

/// Platform permission prompt
pub trait PermissionProvider: Send + Sync {
    fn request_camera_access(&self) -> BoxFuture<'static, AccessStatus>;

    fn request_microphone_access(&self) -> BoxFuture<'static, AccessStatus>;
}

/// Fixed answers, changeable at runtime
///
/// Used by the CLI (where nobody can be asked) and by tests that revoke
/// access between calls.
#[derive(Debug, Clone)]
pub struct StaticPermissions {
    camera: Arc<AtomicBool>,
    microphone: Arc<AtomicBool>,
}

impl StaticPermissions {
    pub fn new(camera: bool, microphone: bool) -> Self {
        Self {
            camera: Arc::new(AtomicBool::new(camera)),
            microphone: Arc::new(AtomicBool::new(microphone)),
        }
    }

    pub fn granted() -> Self {
        Self::new(true, true)
    }

    pub fn set_camera(&self, granted: bool) {
        self.camera.store(granted, Ordering::SeqCst);
    }

    pub fn set_microphone(&self, granted: bool) {
        self.microphone.store(granted, Ordering::SeqCst);
    }
}

impl Default for StaticPermissions {
    fn default() -> Self {
        Self::granted()
    }
}

impl PermissionProvider for StaticPermissions {
    fn request_camera_access(&self) -> BoxFuture<'static, AccessStatus> {
        future::ready(AccessStatus::from(self.camera.load(Ordering::SeqCst))).boxed()
    }

    fn request_microphone_access(&self) -> BoxFuture<'static, AccessStatus> {
        future::ready(AccessStatus::from(self.microphone.load(Ordering::SeqCst))).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_follow_runtime_changes() {
        let permissions = StaticPermissions::new(true, false);
        let camera = futures::executor::block_on(permissions.request_camera_access());
        let mic = futures::executor::block_on(permissions.request_microphone_access());
        assert_eq!(camera, AccessStatus::Granted);
        assert_eq!(mic, AccessStatus::Denied);

        permissions.set_camera(false);
        let camera = futures::executor::block_on(permissions.request_camera_access());
        assert!(!camera.is_granted());
    }
}
