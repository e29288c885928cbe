// SPDX-License-Identifier: GPL-3.0-only

//! Per-device hardware controls behind an exclusive configuration lock
//!
//! Focus, exposure, zoom and torch live on the device, not on the session.
//! Writers take [`DeviceControls::lock_for_configuration`], change what they
//! need and drop the guard; the device thread reads a [`DeviceSettings`]
//! snapshot once per frame, so every change applies from the next frame.

use super::types::{BackendError, BackendResult};
use std::sync::{Mutex, MutexGuard};

/// What a device supports
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceCapabilities {
    pub focus_point_of_interest: bool,
    pub exposure_point_of_interest: bool,
    pub has_torch: bool,
    /// Largest zoom factor; 1.0 means no zoom
    pub max_zoom: f32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            focus_point_of_interest: true,
            exposure_point_of_interest: true,
            has_torch: true,
            max_zoom: 5.0,
        }
    }
}

/// A point in normalized frame coordinates, both axes in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    /// Clamp onto the unit square; NaN becomes the center
    pub fn new(x: f32, y: f32) -> Self {
        let clamp = |v: f32| if v.is_nan() { 0.5 } else { v.clamp(0.0, 1.0) };
        Self {
            x: clamp(x),
            y: clamp(y),
        }
    }

    pub fn center() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    #[default]
    ContinuousAuto,
    /// One-shot autofocus at the point of interest
    AutoAtPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExposureMode {
    #[default]
    ContinuousAuto,
    /// Meter at the point of interest
    AutoAtPoint,
}

/// Current hardware settings of one device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSettings {
    pub focus_mode: FocusMode,
    pub focus_point: Option<NormalizedPoint>,
    pub exposure_mode: ExposureMode,
    pub exposure_point: Option<NormalizedPoint>,
    pub zoom: f32,
    pub torch: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            focus_mode: FocusMode::default(),
            focus_point: None,
            exposure_mode: ExposureMode::default(),
            exposure_point: None,
            zoom: 1.0,
            torch: false,
        }
    }
}

/// Which parts of a focus request the device honored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusOutcome {
    pub focus_applied: bool,
    pub exposure_applied: bool,
}

/// Shared control block of one device
#[derive(Debug, Default)]
pub struct DeviceControls {
    capabilities: DeviceCapabilities,
    settings: Mutex<DeviceSettings>,
}

impl DeviceControls {
    pub fn new(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            settings: Mutex::new(DeviceSettings::default()),
        }
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    /// Take the exclusive configuration lock
    pub fn lock_for_configuration(&self) -> BackendResult<ConfigurationLock<'_>> {
        let guard = self
            .settings
            .lock()
            .map_err(|_| BackendError::Busy("device configuration lock poisoned".into()))?;
        Ok(ConfigurationLock {
            capabilities: self.capabilities,
            settings: guard,
        })
    }

    /// Settings as of now
    pub fn snapshot(&self) -> DeviceSettings {
        match self.settings.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Exclusive access to a device's settings; released on drop
pub struct ConfigurationLock<'a> {
    capabilities: DeviceCapabilities,
    settings: MutexGuard<'a, DeviceSettings>,
}

impl ConfigurationLock<'_> {
    /// Focus and meter at `point`, where supported
    pub fn focus_at(&mut self, point: NormalizedPoint) -> FocusOutcome {
        let mut outcome = FocusOutcome::default();
        if self.capabilities.focus_point_of_interest {
            self.settings.focus_point = Some(point);
            self.settings.focus_mode = FocusMode::AutoAtPoint;
            outcome.focus_applied = true;
        }
        if self.capabilities.exposure_point_of_interest {
            self.settings.exposure_point = Some(point);
            self.settings.exposure_mode = ExposureMode::AutoAtPoint;
            outcome.exposure_applied = true;
        }
        outcome
    }

    /// Set zoom, clamped to `[1, max_zoom]`. Returns the applied factor.
    pub fn set_zoom(&mut self, factor: f32) -> f32 {
        let max = self.capabilities.max_zoom.max(1.0);
        let applied = if factor.is_nan() {
            1.0
        } else {
            factor.clamp(1.0, max)
        };
        self.settings.zoom = applied;
        applied
    }

    /// Switch the torch. Returns whether it is now on.
    pub fn set_torch(&mut self, on: bool) -> bool {
        if !self.capabilities.has_torch {
            return false;
        }
        self.settings.torch = on;
        on
    }

    pub fn settings(&self) -> DeviceSettings {
        *self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_clamped_to_device_range() {
        let controls = DeviceControls::new(DeviceCapabilities {
            max_zoom: 3.0,
            ..Default::default()
        });
        let mut lock = controls.lock_for_configuration().unwrap();
        assert_eq!(lock.set_zoom(10.0), 3.0);
        assert_eq!(lock.set_zoom(0.2), 1.0);
        assert_eq!(lock.set_zoom(f32::NAN), 1.0);
        assert_eq!(lock.set_zoom(2.5), 2.5);
        drop(lock);
        assert_eq!(controls.snapshot().zoom, 2.5);
    }

    #[test]
    fn torch_requires_hardware() {
        let controls = DeviceControls::new(DeviceCapabilities {
            has_torch: false,
            ..Default::default()
        });
        assert!(!controls.lock_for_configuration().unwrap().set_torch(true));
        assert!(!controls.snapshot().torch);
    }

    #[test]
    fn focus_only_where_supported() {
        let controls = DeviceControls::new(DeviceCapabilities {
            focus_point_of_interest: false,
            ..Default::default()
        });
        let outcome = controls
            .lock_for_configuration()
            .unwrap()
            .focus_at(NormalizedPoint::new(2.0, -1.0));
        assert!(!outcome.focus_applied);
        assert!(outcome.exposure_applied);

        let settings = controls.snapshot();
        assert_eq!(settings.focus_point, None);
        assert_eq!(settings.exposure_point, Some(NormalizedPoint::new(1.0, 0.0)));
        assert_eq!(settings.exposure_mode, ExposureMode::AutoAtPoint);
    }
}
