// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for device capture loops
//!
//! Synthetic cameras and microphones produce their data on a dedicated
//! thread each. The controller owns that thread, paces it, and joins it on
//! stop or drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// ```ignore
/// let controller = CaptureLoopController::start_paced("virtual-camera", period, move |tick| {
///     if sink.is_closed() {
///         return LoopAction::Stop;
///     }
///     sink.deliver(render(tick));
///     LoopAction::Continue
/// })?;
/// ```
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Run `loop_fn` back to back until it returns `LoopAction::Stop` or the
    /// controller is stopped.
    pub fn start<F>(name: &str, mut loop_fn: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn(name, move |stop: &AtomicBool| {
            while !stop.load(Ordering::SeqCst) {
                if loop_fn() == LoopAction::Stop {
                    return;
                }
            }
        })
    }

    /// Run `loop_fn` once per `period`, passing the iteration number.
    ///
    /// Iterations are scheduled against a fixed start instant, so a slow
    /// iteration does not push every later one back.
    pub fn start_paced<F>(name: &str, period: Duration, mut loop_fn: F) -> std::io::Result<Self>
    where
        F: FnMut(u64) -> LoopAction + Send + 'static,
    {
        Self::spawn(name, move |stop: &AtomicBool| {
            let started = Instant::now();
            let mut tick: u64 = 0;
            while !stop.load(Ordering::SeqCst) {
                if loop_fn(tick) == LoopAction::Stop {
                    return;
                }
                tick += 1;
                let due = started + period.saturating_mul(tick as u32);
                // Sleep in short slices so stop() stays responsive
                while !stop.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    if now >= due {
                        break;
                    }
                    thread::sleep((due - now).min(Duration::from_millis(10)));
                }
            }
        })
    }

    fn spawn<B>(name: &str, body: B) -> std::io::Result<Self>
    where
        B: FnOnce(&AtomicBool) + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Capture loop thread started");
                body(&thread_stop);
                info!(name = %thread_name, "Capture loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}
