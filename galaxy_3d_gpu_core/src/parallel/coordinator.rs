/// Parallel render coordinator
///
/// Strict alternation between the update thread (producer) and a dedicated
/// render thread (consumer):
///
/// ```text
/// update thread : update K  | kick K | update K+1 | wait_idle K | present K | kick K+1 ...
/// render thread :           | render K ------------------------> Idle      | render K+1 ...
/// ```
///
/// The update of frame K+1 overlaps the render of frame K. Render submissions
/// never overlap each other, and the present of frame K waits for frame K's
/// submission to complete.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// Handoff state between the update and render threads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// No frame is being rendered; the update thread may present
    Idle,
    /// The render thread owns the current frame
    Processing,
}

struct Shared {
    state: RenderState,
    stop: bool,
    error: Option<Error>,
    frames_rendered: u64,
}

struct Handoff {
    shared: Mutex<Shared>,
    cond: Condvar,
}

/// Owner of the render thread
pub struct ParallelRenderCoordinator {
    handoff: Arc<Handoff>,
    thread: Option<JoinHandle<()>>,
}

impl ParallelRenderCoordinator {
    /// Start the render thread
    ///
    /// `render` is invoked once per `kick`, on the render thread. An error it
    /// returns is handed to the next `wait_idle`.
    ///
    /// # Errors
    ///
    /// Returns `InitializationFailed` when the thread cannot be spawned.
    pub fn spawn<F>(render: F) -> Result<Self>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let handoff = Arc::new(Handoff {
            shared: Mutex::new(Shared {
                state: RenderState::Idle,
                stop: false,
                error: None,
                frames_rendered: 0,
            }),
            cond: Condvar::new(),
        });

        let thread_handoff = handoff.clone();
        let thread = std::thread::Builder::new()
            .name("galaxy3d-render".to_string())
            .spawn(move || render_loop(&thread_handoff, render))
            .map_err(|e| {
                Error::InitializationFailed(format!("cannot spawn render thread: {}", e))
            })?;

        crate::gpu_debug!("galaxy3d::ParallelRenderCoordinator", "Render thread started");

        Ok(Self {
            handoff,
            thread: Some(thread),
        })
    }

    /// Hand the current frame to the render thread
    ///
    /// # Panics
    ///
    /// Panics if the previous frame has not been waited for with `wait_idle`.
    pub fn kick(&self) {
        let mut shared = self.handoff.shared.lock();
        assert_eq!(
            shared.state,
            RenderState::Idle,
            "kick while the render thread is still processing"
        );
        shared.state = RenderState::Processing;
        self.handoff.cond.notify_all();
    }

    /// Block until the render thread is idle
    ///
    /// # Errors
    ///
    /// Returns the error the last render submission failed with, if any.
    pub fn wait_idle(&self) -> Result<()> {
        let mut shared = self.handoff.shared.lock();
        self.handoff
            .cond
            .wait_while(&mut shared, |s| s.state == RenderState::Processing);
        match shared.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> RenderState {
        self.handoff.shared.lock().state
    }

    /// Number of frames the render thread has completed
    pub fn frames_rendered(&self) -> u64 {
        self.handoff.shared.lock().frames_rendered
    }

    /// Stop the render thread and join it
    ///
    /// A frame being rendered is finished first; stop is only observed when
    /// the render thread waits for its next frame.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        {
            let mut shared = self.handoff.shared.lock();
            shared.stop = true;
            self.handoff.cond.notify_all();
        }
        if thread.join().is_err() {
            crate::gpu_error!(
                "galaxy3d::ParallelRenderCoordinator",
                "Render thread panicked"
            );
        } else {
            crate::gpu_debug!("galaxy3d::ParallelRenderCoordinator", "Render thread joined");
        }
    }
}

impl Drop for ParallelRenderCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn render_loop<F>(handoff: &Handoff, mut render: F)
where
    F: FnMut() -> Result<()>,
{
    loop {
        {
            let mut shared = handoff.shared.lock();
            handoff
                .cond
                .wait_while(&mut shared, |s| !s.stop && s.state != RenderState::Processing);
            if shared.stop {
                // A frame kicked but never started is dropped
                shared.state = RenderState::Idle;
                handoff.cond.notify_all();
                break;
            }
        }

        // Rendered without the lock; a panic becomes the error of wait_idle
        let result = panic::catch_unwind(AssertUnwindSafe(&mut render)).unwrap_or_else(|_| {
            Err(Error::InvalidState("render submission panicked".to_string()))
        });

        let mut shared = handoff.shared.lock();
        if let Err(error) = result {
            crate::gpu_error!(
                "galaxy3d::ParallelRenderCoordinator",
                "Render submission failed: {}",
                error
            );
            shared.error = Some(error);
        }
        shared.frames_rendered += 1;
        shared.state = RenderState::Idle;
        handoff.cond.notify_all();
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
