use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::Result;
use crate::view::{SharedView, ViewState};

/// Trailing-edge debounced redraws on a background thread.
///
/// Each request pushes the deadline out by the debounce window, so a burst
/// of requests produces one render once input goes quiet. Only this thread
/// ever renders, so at most one pass is in flight.
pub struct RedrawScheduler {
    view: Arc<SharedView>,
    debounce: Duration,
    handle: Option<JoinHandle<()>>,
}

impl RedrawScheduler {
    pub fn spawn<F>(view: Arc<SharedView>, debounce: Duration, mut render: F) -> Result<Self>
    where
        F: FnMut(ViewState) -> Result<()> + Send + 'static,
    {
        let shared = Arc::clone(&view);
        let handle = thread::Builder::new()
            .name("redraw".to_string())
            .spawn(move || {
                while let Some(state) = shared.next_frame() {
                    log::debug!("Redraw firing: {:?}", state);
                    // A dropped frame is retried by the next request
                    if let Err(e) = render(state) {
                        log::warn!("Render failed, frame dropped: {}", e);
                    }
                }
                log::debug!("Redraw loop exited");
            })?;

        Ok(Self {
            view,
            debounce,
            handle: Some(handle),
        })
    }

    /// Schedule a render `debounce` after the latest request. Safe from any
    /// thread.
    pub fn request_redraw(&self) {
        self.view.request_redraw(self.debounce);
    }

    /// Stop the loop and wait for an in-flight render to finish.
    pub fn shutdown(&mut self) {
        self.view.shutdown();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Redraw thread panicked");
            }
        }
    }
}

impl Drop for RedrawScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
