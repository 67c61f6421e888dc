use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What the next frame should look like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Window size; unset until the window is created or first configured.
    pub size: Option<(u16, u16)>,
}

#[derive(Debug)]
struct RedrawRequest {
    dirty: bool,
    not_before: Instant,
}

#[derive(Debug)]
struct Inner {
    view: ViewState,
    redraw: RedrawRequest,
    shutdown: bool,
}

/// View state and the pending redraw, shared by the event loop and the
/// redraw thread.
///
/// Every method takes the single internal lock for its whole duration and
/// releases it before returning, so none may be called with the lock held.
#[derive(Debug)]
pub struct SharedView {
    inner: Mutex<Inner>,
    wake: Condvar,
}

impl SharedView {
    pub fn new(opacity: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                view: ViewState {
                    opacity: opacity.clamp(0.0, 1.0),
                    size: None,
                },
                redraw: RedrawRequest {
                    dirty: false,
                    not_before: Instant::now(),
                },
                shutdown: false,
            }),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State stays consistent across a panicking holder
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ViewState {
        self.lock().view
    }

    /// Record a new window size. Returns whether it changed.
    pub fn resize(&self, width: u16, height: u16) -> bool {
        let mut inner = self.lock();
        if inner.view.size == Some((width, height)) {
            return false;
        }
        inner.view.size = Some((width, height));
        true
    }

    /// Map a click at `x` to an opacity proportional to its position across
    /// the window. Returns the new opacity, or `None` while the width is
    /// unknown.
    pub fn click(&self, x: i16) -> Option<f64> {
        let mut inner = self.lock();
        let width = match inner.view.size {
            Some((w, _)) if w > 0 => w,
            _ => return None,
        };
        let x = (x.max(0) as u16).min(width);
        let opacity = x as f64 / width as f64;
        inner.view.opacity = opacity;
        Some(opacity)
    }

    /// Mark the view dirty and push the earliest render time out to
    /// `debounce` from now.
    pub fn request_redraw(&self, debounce: Duration) {
        let mut inner = self.lock();
        inner.redraw.dirty = true;
        inner.redraw.not_before = Instant::now() + debounce;
        drop(inner);
        self.wake.notify_all();
    }

    #[cfg(test)]
    pub fn is_dirty(&self) -> bool {
        self.lock().redraw.dirty
    }

    /// Block until a requested redraw is due, then clear it and return the
    /// view to render. Returns `None` once shut down.
    pub fn next_frame(&self) -> Option<ViewState> {
        let mut inner = self.lock();
        loop {
            if inner.shutdown {
                return None;
            }

            if !inner.redraw.dirty {
                inner = self.wake.wait(inner).unwrap_or_else(PoisonError::into_inner);
                continue;
            }

            let now = Instant::now();
            if now >= inner.redraw.not_before {
                inner.redraw.dirty = false;
                return Some(inner.view);
            }

            let timeout = inner.redraw.not_before - now;
            inner = match self.wake.wait_timeout(inner, timeout) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Wake and stop any thread blocked in `next_frame`.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.wake.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_opacity_clamped() {
        assert_eq!(SharedView::new(1.7).snapshot().opacity, 1.0);
        assert_eq!(SharedView::new(-0.2).snapshot().opacity, 0.0);
    }

    #[test]
    fn test_resize_reports_change_only() {
        let view = SharedView::new(0.5);
        assert!(view.resize(400, 100));
        assert!(!view.resize(400, 100));
        assert!(view.resize(100, 400));
        assert_eq!(view.snapshot().size, Some((100, 400)));
    }

    #[test]
    fn test_click_maps_position_to_opacity() {
        let view = SharedView::new(0.5);
        assert_eq!(view.click(10), None);

        view.resize(400, 100);
        assert_eq!(view.click(100), Some(0.25));
        assert_eq!(view.snapshot().opacity, 0.25);
        assert_eq!(view.click(-30), Some(0.0));
        assert_eq!(view.click(900), Some(1.0));
    }

    #[test]
    fn test_next_frame_waits_for_deadline() {
        let view = SharedView::new(0.5);
        let requested = Instant::now();
        view.request_redraw(Duration::from_millis(30));
        assert!(view.is_dirty());

        let frame = view.next_frame();
        assert!(frame.is_some());
        assert!(requested.elapsed() >= Duration::from_millis(30));
        assert!(!view.is_dirty());
    }

    #[test]
    fn test_shutdown_releases_waiter() {
        let view = SharedView::new(0.5);
        view.shutdown();
        view.request_redraw(Duration::ZERO);
        assert_eq!(view.next_frame(), None);
    }
}
