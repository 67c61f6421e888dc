use x11rb::protocol::xproto::Window;
use x11rb::protocol::Event;

use crate::connection::Atoms;
use crate::error::Result;
use crate::view::SharedView;
use crate::window::ImageWindow;

/// What an X event means for the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Window was configured to this size.
    Resize(u16, u16),
    /// Pointer button pressed at this x coordinate.
    Click(i16),
    /// Window manager asked us to close.
    CloseRequested,
    /// Window is gone.
    Destroyed,
    /// Nothing to do.
    None,
}

/// Whether the event loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
    Exit,
}

/// Classify an event addressed to `window`.
pub fn translate(event: &Event, window: Window, atoms: &Atoms) -> Intent {
    match event {
        Event::ConfigureNotify(e) if e.window == window => Intent::Resize(e.width, e.height),
        Event::ButtonPress(e) if e.event == window => Intent::Click(e.event_x),
        Event::DestroyNotify(e) if e.window == window => Intent::Destroyed,
        Event::ClientMessage(e)
            if e.window == window
                && e.format == 32
                && e.type_ == atoms.WM_PROTOCOLS
                && e.data.as_data32()[0] == atoms.WM_DELETE_WINDOW =>
        {
            Intent::CloseRequested
        }
        Event::Error(e) => {
            log::warn!("X error: {:?}", e);
            Intent::None
        }
        _ => {
            log::trace!("Ignoring event: {:?}", event);
            Intent::None
        }
    }
}

/// Update the view for `intent`, requesting a redraw when it changed.
pub fn apply<F: Fn()>(intent: Intent, view: &SharedView, request_redraw: F) -> Flow {
    match intent {
        Intent::Resize(width, height) => {
            if view.resize(width, height) {
                log::debug!("Resized to {}x{}", width, height);
                request_redraw();
            }
            Flow::Continue
        }
        Intent::Click(x) => {
            if let Some(opacity) = view.click(x) {
                log::debug!("Click at x={}, opacity {:.3}", x, opacity);
                request_redraw();
            }
            Flow::Continue
        }
        Intent::CloseRequested => Flow::Close,
        Intent::Destroyed => Flow::Exit,
        Intent::None => Flow::Continue,
    }
}

/// Pull events until the window is destroyed.
pub fn run(overlay: &mut ImageWindow) -> Result<()> {
    let window = match overlay.resources() {
        Some(res) => res.window,
        None => return Ok(()),
    };

    loop {
        let event = overlay.wait_for_event()?;
        let intent = translate(&event, window, &overlay.xconn().atoms);

        match apply(intent, overlay.view(), || overlay.request_redraw()) {
            Flow::Continue => {}
            Flow::Close => {
                log::info!("Close requested");
                overlay.destroy()?;
            }
            Flow::Exit => {
                log::info!("Window destroyed");
                overlay.mark_destroyed();
                return Ok(());
            }
        }
    }
}
