use std::sync::Arc;

use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::wrapper::ConnectionExt as _;

use crate::compositor;
use crate::config::Config;
use crate::connection::XConnection;
use crate::error::{OverlayError, Result};
use crate::scheduler::RedrawScheduler;
use crate::shm::{self, XShmHost};
use crate::source::SourceImage;
use crate::view::{SharedView, ViewState};
use crate::visual::{find_visual, DEPTH_WITH_ALPHA};

/// Server-side resources backing the overlay window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayResources {
    pub window: Window,
    /// Unset until the GC has been created.
    pub gc: Option<Gcontext>,
    pub colormap: Colormap,
    /// Set once the server reports the window destroyed.
    pub destroyed: bool,
}

/// One request needed to free an overlay resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    FreeGc(Gcontext),
    DestroyWindow(Window),
    FreeColormap(Colormap),
}

impl OverlayResources {
    /// Requests that free whatever exists, in order.
    pub fn teardown(&self) -> Vec<Teardown> {
        let mut steps = Vec::with_capacity(3);
        if let Some(gc) = self.gc {
            steps.push(Teardown::FreeGc(gc));
        }
        if !self.destroyed {
            steps.push(Teardown::DestroyWindow(self.window));
        }
        steps.push(Teardown::FreeColormap(self.colormap));
        steps
    }
}

/// Owns the connection, the window and the redraw thread.
pub struct ImageWindow {
    xconn: Arc<XConnection>,
    source: Arc<SourceImage>,
    config: Config,
    view: Arc<SharedView>,
    scheduler: Option<RedrawScheduler>,
    resources: Option<OverlayResources>,
}

impl ImageWindow {
    pub fn new(xconn: XConnection, source: SourceImage, opacity: f64, config: Config) -> Self {
        Self {
            xconn: Arc::new(xconn),
            source: Arc::new(source),
            config,
            view: Arc::new(SharedView::new(opacity)),
            scheduler: None,
            resources: None,
        }
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    pub fn xconn(&self) -> &XConnection {
        &self.xconn
    }

    pub fn resources(&self) -> Option<&OverlayResources> {
        self.resources.as_ref()
    }

    /// Create and map an ARGB window at the image's native size, then start
    /// the redraw thread.
    pub fn create_window(&mut self, title: &str) -> Result<()> {
        let xconn = &self.xconn;
        let conn = &xconn.conn;

        let visual_id = find_visual(&xconn.allowed_depths, DEPTH_WITH_ALPHA, VisualClass::TRUE_COLOR)
            .map(|v| v.visual_id)
            .ok_or(OverlayError::NoVisual)?;
        log::info!("Using visual 0x{:x} at depth {}", visual_id, DEPTH_WITH_ALPHA);

        let colormap = xconn.generate_id()?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, xconn.root, visual_id)?
            .check()?;

        let width = u16::try_from(self.source.width()).unwrap_or(u16::MAX);
        let height = u16::try_from(self.source.height()).unwrap_or(u16::MAX);

        // A depth-32 window under a depth-24 root needs its own colormap and
        // an explicit border pixel
        let window = xconn.generate_id()?;
        let created = conn.create_window(
            DEPTH_WITH_ALPHA,
            window,
            xconn.root,
            0,
            0,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            visual_id,
            &CreateWindowAux::new()
                .background_pixel(0)
                .border_pixel(0)
                .colormap(colormap)
                .event_mask(
                    EventMask::STRUCTURE_NOTIFY | EventMask::EXPOSURE | EventMask::BUTTON_PRESS,
                ),
        );
        if let Err(e) = created.map_err(ReplyError::from).and_then(|cookie| cookie.check()) {
            if let Err(free) = conn.free_colormap(colormap) {
                log::warn!("Failed to free colormap: {}", free);
            }
            return Err(e.into());
        }

        // From here on close() frees whatever was created
        self.resources = Some(OverlayResources {
            window,
            gc: None,
            colormap,
            destroyed: false,
        });

        self.view.resize(width, height);

        self.set_properties(window, title)?;

        let conn = &self.xconn.conn;
        conn.map_window(window)?.check()?;

        let gc = self.xconn.generate_id()?;
        conn.create_gc(gc, window, &CreateGCAux::new())?.check()?;
        if let Some(res) = self.resources.as_mut() {
            res.gc = Some(gc);
        }

        log::info!("Created {}x{} window 0x{:x}", width, height, window);

        let render = render_pass(
            Arc::clone(&self.xconn),
            Arc::clone(&self.source),
            window,
            gc,
        );
        self.scheduler = Some(RedrawScheduler::spawn(
            Arc::clone(&self.view),
            self.config.debounce(),
            render,
        )?);

        Ok(())
    }

    /// WM_CLASS, title and the WM_DELETE_WINDOW protocol.
    fn set_properties(&self, window: Window, title: &str) -> Result<()> {
        let conn = &self.xconn.conn;
        let atoms = &self.xconn.atoms;

        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            &self.config.wm_class_property(),
        )?
        .check()?;

        conn.change_property8(
            PropMode::REPLACE,
            window,
            atoms._NET_WM_NAME,
            atoms.UTF8_STRING,
            title.as_bytes(),
        )?
        .check()?;
        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            title.as_bytes(),
        )?
        .check()?;
        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.WM_PROTOCOLS,
            AtomEnum::ATOM,
            &[atoms.WM_DELETE_WINDOW],
        )?
        .check()?;

        Ok(())
    }

    /// Ask for a debounced render of the current view. Requests made before
    /// the window exists are picked up when the redraw thread starts.
    pub fn request_redraw(&self) {
        match &self.scheduler {
            Some(scheduler) => scheduler.request_redraw(),
            None => self.view.request_redraw(self.config.debounce()),
        }
    }

    /// Block for the next event. Connection loss is fatal.
    pub fn wait_for_event(&self) -> Result<Event> {
        self.xconn
            .conn
            .wait_for_event()
            .map_err(OverlayError::ConnectionLost)
    }

    /// Destroy the window in response to a close request; the loop ends on
    /// the resulting DestroyNotify.
    pub fn destroy(&self) -> Result<()> {
        if let Some(res) = &self.resources {
            self.xconn.conn.destroy_window(res.window)?;
            self.xconn.flush()?;
        }
        Ok(())
    }

    pub fn mark_destroyed(&mut self) {
        if let Some(res) = self.resources.as_mut() {
            res.destroyed = true;
        }
    }

    /// Stop the redraw thread, waiting out any in-flight render, then free
    /// server resources and drop the connection.
    pub fn close(mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }

        if let Err(e) = self.release() {
            log::warn!("Failed to release window resources: {}", e);
        }

        log::info!("Closed at opacity {:.2}", self.view.snapshot().opacity);
    }

    fn release(&mut self) -> Result<()> {
        let res = match self.resources.take() {
            Some(res) => res,
            None => return Ok(()),
        };

        let conn = &self.xconn.conn;
        for step in res.teardown() {
            match step {
                Teardown::FreeGc(gc) => conn.free_gc(gc)?,
                Teardown::DestroyWindow(window) => conn.destroy_window(window)?,
                Teardown::FreeColormap(colormap) => conn.free_colormap(colormap)?,
            };
        }
        self.xconn.flush()?;
        Ok(())
    }
}

/// One render pass: scale and mask the source for the snapshot, then push it
/// through shared memory. Runs without the view lock held.
fn render_pass(
    xconn: Arc<XConnection>,
    source: Arc<SourceImage>,
    window: Window,
    gc: Gcontext,
) -> impl FnMut(ViewState) -> Result<()> + Send + 'static {
    move |state| {
        let (width, height) = match state.size {
            Some(size) => size,
            None => {
                log::debug!("Window size unknown, skipping frame");
                return Ok(());
            }
        };

        let frame = match compositor::render(&source, width, height, state.opacity, xconn.pixel_layout) {
            Some(frame) => frame,
            None => {
                log::debug!("Empty target {}x{}, nothing to draw", width, height);
                return Ok(());
            }
        };

        let host = XShmHost {
            conn: &xconn.conn,
            drawable: window,
            gc,
            depth: DEPTH_WITH_ALPHA,
        };
        shm::transfer(&host, &frame)
    }
}
