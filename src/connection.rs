use x11rb::atom_manager;
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::shm;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::compositor::PixelLayout;
use crate::error::{OverlayError, Result};

atom_manager! {
    pub Atoms: AtomsCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        _NET_WM_NAME,
        UTF8_STRING,
    }
}

pub struct XConnection {
    pub conn: RustConnection,
    pub atoms: Atoms,
    pub root: Window,
    pub allowed_depths: Vec<Depth>,
    pub pixel_layout: PixelLayout,
}

impl XConnection {
    pub fn new() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let setup = conn.setup();
        let screen = &setup.roots[screen_num];

        let atoms = Atoms::new(&conn)?.reply()?;

        // MIT-SHM carries every frame, so it is mandatory
        if conn.extension_information(shm::X11_EXTENSION_NAME)?.is_none() {
            return Err(OverlayError::NoShm);
        }
        let shm_version = shm::query_version(&conn)?.reply()?;
        log::info!(
            "MIT-SHM extension version {}.{}",
            shm_version.major_version,
            shm_version.minor_version
        );

        let pixel_layout = PixelLayout::from(setup.image_byte_order);
        log::debug!("Server image byte order: {:?}", pixel_layout);

        Ok(Self {
            root: screen.root,
            allowed_depths: screen.allowed_depths.clone(),
            pixel_layout,
            atoms,
            conn,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    pub fn generate_id(&self) -> Result<u32> {
        Ok(self.conn.generate_id()?)
    }
}
