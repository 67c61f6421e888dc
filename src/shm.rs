use std::io;
use std::ptr;

use x11rb::connection::{Connection, RequestConnection};
use x11rb::cookie::VoidCookie;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::shm::{self, Seg};
use x11rb::protocol::xproto::{Drawable, Gcontext, ImageFormat};
use x11rb::rust_connection::RustConnection;

use crate::compositor::{FittedRect, RenderedFrame};
use crate::error::{OverlayError, Result};

/// The OS and display-server operations a shared-memory transfer needs.
pub trait SegmentHost {
    type Mapping;
    type ServerSegment: Copy;

    fn create_segment(&self, size: usize) -> Result<i32>;
    fn attach_segment(&self, shmid: i32, size: usize) -> Result<Self::Mapping>;
    /// Copy `bytes` into the mapping, returning how many were copied.
    fn copy_into(&self, mapping: &mut Self::Mapping, bytes: &[u8]) -> usize;
    fn server_attach(&self, shmid: i32) -> Result<Self::ServerSegment>;
    fn put_image(&self, segment: Self::ServerSegment, rect: &FittedRect) -> Result<()>;
    fn server_detach(&self, segment: Self::ServerSegment) -> Result<()>;
    fn detach_segment(&self, mapping: Self::Mapping) -> Result<()>;
    fn remove_segment(&self, shmid: i32) -> Result<()>;
}

// Cleanup guards. Locals drop in reverse order of creation, so teardown runs
// server detach, then local detach, then removal, on every exit path.

struct OsSegment<'h, H: SegmentHost> {
    host: &'h H,
    shmid: i32,
}

impl<H: SegmentHost> Drop for OsSegment<'_, H> {
    fn drop(&mut self) {
        // The segment outlives the process unless removed
        if let Err(e) = self.host.remove_segment(self.shmid) {
            log::warn!("{}", e);
        }
    }
}

struct LocalMapping<'h, H: SegmentHost> {
    host: &'h H,
    mapping: Option<H::Mapping>,
}

impl<H: SegmentHost> Drop for LocalMapping<'_, H> {
    fn drop(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            if let Err(e) = self.host.detach_segment(mapping) {
                log::warn!("{}", e);
            }
        }
    }
}

struct ServerAttachment<'h, H: SegmentHost> {
    host: &'h H,
    segment: H::ServerSegment,
}

impl<H: SegmentHost> Drop for ServerAttachment<'_, H> {
    fn drop(&mut self) {
        if let Err(e) = self.host.server_detach(self.segment) {
            log::warn!("{}", e);
        }
    }
}

/// Push `frame` to the display through a fresh shared-memory segment.
///
/// The outcome is decided by allocation, copy, server attach and put-image.
/// Teardown failures are logged only.
pub fn transfer<H: SegmentHost>(host: &H, frame: &RenderedFrame) -> Result<()> {
    let size = frame.data.len();

    let segment = OsSegment {
        host,
        shmid: host.create_segment(size)?,
    };

    let mut local = LocalMapping {
        host,
        mapping: Some(host.attach_segment(segment.shmid, size)?),
    };

    let copied = match local.mapping.as_mut() {
        Some(mapping) => host.copy_into(mapping, &frame.data),
        None => 0,
    };
    if copied != size {
        return Err(OverlayError::ShortCopy {
            want: size,
            got: copied,
        });
    }

    let server = ServerAttachment {
        host,
        segment: host.server_attach(segment.shmid)?,
    };

    host.put_image(server.segment, &frame.rect)?;

    log::debug!("Transferred {} bytes through segment {}", size, segment.shmid);
    Ok(())
}

/// Process-side view of an attached System V segment.
pub struct Mapping {
    ptr: *mut u8,
    len: usize,
}

/// System V shared memory plus MIT-SHM requests against one drawable.
pub struct XShmHost<'c> {
    pub conn: &'c RustConnection,
    pub drawable: Drawable,
    pub gc: Gcontext,
    pub depth: u8,
}

fn checked<C: RequestConnection + ?Sized>(
    cookie: std::result::Result<VoidCookie<'_, C>, ConnectionError>,
) -> std::result::Result<(), ReplyError> {
    cookie?.check()
}

impl SegmentHost for XShmHost<'_> {
    type Mapping = Mapping;
    type ServerSegment = Seg;

    fn create_segment(&self, size: usize) -> Result<i32> {
        let shmid = unsafe {
            libc::shmget(
                libc::IPC_PRIVATE,
                size,
                libc::IPC_CREAT | libc::IPC_EXCL | 0o600,
            )
        };
        if shmid < 0 {
            return Err(OverlayError::SegmentCreate(io::Error::last_os_error()));
        }
        Ok(shmid)
    }

    fn attach_segment(&self, shmid: i32, size: usize) -> Result<Mapping> {
        let ptr = unsafe { libc::shmat(shmid, ptr::null(), 0) };
        if ptr as isize == -1 {
            return Err(OverlayError::SegmentAttach(io::Error::last_os_error()));
        }
        Ok(Mapping {
            ptr: ptr as *mut u8,
            len: size,
        })
    }

    fn copy_into(&self, mapping: &mut Mapping, bytes: &[u8]) -> usize {
        let n = bytes.len().min(mapping.len);
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), mapping.ptr, n) };
        n
    }

    fn server_attach(&self, shmid: i32) -> Result<Seg> {
        let segment = self
            .conn
            .generate_id()
            .map_err(OverlayError::ServerAttach)?;
        checked(shm::attach(self.conn, segment, shmid as u32, false))
            .map_err(|e| OverlayError::ServerAttach(e.into()))?;
        Ok(segment)
    }

    fn put_image(&self, segment: Seg, rect: &FittedRect) -> Result<()> {
        checked(shm::put_image(
            self.conn,
            self.drawable,
            self.gc,
            rect.width,
            rect.height,
            0, // src x
            0, // src y
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            self.depth,
            ImageFormat::Z_PIXMAP.into(),
            false,
            segment,
            0,
        ))
        .map_err(OverlayError::PutImage)
    }

    fn server_detach(&self, segment: Seg) -> Result<()> {
        checked(shm::detach(self.conn, segment)).map_err(OverlayError::ServerDetach)
    }

    fn detach_segment(&self, mapping: Mapping) -> Result<()> {
        if unsafe { libc::shmdt(mapping.ptr as *const libc::c_void) } < 0 {
            return Err(OverlayError::SegmentDetach(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn remove_segment(&self, shmid: i32) -> Result<()> {
        if unsafe { libc::shmctl(shmid, libc::IPC_RMID, ptr::null_mut()) } < 0 {
            return Err(OverlayError::SegmentRemove(io::Error::last_os_error()));
        }
        Ok(())
    }
}
