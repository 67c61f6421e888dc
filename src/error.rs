use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("X11 connection error: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    #[error("X11 reply error: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),

    #[error("X11 reply or ID error: {0}")]
    ReplyOrId(#[from] x11rb::errors::ReplyOrIdError),

    #[error("X11 connection error: {0}")]
    ConnectionError(#[from] x11rb::errors::ConnectionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels")]
    EmptyImage,

    #[error("MIT-SHM extension not available")]
    NoShm,

    #[error("no 32-bit TrueColor visual found, alpha-composited windows are unsupported")]
    NoVisual,

    #[error("connection to the X server was lost: {0}")]
    ConnectionLost(#[source] x11rb::errors::ConnectionError),

    #[error("create shared memory segment: {0}")]
    SegmentCreate(#[source] std::io::Error),

    #[error("attach to shared memory segment: {0}")]
    SegmentAttach(#[source] std::io::Error),

    #[error("copy failed, want {want} bytes, got {got}")]
    ShortCopy { want: usize, got: usize },

    #[error("attach to shared memory segment (X): {0}")]
    ServerAttach(#[source] x11rb::errors::ReplyOrIdError),

    #[error("put image: {0}")]
    PutImage(#[source] x11rb::errors::ReplyError),

    #[error("detach from shared memory segment (X): {0}")]
    ServerDetach(#[source] x11rb::errors::ReplyError),

    #[error("detach from shared memory segment: {0}")]
    SegmentDetach(#[source] std::io::Error),

    #[error("destroy shared memory segment: {0}")]
    SegmentRemove(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
