/// Errors that can occur while reading units from a byte source.
///
/// [`StreamFramer`](crate::StreamFramer) itself never fails; these come from
/// [`UnitReader`](crate::UnitReader) and the I/O underneath it.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading the stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source reached EOF. The last unit is never terminated by a start
    /// code, so its bytes remain buffered.
    #[error("end of stream ({trailing} bytes left unterminated)")]
    EndOfStream { trailing: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
