use crate::container::SourceStream;
use crate::demux::{MuxCodec, StreamKind};
use crate::error::ForwarderError;
use crate::sink::SinkConnection;
use futures::StreamExt;
use tokio_util::codec::FramedRead;

/// Frame decoder over a live source stream
pub type FrameReader = FramedRead<SourceStream, MuxCodec>;

pub fn frames(source: SourceStream) -> FrameReader {
    FramedRead::new(source, MuxCodec::new())
}

/// Why a relay stopped
#[derive(Debug)]
pub enum RelayEnd {
    /// The source reached end of stream (including a truncated final frame)
    SourceEnded,
    /// Reading the source failed
    SourceFailed(ForwarderError),
    /// The source is not in the multiplexed format; re-reading it cannot help
    Malformed(ForwarderError),
    /// Writing to the sink failed; the connection has been marked broken
    SinkFailed(ForwarderError),
}

/// Copy payloads of every frame into `sink`, in arrival order
///
/// stdout and stderr share the one sink; payload bytes are written verbatim.
/// stdin frames are not container output and are skipped.
/// `forwarded` counts frames written so far and survives the future being
/// dropped, which happens whenever the coupling is torn down.
pub async fn relay(
    frames: &mut FrameReader,
    sink: &SinkConnection,
    forwarded: &mut u64,
) -> RelayEnd {
    while let Some(frame) = frames.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e @ ForwarderError::FrameError(_)) => return RelayEnd::Malformed(e),
            Err(e) => return RelayEnd::SourceFailed(e),
        };

        if frame.kind == StreamKind::Stdin || frame.payload.is_empty() {
            continue;
        }

        if let Err(e) = sink.write_all(&frame.payload).await {
            return RelayEnd::SinkFailed(e);
        }
        *forwarded += 1;
    }

    RelayEnd::SourceEnded
}
