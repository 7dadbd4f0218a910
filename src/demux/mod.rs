// Demux module - Multiplexed stdout/stderr framing

mod codec;
mod relay;

pub use codec::{encode_frame, Frame, MuxCodec, StreamKind, HEADER_LEN, MAX_FRAME_LEN};
pub use relay::{frames, relay, FrameReader, RelayEnd};
