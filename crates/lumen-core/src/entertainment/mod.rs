// ── Entertainment streaming ──
//
// Real-time colour streaming to the lights of one entertainment
// configuration: the datagram frame codec, per-light render state, the
// session that drives them at a fixed rate, and the queue that keeps REST
// writes for non-protocol lights in order.

pub mod frame;
pub mod light_stream;
pub mod session;
pub mod write_queue;

pub use frame::{ChannelColor, encode_frame, scale_channel};
pub use light_stream::{LightStream, StreamTarget};
pub use session::{EntertainmentSession, FrameCallback, frame_period};
pub use write_queue::WriteQueue;
