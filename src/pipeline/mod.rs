pub mod buffer;
pub mod clock;
pub mod registry;

pub use buffer::{BufferState, BufferStats, BufferedFrame, FrameBuffer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::BufferRegistry;
