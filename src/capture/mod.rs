pub mod decoder;
pub mod frame;

pub use decoder::{decode_data_url, decode_frame};
pub use frame::{Frame, FrameMetadata, PixelFormat};
