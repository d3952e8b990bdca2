pub mod device;
pub mod pcm;

pub use device::DevicePlayer;
pub use pcm::{PcmClip, PlaybackBuffer};
