pub mod behavior;
pub mod config;

pub use behavior::{mouse_path, proxy_username, scrolling_model, typing_model, MotionState, MousePoint};
pub use config::{DeviceProfile, FingerprintConfig, SmallStateRng, WebGlProfile};
