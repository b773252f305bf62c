pub mod architecture;
pub mod detection;
pub mod profiles;

pub use architecture::{classify_architecture, ArchitectureClass, ARCHITECTURE_DENYLIST};
pub use detection::{
    detect_accelerator, parse_device_listing, AcceleratorDescriptor, DeviceListing, DeviceProbe,
    SystemProbe,
};
pub use profiles::{derive_launch_parameters, LaunchParameters, MemoryTier, LAUNCH_TUNING};
