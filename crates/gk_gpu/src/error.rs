/// Errors that originate below the [`crate::GpuBackend`] boundary.
///
/// Every variant here is fatal to the operation that triggered it: the device
/// either rejected a request outright or ran out of room. None of these are
/// recoverable by retrying the same submission.
#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("failed to find a compatible GPU adapter")]
    NoAdapter,

    #[error("failed to open a device on the selected adapter: {0}")]
    RequestDevice(#[source] wgpu::RequestDeviceError),

    #[error("device was lost: {0}")]
    DeviceLost(String),

    #[error("buffer {0} does not exist (already destroyed or never created)")]
    UnknownBuffer(u64),

    #[error("failed to map buffer {buffer} for host read: {reason}")]
    MapFailed { buffer: u64, reason: String },
}
