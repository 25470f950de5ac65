//! Compute capability probing for the local model backend.
//!
//! The probe answers one question: on what kind of device can the model
//! runtime run here? It inspects the host once (executables on `PATH`,
//! environment, target platform) and classifies the result as a
//! [`ComputeDevice`]. The synthesis service calls it a single time when it is
//! constructed and caches the answer in its backend state.

use crate::types::{Accelerator, ComputeDevice};

/// Host facts that decide the compute device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSignals {
    /// The model runtime executable was found.
    pub runtime_installed: bool,
    /// `nvidia-smi` is on the `PATH`.
    pub nvidia_driver: bool,
    /// Value of `CUDA_VISIBLE_DEVICES`, if set.
    pub cuda_visible_devices: Option<String>,
    /// Running on Apple silicon.
    pub apple_silicon: bool,
}

impl DeviceSignals {
    /// Inspect the current host.
    pub fn gather(runtime: &str) -> Self {
        Self {
            runtime_installed: which::which(runtime).is_ok(),
            nvidia_driver: which::which("nvidia-smi").is_ok(),
            cuda_visible_devices: std::env::var("CUDA_VISIBLE_DEVICES").ok(),
            apple_silicon: cfg!(all(target_os = "macos", target_arch = "aarch64")),
        }
    }

    fn cuda_disabled(&self) -> bool {
        matches!(
            self.cuda_visible_devices.as_deref().map(str::trim),
            Some("") | Some("-1") | Some("none") | Some("NoDevFiles")
        )
    }
}

/// Classify a set of host signals.
///
/// An accelerator is preferred when present; otherwise the runtime falls back
/// to the CPU. Without the runtime there is nothing to run on.
///
/// ## Examples
///
/// ```
/// use narrator_lib::detection::{classify, DeviceSignals};
/// use narrator_lib::types::ComputeDevice;
///
/// let signals = DeviceSignals { runtime_installed: true, ..Default::default() };
/// assert_eq!(classify(&signals), ComputeDevice::GeneralPurpose);
/// ```
pub fn classify(signals: &DeviceSignals) -> ComputeDevice {
    if !signals.runtime_installed {
        return ComputeDevice::Unavailable;
    }
    if signals.nvidia_driver && !signals.cuda_disabled() {
        return ComputeDevice::Accelerated(Accelerator::Cuda);
    }
    if signals.apple_silicon {
        return ComputeDevice::Accelerated(Accelerator::Metal);
    }
    ComputeDevice::GeneralPurpose
}

/// Probe the host for the device the given model runtime would use.
pub fn probe_compute_device(runtime: &str) -> ComputeDevice {
    let signals = DeviceSignals::gather(runtime);
    let device = classify(&signals);
    tracing::debug!(runtime, device = device.id(), ?signals, "Probed compute device");
    device
}
