//! Compute device selection with GPU detection.

use serde::{Deserialize, Serialize};

/// CPU training backend (NdArray with autodiff).
pub type CpuBackend = burn::backend::Autodiff<burn::backend::NdArray>;

/// Device type for NdArray (always CPU)
pub type CpuDevice = burn::backend::ndarray::NdArrayDevice;

/// GPU training backend (wgpu with autodiff).
#[cfg(feature = "wgpu")]
pub type GpuBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

#[cfg(feature = "wgpu")]
pub type GpuDevice = burn::backend::wgpu::WgpuDevice;

/// Where training should execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlacement {
    /// CPU via NdArray backend (always available).
    Cpu,
    /// GPU via wgpu backend, falling back to CPU when no adapter is found.
    #[default]
    Gpu,
}

/// Selected GPU adapter.
#[derive(Debug, Clone)]
pub struct GpuInfo {
    pub name: String,
    pub backend: String,
}

#[cfg(feature = "wgpu")]
mod gpu {
    use super::{GpuDevice, GpuInfo};
    use crate::error::{Error, Result};
    use burn::backend::wgpu::{init_device, RuntimeOptions, WgpuSetup};

    /// First high-performance adapter on any primary backend, wrapped as a
    /// Burn device.
    pub(super) fn init_gpu() -> Result<(GpuDevice, GpuInfo)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let (adapter, device, queue) = pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    ..Default::default()
                })
                .await
                .map_err(|e| Error::BackendInit(format!("No GPU adapter: {}", e)))?;
            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .map_err(|e| Error::BackendInit(e.to_string()))?;
            Ok::<_, Error>((adapter, device, queue))
        })?;

        let adapter_info = adapter.get_info();
        tracing::debug!("Training on GPU adapter {:?}", adapter_info.name);
        let info = GpuInfo {
            name: adapter_info.name,
            backend: format!("{:?}", adapter_info.backend),
        };

        let setup = WgpuSetup {
            instance,
            adapter,
            device,
            queue,
            backend: adapter_info.backend,
        };
        Ok((init_device(setup, RuntimeOptions::default()), info))
    }
}

/// Training device resolved from a [`DevicePlacement`].
#[derive(Debug, Clone)]
pub enum TrainingDevice {
    Cpu(CpuDevice),
    #[cfg(feature = "wgpu")]
    Gpu { device: GpuDevice, info: GpuInfo },
}

impl TrainingDevice {
    /// Resolve a placement. A GPU request without a usable adapter falls back to CPU.
    pub fn select(placement: DevicePlacement) -> Self {
        match placement {
            DevicePlacement::Cpu => TrainingDevice::Cpu(CpuDevice::default()),
            DevicePlacement::Gpu => Self::gpu_or_cpu(),
        }
    }

    #[cfg(feature = "wgpu")]
    fn gpu_or_cpu() -> Self {
        match gpu::init_gpu() {
            Ok((device, info)) => TrainingDevice::Gpu { device, info },
            Err(e) => {
                tracing::warn!("GPU unavailable ({}), training on CPU", e);
                TrainingDevice::Cpu(CpuDevice::default())
            }
        }
    }

    #[cfg(not(feature = "wgpu"))]
    fn gpu_or_cpu() -> Self {
        tracing::warn!("Built without the `wgpu` feature, training on CPU");
        TrainingDevice::Cpu(CpuDevice::default())
    }

    pub fn placement(&self) -> DevicePlacement {
        match self {
            TrainingDevice::Cpu(_) => DevicePlacement::Cpu,
            #[cfg(feature = "wgpu")]
            TrainingDevice::Gpu { .. } => DevicePlacement::Gpu,
        }
    }

    pub fn name(&self) -> String {
        match self {
            TrainingDevice::Cpu(_) => "Burn/NdArray".into(),
            #[cfg(feature = "wgpu")]
            TrainingDevice::Gpu { info, .. } => format!("Burn/wgpu ({}, {})", info.name, info.backend),
        }
    }
}
