use std::env;
use std::str::FromStr;

use burn::tensor::backend::Backend as BackendTrait;
use burn_wgpu::{self, MemoryConfiguration, RuntimeOptions, Wgpu, graphics};
use tracing::warn;

pub type WgpuDevice = <Wgpu<f32> as BackendTrait>::Device;

const GRAPHICS_VAR: &str = "TOWERS_WGPU_GRAPHICS";
const TASKS_VAR: &str = "TOWERS_WGPU_TASKS_MAX";
const MEMORY_VAR: &str = "TOWERS_WGPU_MEMORY";

/// Set up the wgpu runtime for `device` before any tower touches it.
///
/// * `TOWERS_WGPU_GRAPHICS`: `auto` (default), `vulkan`, `dx12`, `metal`, `opengl`.
/// * `TOWERS_WGPU_TASKS_MAX`: tasks aggregated per submit.
/// * `TOWERS_WGPU_MEMORY`: `subslices` (default) or `exclusive`.
pub fn init_runtime(device: &WgpuDevice) {
    if matches!(device, WgpuDevice::Existing(_)) {
        return;
    }

    let api = env::var(GRAPHICS_VAR)
        .ok()
        .map(|value| {
            value.parse().unwrap_or_else(|_| {
                warn!("unknown {GRAPHICS_VAR} value '{value}', using auto");
                GraphicsApi::Auto
            })
        })
        .unwrap_or(GraphicsApi::Auto);
    let options = runtime_options(env::var(TASKS_VAR).ok(), env::var(MEMORY_VAR).ok());

    match api {
        GraphicsApi::Auto => burn_wgpu::init_setup::<graphics::AutoGraphicsApi>(device, options),
        GraphicsApi::Vulkan => burn_wgpu::init_setup::<graphics::Vulkan>(device, options),
        GraphicsApi::Dx12 => burn_wgpu::init_setup::<graphics::Dx12>(device, options),
        GraphicsApi::Metal => burn_wgpu::init_setup::<graphics::Metal>(device, options),
        GraphicsApi::OpenGl => burn_wgpu::init_setup::<graphics::OpenGl>(device, options),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphicsApi {
    Auto,
    Vulkan,
    Dx12,
    Metal,
    OpenGl,
}

impl FromStr for GraphicsApi {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "vulkan" => Ok(Self::Vulkan),
            "dx12" | "directx" => Ok(Self::Dx12),
            "metal" => Ok(Self::Metal),
            "opengl" | "gl" => Ok(Self::OpenGl),
            _ => Err(()),
        }
    }
}

fn runtime_options(tasks_max: Option<String>, memory: Option<String>) -> RuntimeOptions {
    let defaults = RuntimeOptions::default();
    let tasks_max = tasks_max
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(defaults.tasks_max);

    let memory_config = match memory.unwrap_or_default().to_ascii_lowercase().as_str() {
        "exclusive" => MemoryConfiguration::ExclusivePages,
        "subslices" | "" => MemoryConfiguration::SubSlices,
        other => {
            warn!("unknown {MEMORY_VAR} value '{other}', using subslices");
            MemoryConfiguration::SubSlices
        }
    };

    RuntimeOptions {
        tasks_max,
        memory_config,
    }
}
