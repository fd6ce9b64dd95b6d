//! strata 的 GFX 层
//!
//! - `resources`：物理资源的描述（image / buffer / view / bindless descriptor）
//! - `commands`：barrier、submit info、command pool、timeline semaphore 的封装
//! - `foundation`：设备抽象 [`GfxDeviceContext`] 以及它的 Vulkan 实现

pub mod commands;
pub mod error;
pub mod foundation;
pub mod queue;
pub mod resources;

pub use error::{GfxError, GfxResult};
pub use foundation::device_context::GfxDeviceContext;
pub use queue::GfxQueueType;
