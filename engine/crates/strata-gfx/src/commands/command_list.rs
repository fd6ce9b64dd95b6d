use ash::vk;

use crate::{GfxDeviceContext, GfxQueueType};

/// 交给 pass 录制回调的 command buffer
///
/// 只在一次录制期间有效，不能被保存下来
pub struct GfxCommandList<'a> {
    handle: vk::CommandBuffer,
    queue: GfxQueueType,
    device: &'a dyn GfxDeviceContext,
}

// new
impl<'a> GfxCommandList<'a> {
    #[inline]
    pub fn new(handle: vk::CommandBuffer, queue: GfxQueueType, device: &'a dyn GfxDeviceContext) -> Self {
        Self { handle, queue, device }
    }
}

// getters
impl<'a> GfxCommandList<'a> {
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    #[inline]
    pub fn queue(&self) -> GfxQueueType {
        self.queue
    }

    /// 用于录制 draw / dispatch / copy 等命令；非 Vulkan 设备返回 None
    #[inline]
    pub fn ash_device(&self) -> Option<&'a ash::Device> {
        self.device.ash_device()
    }
}

// tools
impl GfxCommandList<'_> {
    #[inline]
    pub fn begin_label(&self, name: &str, color: [f32; 4]) {
        self.device.cmd_begin_label(self.handle, name, color);
    }

    #[inline]
    pub fn end_label(&self) {
        self.device.cmd_end_label(self.handle);
    }
}
