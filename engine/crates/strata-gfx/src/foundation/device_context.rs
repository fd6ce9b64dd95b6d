use std::ptr::NonNull;

use ash::vk;

use crate::{
    GfxQueueType, GfxResult,
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        submit_info::GfxSubmitInfo,
    },
    resources::{
        bindless::{GfxBindlessDescriptor, GfxDescriptorKind},
        buffer::{GfxBufferDesc, GfxBufferViewDesc},
        image::{GfxImageDesc, GfxImageViewDesc},
    },
};

/// 渲染图所需的全部设备能力
///
/// 渲染图在构造时拿到一个 `Rc<dyn GfxDeviceContext>`，之后所有的资源创建、
/// 命令录制、提交都经过它，不存在全局的设备单例。
///
/// Vulkan 的实现见 [`crate::foundation::vulkan_context::GfxVulkanContext`]。
pub trait GfxDeviceContext {
    /// 设备是否提供了这种 queue
    fn has_queue(&self, queue: GfxQueueType) -> bool;

    /// 原生的 ash device，pass 的录制回调需要它来录制 draw/dispatch
    ///
    /// 不基于 Vulkan 的实现返回 None
    fn ash_device(&self) -> Option<&ash::Device> {
        None
    }

    // ---------------------------------------------------------------------
    // 资源
    // ---------------------------------------------------------------------
    fn create_image(&self, desc: &GfxImageDesc, name: &str) -> GfxResult<vk::Image>;
    fn destroy_image(&self, image: vk::Image);

    fn create_buffer(&self, desc: &GfxBufferDesc, name: &str) -> GfxResult<vk::Buffer>;
    fn destroy_buffer(&self, buffer: vk::Buffer);

    fn create_image_view(&self, image: vk::Image, desc: &GfxImageViewDesc, name: &str) -> GfxResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    fn create_buffer_view(&self, buffer: vk::Buffer, desc: &GfxBufferViewDesc, name: &str)
    -> GfxResult<vk::BufferView>;
    fn destroy_buffer_view(&self, view: vk::BufferView);

    /// 只有 host visible 的 buffer 可以 map
    fn map_buffer(&self, buffer: vk::Buffer) -> GfxResult<NonNull<u8>>;
    fn unmap_buffer(&self, buffer: vk::Buffer);

    // ---------------------------------------------------------------------
    // bindless
    // ---------------------------------------------------------------------
    fn bindless_capacity(&self, kind: GfxDescriptorKind) -> u32;

    /// `slot` 是 ring slot 的编号，每个 slot 拥有独立的 descriptor set
    fn write_bindless(
        &self,
        slot: usize,
        kind: GfxDescriptorKind,
        index: u32,
        descriptor: GfxBindlessDescriptor,
    ) -> GfxResult<()>;

    fn bindless_descriptor_set(&self, slot: usize) -> Option<vk::DescriptorSet>;

    // ---------------------------------------------------------------------
    // command
    // ---------------------------------------------------------------------
    fn create_command_pool(&self, queue: GfxQueueType, name: &str) -> GfxResult<vk::CommandPool>;
    fn allocate_command_buffers(&self, pool: vk::CommandPool, count: u32) -> GfxResult<Vec<vk::CommandBuffer>>;
    /// reset 不会释放 command buffer，只是让它们回到初始状态
    fn reset_command_pool(&self, pool: vk::CommandPool) -> GfxResult<()>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, name: &str) -> GfxResult<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> GfxResult<()>;

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
    );

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, name: &str, color: [f32; 4]);
    fn cmd_end_label(&self, cmd: vk::CommandBuffer);

    // ---------------------------------------------------------------------
    // queue & timeline
    // ---------------------------------------------------------------------
    fn submit(&self, queue: GfxQueueType, submit_info: &GfxSubmitInfo) -> GfxResult<()>;

    /// queue 的 timeline semaphore 当前已经完成的值
    fn completed_value(&self, queue: GfxQueueType) -> GfxResult<u64>;

    /// CPU 阻塞等待 queue 的 timeline 达到 `value`
    fn wait_value(&self, queue: GfxQueueType, value: u64, timeout_ns: u64) -> GfxResult<()>;
}
