use std::{
    cell::RefCell,
    collections::HashMap,
    ffi::CString,
    mem::ManuallyDrop,
    ptr::NonNull,
};

use ash::vk;
use itertools::Itertools;
use vk_mem::Alloc;

use crate::{
    GfxDeviceContext, GfxError, GfxQueueType, GfxResult,
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        semaphore::GfxSemaphore,
        submit_info::GfxSubmitInfo,
    },
    resources::{
        bindless::{GfxBindlessDescriptor, GfxBindlessLimits, GfxDescriptorKind},
        buffer::{GfxBufferDesc, GfxBufferViewDesc, GfxMemoryLocation},
        image::{GfxImageDesc, GfxImageViewDesc},
    },
};

/// 某个 queue 在 device 创建时使用的 family 和 index
#[derive(Copy, Clone, Debug)]
pub struct GfxVulkanQueueInfo {
    pub family_index: u32,
    pub queue_index: u32,
}

/// 创建 [`GfxVulkanContext`] 所需的信息
///
/// instance 和 device 由调用者创建并持有，context 只负责在其上构建渲染图需要的对象
pub struct GfxVulkanContextCreateInfo<'a> {
    pub instance: &'a ash::Instance,
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub vulkan_api_version: u32,
    /// 下标为 [`GfxQueueType::index`]
    pub queues: [Option<GfxVulkanQueueInfo>; GfxQueueType::COUNT],
    /// instance 是否开启了 VK_EXT_debug_utils
    pub debug_utils: bool,
    pub bindless_limits: GfxBindlessLimits,
    /// 每个 ring slot 一个 bindless descriptor set
    pub bindless_set_count: usize,
}

struct GfxVulkanQueue {
    family_index: u32,
    handle: vk::Queue,
    timeline: GfxSemaphore,
}

struct GfxBindlessSets {
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

/// 基于 ash + vk-mem 的 [`GfxDeviceContext`] 实现
///
/// - 每个 queue 一个 timeline semaphore
/// - 所有的 image/buffer 通过 vk-mem 分配，allocation 由 context 内部记录
/// - 多个 queue family 时，资源使用 CONCURRENT 共享模式，不需要 ownership transfer
pub struct GfxVulkanContext {
    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    allocator: ManuallyDrop<vk_mem::Allocator>,

    queues: [Option<GfxVulkanQueue>; GfxQueueType::COUNT],
    /// 去重之后的 queue family
    queue_family_indices: Vec<u32>,

    images: RefCell<HashMap<vk::Image, vk_mem::Allocation>>,
    buffers: RefCell<HashMap<vk::Buffer, (vk_mem::Allocation, GfxMemoryLocation)>>,

    bindless: GfxBindlessSets,
    bindless_limits: GfxBindlessLimits,

    destroyed: bool,
}

// new & destroy
impl GfxVulkanContext {
    pub fn new(info: GfxVulkanContextCreateInfo) -> GfxResult<Self> {
        let device = info.device;

        let mut allocator_ci = vk_mem::AllocatorCreateInfo::new(info.instance, &device, info.physical_device);
        allocator_ci.vulkan_api_version = info.vulkan_api_version;
        let allocator = unsafe { vk_mem::Allocator::new(allocator_ci) }
            .map_err(|result| GfxError::Allocation { name: "vma allocator".to_string(), result })?;

        let debug_utils = info.debug_utils.then(|| ash::ext::debug_utils::Device::new(info.instance, &device));

        let mut queues: [Option<GfxVulkanQueue>; GfxQueueType::COUNT] = [None, None, None];
        for queue_type in GfxQueueType::ALL {
            let Some(queue_info) = info.queues[queue_type.index()] else {
                continue;
            };
            let handle = unsafe { device.get_device_queue(queue_info.family_index, queue_info.queue_index) };
            let timeline = GfxSemaphore::new_timeline(&device, 0)?;
            queues[queue_type.index()] = Some(GfxVulkanQueue {
                family_index: queue_info.family_index,
                handle,
                timeline,
            });
        }
        let queue_family_indices =
            queues.iter().flatten().map(|queue| queue.family_index).sorted().dedup().collect_vec();

        let bindless = Self::create_bindless_sets(&device, &info.bindless_limits, info.bindless_set_count)?;

        let context = Self {
            device,
            debug_utils,
            allocator: ManuallyDrop::new(allocator),
            queues,
            queue_family_indices,
            images: RefCell::new(HashMap::new()),
            buffers: RefCell::new(HashMap::new()),
            bindless,
            bindless_limits: info.bindless_limits,
            destroyed: false,
        };

        for queue_type in GfxQueueType::ALL {
            if let Some(queue) = &context.queues[queue_type.index()] {
                context.set_object_debug_name(queue.timeline.handle(), &format!("timeline-{queue_type}"));
            }
        }
        log::info!("vulkan device context created, queue families: {:?}", context.queue_family_indices);

        Ok(context)
    }

    fn create_bindless_sets(
        device: &ash::Device,
        limits: &GfxBindlessLimits,
        set_count: usize,
    ) -> GfxResult<GfxBindlessSets> {
        let bindings = GfxDescriptorKind::ALL
            .iter()
            .map(|kind| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(kind.index() as u32)
                    .descriptor_type(kind.descriptor_type())
                    .descriptor_count(limits.capacity(*kind))
                    .stage_flags(vk::ShaderStageFlags::ALL)
            })
            .collect_vec();
        let binding_flags = vec![
            vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND;
            bindings.len()
        ];
        let mut binding_flags_ci = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);
        let layout_ci = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
            .bindings(&bindings)
            .push_next(&mut binding_flags_ci);
        let layout = unsafe {
            device.create_descriptor_set_layout(&layout_ci, None).map_err(GfxError::vk("vkCreateDescriptorSetLayout"))?
        };

        let pool_sizes = GfxDescriptorKind::ALL
            .iter()
            .filter(|kind| limits.capacity(**kind) > 0)
            .map(|kind| {
                vk::DescriptorPoolSize::default()
                    .ty(kind.descriptor_type())
                    .descriptor_count(limits.capacity(*kind) * set_count as u32)
            })
            .collect_vec();
        let pool_ci = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
            .max_sets(set_count as u32)
            .pool_sizes(&pool_sizes);
        let pool = unsafe {
            device.create_descriptor_pool(&pool_ci, None).map_err(GfxError::vk("vkCreateDescriptorPool"))?
        };

        let layouts = vec![layout; set_count];
        let alloc_info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(pool).set_layouts(&layouts);
        let sets = unsafe {
            device.allocate_descriptor_sets(&alloc_info).map_err(GfxError::vk("vkAllocateDescriptorSets"))?
        };

        Ok(GfxBindlessSets { layout, pool, sets })
    }

    /// 调用前需要保证所有使用该 context 的对象（渲染图等）都已经销毁
    pub fn destroy(mut self) {
        unsafe {
            if let Err(err) = self.device.device_wait_idle() {
                log::error!("device_wait_idle failed while destroying context: {err}");
            }

            for (image, mut allocation) in self.images.get_mut().drain() {
                log::warn!("image {image:?} leaked until context destroy");
                self.allocator.destroy_image(image, &mut allocation);
            }
            for (buffer, (mut allocation, _)) in self.buffers.get_mut().drain() {
                log::warn!("buffer {buffer:?} leaked until context destroy");
                self.allocator.destroy_buffer(buffer, &mut allocation);
            }

            self.device.destroy_descriptor_pool(self.bindless.pool, None);
            self.device.destroy_descriptor_set_layout(self.bindless.layout, None);

            for queue in self.queues.iter_mut() {
                if let Some(queue) = queue.take() {
                    queue.timeline.destroy(&self.device);
                }
            }

            ManuallyDrop::drop(&mut self.allocator);
        }
        self.destroyed = true;
        log::info!("vulkan device context destroyed");
    }
}

// getters
impl GfxVulkanContext {
    #[inline]
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn bindless_layout(&self) -> vk::DescriptorSetLayout {
        self.bindless.layout
    }

    #[inline]
    fn queue(&self, queue: GfxQueueType) -> GfxResult<&GfxVulkanQueue> {
        self.queues[queue.index()].as_ref().ok_or(GfxError::QueueUnavailable(queue))
    }
}

// tools
impl GfxVulkanContext {
    pub fn set_object_debug_name<T: vk::Handle + Copy>(&self, handle: T, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let name_info = vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle);
        if let Err(err) = unsafe { debug_utils.set_debug_utils_object_name(&name_info) } {
            log::warn!("failed to set debug name {name:?}: {err}");
        }
    }

    /// 多 queue family 时，资源以 CONCURRENT 模式创建
    fn sharing_mode(&self) -> vk::SharingMode {
        if self.queue_family_indices.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        }
    }

    fn allocation_create_info(memory: GfxMemoryLocation) -> vk_mem::AllocationCreateInfo {
        match memory {
            GfxMemoryLocation::GpuOnly => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                flags: vk_mem::AllocationCreateFlags::empty(),
                ..Default::default()
            },
            GfxMemoryLocation::CpuToGpu => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::Auto,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            GfxMemoryLocation::GpuToCpu => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::Auto,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
                ..Default::default()
            },
        }
    }
}

impl GfxDeviceContext for GfxVulkanContext {
    fn has_queue(&self, queue: GfxQueueType) -> bool {
        self.queues[queue.index()].is_some()
    }

    fn ash_device(&self) -> Option<&ash::Device> {
        Some(&self.device)
    }

    fn create_image(&self, desc: &GfxImageDesc, name: &str) -> GfxResult<vk::Image> {
        let image_ci = desc
            .image_create_info()
            .sharing_mode(self.sharing_mode())
            .queue_family_indices(&self.queue_family_indices);
        let alloc_ci = Self::allocation_create_info(GfxMemoryLocation::GpuOnly);
        let (image, allocation) = unsafe { self.allocator.create_image(&image_ci, &alloc_ci) }.map_err(|result| {
            GfxError::Allocation {
                name: name.to_string(),
                result,
            }
        })?;

        self.set_object_debug_name(image, name);
        self.images.borrow_mut().insert(image, allocation);
        Ok(image)
    }

    fn destroy_image(&self, image: vk::Image) {
        let Some(mut allocation) = self.images.borrow_mut().remove(&image) else {
            log::error!("destroying unknown image {image:?}");
            return;
        };
        unsafe {
            self.allocator.destroy_image(image, &mut allocation);
        }
    }

    fn create_buffer(&self, desc: &GfxBufferDesc, name: &str) -> GfxResult<vk::Buffer> {
        let buffer_ci = desc
            .buffer_create_info()
            .sharing_mode(self.sharing_mode())
            .queue_family_indices(&self.queue_family_indices);
        let alloc_ci = Self::allocation_create_info(desc.memory);
        let (buffer, allocation) = unsafe { self.allocator.create_buffer(&buffer_ci, &alloc_ci) }.map_err(|result| {
            GfxError::Allocation {
                name: name.to_string(),
                result,
            }
        })?;

        self.set_object_debug_name(buffer, name);
        self.buffers.borrow_mut().insert(buffer, (allocation, desc.memory));
        Ok(buffer)
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        let Some((mut allocation, _)) = self.buffers.borrow_mut().remove(&buffer) else {
            log::error!("destroying unknown buffer {buffer:?}");
            return;
        };
        unsafe {
            self.allocator.destroy_buffer(buffer, &mut allocation);
        }
    }

    fn create_image_view(&self, image: vk::Image, desc: &GfxImageViewDesc, name: &str) -> GfxResult<vk::ImageView> {
        let view = unsafe {
            self.device
                .create_image_view(&desc.image_view_create_info(image), None)
                .map_err(GfxError::vk("vkCreateImageView"))?
        };
        self.set_object_debug_name(view, name);
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe {
            self.device.destroy_image_view(view, None);
        }
    }

    fn create_buffer_view(
        &self,
        buffer: vk::Buffer,
        desc: &GfxBufferViewDesc,
        name: &str,
    ) -> GfxResult<vk::BufferView> {
        let view = unsafe {
            self.device
                .create_buffer_view(&desc.buffer_view_create_info(buffer), None)
                .map_err(GfxError::vk("vkCreateBufferView"))?
        };
        self.set_object_debug_name(view, name);
        Ok(view)
    }

    fn destroy_buffer_view(&self, view: vk::BufferView) {
        unsafe {
            self.device.destroy_buffer_view(view, None);
        }
    }

    fn map_buffer(&self, buffer: vk::Buffer) -> GfxResult<NonNull<u8>> {
        let mut buffers = self.buffers.borrow_mut();
        let (allocation, memory) =
            buffers.get_mut(&buffer).ok_or_else(|| GfxError::UnknownObject(format!("{buffer:?}")))?;
        if !memory.is_host_visible() {
            return Err(GfxError::NotHostVisible(buffer));
        }

        let ptr = unsafe { self.allocator.map_memory(allocation) }.map_err(GfxError::vk("vmaMapMemory"))?;
        NonNull::new(ptr).ok_or(GfxError::NotHostVisible(buffer))
    }

    fn unmap_buffer(&self, buffer: vk::Buffer) {
        if let Some((allocation, _)) = self.buffers.borrow_mut().get_mut(&buffer) {
            unsafe {
                self.allocator.unmap_memory(allocation);
            }
        }
    }

    fn bindless_capacity(&self, kind: GfxDescriptorKind) -> u32 {
        self.bindless_limits.capacity(kind)
    }

    fn write_bindless(
        &self,
        slot: usize,
        kind: GfxDescriptorKind,
        index: u32,
        descriptor: GfxBindlessDescriptor,
    ) -> GfxResult<()> {
        let set = *self.bindless.sets.get(slot).ok_or_else(|| GfxError::UnknownObject(format!("bindless set {slot}")))?;
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(kind.index() as u32)
            .dst_array_element(index)
            .descriptor_type(kind.descriptor_type());

        match descriptor {
            GfxBindlessDescriptor::Image(view) => {
                let layout = match kind {
                    GfxDescriptorKind::StorageImage => vk::ImageLayout::GENERAL,
                    _ => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                };
                let image_info = [vk::DescriptorImageInfo::default().image_view(view).image_layout(layout)];
                unsafe { self.device.update_descriptor_sets(&[write.image_info(&image_info)], &[]) };
            }
            GfxBindlessDescriptor::TexelBuffer(view) => {
                let texel_views = [view];
                unsafe { self.device.update_descriptor_sets(&[write.texel_buffer_view(&texel_views)], &[]) };
            }
            GfxBindlessDescriptor::Buffer { buffer, offset, range } => {
                let buffer_info = [vk::DescriptorBufferInfo::default().buffer(buffer).offset(offset).range(range)];
                unsafe { self.device.update_descriptor_sets(&[write.buffer_info(&buffer_info)], &[]) };
            }
        }
        Ok(())
    }

    fn bindless_descriptor_set(&self, slot: usize) -> Option<vk::DescriptorSet> {
        self.bindless.sets.get(slot).copied()
    }

    fn create_command_pool(&self, queue: GfxQueueType, name: &str) -> GfxResult<vk::CommandPool> {
        let family_index = self.queue(queue)?.family_index;
        let pool = unsafe {
            self.device
                .create_command_pool(&vk::CommandPoolCreateInfo::default().queue_family_index(family_index), None)
                .map_err(GfxError::vk("vkCreateCommandPool"))?
        };
        self.set_object_debug_name(pool, name);
        Ok(pool)
    }

    fn allocate_command_buffers(&self, pool: vk::CommandPool, count: u32) -> GfxResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        unsafe { self.device.allocate_command_buffers(&alloc_info).map_err(GfxError::vk("vkAllocateCommandBuffers")) }
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> GfxResult<()> {
        unsafe {
            self.device
                .reset_command_pool(pool, vk::CommandPoolResetFlags::empty())
                .map_err(GfxError::vk("vkResetCommandPool"))
        }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe {
            self.device.destroy_command_pool(pool, None);
        }
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, name: &str) -> GfxResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device.begin_command_buffer(cmd, &begin_info).map_err(GfxError::vk("vkBeginCommandBuffer"))?;
        }
        self.set_object_debug_name(cmd, name);
        Ok(())
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> GfxResult<()> {
        unsafe { self.device.end_command_buffer(cmd).map_err(GfxError::vk("vkEndCommandBuffer")) }
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
    ) {
        let image_barriers = image_barriers.iter().map(|barrier| *barrier.inner()).collect_vec();
        let buffer_barriers = buffer_barriers.iter().map(|barrier| *barrier.inner()).collect_vec();
        let dependency_info = vk::DependencyInfo::default()
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(cmd, &dependency_info);
        }
    }

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, name: &str, color: [f32; 4]) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let label = vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(color);
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(cmd, &label);
        }
    }

    fn cmd_end_label(&self, cmd: vk::CommandBuffer) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(cmd);
            }
        }
    }

    fn submit(&self, queue: GfxQueueType, submit_info: &GfxSubmitInfo) -> GfxResult<()> {
        strata_crate_tools::profile_scope!("GfxVulkanContext::submit");

        let (command_buffers, wait_infos, signal_infos) = submit_info.to_vk_infos(|queue| {
            self.queues[queue.index()].as_ref().map(|queue| queue.timeline.handle()).unwrap_or_default()
        });
        if let Some(missing) = submit_info
            .waits
            .iter()
            .map(|wait| wait.queue)
            .chain(submit_info.signals.iter().map(|signal| signal.queue))
            .find(|queue| !self.has_queue(*queue))
        {
            return Err(GfxError::QueueUnavailable(missing));
        }

        let submit = vk::SubmitInfo2::default()
            .command_buffer_infos(&command_buffers)
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos);
        let vk_queue = self.queue(queue)?.handle;
        unsafe {
            self.device
                .queue_submit2(vk_queue, std::slice::from_ref(&submit), vk::Fence::null())
                .map_err(GfxError::vk("vkQueueSubmit2"))
        }
    }

    fn completed_value(&self, queue: GfxQueueType) -> GfxResult<u64> {
        self.queue(queue)?.timeline.completed_value(&self.device)
    }

    fn wait_value(&self, queue: GfxQueueType, value: u64, timeout_ns: u64) -> GfxResult<()> {
        match self.queue(queue)?.timeline.wait_timeline(&self.device, value, timeout_ns) {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(GfxError::Timeout {
                queue,
                value,
                timeout_ns,
            }),
            Err(result) => Err(GfxError::vk("vkWaitSemaphores")(result)),
        }
    }
}

impl Drop for GfxVulkanContext {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "GfxVulkanContext must be destroyed manually.");
    }
}
