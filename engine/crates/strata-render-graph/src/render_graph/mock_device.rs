//! 测试用的设备
//!
//! 不访问 GPU，只记录渲染图发出的每一个调用，timeline 的完成进度由测试控制。

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    ptr::NonNull,
};

use ash::vk::{self, Handle};
use strata_gfx::{
    GfxDeviceContext, GfxError, GfxQueueType, GfxResult,
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

#[derive(Clone, Debug)]
pub(crate) enum MockCommand {
    Begin(vk::CommandBuffer),
    Barrier {
        cmd: vk::CommandBuffer,
        images: Vec<GfxImageBarrier>,
        buffers: Vec<GfxBufferBarrier>,
    },
    BeginLabel(vk::CommandBuffer, String),
    EndLabel(vk::CommandBuffer),
    End(vk::CommandBuffer),
}

pub(crate) struct MockState {
    next_handle: u64,
    pub queues: [bool; GfxQueueType::COUNT],

    pub images: HashMap<vk::Image, GfxImageDesc>,
    pub buffers: HashMap<vk::Buffer, (GfxBufferDesc, Box<[u8]>)>,
    pub image_views: HashSet<vk::ImageView>,
    pub buffer_views: HashSet<vk::BufferView>,
    pub created_images: usize,
    pub created_buffers: usize,
    pub destroyed_images: usize,
    pub destroyed_buffers: usize,
    pub fail_image_creation: bool,

    pub mapped: HashSet<vk::Buffer>,

    pub bindless_capacity: u32,
    pub bindless_writes: Vec<(usize, GfxDescriptorKind, u32, GfxBindlessDescriptor)>,

    pub pools: HashMap<vk::CommandPool, GfxQueueType>,
    /// 每次 allocate_command_buffers 的数量
    pub allocations: Vec<u32>,
    pub pool_resets: usize,

    pub commands: Vec<MockCommand>,
    pub submits: Vec<(GfxQueueType, GfxSubmitInfo)>,

    /// 每个 queue 已经完成的 timeline 值
    pub completed: [u64; GfxQueueType::COUNT],
    /// 提交后立即完成
    pub auto_complete: bool,
    /// wait 一直等不到
    pub stalled: bool,
    pub waits: Vec<(GfxQueueType, u64)>,
}

pub(crate) struct MockDevice {
    state: RefCell<MockState>,
}

// new & init
impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MockState {
                next_handle: 0x1000,
                queues: [true; GfxQueueType::COUNT],
                images: HashMap::new(),
                buffers: HashMap::new(),
                image_views: HashSet::new(),
                buffer_views: HashSet::new(),
                created_images: 0,
                created_buffers: 0,
                destroyed_images: 0,
                destroyed_buffers: 0,
                fail_image_creation: false,
                mapped: HashSet::new(),
                bindless_capacity: 64,
                bindless_writes: vec![],
                pools: HashMap::new(),
                allocations: vec![],
                pool_resets: 0,
                commands: vec![],
                submits: vec![],
                completed: [0; GfxQueueType::COUNT],
                auto_complete: true,
                stalled: false,
                waits: vec![],
            }),
        }
    }

    pub fn without_queue(self, queue: GfxQueueType) -> Self {
        self.state.borrow_mut().queues[queue.index()] = false;
        self
    }
}

// tools
impl MockDevice {
    pub fn state(&self) -> std::cell::Ref<'_, MockState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> std::cell::RefMut<'_, MockState> {
        self.state.borrow_mut()
    }

    /// 所有录制过的 barrier 命令
    pub fn barrier_commands(&self) -> Vec<(Vec<GfxImageBarrier>, Vec<GfxBufferBarrier>)> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|command| match command {
                MockCommand::Barrier { images, buffers, .. } => Some((images.clone(), buffers.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|command| match command {
                MockCommand::BeginLabel(_, name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn next_raw(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        state.next_handle
    }
}

impl GfxDeviceContext for MockDevice {
    fn has_queue(&self, queue: GfxQueueType) -> bool {
        self.state.borrow().queues[queue.index()]
    }

    fn create_image(&self, desc: &GfxImageDesc, name: &str) -> GfxResult<vk::Image> {
        if self.state.borrow().fail_image_creation {
            return Err(GfxError::Allocation {
                name: name.to_string(),
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            });
        }
        let image = vk::Image::from_raw(self.next_raw());
        let mut state = self.state.borrow_mut();
        state.images.insert(image, *desc);
        state.created_images += 1;
        Ok(image)
    }

    fn destroy_image(&self, image: vk::Image) {
        let mut state = self.state.borrow_mut();
        assert!(state.images.remove(&image).is_some(), "double destroy of {image:?}");
        state.destroyed_images += 1;
    }

    fn create_buffer(&self, desc: &GfxBufferDesc, _name: &str) -> GfxResult<vk::Buffer> {
        let buffer = vk::Buffer::from_raw(self.next_raw());
        let mut state = self.state.borrow_mut();
        state.buffers.insert(buffer, (*desc, vec![0u8; desc.size as usize].into_boxed_slice()));
        state.created_buffers += 1;
        Ok(buffer)
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        let mut state = self.state.borrow_mut();
        assert!(state.buffers.remove(&buffer).is_some(), "double destroy of {buffer:?}");
        state.destroyed_buffers += 1;
    }

    fn create_image_view(&self, _image: vk::Image, _desc: &GfxImageViewDesc, _name: &str) -> GfxResult<vk::ImageView> {
        let view = vk::ImageView::from_raw(self.next_raw());
        self.state.borrow_mut().image_views.insert(view);
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        assert!(self.state.borrow_mut().image_views.remove(&view));
    }

    fn create_buffer_view(
        &self,
        _buffer: vk::Buffer,
        _desc: &GfxBufferViewDesc,
        _name: &str,
    ) -> GfxResult<vk::BufferView> {
        let view = vk::BufferView::from_raw(self.next_raw());
        self.state.borrow_mut().buffer_views.insert(view);
        Ok(view)
    }

    fn destroy_buffer_view(&self, view: vk::BufferView) {
        assert!(self.state.borrow_mut().buffer_views.remove(&view));
    }

    fn map_buffer(&self, buffer: vk::Buffer) -> GfxResult<NonNull<u8>> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let Some((desc, memory)) = state.buffers.get_mut(&buffer) else {
            return Err(GfxError::UnknownObject(format!("{buffer:?}")));
        };
        if !desc.memory.is_host_visible() {
            return Err(GfxError::NotHostVisible(buffer));
        }
        state.mapped.insert(buffer);
        NonNull::new(memory.as_mut_ptr()).ok_or(GfxError::NotHostVisible(buffer))
    }

    fn unmap_buffer(&self, buffer: vk::Buffer) {
        assert!(self.state.borrow_mut().mapped.remove(&buffer));
    }

    fn bindless_capacity(&self, _kind: GfxDescriptorKind) -> u32 {
        self.state.borrow().bindless_capacity
    }

    fn write_bindless(
        &self,
        slot: usize,
        kind: GfxDescriptorKind,
        index: u32,
        descriptor: GfxBindlessDescriptor,
    ) -> GfxResult<()> {
        self.state.borrow_mut().bindless_writes.push((slot, kind, index, descriptor));
        Ok(())
    }

    fn bindless_descriptor_set(&self, slot: usize) -> Option<vk::DescriptorSet> {
        Some(vk::DescriptorSet::from_raw(0xd000 + slot as u64))
    }

    fn create_command_pool(&self, queue: GfxQueueType, _name: &str) -> GfxResult<vk::CommandPool> {
        let pool = vk::CommandPool::from_raw(self.next_raw());
        self.state.borrow_mut().pools.insert(pool, queue);
        Ok(pool)
    }

    fn allocate_command_buffers(&self, _pool: vk::CommandPool, count: u32) -> GfxResult<Vec<vk::CommandBuffer>> {
        let buffers = (0..count).map(|_| vk::CommandBuffer::from_raw(self.next_raw())).collect();
        self.state.borrow_mut().allocations.push(count);
        Ok(buffers)
    }

    fn reset_command_pool(&self, _pool: vk::CommandPool) -> GfxResult<()> {
        self.state.borrow_mut().pool_resets += 1;
        Ok(())
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        assert!(self.state.borrow_mut().pools.remove(&pool).is_some());
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, _name: &str) -> GfxResult<()> {
        self.state.borrow_mut().commands.push(MockCommand::Begin(cmd));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> GfxResult<()> {
        self.state.borrow_mut().commands.push(MockCommand::End(cmd));
        Ok(())
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
    ) {
        self.state.borrow_mut().commands.push(MockCommand::Barrier {
            cmd,
            images: image_barriers.to_vec(),
            buffers: buffer_barriers.to_vec(),
        });
    }

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, name: &str, _color: [f32; 4]) {
        self.state.borrow_mut().commands.push(MockCommand::BeginLabel(cmd, name.to_string()));
    }

    fn cmd_end_label(&self, cmd: vk::CommandBuffer) {
        self.state.borrow_mut().commands.push(MockCommand::EndLabel(cmd));
    }

    fn submit(&self, queue: GfxQueueType, submit_info: &GfxSubmitInfo) -> GfxResult<()> {
        let mut state = self.state.borrow_mut();
        if state.auto_complete {
            for signal in &submit_info.signals {
                let completed = &mut state.completed[signal.queue.index()];
                *completed = (*completed).max(signal.value);
            }
        }
        state.submits.push((queue, submit_info.clone()));
        Ok(())
    }

    fn completed_value(&self, queue: GfxQueueType) -> GfxResult<u64> {
        Ok(self.state.borrow().completed[queue.index()])
    }

    fn wait_value(&self, queue: GfxQueueType, value: u64, timeout_ns: u64) -> GfxResult<()> {
        let mut state = self.state.borrow_mut();
        state.waits.push((queue, value));
        if state.stalled {
            return Err(GfxError::Timeout {
                queue,
                value,
                timeout_ns,
            });
        }
        // GPU 在等待期间完成了工作
        let completed = &mut state.completed[queue.index()];
        *completed = (*completed).max(value);
        Ok(())
    }
}
