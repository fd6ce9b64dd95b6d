use ash::vk;

use crate::{GfxDeviceContext, GfxQueueType, GfxResult};

/// 按 chunk 增长的 command pool
///
/// command buffer 一次分配 `chunk_size` 个，用完之后再整块分配下一批；
/// `reset` 会让所有 command buffer 回到初始状态，之后从头开始复用。
///
/// # Destroy
/// 需要手动调用 destroy，否则 Drop 时会 panic（debug 模式）
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    queue: GfxQueueType,
    chunk_size: u32,

    command_buffers: Vec<vk::CommandBuffer>,
    /// 下一个可用的 command buffer
    cursor: usize,
    /// 一共分配过几次 chunk
    chunk_count: usize,

    debug_name: String,
    valid: bool,
}

// new & destroy
impl GfxCommandPool {
    pub fn new(
        device: &dyn GfxDeviceContext,
        queue: GfxQueueType,
        chunk_size: u32,
        debug_name: impl Into<String>,
    ) -> GfxResult<Self> {
        let debug_name = debug_name.into();
        let handle = device.create_command_pool(queue, &debug_name)?;

        Ok(Self {
            handle,
            queue,
            chunk_size: chunk_size.max(1),
            command_buffers: vec![],
            cursor: 0,
            chunk_count: 0,
            debug_name,
            valid: true,
        })
    }

    /// 销毁 pool 时，其中所有的 command buffer 也会一并释放
    pub fn destroy(mut self, device: &dyn GfxDeviceContext) {
        device.destroy_command_pool(self.handle);
        self.command_buffers.clear();
        self.valid = false;
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn queue(&self) -> GfxQueueType {
        self.queue
    }

    /// 已经分配的 command buffer 数量
    #[inline]
    pub fn capacity(&self) -> usize {
        self.command_buffers.len()
    }

    /// 本轮 reset 之后已经取走的数量
    #[inline]
    pub fn acquired_count(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }
}

// tools
impl GfxCommandPool {
    /// 取出一个处于初始状态的 command buffer，不够时按 chunk 增长
    pub fn acquire(&mut self, device: &dyn GfxDeviceContext) -> GfxResult<vk::CommandBuffer> {
        if self.cursor == self.command_buffers.len() {
            let chunk = device.allocate_command_buffers(self.handle, self.chunk_size)?;
            self.chunk_count += 1;
            log::debug!(
                "command pool {} grows to {} command buffers",
                self.debug_name,
                self.command_buffers.len() + chunk.len()
            );
            self.command_buffers.extend(chunk);
        }

        let cmd = self.command_buffers[self.cursor];
        self.cursor += 1;
        Ok(cmd)
    }

    /// 这个调用并不会释放资源，而是将 pool 内的 command buffer 设置到初始状态
    ///
    /// 调用者需要保证这些 command buffer 已经执行完毕
    pub fn reset(&mut self, device: &dyn GfxDeviceContext) -> GfxResult<()> {
        device.reset_command_pool(self.handle)?;
        self.cursor = 0;
        Ok(())
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        debug_assert!(!self.valid, "CommandPool {} must be destroyed manually.", self.debug_name);
    }
}
