use ash::vk;

/// buffer 所在的内存位置
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum GfxMemoryLocation {
    /// 只有 GPU 访问
    #[default]
    GpuOnly,
    /// CPU 写入，GPU 读取（上传）
    CpuToGpu,
    /// GPU 写入，CPU 读取（回读）
    GpuToCpu,
}

impl GfxMemoryLocation {
    #[inline]
    pub fn is_host_visible(self) -> bool {
        !matches!(self, Self::GpuOnly)
    }
}

/// buffer 描述
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GfxBufferDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub memory: GfxMemoryLocation,
}

// new & builder
impl GfxBufferDesc {
    #[inline]
    pub fn new(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            size,
            usage,
            memory: GfxMemoryLocation::GpuOnly,
        }
    }

    #[inline]
    pub fn with_memory(mut self, memory: GfxMemoryLocation) -> Self {
        self.memory = memory;
        self
    }
}

// tools
impl GfxBufferDesc {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.size > 0
    }

    pub fn buffer_create_info<'a>(&self) -> vk::BufferCreateInfo<'a> {
        vk::BufferCreateInfo::default().size(self.size).usage(self.usage).sharing_mode(vk::SharingMode::EXCLUSIVE)
    }
}

/// 创建物理 buffer view（texel buffer view）的参数
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GfxBufferViewDesc {
    pub format: vk::Format,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

impl GfxBufferViewDesc {
    pub fn buffer_view_create_info(&self, buffer: vk::Buffer) -> vk::BufferViewCreateInfo<'static> {
        vk::BufferViewCreateInfo::default()
            .buffer(buffer)
            .format(self.format)
            .offset(self.offset)
            .range(self.size)
    }
}
