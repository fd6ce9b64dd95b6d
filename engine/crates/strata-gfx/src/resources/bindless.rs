use ash::vk;

/// bindless descriptor 的种类，每一种在 descriptor set 中占一个 binding
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GfxDescriptorKind {
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
}

impl GfxDescriptorKind {
    pub const COUNT: usize = 6;
    pub const ALL: [GfxDescriptorKind; Self::COUNT] = [
        Self::SampledImage,
        Self::StorageImage,
        Self::UniformTexelBuffer,
        Self::StorageTexelBuffer,
        Self::UniformBuffer,
        Self::StorageBuffer,
    ];

    /// 同时也是 descriptor set 中的 binding 编号
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::SampledImage => 0,
            Self::StorageImage => 1,
            Self::UniformTexelBuffer => 2,
            Self::StorageTexelBuffer => 3,
            Self::UniformBuffer => 4,
            Self::StorageBuffer => 5,
        }
    }

    #[inline]
    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            Self::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
            Self::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
            Self::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            Self::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            Self::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            Self::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        }
    }

    /// image view 根据 image 的 usage 决定需要哪些 descriptor
    pub fn kinds_for_image(usage: vk::ImageUsageFlags) -> impl Iterator<Item = GfxDescriptorKind> {
        [
            (vk::ImageUsageFlags::SAMPLED, Self::SampledImage),
            (vk::ImageUsageFlags::STORAGE, Self::StorageImage),
        ]
        .into_iter()
        .filter(move |(flag, _)| usage.contains(*flag))
        .map(|(_, kind)| kind)
    }

    /// buffer view 根据 buffer 的 usage 以及是否带 format 决定需要哪些 descriptor
    pub fn kinds_for_buffer(usage: vk::BufferUsageFlags, texel: bool) -> impl Iterator<Item = GfxDescriptorKind> {
        let candidates = if texel {
            [
                (vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER, Self::UniformTexelBuffer),
                (vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER, Self::StorageTexelBuffer),
            ]
        } else {
            [
                (vk::BufferUsageFlags::UNIFORM_BUFFER, Self::UniformBuffer),
                (vk::BufferUsageFlags::STORAGE_BUFFER, Self::StorageBuffer),
            ]
        };
        candidates.into_iter().filter(move |(flag, _)| usage.contains(*flag)).map(|(_, kind)| kind)
    }
}

/// 写入 bindless 表的一项
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GfxBindlessDescriptor {
    Image(vk::ImageView),
    TexelBuffer(vk::BufferView),
    Buffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
}

/// 每种 descriptor 的容量
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxBindlessLimits {
    pub capacities: [u32; GfxDescriptorKind::COUNT],
}

impl Default for GfxBindlessLimits {
    fn default() -> Self {
        Self {
            capacities: [1024; GfxDescriptorKind::COUNT],
        }
    }
}

impl GfxBindlessLimits {
    #[inline]
    pub fn uniform(capacity: u32) -> Self {
        Self {
            capacities: [capacity; GfxDescriptorKind::COUNT],
        }
    }

    #[inline]
    pub fn capacity(&self, kind: GfxDescriptorKind) -> u32 {
        self.capacities[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_for_image() {
        let kinds: Vec<_> =
            GfxDescriptorKind::kinds_for_image(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .collect();
        assert_eq!(kinds, vec![GfxDescriptorKind::SampledImage]);
    }

    #[test]
    fn test_kinds_for_buffer() {
        let usage = vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER;
        let plain: Vec<_> = GfxDescriptorKind::kinds_for_buffer(usage, false).collect();
        let texel: Vec<_> = GfxDescriptorKind::kinds_for_buffer(usage, true).collect();
        assert_eq!(plain, vec![GfxDescriptorKind::StorageBuffer]);
        assert_eq!(texel, vec![GfxDescriptorKind::StorageTexelBuffer]);
    }
}
