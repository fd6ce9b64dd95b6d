use ash::vk;

/// 图像描述
///
/// 包含创建 `vk::Image` 所需的所有信息。实现了 Hash，
/// 用于在 ring slot 之间复用描述完全一致的物理图像。
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageDesc {
    /// 图像宽度
    pub width: u32,
    /// 图像高度
    pub height: u32,
    /// 图像深度（3D 纹理）
    pub depth: u32,
    /// Mip 级别数
    pub mip_levels: u32,
    /// 数组层数
    pub array_layers: u32,
    /// 图像格式
    pub format: vk::Format,
    /// 图像用途
    pub usage: vk::ImageUsageFlags,
    /// 采样数
    pub samples: vk::SampleCountFlags,
    /// 图像类型
    pub image_type: vk::ImageType,
}

impl Default for GfxImageDesc {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::STORAGE,
            samples: vk::SampleCountFlags::TYPE_1,
            image_type: vk::ImageType::TYPE_2D,
        }
    }
}

// new & builder
impl GfxImageDesc {
    /// 创建 2D 图像描述
    #[inline]
    pub fn new_2d(width: u32, height: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_array_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers;
        self
    }

    #[inline]
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    #[inline]
    pub fn with_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }
}

// getters & tools
impl GfxImageDesc {
    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        vk::Extent3D {
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }

    /// 描述是否合法：尺寸、mip、layer 都不能为 0
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.depth > 0 && self.mip_levels > 0 && self.array_layers > 0
    }

    /// 子资源数量：mip × layer
    #[inline]
    pub fn subresource_count(&self) -> usize {
        (self.mip_levels * self.array_layers) as usize
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        Self::infer_aspect(self.format)
    }

    pub fn image_create_info<'a>(&self) -> vk::ImageCreateInfo<'a> {
        vk::ImageCreateInfo::default()
            .image_type(self.image_type)
            .format(self.format)
            .extent(self.extent())
            .mip_levels(self.mip_levels)
            .array_layers(self.array_layers)
            .samples(self.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }

    /// 从格式推断 aspect
    pub fn infer_aspect(format: vk::Format) -> vk::ImageAspectFlags {
        match format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }
            vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
            vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::COLOR,
        }
    }

    /// 从图像类型推断视图类型
    pub fn infer_view_type(image_type: vk::ImageType, layer_count: u32) -> vk::ImageViewType {
        match image_type {
            vk::ImageType::TYPE_1D => {
                if layer_count > 1 {
                    vk::ImageViewType::TYPE_1D_ARRAY
                } else {
                    vk::ImageViewType::TYPE_1D
                }
            }
            vk::ImageType::TYPE_3D => vk::ImageViewType::TYPE_3D,
            _ => {
                if layer_count > 1 {
                    vk::ImageViewType::TYPE_2D_ARRAY
                } else {
                    vk::ImageViewType::TYPE_2D
                }
            }
        }
    }
}

/// 创建物理 image view 的参数，所有字段都已经确定
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageViewDesc {
    pub view_type: vk::ImageViewType,
    pub format: vk::Format,
    pub aspect: vk::ImageAspectFlags,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl GfxImageViewDesc {
    #[inline]
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: self.base_mip,
            level_count: self.mip_count,
            base_array_layer: self.base_layer,
            layer_count: self.layer_count,
        }
    }

    pub fn image_view_create_info(&self, image: vk::Image) -> vk::ImageViewCreateInfo<'static> {
        vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(self.view_type)
            .format(self.format)
            .subresource_range(self.subresource_range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_aspect() {
        assert_eq!(GfxImageDesc::infer_aspect(vk::Format::D16_UNORM), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            GfxImageDesc::infer_aspect(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(GfxImageDesc::infer_aspect(vk::Format::R16G16B16A16_SFLOAT), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_infer_view_type() {
        assert_eq!(GfxImageDesc::infer_view_type(vk::ImageType::TYPE_2D, 4), vk::ImageViewType::TYPE_2D_ARRAY);
        assert_eq!(GfxImageDesc::infer_view_type(vk::ImageType::TYPE_2D, 1), vk::ImageViewType::TYPE_2D);
        assert_eq!(GfxImageDesc::infer_view_type(vk::ImageType::TYPE_3D, 1), vk::ImageViewType::TYPE_3D);
    }

    #[test]
    fn test_desc_validity() {
        let desc = GfxImageDesc::new_2d(2048, 2048, vk::Format::D16_UNORM, vk::ImageUsageFlags::SAMPLED)
            .with_array_layers(4);
        assert!(desc.is_valid());
        assert_eq!(desc.subresource_count(), 4);
        assert!(!desc.with_mip_levels(0).is_valid());
    }
}
