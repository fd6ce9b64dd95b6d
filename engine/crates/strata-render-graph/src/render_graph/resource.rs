//! 资源与视图的描述模型
//!
//! 这里只有纯数据，不涉及任何 GPU 对象。物理资源在 execute 时才会分配。

use ash::vk;
use strata_gfx::{
    GfxQueueType,
    resources::{
        buffer::GfxBufferDesc,
        image::{GfxImageDesc, GfxImageViewDesc},
    },
};

use crate::{
    error::{GraphConstructionError, GraphResult},
    render_graph::{RgResourceHandle, RgState, RgViewHandle},
};

pub type RgQueue = GfxQueueType;

/// 外部资源的同步状态
///
/// 由调用者持有，import 时传入 `&mut`，execute 成功提交后被更新为资源的最终状态
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RgExternalSync {
    /// 最后一次访问的状态
    pub state: RgState,
    /// 最后一次访问所在的 queue；None 表示不属于任何 queue（例如刚 acquire 的 swapchain image）
    pub queue: Option<RgQueue>,
    /// `queue` 的 timeline 达到该值时，最后一次访问已经完成
    pub timeline_value: u64,
}

impl Default for RgExternalSync {
    fn default() -> Self {
        Self::new(RgState::UNDEFINED)
    }
}

impl RgExternalSync {
    #[inline]
    pub fn new(state: RgState) -> Self {
        Self {
            state,
            queue: None,
            timeline_value: 0,
        }
    }

    #[inline]
    pub fn on_queue(state: RgState, queue: RgQueue, timeline_value: u64) -> Self {
        Self {
            state,
            queue: Some(queue),
            timeline_value,
        }
    }
}

/// 逻辑资源的描述
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RgResourceDesc {
    Image(GfxImageDesc),
    Buffer(GfxBufferDesc),
}

impl RgResourceDesc {
    #[inline]
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    #[inline]
    pub fn as_image(&self) -> Option<&GfxImageDesc> {
        match self {
            Self::Image(desc) => Some(desc),
            Self::Buffer(_) => None,
        }
    }

    #[inline]
    pub fn as_buffer(&self) -> Option<&GfxBufferDesc> {
        match self {
            Self::Buffer(desc) => Some(desc),
            Self::Image(_) => None,
        }
    }
}

/// 原生的 Vulkan 资源
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RgRawResource {
    Image(vk::Image),
    Buffer(vk::Buffer),
}

/// 视图在 image 上覆盖的 mip / layer 范围
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RgImageRange {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl RgImageRange {
    #[inline]
    pub fn whole(desc: &GfxImageDesc) -> Self {
        Self {
            base_mip: 0,
            mip_count: desc.mip_levels,
            base_layer: 0,
            layer_count: desc.array_layers,
        }
    }

    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.base_mip < other.base_mip + other.mip_count
            && other.base_mip < self.base_mip + self.mip_count
            && self.base_layer < other.base_layer + other.layer_count
            && other.base_layer < self.base_layer + self.layer_count
    }

    pub fn subresource_range(&self, aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: self.base_mip,
            level_count: self.mip_count,
            base_array_layer: self.base_layer,
            layer_count: self.layer_count,
        }
    }
}

/// 创建 image view 的描述，None 表示使用资源的默认值 / 剩余全部
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RgImageViewDesc {
    pub base_mip: u32,
    pub mip_count: Option<u32>,
    pub base_layer: u32,
    pub layer_count: Option<u32>,
    pub view_type: Option<vk::ImageViewType>,
    pub format: Option<vk::Format>,
}

// new & builder
impl RgImageViewDesc {
    /// 覆盖整个资源
    #[inline]
    pub fn whole() -> Self {
        Self::default()
    }

    /// 单独的一层
    #[inline]
    pub fn layer(layer: u32) -> Self {
        Self::layers(layer, 1)
    }

    #[inline]
    pub fn layers(base_layer: u32, layer_count: u32) -> Self {
        Self {
            base_layer,
            layer_count: Some(layer_count),
            ..Default::default()
        }
    }

    #[inline]
    pub fn mip(mip: u32) -> Self {
        Self {
            base_mip: mip,
            mip_count: Some(1),
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_view_type(mut self, view_type: vk::ImageViewType) -> Self {
        self.view_type = Some(view_type);
        self
    }

    #[inline]
    pub fn with_format(mut self, format: vk::Format) -> Self {
        self.format = Some(format);
        self
    }
}

/// 创建 buffer view 的描述
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RgBufferViewDesc {
    pub offset: vk::DeviceSize,
    /// None 表示到 buffer 末尾
    pub size: Option<vk::DeviceSize>,
    /// 结构化 buffer 的元素大小，0 表示不关心
    pub stride: u32,
    /// 有 format 时会创建 texel buffer view
    pub format: Option<vk::Format>,
}

// new & builder
impl RgBufferViewDesc {
    #[inline]
    pub fn whole() -> Self {
        Self::default()
    }

    #[inline]
    pub fn range(offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        Self {
            offset,
            size: Some(size),
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    #[inline]
    pub fn with_format(mut self, format: vk::Format) -> Self {
        self.format = Some(format);
        self
    }
}

/// 已经解析（填充默认值、校验范围）的视图
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RgViewKind {
    Image(GfxImageViewDesc),
    Buffer {
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        stride: u32,
        format: Option<vk::Format>,
    },
}

impl RgViewKind {
    #[inline]
    pub fn image_range(&self) -> Option<RgImageRange> {
        match self {
            Self::Image(desc) => Some(RgImageRange {
                base_mip: desc.base_mip,
                mip_count: desc.mip_count,
                base_layer: desc.base_layer,
                layer_count: desc.layer_count,
            }),
            Self::Buffer { .. } => None,
        }
    }

    /// buffer 视图的字节范围 [begin, end)
    #[inline]
    pub fn byte_range(&self) -> Option<(vk::DeviceSize, vk::DeviceSize)> {
        match self {
            Self::Buffer { offset, size, .. } => Some((*offset, offset + size)),
            Self::Image(_) => None,
        }
    }
}

pub(crate) struct RgImport {
    pub raw: RgRawResource,
    pub initial: RgExternalSync,
}

pub(crate) struct RgResourceEntry {
    pub name: String,
    pub desc: RgResourceDesc,
    /// 外部资源才有
    pub import: Option<RgImport>,
}

impl RgResourceEntry {
    #[inline]
    pub fn is_external(&self) -> bool {
        self.import.is_some()
    }
}

pub(crate) struct RgViewEntry {
    pub name: String,
    pub resource: RgResourceHandle,
    pub kind: RgViewKind,
}

/// 一次构建周期内的资源表和视图表
///
/// 句柄就是表的下标，附带构建周期的 epoch
pub(crate) struct RgResourceTable {
    epoch: u32,
    resources: Vec<RgResourceEntry>,
    views: Vec<RgViewEntry>,
}

// new & 注册
impl RgResourceTable {
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            resources: Vec::new(),
            views: Vec::new(),
        }
    }

    pub fn add_resource(
        &mut self,
        name: String,
        desc: RgResourceDesc,
        import: Option<RgImport>,
    ) -> GraphResult<RgResourceHandle> {
        let reason = match &desc {
            RgResourceDesc::Image(desc) if !desc.is_valid() => Some("extent, mip levels and array layers must be > 0"),
            RgResourceDesc::Buffer(desc) if !desc.is_valid() => Some("size must be > 0"),
            _ => None,
        };
        if let Some(reason) = reason {
            return Err(GraphConstructionError::InvalidDescriptor { name, reason }.into());
        }

        let handle = RgResourceHandle::new(self.resources.len(), self.epoch);
        log::trace!("declare {handle:?} `{name}`");
        self.resources.push(RgResourceEntry { name, desc, import });
        Ok(handle)
    }

    pub fn add_image_view(
        &mut self,
        resource: RgResourceHandle,
        desc: &RgImageViewDesc,
    ) -> GraphResult<RgViewHandle> {
        let entry = self.resource(resource)?;
        let Some(image) = entry.desc.as_image() else {
            return Err(GraphConstructionError::ViewKindMismatch {
                resource: entry.name.clone(),
                reason: "image view on a buffer",
            }
            .into());
        };

        let mip_count = desc.mip_count.unwrap_or(image.mip_levels.saturating_sub(desc.base_mip));
        let layer_count = desc.layer_count.unwrap_or(image.array_layers.saturating_sub(desc.base_layer));
        if mip_count == 0
            || layer_count == 0
            || desc.base_mip as u64 + mip_count as u64 > image.mip_levels as u64
            || desc.base_layer as u64 + layer_count as u64 > image.array_layers as u64
        {
            return Err(GraphConstructionError::ViewOutOfRange {
                resource: entry.name.clone(),
                detail: format!(
                    "mips {}..{} layers {}..{} on an image with {} mips and {} layers",
                    desc.base_mip,
                    desc.base_mip as u64 + mip_count as u64,
                    desc.base_layer,
                    desc.base_layer as u64 + layer_count as u64,
                    image.mip_levels,
                    image.array_layers
                ),
            }
            .into());
        }

        let kind = RgViewKind::Image(GfxImageViewDesc {
            view_type: desc.view_type.unwrap_or(GfxImageDesc::infer_view_type(image.image_type, layer_count)),
            format: desc.format.unwrap_or(image.format),
            aspect: image.aspect(),
            base_mip: desc.base_mip,
            mip_count,
            base_layer: desc.base_layer,
            layer_count,
        });
        Ok(self.push_view(resource, kind))
    }

    pub fn add_buffer_view(
        &mut self,
        resource: RgResourceHandle,
        desc: &RgBufferViewDesc,
    ) -> GraphResult<RgViewHandle> {
        let entry = self.resource(resource)?;
        let Some(buffer) = entry.desc.as_buffer() else {
            return Err(GraphConstructionError::ViewKindMismatch {
                resource: entry.name.clone(),
                reason: "buffer view on an image",
            }
            .into());
        };

        let size = desc.size.unwrap_or(buffer.size.saturating_sub(desc.offset));
        let in_range = desc.offset.checked_add(size).is_some_and(|end| end <= buffer.size);
        let stride_fits = desc.stride == 0 || size % desc.stride as vk::DeviceSize == 0;
        if size == 0 || !in_range || !stride_fits {
            return Err(GraphConstructionError::ViewOutOfRange {
                resource: entry.name.clone(),
                detail: format!(
                    "bytes {}+{} (stride {}) on a buffer of {} bytes",
                    desc.offset, size, desc.stride, buffer.size
                ),
            }
            .into());
        }

        let kind = RgViewKind::Buffer {
            offset: desc.offset,
            size,
            stride: desc.stride,
            format: desc.format,
        };
        Ok(self.push_view(resource, kind))
    }

    fn push_view(&mut self, resource: RgResourceHandle, kind: RgViewKind) -> RgViewHandle {
        let handle = RgViewHandle::new(self.views.len(), self.epoch);
        let name = format!("{}#view{}", self.resources[resource.index()].name, self.views.len());
        log::trace!("declare {handle:?} `{name}`");
        self.views.push(RgViewEntry { name, resource, kind });
        handle
    }
}

// getters
impl RgResourceTable {
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn resource(&self, handle: RgResourceHandle) -> GraphResult<&RgResourceEntry> {
        self.check_epoch(format!("{handle:?}"), handle.epoch)?;
        self.resources.get(handle.index()).ok_or_else(|| GraphConstructionError::UnknownResource(handle).into())
    }

    pub fn view(&self, handle: RgViewHandle) -> GraphResult<&RgViewEntry> {
        self.check_epoch(format!("{handle:?}"), handle.epoch)?;
        self.views.get(handle.index()).ok_or_else(|| GraphConstructionError::UnknownView(handle).into())
    }

    #[inline]
    pub fn resources(&self) -> &[RgResourceEntry] {
        &self.resources
    }

    #[inline]
    pub fn views(&self) -> &[RgViewEntry] {
        &self.views
    }

    fn check_epoch(&self, handle: String, handle_epoch: u32) -> GraphResult<()> {
        if handle_epoch != self.epoch {
            return Err(GraphConstructionError::StaleHandle {
                handle,
                handle_epoch,
                current_epoch: self.epoch,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RgError;

    fn shadow_desc() -> RgResourceDesc {
        RgResourceDesc::Image(
            GfxImageDesc::new_2d(
                2048,
                2048,
                vk::Format::D16_UNORM,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            )
            .with_array_layers(4),
        )
    }

    #[test]
    fn test_image_view_defaults_to_whole_resource() {
        let mut table = RgResourceTable::new(1);
        let image = table.add_resource("shadow".to_string(), shadow_desc(), None).unwrap();
        let view = table.add_image_view(image, &RgImageViewDesc::whole()).unwrap();

        let RgViewKind::Image(desc) = table.view(view).unwrap().kind else {
            panic!("expected an image view");
        };
        assert_eq!(desc.layer_count, 4);
        assert_eq!(desc.view_type, vk::ImageViewType::TYPE_2D_ARRAY);
        assert_eq!(desc.aspect, vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn test_image_view_out_of_range_fails_fast() {
        let mut table = RgResourceTable::new(1);
        let image = table.add_resource("shadow".to_string(), shadow_desc(), None).unwrap();
        let err = table.add_image_view(image, &RgImageViewDesc::layers(3, 2)).unwrap_err();
        assert!(matches!(err, RgError::Construction(GraphConstructionError::ViewOutOfRange { .. })));
    }

    #[test]
    fn test_buffer_view_range_checks() {
        let mut table = RgResourceTable::new(1);
        let desc = GfxBufferDesc::new(256, vk::BufferUsageFlags::STORAGE_BUFFER);
        let buffer = table.add_resource("particles".to_string(), RgResourceDesc::Buffer(desc), None).unwrap();

        assert!(table.add_buffer_view(buffer, &RgBufferViewDesc::range(128, 128)).is_ok());
        assert!(table.add_buffer_view(buffer, &RgBufferViewDesc::range(200, 100)).is_err());
        assert!(table.add_buffer_view(buffer, &RgBufferViewDesc::range(0, 100).with_stride(16)).is_err());
        assert!(table.add_image_view(buffer, &RgImageViewDesc::whole()).is_err());
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut old = RgResourceTable::new(1);
        let image = old.add_resource("shadow".to_string(), shadow_desc(), None).unwrap();

        let mut table = RgResourceTable::new(2);
        table.add_resource("shadow".to_string(), shadow_desc(), None).unwrap();
        let err = table.add_image_view(image, &RgImageViewDesc::whole()).unwrap_err();
        assert!(matches!(err, RgError::Construction(GraphConstructionError::StaleHandle { .. })));
    }

    #[test]
    fn test_zero_sized_descriptor_is_rejected() {
        let mut table = RgResourceTable::new(1);
        let desc = GfxBufferDesc::new(0, vk::BufferUsageFlags::STORAGE_BUFFER);
        assert!(table.add_resource("empty".to_string(), RgResourceDesc::Buffer(desc), None).is_err());
    }
}
