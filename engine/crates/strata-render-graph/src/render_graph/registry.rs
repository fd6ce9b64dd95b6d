//! Registry：pass 录制期间解析句柄
//!
//! 只在一次 execute 内有效。所有查询都是只读的，
//! 唯一的例外是 host visible buffer 的 map，由 [`RgMappedView`] 负责 unmap。

use std::{cell::RefCell, collections::HashSet, ptr::NonNull};

use ash::vk;
use strata_gfx::{GfxDeviceContext, GfxError, resources::bindless::GfxDescriptorKind, resources::image::GfxImageViewDesc};

use crate::{
    error::RgRegistryError,
    render_graph::{
        RgRawResource, RgResourceHandle, RgViewHandle, frame_resources::RgFrameResources, resource::RgResourceTable,
    },
};

pub type RgRegistryResult<T> = Result<T, RgRegistryError>;

/// 物理 image view
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RgImageViewData {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub desc: GfxImageViewDesc,
    /// 每种 descriptor 在 bindless 表中的下标
    pub bindless: [Option<u32>; GfxDescriptorKind::COUNT],
}

/// 物理 buffer view
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RgBufferViewData {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
    pub stride: u32,
    /// 视图带 format 时才有
    pub texel_view: Option<vk::BufferView>,
    pub bindless: [Option<u32>; GfxDescriptorKind::COUNT],
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RgPhysicalView {
    Image(RgImageViewData),
    Buffer(RgBufferViewData),
}

impl RgPhysicalView {
    #[inline]
    pub fn bindless(&self, kind: GfxDescriptorKind) -> Option<u32> {
        match self {
            Self::Image(data) => data.bindless[kind.index()],
            Self::Buffer(data) => data.bindless[kind.index()],
        }
    }
}

pub struct RgRegistry<'a> {
    table: &'a RgResourceTable,
    frame: &'a RgFrameResources,
    device: &'a dyn GfxDeviceContext,
    /// 当前处于 map 状态的 buffer
    mapped: RefCell<HashSet<vk::Buffer>>,
}

// new
impl<'a> RgRegistry<'a> {
    pub(crate) fn new(table: &'a RgResourceTable, frame: &'a RgFrameResources, device: &'a dyn GfxDeviceContext) -> Self {
        Self {
            table,
            frame,
            device,
            mapped: RefCell::new(HashSet::new()),
        }
    }
}

// getters
impl RgRegistry<'_> {
    pub fn image(&self, resource: RgResourceHandle) -> RgRegistryResult<vk::Image> {
        match self.raw(resource)? {
            RgRawResource::Image(image) => Ok(image),
            RgRawResource::Buffer(_) => Err(RgRegistryError::WrongKind {
                name: self.resource_name(resource),
                expected: "an image",
            }),
        }
    }

    pub fn buffer(&self, resource: RgResourceHandle) -> RgRegistryResult<vk::Buffer> {
        match self.raw(resource)? {
            RgRawResource::Buffer(buffer) => Ok(buffer),
            RgRawResource::Image(_) => Err(RgRegistryError::WrongKind {
                name: self.resource_name(resource),
                expected: "a buffer",
            }),
        }
    }

    pub fn view(&self, view: RgViewHandle) -> RgRegistryResult<&RgPhysicalView> {
        if view.epoch != self.table.epoch() {
            return Err(RgRegistryError::StaleHandle(format!("{view:?}")));
        }
        let entry = self.table.views().get(view.index()).ok_or_else(|| RgRegistryError::Unknown(format!("{view:?}")))?;
        self.frame
            .views()
            .get(view.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| RgRegistryError::Culled(entry.name.clone()))
    }

    pub fn image_view(&self, view: RgViewHandle) -> RgRegistryResult<&RgImageViewData> {
        match self.view(view)? {
            RgPhysicalView::Image(data) => Ok(data),
            RgPhysicalView::Buffer(_) => Err(RgRegistryError::WrongKind {
                name: self.view_name(view),
                expected: "an image view",
            }),
        }
    }

    pub fn buffer_view(&self, view: RgViewHandle) -> RgRegistryResult<&RgBufferViewData> {
        match self.view(view)? {
            RgPhysicalView::Buffer(data) => Ok(data),
            RgPhysicalView::Image(_) => Err(RgRegistryError::WrongKind {
                name: self.view_name(view),
                expected: "a buffer view",
            }),
        }
    }

    /// 视图在 bindless 表中的下标
    pub fn bindless_index(&self, view: RgViewHandle, kind: GfxDescriptorKind) -> RgRegistryResult<u32> {
        self.view(view)?.bindless(kind).ok_or_else(|| RgRegistryError::NoDescriptor {
            name: self.view_name(view),
            kind,
        })
    }

    /// 当前 ring slot 的 bindless descriptor set
    #[inline]
    pub fn bindless_descriptor_set(&self) -> Option<vk::DescriptorSet> {
        self.device.bindless_descriptor_set(self.frame.slot())
    }

    fn raw(&self, resource: RgResourceHandle) -> RgRegistryResult<RgRawResource> {
        if resource.epoch != self.table.epoch() {
            return Err(RgRegistryError::StaleHandle(format!("{resource:?}")));
        }
        let entry = self
            .table
            .resources()
            .get(resource.index())
            .ok_or_else(|| RgRegistryError::Unknown(format!("{resource:?}")))?;
        self.frame
            .physical()
            .get(resource.index())
            .copied()
            .flatten()
            .ok_or_else(|| RgRegistryError::Culled(entry.name.clone()))
    }

    fn resource_name(&self, resource: RgResourceHandle) -> String {
        self.table.resources().get(resource.index()).map(|entry| entry.name.clone()).unwrap_or_default()
    }

    fn view_name(&self, view: RgViewHandle) -> String {
        self.table.views().get(view.index()).map(|entry| entry.name.clone()).unwrap_or_default()
    }
}

// map
impl RgRegistry<'_> {
    /// map 一个 host visible buffer 的视图
    ///
    /// 同一个 buffer 同时只能 map 一次
    pub fn map(&self, view: RgViewHandle) -> RgRegistryResult<RgMappedView<'_>> {
        let data = *self.buffer_view(view)?;
        let name = self.view_name(view);

        let host_visible = self
            .table
            .resources()
            .get(self.table.views()[view.index()].resource.index())
            .and_then(|entry| entry.desc.as_buffer())
            .is_some_and(|desc| desc.memory.is_host_visible());
        if !host_visible {
            return Err(RgRegistryError::Map {
                name,
                source: GfxError::NotHostVisible(data.buffer),
            });
        }

        if !self.mapped.borrow_mut().insert(data.buffer) {
            return Err(RgRegistryError::AlreadyMapped(name));
        }
        let base = match self.device.map_buffer(data.buffer) {
            Ok(ptr) => ptr,
            Err(source) => {
                self.mapped.borrow_mut().remove(&data.buffer);
                return Err(RgRegistryError::Map { name, source });
            }
        };

        // SAFETY: 视图范围在创建时已经校验过，不会超出 buffer
        let ptr = unsafe { NonNull::new_unchecked(base.as_ptr().add(data.offset as usize)) };
        Ok(RgMappedView {
            registry: self,
            buffer: data.buffer,
            ptr,
            size: data.size as usize,
            mapped: true,
        })
    }

    fn unmap_buffer(&self, buffer: vk::Buffer) {
        if self.mapped.borrow_mut().remove(&buffer) {
            self.device.unmap_buffer(buffer);
        }
    }
}

/// map 之后的视图内存，drop 时自动 unmap
pub struct RgMappedView<'r> {
    registry: &'r RgRegistry<'r>,
    buffer: vk::Buffer,
    ptr: NonNull<u8>,
    size: usize,
    mapped: bool,
}

impl RgMappedView<'_> {
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr 指向 map 出来的 size 字节，在 unmap 之前有效
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: 同 as_slice，且 &mut self 保证独占
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn unmap(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.mapped) {
            self.registry.unmap_buffer(self.buffer);
        }
    }
}

impl Drop for RgMappedView<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
