//! 每个 ring slot 的物理资源
//!
//! 一个 slot 拥有：按描述缓存的 image / buffer、本帧创建的视图和 bindless 下标、
//! 每个 queue 一个按 chunk 增长的 command pool，以及该 slot 最后一次提交的 timeline 值。
//! slot 被复用之前必须等待这些提交完成。

use std::collections::HashMap;

use ash::vk;
use strata_gfx::{
    GfxDeviceContext, GfxQueueType, GfxResult,
    commands::command_pool::GfxCommandPool,
    resources::{
        bindless::{GfxBindlessDescriptor, GfxDescriptorKind},
        buffer::{GfxBufferDesc, GfxBufferViewDesc},
        image::GfxImageDesc,
    },
};

use crate::{
    error::{GraphAllocationError, GraphResult},
    render_graph::{
        RgFrameLabel, RgRawResource, RgResourceDesc, RgViewKind,
        culling::RgCullResult,
        registry::{RgBufferViewData, RgImageViewData, RgPhysicalView},
        resource::RgResourceTable,
    },
};

pub struct RgFrameResources {
    label: RgFrameLabel,

    /// 上一帧分配、这一帧可以复用的资源
    image_cache: HashMap<GfxImageDesc, Vec<vk::Image>>,
    buffer_cache: HashMap<GfxBufferDesc, Vec<vk::Buffer>>,
    /// 这一帧正在使用的资源
    images_in_use: Vec<(GfxImageDesc, vk::Image)>,
    buffers_in_use: Vec<(GfxBufferDesc, vk::Buffer)>,

    /// 以资源句柄为下标，被剔除的为 None
    physical: Vec<Option<RgRawResource>>,
    /// 以视图句柄为下标，被剔除的为 None
    views: Vec<Option<RgPhysicalView>>,
    bindless_next: [u32; GfxDescriptorKind::COUNT],

    command_pools: [Option<GfxCommandPool>; GfxQueueType::COUNT],
    /// 每个 queue 上这个 slot 最后一次提交的 signal 值
    submitted: [u64; GfxQueueType::COUNT],
}

// new & init
impl RgFrameResources {
    pub(crate) fn new(label: RgFrameLabel) -> Self {
        Self {
            label,
            image_cache: HashMap::new(),
            buffer_cache: HashMap::new(),
            images_in_use: vec![],
            buffers_in_use: vec![],
            physical: vec![],
            views: vec![],
            bindless_next: [0; GfxDescriptorKind::COUNT],
            command_pools: [None, None, None],
            submitted: [0; GfxQueueType::COUNT],
        }
    }
}

// getters
impl RgFrameResources {
    #[inline]
    pub fn slot(&self) -> usize {
        self.label.slot()
    }

    #[inline]
    pub fn label(&self) -> RgFrameLabel {
        self.label
    }

    #[inline]
    pub fn physical(&self) -> &[Option<RgRawResource>] {
        &self.physical
    }

    #[inline]
    pub fn views(&self) -> &[Option<RgPhysicalView>] {
        &self.views
    }

    #[inline]
    pub fn submitted(&self, queue: GfxQueueType) -> u64 {
        self.submitted[queue.index()]
    }

    #[inline]
    pub fn command_pool(&self, queue: GfxQueueType) -> Option<&GfxCommandPool> {
        self.command_pools[queue.index()].as_ref()
    }

    /// 缓存 + 使用中的物理资源数量
    pub fn resource_count(&self) -> usize {
        self.images_in_use.len()
            + self.buffers_in_use.len()
            + self.image_cache.values().map(Vec::len).sum::<usize>()
            + self.buffer_cache.values().map(Vec::len).sum::<usize>()
    }
}

// 帧的生命周期
impl RgFrameResources {
    /// 等待这个 slot 上一次的提交全部完成
    pub(crate) fn wait_for_gpu(&self, device: &dyn GfxDeviceContext, timeout_ns: u64) -> GfxResult<()> {
        strata_crate_tools::profile_scope!("RgFrameResources::wait_for_gpu");
        for queue in GfxQueueType::ALL {
            let value = self.submitted[queue.index()];
            if value == 0 || device.completed_value(queue)? >= value {
                continue;
            }
            log::debug!("slot {}: wait {} timeline >= {}", self.label, queue, value);
            device.wait_value(queue, value, timeout_ns)?;
        }
        Ok(())
    }

    /// 回收上一次使用的视图、bindless 下标和 command buffer
    ///
    /// 调用前必须已经 [`Self::wait_for_gpu`]
    pub(crate) fn reclaim(&mut self, device: &dyn GfxDeviceContext) -> GfxResult<()> {
        self.destroy_views(device);
        self.physical.clear();
        self.bindless_next = [0; GfxDescriptorKind::COUNT];

        for (desc, image) in self.images_in_use.drain(..) {
            self.image_cache.entry(desc).or_default().push(image);
        }
        for (desc, buffer) in self.buffers_in_use.drain(..) {
            self.buffer_cache.entry(desc).or_default().push(buffer);
        }

        for pool in self.command_pools.iter_mut().flatten() {
            pool.reset(device)?;
        }
        Ok(())
    }

    /// 按句柄顺序为所有存活的资源找到物理对象
    ///
    /// 描述完全相同的缓存会被复用，没有被复用的缓存在最后销毁
    pub(crate) fn allocate(
        &mut self,
        device: &dyn GfxDeviceContext,
        table: &RgResourceTable,
        cull: &RgCullResult,
        frame_name: &str,
    ) -> GraphResult<()> {
        strata_crate_tools::profile_scope!("RgFrameResources::allocate");

        for (idx, entry) in table.resources().iter().enumerate() {
            if !cull.resource_alive[idx] {
                self.physical.push(None);
                continue;
            }
            if let Some(import) = &entry.import {
                self.physical.push(Some(import.raw));
                continue;
            }

            let raw = match &entry.desc {
                RgResourceDesc::Image(desc) => {
                    let image = match self.image_cache.get_mut(desc).and_then(Vec::pop) {
                        Some(image) => {
                            log::trace!("{} reuse image `{}`", frame_name, entry.name);
                            image
                        }
                        None => {
                            let image = device.create_image(desc, &entry.name).map_err(|source| {
                                GraphAllocationError::Resource {
                                    name: entry.name.clone(),
                                    source,
                                }
                            })?;
                            log::info!(
                                "{} create image `{}`: {}x{}x{} {:?}",
                                frame_name,
                                entry.name,
                                desc.width,
                                desc.height,
                                desc.array_layers,
                                desc.format
                            );
                            image
                        }
                    };
                    self.images_in_use.push((*desc, image));
                    RgRawResource::Image(image)
                }
                RgResourceDesc::Buffer(desc) => {
                    let buffer = match self.buffer_cache.get_mut(desc).and_then(Vec::pop) {
                        Some(buffer) => {
                            log::trace!("{} reuse buffer `{}`", frame_name, entry.name);
                            buffer
                        }
                        None => {
                            let buffer = device.create_buffer(desc, &entry.name).map_err(|source| {
                                GraphAllocationError::Resource {
                                    name: entry.name.clone(),
                                    source,
                                }
                            })?;
                            log::info!("{} create buffer `{}`: {} bytes", frame_name, entry.name, desc.size);
                            buffer
                        }
                    };
                    self.buffers_in_use.push((*desc, buffer));
                    RgRawResource::Buffer(buffer)
                }
            };
            self.physical.push(Some(raw));
        }

        self.destroy_cache(device);
        Ok(())
    }

    /// 为存活资源上的视图创建物理视图，并写入 bindless 表
    pub(crate) fn create_views(
        &mut self,
        device: &dyn GfxDeviceContext,
        table: &RgResourceTable,
        frame_name: &str,
    ) -> GraphResult<()> {
        for entry in table.views() {
            let Some(raw) = self.physical[entry.resource.index()] else {
                self.views.push(None);
                continue;
            };
            let resource = &table.resources()[entry.resource.index()];
            let view_err = |source| GraphAllocationError::View {
                name: entry.name.clone(),
                source,
            };

            let physical = match (raw, &entry.kind, &resource.desc) {
                (RgRawResource::Image(image), RgViewKind::Image(desc), RgResourceDesc::Image(image_desc)) => {
                    let view = device.create_image_view(image, desc, &entry.name).map_err(view_err)?;
                    // 先登记，出错时 reclaim 也能销毁它
                    let mut data = RgImageViewData {
                        image,
                        view,
                        desc: *desc,
                        bindless: [None; GfxDescriptorKind::COUNT],
                    };
                    self.views.push(Some(RgPhysicalView::Image(data)));
                    for kind in GfxDescriptorKind::kinds_for_image(image_desc.usage) {
                        data.bindless[kind.index()] =
                            Some(self.register_bindless(device, kind, GfxBindlessDescriptor::Image(view), &entry.name)?);
                    }
                    RgPhysicalView::Image(data)
                }
                (
                    RgRawResource::Buffer(buffer),
                    RgViewKind::Buffer {
                        offset,
                        size,
                        stride,
                        format,
                    },
                    RgResourceDesc::Buffer(buffer_desc),
                ) => {
                    let texel_view = match format {
                        Some(format) => Some(
                            device
                                .create_buffer_view(
                                    buffer,
                                    &GfxBufferViewDesc {
                                        format: *format,
                                        offset: *offset,
                                        size: *size,
                                    },
                                    &entry.name,
                                )
                                .map_err(view_err)?,
                        ),
                        None => None,
                    };
                    let mut data = RgBufferViewData {
                        buffer,
                        offset: *offset,
                        size: *size,
                        stride: *stride,
                        texel_view,
                        bindless: [None; GfxDescriptorKind::COUNT],
                    };
                    self.views.push(Some(RgPhysicalView::Buffer(data)));
                    for kind in GfxDescriptorKind::kinds_for_buffer(buffer_desc.usage, texel_view.is_some()) {
                        let descriptor = match texel_view {
                            Some(view) => GfxBindlessDescriptor::TexelBuffer(view),
                            None => GfxBindlessDescriptor::Buffer {
                                buffer,
                                offset: *offset,
                                range: *size,
                            },
                        };
                        data.bindless[kind.index()] =
                            Some(self.register_bindless(device, kind, descriptor, &entry.name)?);
                    }
                    RgPhysicalView::Buffer(data)
                }
                _ => {
                    log::error!("{} view `{}` does not match its resource", frame_name, entry.name);
                    self.views.push(None);
                    continue;
                }
            };

            if let Some(slot) = self.views.last_mut() {
                *slot = Some(physical);
            }
        }
        Ok(())
    }

    fn register_bindless(
        &mut self,
        device: &dyn GfxDeviceContext,
        kind: GfxDescriptorKind,
        descriptor: GfxBindlessDescriptor,
        name: &str,
    ) -> GraphResult<u32> {
        let capacity = device.bindless_capacity(kind);
        let index = self.bindless_next[kind.index()];
        if index >= capacity {
            return Err(GraphAllocationError::BindlessExhausted { kind, capacity }.into());
        }
        device.write_bindless(self.slot(), kind, index, descriptor).map_err(|source| GraphAllocationError::View {
            name: name.to_string(),
            source,
        })?;
        self.bindless_next[kind.index()] += 1;
        Ok(index)
    }

    /// 取出一个 command buffer，pool 在第一次使用时创建
    pub(crate) fn acquire_command_buffer(
        &mut self,
        device: &dyn GfxDeviceContext,
        queue: GfxQueueType,
        chunk_size: u32,
    ) -> GraphResult<vk::CommandBuffer> {
        let pool_err = |source| GraphAllocationError::CommandPool { queue, source };
        let pool = match &mut self.command_pools[queue.index()] {
            Some(pool) => pool,
            empty => empty.insert(
                GfxCommandPool::new(device, queue, chunk_size, format!("rg-{}-pool-{}", queue, self.label))
                    .map_err(pool_err)?,
            ),
        };
        let cmd = pool.acquire(device).map_err(pool_err)?;
        Ok(cmd)
    }

    /// 一次提交之后记录 signal 值
    #[inline]
    pub(crate) fn record_submit(&mut self, queue: GfxQueueType, signal_value: u64) {
        let submitted = &mut self.submitted[queue.index()];
        *submitted = (*submitted).max(signal_value);
    }
}

// destroy
impl RgFrameResources {
    /// 调用者需要保证这个 slot 的提交已经全部完成
    pub(crate) fn destroy(mut self, device: &dyn GfxDeviceContext) {
        self.destroy_views(device);
        for (desc, image) in self.images_in_use.drain(..) {
            self.image_cache.entry(desc).or_default().push(image);
        }
        for (desc, buffer) in self.buffers_in_use.drain(..) {
            self.buffer_cache.entry(desc).or_default().push(buffer);
        }
        self.destroy_cache(device);
        for pool in self.command_pools.iter_mut().filter_map(Option::take) {
            pool.destroy(device);
        }
    }

    fn destroy_views(&mut self, device: &dyn GfxDeviceContext) {
        for view in self.views.drain(..).flatten() {
            match view {
                RgPhysicalView::Image(data) => device.destroy_image_view(data.view),
                RgPhysicalView::Buffer(data) => {
                    if let Some(texel_view) = data.texel_view {
                        device.destroy_buffer_view(texel_view);
                    }
                }
            }
        }
    }

    fn destroy_cache(&mut self, device: &dyn GfxDeviceContext) {
        for (desc, images) in self.image_cache.drain() {
            for image in images {
                log::debug!("slot {}: destroy unused image {}x{} {:?}", self.label, desc.width, desc.height, desc.format);
                device.destroy_image(image);
            }
        }
        for (desc, buffers) in self.buffer_cache.drain() {
            for buffer in buffers {
                log::debug!("slot {}: destroy unused buffer of {} bytes", self.label, desc.size);
                device.destroy_buffer(buffer);
            }
        }
    }
}
