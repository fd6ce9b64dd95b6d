//! 构建与执行
//!
//! [`RenderGraphBuilder`] 是一个构建周期：声明资源和视图、注册 pass，
//! 然后 `compile()` 查看执行计划，或者 `execute()` 分配资源、录制并提交。

use ash::vk;
use itertools::Itertools;
use strata_gfx::{
    GfxDeviceContext,
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        command_list::GfxCommandList,
        submit_info::GfxSubmitInfo,
    },
    resources::{buffer::GfxBufferDesc, image::GfxImageDesc},
};

use crate::{
    error::{GraphConstructionError, GraphResult},
    render_graph::{
        RenderGraph, RgBufferViewDesc, RgCompiledGraph, RgExternalSync, RgFrameLabel, RgImageViewDesc, RgPass,
        RgPassContext, RgPassHandle, RgQueue, RgRawResource, RgRegistry, RgResourceDesc, RgResourceHandle, RgUsage,
        RgViewHandle,
        barrier::RgBarrier,
        batcher::build_batches,
        compiled::RgCompiledPass,
        culling::{RgCullResult, cull},
        frame_resources::RgFrameResources,
        pass::{RgPassNode, resolve_usages},
        resource::{RgImport, RgResourceTable},
        tracker::track,
    },
};

/// 一帧执行的统计
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgFrameReport {
    pub frame_id: u64,
    pub frame_label: RgFrameLabel,
    pub batch_count: usize,
    pub recorded_passes: usize,
    pub culled_passes: usize,
    pub culled_resources: usize,
    pub barrier_count: usize,
    /// 提交之后各个 queue 的 timeline 值
    pub signal_values: [u64; RgQueue::COUNT],
}

/// 一个构建周期
///
/// 持有 `&mut RenderGraph`，同一时间只能有一个构建周期
pub struct RenderGraphBuilder<'a> {
    graph: &'a mut RenderGraph,
    table: RgResourceTable,
    passes: Vec<RgPassNode<'a>>,
    /// 外部资源的同步记录，提交成功后写回
    externals: Vec<(RgResourceHandle, &'a mut RgExternalSync)>,
}

// new
impl<'a> RenderGraphBuilder<'a> {
    pub(crate) fn new(graph: &'a mut RenderGraph, table: RgResourceTable) -> Self {
        Self {
            graph,
            table,
            passes: vec![],
            externals: vec![],
        }
    }
}

// 资源声明
impl<'a> RenderGraphBuilder<'a> {
    pub fn create_image(&mut self, name: impl Into<String>, desc: GfxImageDesc) -> GraphResult<RgResourceHandle> {
        self.table.add_resource(name.into(), RgResourceDesc::Image(desc), None)
    }

    pub fn create_buffer(&mut self, name: impl Into<String>, desc: GfxBufferDesc) -> GraphResult<RgResourceHandle> {
        self.table.add_resource(name.into(), RgResourceDesc::Buffer(desc), None)
    }

    pub fn create_image_view(&mut self, resource: RgResourceHandle, desc: RgImageViewDesc) -> GraphResult<RgViewHandle> {
        self.table.add_image_view(resource, &desc)
    }

    pub fn create_buffer_view(
        &mut self,
        resource: RgResourceHandle,
        desc: RgBufferViewDesc,
    ) -> GraphResult<RgViewHandle> {
        self.table.add_buffer_view(resource, &desc)
    }

    /// 导入外部 image
    ///
    /// `sync` 描述 image 的当前状态，提交成功后被更新为帧末的状态
    pub fn import_image(
        &mut self,
        name: impl Into<String>,
        image: vk::Image,
        desc: GfxImageDesc,
        sync: &'a mut RgExternalSync,
    ) -> GraphResult<RgResourceHandle> {
        let import = RgImport {
            raw: RgRawResource::Image(image),
            initial: *sync,
        };
        let handle = self.table.add_resource(name.into(), RgResourceDesc::Image(desc), Some(import))?;
        self.externals.push((handle, sync));
        Ok(handle)
    }

    /// 导入外部 buffer
    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: vk::Buffer,
        desc: GfxBufferDesc,
        sync: &'a mut RgExternalSync,
    ) -> GraphResult<RgResourceHandle> {
        let import = RgImport {
            raw: RgRawResource::Buffer(buffer),
            initial: *sync,
        };
        let handle = self.table.add_resource(name.into(), RgResourceDesc::Buffer(desc), Some(import))?;
        self.externals.push((handle, sync));
        Ok(handle)
    }
}

// pass 注册
impl<'a> RenderGraphBuilder<'a> {
    /// 注册一个 pass，执行顺序就是注册顺序
    pub fn add_pass(
        &mut self,
        name: impl Into<String>,
        queue: RgQueue,
        usages: Vec<RgUsage>,
        pass: impl RgPass + 'a,
    ) -> GraphResult<RgPassHandle> {
        let name = name.into();
        if !self.graph.device.has_queue(queue) {
            return Err(GraphConstructionError::UnsupportedQueue { pass: name, queue }.into());
        }
        let usages = resolve_usages(&self.table, &name, &usages)?;

        let handle = RgPassHandle::new(self.passes.len(), self.table.epoch());
        log::trace!("add pass {handle:?} `{name}` on {queue} with {} usages", usages.len());
        self.passes.push(RgPassNode {
            name,
            queue,
            usages,
            pass: Box::new(pass),
        });
        Ok(handle)
    }
}

// compile & execute
impl RenderGraphBuilder<'_> {
    /// 只做规划：剔除、依赖追踪、batch 划分，不会触碰 GPU
    pub fn compile(&self) -> RgCompiledGraph {
        self.plan().1
    }

    fn plan(&self) -> (RgCullResult, RgCompiledGraph) {
        strata_crate_tools::profile_scope!("RenderGraph::compile");

        let cull = cull(&self.table, &self.passes);
        let mut track = track(&self.table, &self.passes, &cull);
        let batching = build_batches(&self.passes, &cull, &mut track, &self.graph.timeline, self.table.epoch());

        let passes = self
            .passes
            .iter()
            .zip(track.pass_barriers)
            .enumerate()
            .map(|(idx, (pass, barriers))| RgCompiledPass {
                name: pass.name.clone(),
                queue: pass.queue,
                culled: !cull.pass_alive[idx],
                barriers,
                batch: batching.pass_batch[idx],
            })
            .collect_vec();

        let compiled = RgCompiledGraph {
            epoch: self.table.epoch(),
            passes,
            batches: batching.batches,
            resource_names: self.table.resources().iter().map(|entry| entry.name.clone()).collect(),
            resource_culled: cull.resource_alive.iter().map(|alive| !alive).collect(),
            external_finals: batching.external_finals,
            timeline_after: batching.timeline_after,
        };
        (cull, compiled)
    }

    /// 分配资源、录制所有 batch、依次提交，成功后写回外部资源的同步记录
    ///
    /// 第一次提交之前的任何错误都会放弃整帧，不会产生 GPU 副作用
    pub fn execute(self) -> GraphResult<RgFrameReport> {
        let (cull, compiled) = self.plan();
        let Self {
            graph,
            table,
            passes,
            externals,
        } = self;

        let frame_name = graph.frame_counter.frame_name();
        if graph.config.print_execution_plan {
            compiled.print_execution_plan();
        }

        let device = graph.device.clone();
        let device: &dyn GfxDeviceContext = device.as_ref();
        let frame = &mut graph.frames[graph.frame_counter.slot()];

        frame.wait_for_gpu(device, graph.config.slot_wait_timeout_ns())?;
        frame.reclaim(device)?;
        frame.allocate(device, &table, &cull, &frame_name)?;
        frame.create_views(device, &table, &frame_name)?;

        let command_buffers = compiled
            .batches()
            .iter()
            .map(|batch| frame.acquire_command_buffer(device, batch.queue, graph.config.command_chunk_size))
            .collect::<GraphResult<Vec<_>>>()?;

        // 先录制全部 batch，再统一提交
        {
            strata_crate_tools::profile_scope!("RenderGraph::record");
            let frame: &RgFrameResources = frame;
            let registry = RgRegistry::new(&table, frame, device);
            for (batch_idx, (batch, &cmd)) in compiled.batches().iter().zip(&command_buffers).enumerate() {
                device.begin_command_buffer(cmd, &format!("{frame_name}-batch{batch_idx}-{}", batch.queue))?;

                for pass_handle in &batch.passes {
                    let node = &passes[pass_handle.index()];
                    if graph.config.debug_labels {
                        device.cmd_begin_label(cmd, &node.name, graph.config.label_color);
                    }
                    record_barriers(device, cmd, compiled.pass_barriers(*pass_handle), &table, frame);

                    let mut ctx = RgPassContext::new(GfxCommandList::new(cmd, batch.queue, device), &registry, &node.name);
                    node.pass.execute(&mut ctx);

                    if graph.config.debug_labels {
                        device.cmd_end_label(cmd);
                    }
                }

                record_barriers(device, cmd, &batch.release_barriers, &table, frame);
                device.end_command_buffer(cmd)?;
            }
        }

        {
            strata_crate_tools::profile_scope!("RenderGraph::submit");
            for (batch, &cmd) in compiled.batches().iter().zip(&command_buffers) {
                let mut submit_info = GfxSubmitInfo::new(&[cmd]).signal(
                    batch.queue,
                    vk::PipelineStageFlags2::ALL_COMMANDS,
                    batch.signal_value,
                );
                for wait in &batch.waits {
                    submit_info = submit_info.wait(wait.queue, wait.stage, wait.value);
                }
                device.submit(batch.queue, &submit_info)?;

                frame.record_submit(batch.queue, batch.signal_value);
                graph.timeline.commit(batch);
            }
        }

        for (handle, sync) in externals {
            if let Some(final_sync) = compiled.final_sync(handle) {
                *sync = final_sync;
            }
        }

        let report = RgFrameReport {
            frame_id: graph.frame_counter.frame_id(),
            frame_label: graph.frame_counter.frame_label(),
            batch_count: compiled.batches().len(),
            recorded_passes: compiled.pass_count() - compiled.culled_pass_count(),
            culled_passes: compiled.culled_pass_count(),
            culled_resources: compiled.culled_resource_count(),
            barrier_count: compiled.barrier_count(),
            signal_values: graph.timeline.signaled,
        };
        log::debug!(
            "{} executed: {} batches, {} passes ({} culled), {} barriers",
            frame_name,
            report.batch_count,
            report.recorded_passes,
            report.culled_passes,
            report.barrier_count
        );
        Ok(report)
    }
}

/// 将 barrier 转换为 GFX 层的 barrier 并录制
fn record_barriers(
    device: &dyn GfxDeviceContext,
    cmd: vk::CommandBuffer,
    barriers: &[RgBarrier],
    table: &RgResourceTable,
    frame: &RgFrameResources,
) {
    if barriers.is_empty() {
        return;
    }

    let mut image_barriers: Vec<GfxImageBarrier> = vec![];
    let mut buffer_barriers: Vec<GfxBufferBarrier> = vec![];
    for barrier in barriers {
        let idx = barrier.resource.index();
        let Some(raw) = frame.physical().get(idx).copied().flatten() else {
            log::error!("barrier on {:?} without a physical resource", barrier.resource);
            continue;
        };
        let aspect = table.resources()[idx].desc.as_image().map(GfxImageDesc::aspect).unwrap_or_default();
        barrier.to_gfx_barriers(raw, aspect, &mut image_barriers, &mut buffer_barriers);
    }
    device.cmd_pipeline_barrier(cmd, &image_barriers, &buffer_barriers);
}
