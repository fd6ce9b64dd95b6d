//! 编译结果
//!
//! `compile()` 是纯粹的规划：剔除、依赖追踪、batch 划分，
//! 不会创建任何 GPU 对象，结果可以直接用于检查和调试。

use ash::vk;
use itertools::Itertools;

use crate::render_graph::{
    RgExternalSync, RgPassHandle, RgQueue, RgResourceHandle,
    barrier::{RgBarrier, RgBarrierRange},
    batcher::{RgBatch, RgTimelineState},
};

#[derive(Clone, Debug)]
pub(crate) struct RgCompiledPass {
    pub name: String,
    pub queue: RgQueue,
    pub culled: bool,
    pub barriers: Vec<RgBarrier>,
    pub batch: Option<usize>,
}

/// 编译后的执行计划
#[derive(Clone, Debug)]
pub struct RgCompiledGraph {
    pub(crate) epoch: u32,
    pub(crate) passes: Vec<RgCompiledPass>,
    pub(crate) batches: Vec<RgBatch>,
    pub(crate) resource_names: Vec<String>,
    pub(crate) resource_culled: Vec<bool>,
    pub(crate) external_finals: Vec<(RgResourceHandle, RgExternalSync)>,
    pub(crate) timeline_after: RgTimelineState,
}

// getters
impl RgCompiledGraph {
    #[inline]
    pub fn batches(&self) -> &[RgBatch] {
        &self.batches
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_name(&self, pass: RgPassHandle) -> Option<&str> {
        self.pass(pass).map(|pass| pass.name.as_str())
    }

    /// pass 之前录制的 barrier；被剔除或句柄无效时为空
    pub fn pass_barriers(&self, pass: RgPassHandle) -> &[RgBarrier] {
        self.pass(pass).map(|pass| pass.barriers.as_slice()).unwrap_or_default()
    }

    pub fn is_pass_culled(&self, pass: RgPassHandle) -> bool {
        self.pass(pass).is_none_or(|pass| pass.culled)
    }

    pub fn is_resource_culled(&self, resource: RgResourceHandle) -> bool {
        resource.epoch != self.epoch || self.resource_culled.get(resource.index()).copied().unwrap_or(true)
    }

    /// pass 所在 batch 的下标
    pub fn batch_of(&self, pass: RgPassHandle) -> Option<usize> {
        self.pass(pass).and_then(|pass| pass.batch)
    }

    /// 外部资源提交之后的同步状态；本帧没有使用时为 None
    pub fn final_sync(&self, resource: RgResourceHandle) -> Option<RgExternalSync> {
        self.external_finals.iter().find(|(handle, _)| *handle == resource).map(|(_, sync)| *sync)
    }

    #[inline]
    pub fn timeline_after(&self) -> &RgTimelineState {
        &self.timeline_after
    }

    /// 所有 pass barrier 与 release barrier 的总数
    pub fn barrier_count(&self) -> usize {
        self.passes.iter().map(|pass| pass.barriers.len()).sum::<usize>()
            + self.batches.iter().map(|batch| batch.release_barriers.len()).sum::<usize>()
    }

    pub fn culled_pass_count(&self) -> usize {
        self.passes.iter().filter(|pass| pass.culled).count()
    }

    pub fn culled_resource_count(&self) -> usize {
        self.resource_culled.iter().filter(|culled| **culled).count()
    }

    fn pass(&self, pass: RgPassHandle) -> Option<&RgCompiledPass> {
        if pass.epoch != self.epoch {
            return None;
        }
        self.passes.get(pass.index())
    }

    fn resource_name(&self, resource: RgResourceHandle) -> &str {
        self.resource_names.get(resource.index()).map(String::as_str).unwrap_or("<unknown>")
    }
}

// debug
impl RgCompiledGraph {
    /// 打印执行计划（用于调试）
    ///
    /// 输出每个 batch 的 queue、wait、signal，以及 batch 内每个 pass 的 barrier
    pub fn print_execution_plan(&self) {
        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              RenderGraph Execution Plan                          ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Passes: {} ({} culled)  |  Batches: {}  |  Barriers: {}",
            self.passes.len(),
            self.culled_pass_count(),
            self.batches.len(),
            self.barrier_count()
        );
        let culled_resources = self
            .resource_culled
            .iter()
            .enumerate()
            .filter(|(_, culled)| **culled)
            .map(|(idx, _)| self.resource_names[idx].as_str())
            .join(", ");
        if !culled_resources.is_empty() {
            log::info!("║ Culled resources: [{}]", culled_resources);
        }
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        for (batch_idx, batch) in self.batches.iter().enumerate() {
            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!(
                "│ Batch [{}/{}] on {} queue, signal {}",
                batch_idx + 1,
                self.batches.len(),
                batch.queue,
                batch.signal_value
            );
            for wait in &batch.waits {
                log::info!(
                    "│   ⏳ wait {} >= {} before {}",
                    wait.queue,
                    wait.value,
                    Self::format_pipeline_stage(wait.stage)
                );
            }

            for pass in &batch.passes {
                let compiled = &self.passes[pass.index()];
                log::info!("├─────────────────────────────────────────────────────────────────┤");
                log::info!("│ Pass: \"{}\" ({})", compiled.name, compiled.queue);
                if compiled.barriers.is_empty() {
                    log::info!("│   No barriers required");
                }
                for barrier in &compiled.barriers {
                    self.print_barrier("🔒", barrier);
                }
            }

            if !batch.release_barriers.is_empty() {
                log::info!("├─────────────────────────────────────────────────────────────────┤");
                log::info!("│ Release:");
                for barrier in &batch.release_barriers {
                    self.print_barrier("📤", barrier);
                }
            }
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        log::info!("");
        log::info!("═══════════════════════ End of Execution Plan ═══════════════════════");
    }

    fn print_barrier(&self, icon: &str, barrier: &RgBarrier) {
        log::info!("│   {} \"{}\":", icon, self.resource_name(barrier.resource));
        for range in &barrier.ranges {
            match range {
                RgBarrierRange::Image { range, old_layout } => log::info!(
                    "│       mips {}..{} layers {}..{}: {:?} → {:?}",
                    range.base_mip,
                    range.base_mip + range.mip_count,
                    range.base_layer,
                    range.base_layer + range.layer_count,
                    old_layout,
                    barrier.dst.layout
                ),
                RgBarrierRange::Buffer { offset, size } => {
                    log::info!("│       bytes {}..{}", offset, offset + size)
                }
            }
        }
        log::info!(
            "│       Stage:  {} → {}",
            Self::format_pipeline_stage(barrier.src_stage),
            Self::format_pipeline_stage(barrier.dst.stage)
        );
        log::info!(
            "│       Access: {} → {}",
            Self::format_access_flags(barrier.src_access),
            Self::format_access_flags(barrier.dst.access)
        );
    }

    /// 格式化 PipelineStageFlags2 为可读字符串
    fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
        const NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
            (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
            (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
            (vk::PipelineStageFlags2::DRAW_INDIRECT, "DRAW_INDIRECT"),
            (vk::PipelineStageFlags2::VERTEX_INPUT, "VERTEX_INPUT"),
            (vk::PipelineStageFlags2::INDEX_INPUT, "INDEX_INPUT"),
            (vk::PipelineStageFlags2::VERTEX_SHADER, "VERTEX_SHADER"),
            (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
            (vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
            (vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
            (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
            (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
            (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
            (vk::PipelineStageFlags2::HOST, "HOST"),
            (vk::PipelineStageFlags2::ALL_GRAPHICS, "ALL_GRAPHICS"),
            (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
        ];

        let names = NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).collect_vec();
        if names.is_empty() { format!("{:?}", stage) } else { names.join(" | ") }
    }

    /// 格式化 AccessFlags2 为可读字符串
    fn format_access_flags(access: vk::AccessFlags2) -> String {
        if access == vk::AccessFlags2::NONE {
            return "NONE".to_string();
        }

        const NAMES: &[(vk::AccessFlags2, &str)] = &[
            (vk::AccessFlags2::INDIRECT_COMMAND_READ, "INDIRECT_CMD_READ"),
            (vk::AccessFlags2::INDEX_READ, "INDEX_READ"),
            (vk::AccessFlags2::VERTEX_ATTRIBUTE_READ, "VERTEX_ATTR_READ"),
            (vk::AccessFlags2::UNIFORM_READ, "UNIFORM_READ"),
            (vk::AccessFlags2::SHADER_SAMPLED_READ, "SHADER_SAMPLED_READ"),
            (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
            (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
            (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_READ"),
            (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_WRITE"),
            (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_READ"),
            (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_WRITE"),
            (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
            (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
            (vk::AccessFlags2::HOST_READ, "HOST_READ"),
            (vk::AccessFlags2::HOST_WRITE, "HOST_WRITE"),
            (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
            (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
        ];

        let names = NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).collect_vec();
        if names.is_empty() { format!("{:?}", access) } else { names.join(" | ") }
    }
}
