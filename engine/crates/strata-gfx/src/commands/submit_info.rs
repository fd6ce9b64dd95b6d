use ash::vk;
use itertools::Itertools;

use crate::GfxQueueType;

/// 等待另一个 queue 的 timeline semaphore 达到 `value`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxTimelineWait {
    pub queue: GfxQueueType,
    pub value: u64,
    pub stage: vk::PipelineStageFlags2,
}

/// 提交完成后，将 `queue` 的 timeline semaphore 设置为 `value`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxTimelineSignal {
    pub queue: GfxQueueType,
    pub value: u64,
    pub stage: vk::PipelineStageFlags2,
}

/// 一次 queue submit 的描述
///
/// semaphore 使用 queue 来指代，由具体的设备实现将其映射为 timeline semaphore
#[derive(Clone, Debug, Default)]
pub struct GfxSubmitInfo {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub waits: Vec<GfxTimelineWait>,
    pub signals: Vec<GfxTimelineSignal>,
}

// new & builder
impl GfxSubmitInfo {
    pub fn new(command_buffers: &[vk::CommandBuffer]) -> Self {
        Self {
            command_buffers: command_buffers.to_vec(),
            waits: vec![],
            signals: vec![],
        }
    }

    #[inline]
    pub fn wait(mut self, queue: GfxQueueType, stage: vk::PipelineStageFlags2, value: u64) -> Self {
        self.waits.push(GfxTimelineWait { queue, value, stage });
        self
    }

    #[inline]
    pub fn signal(mut self, queue: GfxQueueType, stage: vk::PipelineStageFlags2, value: u64) -> Self {
        self.signals.push(GfxTimelineSignal { queue, value, stage });
        self
    }
}

// tools
impl GfxSubmitInfo {
    /// 生成 `vk::SubmitInfo2` 需要的三个数组
    ///
    /// `semaphore_of` 负责将 queue 映射为该 queue 的 timeline semaphore
    pub fn to_vk_infos(
        &self,
        semaphore_of: impl Fn(GfxQueueType) -> vk::Semaphore,
    ) -> (
        Vec<vk::CommandBufferSubmitInfo<'static>>,
        Vec<vk::SemaphoreSubmitInfo<'static>>,
        Vec<vk::SemaphoreSubmitInfo<'static>>,
    ) {
        let command_buffers = self
            .command_buffers
            .iter()
            .map(|cmd| vk::CommandBufferSubmitInfo::default().command_buffer(*cmd))
            .collect_vec();
        let wait_infos = self
            .waits
            .iter()
            .map(|wait| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore_of(wait.queue))
                    .stage_mask(wait.stage)
                    .value(wait.value)
            })
            .collect_vec();
        let signal_infos = self
            .signals
            .iter()
            .map(|signal| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore_of(signal.queue))
                    .stage_mask(signal.stage)
                    .value(signal.value)
            })
            .collect_vec();

        (command_buffers, wait_infos, signal_infos)
    }
}
