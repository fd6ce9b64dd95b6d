//! Batch 划分与跨 queue 同步
//!
//! 按注册顺序遍历存活的 pass，queue 变化或者需要新的 semaphore wait 时开启新的 batch。
//! 每个 batch 提交一次，signal 自己 queue 的 timeline 一次。

use ash::vk;
use strata_gfx::commands::submit_info::GfxTimelineWait;

use crate::render_graph::{
    RgExternalSync, RgPassHandle, RgQueue, RgResourceHandle,
    barrier::RgBarrier,
    culling::RgCullResult,
    pass::RgPassNode,
    tracker::{RgDepTarget, RgTrackResult},
};

/// 一次 queue submit
#[derive(Clone, Debug)]
pub struct RgBatch {
    pub queue: RgQueue,
    pub passes: Vec<RgPassHandle>,
    /// 每个其他 queue 最多一个 wait
    pub waits: Vec<GfxTimelineWait>,
    /// 提交后 `queue` 的 timeline 会达到这个值
    pub signal_value: u64,
    /// 外部资源帧末的 barrier，在所有 pass 之后录制
    pub release_barriers: Vec<RgBarrier>,
}

/// 各个 queue 的 timeline 进度，跨帧保留
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RgTimelineState {
    /// 每个 queue 最后一次 signal 的值
    pub signaled: [u64; RgQueue::COUNT],
    /// `waited[q][other]`：queue q 已经等待过 other 的最大值
    pub waited: [[u64; RgQueue::COUNT]; RgQueue::COUNT],
}

impl RgTimelineState {
    #[inline]
    pub fn signaled(&self, queue: RgQueue) -> u64 {
        self.signaled[queue.index()]
    }

    #[inline]
    pub fn waited(&self, queue: RgQueue, other: RgQueue) -> u64 {
        self.waited[queue.index()][other.index()]
    }

    /// 提交了一个 batch 之后推进
    pub(crate) fn commit(&mut self, batch: &RgBatch) {
        let queue = batch.queue.index();
        self.signaled[queue] = self.signaled[queue].max(batch.signal_value);
        for wait in &batch.waits {
            let waited = &mut self.waited[queue][wait.queue.index()];
            *waited = (*waited).max(wait.value);
        }
    }
}

pub(crate) struct RgBatchResult {
    pub batches: Vec<RgBatch>,
    pub pass_batch: Vec<Option<usize>>,
    /// 外部资源的最终同步状态，提交成功后写回调用者
    pub external_finals: Vec<(RgResourceHandle, RgExternalSync)>,
    /// 全部 batch 提交之后的 timeline 状态
    pub timeline_after: RgTimelineState,
}

pub(crate) fn build_batches(
    passes: &[RgPassNode<'_>],
    cull: &RgCullResult,
    track: &mut RgTrackResult,
    timeline: &RgTimelineState,
    epoch: u32,
) -> RgBatchResult {
    strata_crate_tools::profile_scope!("RenderGraph::batch");

    let mut planned = *timeline;
    let mut batches: Vec<RgBatch> = vec![];
    let mut pass_batch: Vec<Option<usize>> = vec![None; passes.len()];

    for (pass_idx, pass) in passes.iter().enumerate() {
        if !cull.pass_alive[pass_idx] {
            continue;
        }
        let queue = pass.queue;

        let mut waits: [Option<(u64, vk::PipelineStageFlags2)>; RgQueue::COUNT] = [None; RgQueue::COUNT];
        for dep in &track.pass_deps[pass_idx] {
            if dep.queue == queue {
                continue;
            }
            let value = match dep.target {
                RgDepTarget::Pass(other) => pass_batch[other].map_or(0, |batch| batches[batch].signal_value),
                RgDepTarget::Timeline(value) => value,
            };
            if value == 0 || value <= planned.waited(queue, dep.queue) {
                continue;
            }
            let wait = &mut waits[dep.queue.index()];
            *wait = Some(match *wait {
                Some((max_value, stage)) => (max_value.max(value), stage | dep.stage),
                None => (value, dep.stage),
            });
        }

        let has_waits = waits.iter().any(Option::is_some);
        let needs_new_batch = has_waits || batches.last().is_none_or(|batch| batch.queue != queue);
        if needs_new_batch {
            let signal_value = planned.signaled(queue) + 1;
            let batch = RgBatch {
                queue,
                passes: vec![],
                waits: RgQueue::ALL
                    .into_iter()
                    .filter_map(|other| {
                        waits[other.index()].map(|(value, stage)| GfxTimelineWait {
                            queue: other,
                            value,
                            stage,
                        })
                    })
                    .collect(),
                signal_value,
                release_barriers: vec![],
            };
            planned.commit(&batch);
            batches.push(batch);
        }

        let batch_idx = batches.len() - 1;
        batches[batch_idx].passes.push(RgPassHandle::new(pass_idx, epoch));
        pass_batch[pass_idx] = Some(batch_idx);
    }

    // release barrier 放在各自 queue 的最后一个 batch 末尾
    let mut external_finals = vec![];
    for release in &mut track.releases {
        let Some(last_batch) = batches.iter().rposition(|batch| batch.queue == release.queue) else {
            continue;
        };
        let value = match release.barrier.take() {
            Some(barrier) => {
                batches[last_batch].release_barriers.push(barrier);
                batches[last_batch].signal_value
            }
            None => pass_batch[release.last_pass].map_or(0, |batch| batches[batch].signal_value),
        };
        external_finals.push((release.resource, RgExternalSync::on_queue(release.final_state, release.queue, value)));
    }

    log::debug!("batch: {} batches for {} passes", batches.len(), cull.pass_alive.iter().filter(|a| **a).count());

    RgBatchResult {
        batches,
        pass_batch,
        external_finals,
        timeline_after: planned,
    }
}
