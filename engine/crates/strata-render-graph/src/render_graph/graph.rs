use std::rc::Rc;

use strata_gfx::{GfxDeviceContext, GfxQueueType};

use crate::{
    config::RenderGraphConfig,
    render_graph::{
        RgFrameCounter, RgFrameLabel, batcher::RgTimelineState, executor::RenderGraphBuilder,
        frame_resources::RgFrameResources, resource::RgResourceTable,
    },
};

/// 渲染图
///
/// 跨帧持有：设备、配置、帧计数、两个 ring slot 的物理资源、各 queue 的 timeline 进度。
/// 每帧通过 [`RenderGraph::builder`] 开始一个新的构建周期，构建周期之间的句柄互不通用。
///
/// # Destroy
/// 需要手动调用 [`RenderGraph::destroy`]，否则 Drop 时会 panic（debug 模式）
pub struct RenderGraph {
    pub(crate) device: Rc<dyn GfxDeviceContext>,
    pub(crate) config: RenderGraphConfig,
    pub(crate) frame_counter: RgFrameCounter,
    pub(crate) frames: Vec<RgFrameResources>,
    pub(crate) timeline: RgTimelineState,
    /// 构建周期，每次 builder() 加一
    epoch: u32,
    destroyed: bool,
}

// new & init
impl RenderGraph {
    pub fn new(device: Rc<dyn GfxDeviceContext>, config: RenderGraphConfig) -> Self {
        log::info!(
            "create render graph: {} ring slots, command chunk {}",
            RgFrameCounter::SLOT_COUNT,
            config.command_chunk_size
        );
        Self {
            device,
            config,
            frame_counter: RgFrameCounter::new(0),
            frames: (0..RgFrameCounter::SLOT_COUNT)
                .map(|slot| RgFrameResources::new(RgFrameLabel::from_slot(slot)))
                .collect(),
            timeline: RgTimelineState::default(),
            epoch: 0,
            destroyed: false,
        }
    }

    /// 开始一个新的构建周期
    pub fn builder(&mut self) -> RenderGraphBuilder<'_> {
        self.epoch = self.epoch.wrapping_add(1);
        let table = RgResourceTable::new(self.epoch);
        log::trace!("{} begin construction epoch {}", self.frame_counter.frame_name(), self.epoch);
        RenderGraphBuilder::new(self, table)
    }
}

// update
impl RenderGraph {
    /// 推进到下一帧：帧序号加一，ring slot 切换
    ///
    /// 不会分配或释放任何资源，slot 的回收在下一次 execute 时进行
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_counter.next_frame();
    }
}

// getters
impl RenderGraph {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_counter.frame_id()
    }

    #[inline]
    pub fn frame_name(&self) -> String {
        self.frame_counter.frame_name()
    }

    /// 当前帧使用的 ring slot
    #[inline]
    pub fn slot(&self) -> usize {
        self.frame_counter.slot()
    }

    #[inline]
    pub fn config(&self) -> &RenderGraphConfig {
        &self.config
    }

    #[inline]
    pub fn timeline(&self) -> &RgTimelineState {
        &self.timeline
    }

    #[inline]
    pub fn device(&self) -> &Rc<dyn GfxDeviceContext> {
        &self.device
    }

    #[inline]
    pub fn frame_resources(&self, slot: usize) -> Option<&RgFrameResources> {
        self.frames.get(slot)
    }
}

// destroy
impl RenderGraph {
    /// 等待所有 queue 上的提交完成，然后释放全部 slot
    pub fn destroy(mut self) {
        let timeout_ns = self.config.slot_wait_timeout_ns();
        for queue in GfxQueueType::ALL {
            let value = self.timeline.signaled(queue);
            if value == 0 {
                continue;
            }
            if let Err(err) = self.device.wait_value(queue, value, timeout_ns) {
                log::warn!("render graph destroy: wait {} timeline >= {} failed: {}", queue, value, err);
            }
        }

        for frame in std::mem::take(&mut self.frames) {
            frame.destroy(self.device.as_ref());
        }
        self.destroyed = true;
        log::info!("render graph destroyed");
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "RenderGraph must be destroyed manually.");
    }
}
