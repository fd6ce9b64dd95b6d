//! Pass 定义
//!
//! 一个 pass 由三部分组成：目标 queue、资源使用列表、录制回调。
//! 录制回调只能拿到 [`RgPassContext`]：command list 和 registry，看不到 graph 的内部结构。

use ash::vk;
use strata_gfx::commands::command_list::GfxCommandList;

use crate::{
    error::{GraphConstructionError, GraphResult},
    render_graph::{
        RgImageRange, RgQueue, RgRegistry, RgResourceHandle, RgState, RgViewHandle, resource::RgResourceTable,
    },
};

/// pass 对一个视图的使用声明
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RgUsage {
    pub view: RgViewHandle,
    /// pass 执行时要求资源处于的状态
    pub state: RgState,
    /// 只对外部资源有效：帧结束时资源需要处于的状态
    pub final_state: Option<RgState>,
}

impl RgUsage {
    #[inline]
    pub fn new(view: RgViewHandle, state: RgState) -> Self {
        Self {
            view,
            state,
            final_state: None,
        }
    }

    #[inline]
    pub fn with_final_state(mut self, final_state: RgState) -> Self {
        self.final_state = Some(final_state);
        self
    }
}

/// Pass 录制上下文
///
/// 只在录制回调期间有效，不能被保存下来
pub struct RgPassContext<'a> {
    cmd: GfxCommandList<'a>,
    registry: &'a RgRegistry<'a>,
    pass_name: &'a str,
}

// new
impl<'a> RgPassContext<'a> {
    #[inline]
    pub(crate) fn new(cmd: GfxCommandList<'a>, registry: &'a RgRegistry<'a>, pass_name: &'a str) -> Self {
        Self {
            cmd,
            registry,
            pass_name,
        }
    }
}

// getters
impl<'a> RgPassContext<'a> {
    #[inline]
    pub fn cmd(&self) -> &GfxCommandList<'a> {
        &self.cmd
    }

    #[inline]
    pub fn registry(&self) -> &'a RgRegistry<'a> {
        self.registry
    }

    #[inline]
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }
}

/// Pass 的录制逻辑
///
/// 在 execute 阶段被调用一次，调用前该 pass 需要的 barrier 已经录制到 command list 上
pub trait RgPass {
    fn execute(&self, ctx: &mut RgPassContext<'_>);
}

impl<F> RgPass for F
where
    F: Fn(&mut RgPassContext<'_>),
{
    fn execute(&self, ctx: &mut RgPassContext<'_>) {
        self(ctx)
    }
}

/// usage 作用的子资源范围
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RgUsageRange {
    Image(RgImageRange),
    /// 字节范围 [begin, end)
    Buffer { begin: vk::DeviceSize, end: vk::DeviceSize },
}

impl RgUsageRange {
    fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Image(a), Self::Image(b)) => a.overlaps(b),
            (Self::Buffer { begin: a0, end: a1 }, Self::Buffer { begin: b0, end: b1 }) => a0 < b1 && b0 < a1,
            _ => false,
        }
    }
}

/// 经过校验、解析到资源上的 usage
#[derive(Copy, Clone, Debug)]
pub(crate) struct RgResolvedUsage {
    pub resource: RgResourceHandle,
    pub state: RgState,
    pub final_state: Option<RgState>,
    pub range: RgUsageRange,
}

/// Pass 节点（内部使用）
pub(crate) struct RgPassNode<'a> {
    pub name: String,
    pub queue: RgQueue,
    pub usages: Vec<RgResolvedUsage>,
    pub pass: Box<dyn RgPass + 'a>,
}

/// 校验 usage 列表，并解析到具体的资源和范围
///
/// - 视图必须属于当前构建周期
/// - image 的 usage 不能要求 `UNDEFINED` layout
/// - 同一个 pass 内，同一资源上重叠的 usage 必须使用相同的 layout 和 final state
/// - graph 自己创建的资源不能声明 final state
pub(crate) fn resolve_usages(
    table: &RgResourceTable,
    pass_name: &str,
    usages: &[RgUsage],
) -> GraphResult<Vec<RgResolvedUsage>> {
    let mut resolved: Vec<RgResolvedUsage> = Vec::with_capacity(usages.len());

    for usage in usages {
        let view = table.view(usage.view)?;
        let resource = table.resource(view.resource)?;

        let incompatible = |reason: &'static str| GraphConstructionError::IncompatibleUsages {
            pass: pass_name.to_string(),
            resource: resource.name.clone(),
            reason,
        };

        let (range, state, final_state) = match view.kind.image_range() {
            Some(range) => {
                if usage.state.layout == vk::ImageLayout::UNDEFINED
                    || usage.final_state.is_some_and(|state| state.layout == vk::ImageLayout::UNDEFINED)
                {
                    return Err(incompatible("an image usage cannot request the UNDEFINED layout").into());
                }
                (RgUsageRange::Image(range), usage.state, usage.final_state)
            }
            None => {
                // buffer 没有 layout
                let (begin, end) = view.kind.byte_range().unwrap_or_default();
                let strip = |state: RgState| RgState::buffer(state.stage, state.access);
                (RgUsageRange::Buffer { begin, end }, strip(usage.state), usage.final_state.map(strip))
            }
        };

        if final_state.is_some() && !resource.is_external() {
            return Err(GraphConstructionError::FinalStateOnOwned {
                pass: pass_name.to_string(),
                resource: resource.name.clone(),
            }
            .into());
        }

        for other in resolved.iter().filter(|other| other.resource == view.resource) {
            if !other.range.overlaps(&range) {
                continue;
            }
            if other.state.layout != state.layout {
                return Err(incompatible("overlapping usages disagree on layout").into());
            }
            if let (Some(a), Some(b)) = (other.final_state, final_state)
                && a != b
            {
                return Err(incompatible("overlapping usages declare different final states").into());
            }
        }

        resolved.push(RgResolvedUsage {
            resource: view.resource,
            state,
            final_state,
            range,
        });
    }

    Ok(resolved)
}
