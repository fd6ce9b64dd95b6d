//! 依赖追踪
//!
//! 以子资源为单位（image 的一个 (mip, layer)，buffer 的一个基本字节区间）
//! 按注册顺序重放所有存活 pass 的访问，得到：
//!
//! - 每个 pass 之前需要录制的 barrier
//! - 每个 pass 对其他 queue 的依赖（之后由 batcher 转换为 semaphore wait）
//! - 外部资源在帧末需要的 release barrier
//!
//! 每个子资源维护一个"段"：段的开头是一次写入或 layout 变化，之后是若干读取。
//! 同 queue 的前驱贡献 barrier 的 src，跨 queue 的前驱产生依赖。

use std::collections::BTreeMap;

use ash::vk;

use crate::render_graph::{
    RgQueue, RgResourceDesc, RgResourceHandle, RgState,
    barrier::{RgBarrier, RgCell, RgCellBarrier, merge_cell_barriers},
    culling::RgCullResult,
    pass::{RgPassNode, RgUsageRange},
    resource::RgResourceTable,
};

/// 依赖的目标
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RgDepTarget {
    /// 本帧的某个 pass，需要等待它所在 batch 的 signal
    Pass(usize),
    /// 外部资源记录的 timeline 值
    Timeline(u64),
}

/// pass 对另一个 queue 的依赖
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct RgDependency {
    pub queue: RgQueue,
    pub target: RgDepTarget,
    /// 消费者需要在哪个 stage 之前等待
    pub stage: vk::PipelineStageFlags2,
}

/// 外部资源帧末的交还
#[derive(Clone, Debug)]
pub(crate) struct RgRelease {
    pub resource: RgResourceHandle,
    /// 最后一个使用该资源的 pass
    pub last_pass: usize,
    pub queue: RgQueue,
    pub final_state: RgState,
    pub barrier: Option<RgBarrier>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RgTrackResult {
    pub pass_barriers: Vec<Vec<RgBarrier>>,
    pub pass_deps: Vec<Vec<RgDependency>>,
    pub releases: Vec<RgRelease>,
}

/// 对子资源的一次访问
#[derive(Copy, Clone, Debug)]
struct RgAccess {
    origin: RgDepTarget,
    /// None 表示不属于任何 queue（外部资源的初始状态）
    queue: Option<RgQueue>,
    stage: vk::PipelineStageFlags2,
    /// 只保留写操作
    access: vk::AccessFlags2,
}

#[derive(Clone, Debug)]
struct RgCellState {
    layout: vk::ImageLayout,
    /// 当前段的开头
    writer: Option<RgAccess>,
    /// 当前段的读取者，每个 queue 最多一个
    readers: Vec<RgAccess>,
    /// 当前段里已经有 barrier 覆盖了这个 queue 上的读取
    covered: [bool; RgQueue::COUNT],
    /// 最后一次访问的状态
    current: RgState,
}

impl RgCellState {
    fn owned() -> Self {
        Self {
            layout: vk::ImageLayout::UNDEFINED,
            writer: None,
            readers: vec![],
            covered: [false; RgQueue::COUNT],
            current: RgState::UNDEFINED,
        }
    }

    fn external(state: RgState, queue: Option<RgQueue>, timeline_value: u64) -> Self {
        let mut cell = Self {
            layout: state.layout,
            current: state,
            ..Self::owned()
        };

        // TOP_OF_PIPE 表示之前没有需要等待的访问
        if state.stage.is_empty() || state.stage == vk::PipelineStageFlags2::TOP_OF_PIPE {
            return cell;
        }
        let access = RgAccess {
            origin: RgDepTarget::Timeline(timeline_value),
            queue,
            stage: state.stage,
            access: state.src_access(),
        };
        if state.is_write() {
            cell.writer = Some(access);
        } else {
            cell.readers.push(access);
        }
        cell
    }

    fn predecessors(&self) -> impl Iterator<Item = &RgAccess> {
        self.writer.iter().chain(self.readers.iter())
    }

    fn add_reader(&mut self, pass: usize, queue: RgQueue, state: &RgState) {
        match self.readers.iter_mut().find(|reader| reader.queue == Some(queue)) {
            Some(reader) => {
                reader.origin = RgDepTarget::Pass(pass);
                reader.stage |= state.stage;
            }
            None => self.readers.push(RgAccess {
                origin: RgDepTarget::Pass(pass),
                queue: Some(queue),
                stage: state.stage,
                access: vk::AccessFlags2::NONE,
            }),
        }
    }
}

/// 子资源的一条访问记录
#[derive(Copy, Clone, Debug)]
struct RgCellEntry {
    queue: RgQueue,
    state: RgState,
}

/// 一个资源被切分出的子资源
struct RgResourceCells {
    cells: Vec<RgCell>,
    /// image 的 layer 数，用于计算下标
    layers: u32,
    states: Vec<RgCellState>,
    history: Vec<Vec<RgCellEntry>>,
    /// 当前处理到 history 中的哪一条
    cursor: Vec<usize>,
}

impl RgResourceCells {
    fn new(table: &RgResourceTable, resource: usize) -> Self {
        let entry = &table.resources()[resource];
        let (cells, layers) = match &entry.desc {
            RgResourceDesc::Image(desc) => {
                let cells = (0..desc.mip_levels)
                    .flat_map(|mip| (0..desc.array_layers).map(move |layer| RgCell::Image { mip, layer }))
                    .collect::<Vec<_>>();
                (cells, desc.array_layers)
            }
            RgResourceDesc::Buffer(desc) => {
                // 所有视图的边界把 buffer 切成基本区间
                let mut bounds = vec![0, desc.size];
                for view in table.views().iter().filter(|view| view.resource.index() == resource) {
                    if let Some((begin, end)) = view.kind.byte_range() {
                        bounds.extend([begin, end]);
                    }
                }
                bounds.sort_unstable();
                bounds.dedup();
                let cells = bounds.windows(2).map(|w| RgCell::Buffer { begin: w[0], end: w[1] }).collect::<Vec<_>>();
                (cells, 0)
            }
        };

        let initial = match &entry.import {
            Some(import) => {
                let sync = import.initial;
                let state = if entry.desc.is_image() {
                    sync.state
                } else {
                    RgState::buffer(sync.state.stage, sync.state.access)
                };
                RgCellState::external(state, sync.queue, sync.timeline_value)
            }
            None => RgCellState::owned(),
        };

        Self {
            states: vec![initial; cells.len()],
            history: vec![vec![]; cells.len()],
            cursor: vec![0; cells.len()],
            cells,
            layers,
        }
    }

    fn cell_indices(&self, range: &RgUsageRange) -> Vec<usize> {
        match range {
            RgUsageRange::Image(range) => (range.base_mip..range.base_mip + range.mip_count)
                .flat_map(|mip| {
                    (range.base_layer..range.base_layer + range.layer_count)
                        .map(move |layer| (mip * self.layers + layer) as usize)
                })
                .collect(),
            RgUsageRange::Buffer { begin, end } => self
                .cells
                .iter()
                .enumerate()
                .filter(|(_, cell)| matches!(cell, RgCell::Buffer { begin: b, end: e } if b >= begin && e <= end))
                .map(|(idx, _)| idx)
                .collect(),
        }
    }

    /// 从 `pos` 开始，同一段内、同一 queue 上所有读取的合并状态
    fn lookahead_reads(&self, cell: usize, pos: usize, queue: RgQueue) -> RgState {
        let history = &self.history[cell];
        let first = history[pos].state;
        history[pos + 1..]
            .iter()
            .take_while(|entry| entry.state.is_read_only() && entry.state.layout == first.layout)
            .filter(|entry| entry.queue == queue)
            .fold(first, |merged, entry| merged.merge(&entry.state))
    }
}

/// 累积的 src mask 和依赖
#[derive(Default)]
struct RgSyncSources {
    stage: vk::PipelineStageFlags2,
    access: vk::AccessFlags2,
    has_cross_queue: bool,
}

impl RgSyncSources {
    /// 同 queue 的前驱进入 src，其他 queue 的前驱变成依赖
    fn add(
        &mut self,
        pred: &RgAccess,
        queue: RgQueue,
        wait_stage: vk::PipelineStageFlags2,
        deps: &mut Vec<RgDependency>,
    ) {
        match pred.queue {
            Some(pred_queue) if pred_queue != queue => {
                self.has_cross_queue = true;
                if pred.origin != RgDepTarget::Timeline(0) {
                    push_dependency(
                        deps,
                        RgDependency {
                            queue: pred_queue,
                            target: pred.origin,
                            stage: wait_stage,
                        },
                    );
                }
            }
            _ => {
                self.stage |= pred.stage;
                self.access |= pred.access;
            }
        }
    }
}

fn push_dependency(deps: &mut Vec<RgDependency>, dep: RgDependency) {
    match deps.iter_mut().find(|d| d.queue == dep.queue && d.target == dep.target) {
        Some(existing) => existing.stage |= dep.stage,
        None => deps.push(dep),
    }
}

pub(crate) fn track(table: &RgResourceTable, passes: &[RgPassNode<'_>], cull: &RgCullResult) -> RgTrackResult {
    strata_crate_tools::profile_scope!("RenderGraph::track");

    let mut resources: Vec<Option<RgResourceCells>> = (0..table.resources().len())
        .map(|idx| cull.resource_alive[idx].then(|| RgResourceCells::new(table, idx)))
        .collect();

    // 每个 pass 在每个子资源上的合并状态：同一 pass 内重叠的 usage layout 一致，直接合并
    let mut pass_cells: Vec<BTreeMap<(usize, usize), RgState>> = vec![BTreeMap::new(); passes.len()];
    for (pass_idx, pass) in passes.iter().enumerate() {
        if !cull.pass_alive[pass_idx] {
            continue;
        }
        for usage in &pass.usages {
            let Some(cells) = resources[usage.resource.index()].as_ref() else {
                continue;
            };
            for cell in cells.cell_indices(&usage.range) {
                pass_cells[pass_idx]
                    .entry((usage.resource.index(), cell))
                    .and_modify(|state| *state = state.merge(&usage.state))
                    .or_insert(usage.state);
            }
        }
        for (&(res, cell), state) in &pass_cells[pass_idx] {
            if let Some(cells) = resources[res].as_mut() {
                cells.history[cell].push(RgCellEntry {
                    queue: pass.queue,
                    state: *state,
                });
            }
        }
    }

    let mut result = RgTrackResult {
        pass_barriers: vec![vec![]; passes.len()],
        pass_deps: vec![vec![]; passes.len()],
        releases: vec![],
    };

    for (pass_idx, pass) in passes.iter().enumerate() {
        if !cull.pass_alive[pass_idx] {
            continue;
        }
        let queue = pass.queue;
        let mut cell_barriers = vec![];
        let deps = &mut result.pass_deps[pass_idx];

        for (&(res, cell), state) in &pass_cells[pass_idx] {
            let Some(cells) = resources[res].as_mut() else {
                continue;
            };
            let pos = cells.cursor[cell];
            cells.cursor[cell] += 1;

            let resource = RgResourceHandle::new(res, table.epoch());
            let layout_changed = state.layout != cells.states[cell].layout;

            if state.is_write() || layout_changed {
                // 新的段：与上一段的 writer 以及所有 reader 同步
                let mut sources = RgSyncSources::default();
                for pred in cells.states[cell].predecessors() {
                    sources.add(pred, queue, state.stage, deps);
                }

                if layout_changed || !sources.stage.is_empty() {
                    let src_stage = match (sources.stage.is_empty(), sources.has_cross_queue) {
                        (false, _) => sources.stage,
                        // 与 semaphore wait 的 stage 衔接
                        (true, true) => state.stage,
                        (true, false) => vk::PipelineStageFlags2::TOP_OF_PIPE,
                    };
                    let dst = if state.is_write() {
                        *state
                    } else {
                        cells.lookahead_reads(cell, pos, queue)
                    };
                    cell_barriers.push(RgCellBarrier {
                        resource,
                        cell: cells.cells[cell],
                        old_layout: cells.states[cell].layout,
                        src_stage,
                        src_access: sources.access,
                        dst,
                    });
                }

                let cell_state = &mut cells.states[cell];
                let access = RgAccess {
                    origin: RgDepTarget::Pass(pass_idx),
                    queue: Some(queue),
                    stage: state.stage,
                    access: state.src_access(),
                };
                cell_state.layout = state.layout;
                cell_state.writer = Some(access);
                cell_state.covered = [false; RgQueue::COUNT];
                cell_state.readers.clear();
                if state.is_read_only() {
                    // layout 转换的 barrier 已经覆盖了同 queue 的后续读取
                    cell_state.readers.push(access);
                    cell_state.covered[queue.index()] = true;
                }
            } else {
                let cell_state = &cells.states[cell];
                if let Some(writer) = cell_state.writer {
                    match writer.queue {
                        Some(writer_queue) if writer_queue != queue => {
                            let mut sources = RgSyncSources::default();
                            sources.add(&writer, queue, state.stage, deps);
                        }
                        _ if !cell_state.covered[queue.index()] => {
                            cell_barriers.push(RgCellBarrier {
                                resource,
                                cell: cells.cells[cell],
                                old_layout: cell_state.layout,
                                src_stage: writer.stage,
                                src_access: writer.access,
                                dst: cells.lookahead_reads(cell, pos, queue),
                            });
                            cells.states[cell].covered[queue.index()] = true;
                        }
                        _ => {}
                    }
                }
                cells.states[cell].add_reader(pass_idx, queue, state);
            }

            cells.states[cell].current = *state;
        }

        result.pass_barriers[pass_idx] = merge_cell_barriers(&cell_barriers);
        log::trace!(
            "track pass `{}`: {} barriers, {} dependencies",
            pass.name,
            result.pass_barriers[pass_idx].len(),
            result.pass_deps[pass_idx].len()
        );
    }

    for (res, entry) in table.resources().iter().enumerate() {
        if !entry.is_external() {
            continue;
        }
        let Some(cells) = resources[res].as_ref() else {
            continue;
        };
        if let Some(release) = track_release(table, passes, cull, res, cells, &mut result.pass_deps) {
            result.releases.push(release);
        }
    }

    result
}

/// 外部资源的帧末交还
///
/// 本帧没有任何存活的 usage 时什么都不做，调用者的同步记录保持不变
fn track_release(
    table: &RgResourceTable,
    passes: &[RgPassNode<'_>],
    cull: &RgCullResult,
    res: usize,
    cells: &RgResourceCells,
    pass_deps: &mut [Vec<RgDependency>],
) -> Option<RgRelease> {
    let mut last_pass = None;
    let mut declared_final = None;
    for (pass_idx, pass) in passes.iter().enumerate().filter(|(idx, _)| cull.pass_alive[*idx]) {
        for usage in pass.usages.iter().filter(|usage| usage.resource.index() == res) {
            last_pass = Some((pass_idx, usage.state));
            if let Some(final_state) = usage.final_state {
                declared_final = Some(final_state);
            }
        }
    }
    let (last_pass, last_state) = last_pass?;
    let queue = passes[last_pass].queue;
    let final_state = declared_final.unwrap_or(last_state);
    let resource = RgResourceHandle::new(res, table.epoch());

    let mut cell_barriers = vec![];
    for (cell, state) in cells.states.iter().enumerate() {
        // 在其他 queue 上的访问必须在交还之前完成
        let mut sources = RgSyncSources::default();
        for pred in state.predecessors() {
            sources.add(pred, queue, vk::PipelineStageFlags2::ALL_COMMANDS, &mut pass_deps[last_pass]);
        }

        if state.current == final_state {
            continue;
        }
        let src_stage = match (sources.stage.is_empty(), sources.has_cross_queue) {
            (false, _) => sources.stage,
            (true, true) => vk::PipelineStageFlags2::ALL_COMMANDS,
            (true, false) => vk::PipelineStageFlags2::TOP_OF_PIPE,
        };
        cell_barriers.push(RgCellBarrier {
            resource,
            cell: cells.cells[cell],
            old_layout: state.layout,
            src_stage,
            src_access: sources.access,
            dst: final_state,
        });
    }

    Some(RgRelease {
        resource,
        last_pass,
        queue,
        final_state,
        barrier: merge_cell_barriers(&cell_barriers).into_iter().next(),
    })
}
