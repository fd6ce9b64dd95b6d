//! Barrier 描述
//!
//! tracker 以子资源为单位计算 barrier，这里负责把同一个 pass 内
//! 作用于同一资源、目标状态相同的子资源合并成一个 [`RgBarrier`]，
//! 并在录制时转换为 `GfxImageBarrier` / `GfxBufferBarrier`。

use std::collections::BTreeMap;

use ash::vk;
use strata_gfx::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};

use crate::render_graph::{RgImageRange, RgRawResource, RgResourceHandle, RgState};

/// barrier 覆盖的一段子资源
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RgBarrierRange {
    /// image 的一段 mip / layer，每段有自己的旧 layout
    Image { range: RgImageRange, old_layout: vk::ImageLayout },
    Buffer { offset: vk::DeviceSize, size: vk::DeviceSize },
}

/// 同一资源、同一目标状态的 barrier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgBarrier {
    pub resource: RgResourceHandle,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst: RgState,
    pub ranges: Vec<RgBarrierRange>,
}

// getters
impl RgBarrier {
    /// 覆盖的 image layer 总数（只统计 mip 0 所在的段）
    pub fn layer_count(&self) -> u32 {
        self.ranges
            .iter()
            .filter_map(|range| match range {
                RgBarrierRange::Image { range, .. } if range.base_mip == 0 => Some(range.layer_count),
                _ => None,
            })
            .sum()
    }

    #[inline]
    pub fn is_layout_transition(&self) -> bool {
        self.ranges.iter().any(|range| match range {
            RgBarrierRange::Image { old_layout, .. } => *old_layout != self.dst.layout,
            RgBarrierRange::Buffer { .. } => false,
        })
    }
}

// tools
impl RgBarrier {
    /// 转换为 GFX 层的 barrier，每段 range 一个
    pub fn to_gfx_barriers(
        &self,
        raw: RgRawResource,
        aspect: vk::ImageAspectFlags,
        image_barriers: &mut Vec<GfxImageBarrier>,
        buffer_barriers: &mut Vec<GfxBufferBarrier>,
    ) {
        for range in &self.ranges {
            match (raw, range) {
                (RgRawResource::Image(image), RgBarrierRange::Image { range, old_layout }) => {
                    image_barriers.push(
                        GfxImageBarrier::new()
                            .image(image)
                            .layout_transfer(*old_layout, self.dst.layout)
                            .src_mask(self.src_stage, self.src_access)
                            .dst_mask(self.dst.stage, self.dst.access)
                            .subresource_range(range.subresource_range(aspect)),
                    );
                }
                (RgRawResource::Buffer(buffer), RgBarrierRange::Buffer { offset, size }) => {
                    buffer_barriers.push(
                        GfxBufferBarrier::new()
                            .buffer(buffer, *offset, *size)
                            .src_mask(self.src_stage, self.src_access)
                            .dst_mask(self.dst.stage, self.dst.access),
                    );
                }
                _ => log::error!("barrier range does not match {:?} of {:?}", raw, self.resource),
            }
        }
    }
}

/// 一个子资源上的 barrier（tracker 的中间结果）
#[derive(Copy, Clone, Debug)]
pub(crate) struct RgCellBarrier {
    pub resource: RgResourceHandle,
    pub cell: RgCell,
    pub old_layout: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst: RgState,
}

/// 子资源单元
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum RgCell {
    Image { mip: u32, layer: u32 },
    /// 字节区间 [begin, end)
    Buffer { begin: vk::DeviceSize, end: vk::DeviceSize },
}

/// 按 (resource, dst) 合并子资源 barrier
///
/// 结果的顺序与 (resource, dst) 第一次出现的顺序一致
pub(crate) fn merge_cell_barriers(cells: &[RgCellBarrier]) -> Vec<RgBarrier> {
    let mut groups: Vec<((RgResourceHandle, RgState), Vec<&RgCellBarrier>)> = vec![];
    for cell in cells {
        let key = (cell.resource, cell.dst);
        match groups.iter_mut().find(|(group_key, _)| *group_key == key) {
            Some((_, group)) => group.push(cell),
            None => groups.push((key, vec![cell])),
        }
    }

    groups
        .into_iter()
        .map(|((resource, dst), group)| {
            let (src_stage, src_access) = group.iter().fold(
                (vk::PipelineStageFlags2::empty(), vk::AccessFlags2::empty()),
                |(stage, access), cell| (stage | cell.src_stage, access | cell.src_access),
            );
            RgBarrier {
                resource,
                src_stage,
                src_access,
                dst,
                ranges: coalesce_ranges(group.iter().map(|cell| (cell.cell, cell.old_layout))),
            }
        })
        .collect()
}

/// image：同一 mip 内连续且旧 layout 相同的 layer 合并成一段，再把相邻 mip 上完全相同的段合并；
/// buffer：相邻的字节区间合并
fn coalesce_ranges(cells: impl Iterator<Item = (RgCell, vk::ImageLayout)>) -> Vec<RgBarrierRange> {
    let mut image_layers: BTreeMap<(u32, i32), Vec<u32>> = BTreeMap::new();
    let mut buffer_ranges = vec![];
    for (cell, old_layout) in cells {
        match cell {
            RgCell::Image { mip, layer } => image_layers.entry((mip, old_layout.as_raw())).or_default().push(layer),
            RgCell::Buffer { begin, end } => buffer_ranges.push((begin, end)),
        }
    }

    // (mip, old_layout) -> layer runs
    let mut runs: Vec<(u32, vk::ImageLayout, u32, u32)> = vec![];
    for ((mip, layout), mut layers) in image_layers {
        layers.sort_unstable();
        layers.dedup();
        for (base, count) in consecutive_runs(&layers) {
            runs.push((mip, vk::ImageLayout::from_raw(layout), base, count));
        }
    }
    runs.sort_by_key(|(mip, layout, base, count)| (layout.as_raw(), *base, *count, *mip));

    let mut ranges: Vec<RgBarrierRange> = vec![];
    for (mip, layout, base_layer, layer_count) in runs {
        if let Some(RgBarrierRange::Image { range, old_layout }) = ranges.last_mut()
            && *old_layout == layout
            && range.base_layer == base_layer
            && range.layer_count == layer_count
            && range.base_mip + range.mip_count == mip
        {
            range.mip_count += 1;
            continue;
        }
        ranges.push(RgBarrierRange::Image {
            range: RgImageRange {
                base_mip: mip,
                mip_count: 1,
                base_layer,
                layer_count,
            },
            old_layout: layout,
        });
    }

    buffer_ranges.sort_unstable();
    for (begin, end) in buffer_ranges {
        if let Some(RgBarrierRange::Buffer { offset, size }) = ranges.last_mut()
            && *offset + *size == begin
        {
            *size = end - *offset;
            continue;
        }
        ranges.push(RgBarrierRange::Buffer {
            offset: begin,
            size: end - begin,
        });
    }

    ranges
}

/// 有序、去重的下标切分为 (起点, 长度) 的连续段
fn consecutive_runs(sorted: &[u32]) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = vec![];
    for &value in sorted {
        match runs.last_mut() {
            Some((base, count)) if *base + *count == value => *count += 1,
            _ => runs.push((value, 1)),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_cell(layer: u32, old_layout: vk::ImageLayout) -> RgCellBarrier {
        RgCellBarrier {
            resource: RgResourceHandle::new(0, 1),
            cell: RgCell::Image { mip: 0, layer },
            old_layout,
            src_stage: vk::PipelineStageFlags2::TOP_OF_PIPE,
            src_access: vk::AccessFlags2::NONE,
            dst: RgState::SHADER_READ_FRAGMENT,
        }
    }

    #[test]
    fn test_layers_with_same_old_layout_coalesce() {
        let cells = [
            image_cell(0, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            image_cell(1, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            image_cell(2, vk::ImageLayout::UNDEFINED),
            image_cell(3, vk::ImageLayout::UNDEFINED),
        ];
        let barriers = merge_cell_barriers(&cells);
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].ranges.len(), 2);
        assert_eq!(barriers[0].layer_count(), 4);
    }

    #[test]
    fn test_mips_with_identical_runs_coalesce() {
        let mut cells = vec![];
        for mip in 0..3 {
            for layer in 0..2 {
                cells.push(RgCellBarrier {
                    cell: RgCell::Image { mip, layer },
                    ..image_cell(0, vk::ImageLayout::GENERAL)
                });
            }
        }
        let barriers = merge_cell_barriers(&cells);
        assert_eq!(
            barriers[0].ranges,
            vec![RgBarrierRange::Image {
                range: RgImageRange {
                    base_mip: 0,
                    mip_count: 3,
                    base_layer: 0,
                    layer_count: 2
                },
                old_layout: vk::ImageLayout::GENERAL,
            }]
        );
    }

    #[test]
    fn test_adjacent_buffer_intervals_merge() {
        let cell = |begin, end| RgCellBarrier {
            resource: RgResourceHandle::new(1, 1),
            cell: RgCell::Buffer { begin, end },
            old_layout: vk::ImageLayout::UNDEFINED,
            src_stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
            src_access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
            dst: RgState::STORAGE_BUFFER_READ_COMPUTE,
        };
        let barriers = merge_cell_barriers(&[cell(64, 128), cell(0, 64), cell(192, 256)]);
        assert_eq!(
            barriers[0].ranges,
            vec![RgBarrierRange::Buffer { offset: 0, size: 128 }, RgBarrierRange::Buffer { offset: 192, size: 64 }]
        );
    }
}
