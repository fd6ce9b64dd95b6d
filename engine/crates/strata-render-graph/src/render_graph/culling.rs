//! 剔除
//!
//! 从外部资源出发反向遍历 pass：
//! 用到了任何"需要的资源"的 pass 是存活的，存活 pass 用到的所有资源也变成需要的。
//! 外部资源永远是需要的，所以只读外部资源的 pass（例如 present 前的 layout 转换）也会保留。

use crate::render_graph::{pass::RgPassNode, resource::RgResourceTable};

/// 剔除结果，下标与 pass 表、资源表一一对应
#[derive(Clone, Debug, Default)]
pub(crate) struct RgCullResult {
    pub pass_alive: Vec<bool>,
    pub resource_alive: Vec<bool>,
}

impl RgCullResult {
    pub fn culled_pass_count(&self) -> usize {
        self.pass_alive.iter().filter(|alive| !**alive).count()
    }

    pub fn culled_resource_count(&self) -> usize {
        self.resource_alive.iter().filter(|alive| !**alive).count()
    }
}

pub(crate) fn cull(table: &RgResourceTable, passes: &[RgPassNode<'_>]) -> RgCullResult {
    let external = table.resources().iter().map(|entry| entry.is_external()).collect::<Vec<_>>();
    let mut needed = external.clone();
    let mut pass_alive = vec![false; passes.len()];

    // 较早的 pass 也可能让资源变成需要的，反复遍历直到不再变化
    let mut changed = true;
    while changed {
        changed = false;
        for (pass_idx, pass) in passes.iter().enumerate().rev() {
            if pass_alive[pass_idx] {
                continue;
            }
            // 没有任何 usage 的 pass 无法判断是否有副作用，保留
            let alive = pass.usages.is_empty() || pass.usages.iter().any(|usage| needed[usage.resource.index()]);
            if !alive {
                continue;
            }
            pass_alive[pass_idx] = true;
            changed = true;
            for usage in &pass.usages {
                needed[usage.resource.index()] = true;
            }
        }
    }

    // 外部资源总是存活；内部资源必须被某个存活的 pass 使用
    let mut resource_alive = external;
    for pass in passes.iter().zip(&pass_alive).filter(|(_, alive)| **alive).map(|(pass, _)| pass) {
        for usage in &pass.usages {
            resource_alive[usage.resource.index()] = true;
        }
    }

    let result = RgCullResult {
        pass_alive,
        resource_alive,
    };
    log::debug!(
        "cull: {} of {} passes, {} of {} resources",
        result.culled_pass_count(),
        passes.len(),
        result.culled_resource_count(),
        table.resources().len()
    );
    result
}
