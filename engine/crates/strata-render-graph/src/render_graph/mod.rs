//! RenderGraph - 每帧重建的声明式渲染图
//!
//! # 核心概念
//!
//! - **RgResourceHandle / RgViewHandle / RgPassHandle**: 带构建周期 epoch 的句柄，过期后使用会报错
//! - **RgState**: 资源状态，包含 stage、access、layout
//! - **RgUsage**: pass 对一个视图的使用声明，可以附带外部资源的帧末状态
//! - **RgPass**: pass 的录制逻辑，只能通过 [`RgPassContext`] 访问 command list 和 registry
//! - **RenderGraphBuilder**: 一个构建周期，声明资源、注册 pass、编译或执行
//! - **RgCompiledGraph**: 编译结果，包含剔除结果、barrier、batch 划分
//!
//! # 使用示例
//!
//! ```ignore
//! let mut graph = RenderGraph::new(device, RenderGraphConfig::default());
//!
//! let mut builder = graph.builder();
//! let swapchain = builder.import_image("swapchain", image, desc, &mut swapchain_sync)?;
//! let color = builder.create_image_view(swapchain, RgImageViewDesc::whole())?;
//! builder.add_pass(
//!     "clear",
//!     RgQueue::Graphics,
//!     vec![RgUsage::new(color, RgState::TRANSFER_DST).with_final_state(RgState::PRESENT)],
//!     |ctx: &mut RgPassContext| {
//!         let image = ctx.registry().image(swapchain).unwrap();
//!         // 录制 clear...
//!     },
//! )?;
//! builder.execute()?;
//!
//! graph.next_frame();
//! // ...
//! graph.destroy();
//! ```
//!
//! # 模块结构
//!
//! - `handle`: 句柄定义
//! - `resource_state`: 资源状态封装
//! - `resource`: 资源与视图的描述，构建周期内的资源表
//! - `pass`: pass trait、usage 校验
//! - `culling`: 反向可达性剔除
//! - `tracker`: 子资源级的依赖追踪
//! - `barrier`: barrier 的合并与转换
//! - `batcher`: batch 划分与 timeline 同步
//! - `compiled`: 编译结果与执行计划打印
//! - `frame_resources`: ring slot 的物理资源、视图、command pool
//! - `registry`: 录制期间的句柄解析
//! - `executor`: 构建器与执行流程
//! - `graph`: 跨帧持有的渲染图

mod barrier;
mod batcher;
mod compiled;
mod culling;
mod executor;
mod frame_counter;
mod frame_resources;
mod graph;
mod handle;
mod pass;
mod registry;
mod resource;
mod resource_state;
mod tracker;

#[cfg(test)]
mod mock_device;

// Re-exports
pub use barrier::{RgBarrier, RgBarrierRange};
pub use batcher::{RgBatch, RgTimelineState};
pub use compiled::RgCompiledGraph;
pub use executor::{RenderGraphBuilder, RgFrameReport};
pub use frame_counter::{RgFrameCounter, RgFrameLabel};
pub use frame_resources::RgFrameResources;
pub use graph::RenderGraph;
pub use handle::{RgPassHandle, RgResourceHandle, RgViewHandle};
pub use pass::{RgPass, RgPassContext, RgUsage};
pub use registry::{RgBufferViewData, RgImageViewData, RgMappedView, RgPhysicalView, RgRegistry, RgRegistryResult};
pub use resource::{
    RgBufferViewDesc, RgExternalSync, RgImageRange, RgImageViewDesc, RgQueue, RgRawResource, RgResourceDesc,
    RgViewKind,
};
pub use resource_state::RgState;
