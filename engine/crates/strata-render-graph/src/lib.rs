//! strata 的渲染图
//!
//! 每帧重新声明资源和 pass，由渲染图负责：
//! - 剔除没有贡献的 pass 和资源
//! - 推导 barrier 和跨 queue 的 timeline semaphore 同步
//! - 在两个 ring slot 之间复用瞬态资源和 command buffer

pub mod config;
pub mod error;
pub mod render_graph;

pub use config::RenderGraphConfig;
pub use error::{GraphAllocationError, GraphConstructionError, GraphResult, RgError, RgRegistryError};
