use strata_gfx::{GfxError, GfxQueueType};

use crate::render_graph::{RgResourceHandle, RgViewHandle};

/// 构建期的契约错误：描述非法、句柄失效、范围越界、usage 冲突等
///
/// 这些都是调用方的 bug，在调用的那一刻就会返回，不会推迟到 execute
#[derive(Debug, thiserror::Error)]
pub enum GraphConstructionError {
    #[error("resource `{name}` has an invalid descriptor: {reason}")]
    InvalidDescriptor { name: String, reason: &'static str },

    #[error("handle {handle} belongs to construction epoch {handle_epoch}, current epoch is {current_epoch}")]
    StaleHandle {
        handle: String,
        handle_epoch: u32,
        current_epoch: u32,
    },

    #[error("unknown resource {0:?}")]
    UnknownResource(RgResourceHandle),

    #[error("unknown view {0:?}")]
    UnknownView(RgViewHandle),

    #[error("view on `{resource}` does not match the resource kind: {reason}")]
    ViewKindMismatch { resource: String, reason: &'static str },

    #[error("view on `{resource}` is out of range: {detail}")]
    ViewOutOfRange { resource: String, detail: String },

    #[error("pass `{pass}` declares incompatible usages of `{resource}`: {reason}")]
    IncompatibleUsages {
        pass: String,
        resource: String,
        reason: &'static str,
    },

    #[error("pass `{pass}` declares a final state on `{resource}`, which is owned by the graph")]
    FinalStateOnOwned { pass: String, resource: String },

    #[error("pass `{pass}` targets the {queue} queue, which the device does not provide")]
    UnsupportedQueue { pass: String, queue: GfxQueueType },
}

/// 资源耗尽：物理资源、command buffer、bindless 下标分配失败
///
/// 整帧放弃，不会提交任何 batch
#[derive(Debug, thiserror::Error)]
pub enum GraphAllocationError {
    #[error("failed to allocate `{name}`")]
    Resource {
        name: String,
        #[source]
        source: GfxError,
    },

    #[error("failed to create view `{name}`")]
    View {
        name: String,
        #[source]
        source: GfxError,
    },

    #[error("failed to grow the {queue} command pool")]
    CommandPool {
        queue: GfxQueueType,
        #[source]
        source: GfxError,
    },

    #[error("bindless table for {kind:?} is exhausted (capacity {capacity})")]
    BindlessExhausted {
        kind: strata_gfx::resources::bindless::GfxDescriptorKind,
        capacity: u32,
    },
}

/// pass 录制期间通过 registry 查询资源时的错误
#[derive(Debug, thiserror::Error)]
pub enum RgRegistryError {
    #[error("handle {0} does not belong to this execution")]
    StaleHandle(String),

    #[error("handle {0} is unknown")]
    Unknown(String),

    #[error("`{0}` was culled and has no physical object")]
    Culled(String),

    #[error("`{name}` is not {expected}")]
    WrongKind { name: String, expected: &'static str },

    #[error("view on `{name}` has no {kind:?} descriptor")]
    NoDescriptor {
        name: String,
        kind: strata_gfx::resources::bindless::GfxDescriptorKind,
    },

    #[error("`{0}` is already mapped")]
    AlreadyMapped(String),

    #[error("failed to map `{name}`")]
    Map {
        name: String,
        #[source]
        source: GfxError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RgError {
    #[error(transparent)]
    Construction(#[from] GraphConstructionError),

    #[error(transparent)]
    Allocation(#[from] GraphAllocationError),

    #[error(transparent)]
    Registry(#[from] RgRegistryError),

    #[error("device error")]
    Device(#[from] GfxError),
}

pub type GraphResult<T> = Result<T, RgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_error_message_names_pass_and_resource() {
        let err: RgError = GraphConstructionError::IncompatibleUsages {
            pass: "lighting".to_string(),
            resource: "gbuffer".to_string(),
            reason: "overlapping usages disagree on layout",
        }
        .into();
        let message = err.to_string();
        assert!(message.contains("lighting"));
        assert!(message.contains("gbuffer"));
    }

    #[test]
    fn test_device_error_keeps_source() {
        let err: RgError = GfxError::DeviceLost.into();
        assert!(matches!(err, RgError::Device(GfxError::DeviceLost)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
