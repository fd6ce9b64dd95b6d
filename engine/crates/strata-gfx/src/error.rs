use ash::vk;

/// 设备层面的错误，渲染图不会尝试恢复，直接向上传递
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("vulkan call `{call}` failed: {result}")]
    Vulkan { call: &'static str, result: vk::Result },

    #[error("allocation of `{name}` failed: {result}")]
    Allocation { name: String, result: vk::Result },

    #[error("timed out after {timeout_ns}ns waiting for {queue} timeline value {value}")]
    Timeout {
        queue: crate::GfxQueueType,
        value: u64,
        timeout_ns: u64,
    },

    #[error("queue {0} is not available on this device")]
    QueueUnavailable(crate::GfxQueueType),

    #[error("buffer {0:?} is not host visible")]
    NotHostVisible(vk::Buffer),

    #[error("unknown object {0}")]
    UnknownObject(String),

    #[error("device lost")]
    DeviceLost,
}

impl GfxError {
    /// 将 `vk::Result` 转换为 GfxError，`ERROR_DEVICE_LOST` 单独处理
    #[inline]
    pub fn vk(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            result => Self::Vulkan { call, result },
        }
    }
}

pub type GfxResult<T> = Result<T, GfxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_is_distinct() {
        let err = GfxError::vk("vkQueueSubmit2")(vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(err, GfxError::DeviceLost));

        let err = GfxError::vk("vkQueueSubmit2")(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert!(err.to_string().contains("vkQueueSubmit2"));
    }
}
