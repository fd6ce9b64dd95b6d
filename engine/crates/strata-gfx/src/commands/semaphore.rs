use ash::vk;

use crate::{GfxError, GfxResult};

/// timeline semaphore
///
/// # Destroy
/// 不实现 Drop，需要手动调用 destroy
pub struct GfxSemaphore {
    semaphore: vk::Semaphore,
}

// new & destroy
impl GfxSemaphore {
    pub fn new_timeline(device: &ash::Device, initial_value: u64) -> GfxResult<Self> {
        let mut timeline_type_ci = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let timeline_semaphore_ci = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_type_ci);
        let semaphore = unsafe {
            device.create_semaphore(&timeline_semaphore_ci, None).map_err(GfxError::vk("vkCreateSemaphore"))?
        };

        Ok(Self { semaphore })
    }

    #[inline]
    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.semaphore, None);
        }
    }
}

// getters
impl GfxSemaphore {
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

// tools
impl GfxSemaphore {
    /// 当前 GPU 已经完成的值
    #[inline]
    pub fn completed_value(&self, device: &ash::Device) -> GfxResult<u64> {
        unsafe {
            device.get_semaphore_counter_value(self.semaphore).map_err(GfxError::vk("vkGetSemaphoreCounterValue"))
        }
    }

    /// 阻塞直到 timeline 达到 `timeline_value`
    ///
    /// 超时返回 `vk::Result::TIMEOUT`，由调用者转换为具体的错误
    #[inline]
    pub fn wait_timeline(&self, device: &ash::Device, timeline_value: u64, timeout_ns: u64) -> Result<(), vk::Result> {
        let wait_semaphore = [self.semaphore];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&wait_semaphore)
            .values(std::slice::from_ref(&timeline_value));
        unsafe { device.wait_semaphores(&wait_info, timeout_ns) }
    }
}
