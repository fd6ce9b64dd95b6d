pub mod device_context;
pub mod vulkan_context;
