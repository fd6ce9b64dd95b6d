pub mod bindless;
pub mod buffer;
pub mod image;
