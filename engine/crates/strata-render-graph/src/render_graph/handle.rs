//! RenderGraph 句柄定义
//!
//! 句柄是一次构建周期内各张表的下标，附带构建周期的 epoch。
//! 不同构建周期的句柄 epoch 不同，使用时会被识别为过期句柄。

use std::fmt;

macro_rules! rg_handle {
    ($(#[$meta:meta])* $name:ident, $debug_name:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            /// 在表中的下标
            pub(crate) index: u32,
            /// 所属构建周期
            pub(crate) epoch: u32,
        }

        impl $name {
            #[inline]
            pub(crate) fn new(index: usize, epoch: u32) -> Self {
                Self { index: index as u32, epoch }
            }

            #[inline]
            pub fn index(&self) -> usize {
                self.index as usize
            }

            #[inline]
            pub fn epoch(&self) -> u32 {
                self.epoch
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($debug_name, "({}@e{})"), self.index, self.epoch)
            }
        }
    };
}

rg_handle!(
    /// 逻辑资源（image 或 buffer）
    RgResourceHandle,
    "RgResource"
);

rg_handle!(
    /// 资源上的一个视图（image view 或 buffer view）
    RgViewHandle,
    "RgView"
);

rg_handle!(
    /// 已注册的 pass
    RgPassHandle,
    "RgPass"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_debug_format() {
        let handle = RgResourceHandle::new(3, 7);
        assert_eq!(format!("{handle:?}"), "RgResource(3@e7)");
        assert_eq!(handle.index(), 3);
    }

    #[test]
    fn test_handles_from_different_epochs_differ() {
        assert_ne!(RgViewHandle::new(0, 1), RgViewHandle::new(0, 2));
    }
}
