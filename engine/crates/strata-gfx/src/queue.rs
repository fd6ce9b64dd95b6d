use std::fmt::{Display, Formatter};

/// 渲染图调度的三种 queue
///
/// 每种 queue 对应一个 timeline semaphore，batch 之间的同步都通过它完成
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GfxQueueType {
    Graphics,
    Compute,
    Transfer,
}

impl GfxQueueType {
    pub const COUNT: usize = 3;
    pub const ALL: [GfxQueueType; Self::COUNT] = [Self::Graphics, Self::Compute, Self::Transfer];

    /// 用于索引 `[T; GfxQueueType::COUNT]`
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Graphics => 0,
            Self::Compute => 1,
            Self::Transfer => 2,
        }
    }

    #[inline]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Graphics => "G",
            Self::Compute => "C",
            Self::Transfer => "T",
        }
    }
}

impl Display for GfxQueueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
            Self::Transfer => "transfer",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (i, queue) in GfxQueueType::ALL.iter().enumerate() {
            assert_eq!(queue.index(), i);
        }
    }
}
