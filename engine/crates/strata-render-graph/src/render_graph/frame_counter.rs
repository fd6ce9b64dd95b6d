use std::fmt::Display;

/// ring slot 的标签
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RgFrameLabel {
    A,
    B,
}

impl Display for RgFrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

impl RgFrameLabel {
    #[inline]
    pub fn from_slot(slot: usize) -> Self {
        if slot % RgFrameCounter::SLOT_COUNT == 0 { Self::A } else { Self::B }
    }

    #[inline]
    pub fn slot(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// 帧序号与 ring slot
///
/// `next_frame` 只推进计数，不会分配或释放任何资源
#[derive(Clone, Debug)]
pub struct RgFrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
}

// new & init
impl RgFrameCounter {
    pub fn new(init_frame_id: u64) -> Self {
        Self { frame_id: init_frame_id }
    }
}

// update
impl RgFrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}

// getters
impl RgFrameCounter {
    pub const SLOT_COUNT: usize = 2;

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn slot(&self) -> usize {
        (self.frame_id % Self::SLOT_COUNT as u64) as usize
    }

    #[inline]
    pub fn frame_label(&self) -> RgFrameLabel {
        RgFrameLabel::from_slot(self.slot())
    }

    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_name_and_slot() {
        let mut counter = RgFrameCounter::new(12);
        assert_eq!(counter.frame_name(), "[F12A]");
        counter.next_frame();
        assert_eq!(counter.slot(), 1);
        assert_eq!(counter.frame_label(), RgFrameLabel::B);
        assert_eq!(counter.frame_name(), "[F13B]");
    }
}
