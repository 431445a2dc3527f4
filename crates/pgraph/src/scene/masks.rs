//! Visibility and collision bitmasks

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Collision bits a node can be collided into, or the union over a subtree
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CollideMask: u32 {
        /// Bit conventionally set on visible geometry
        const GEOM = 1 << 20;
        const _ = !0;
    }
}

bitflags! {
    /// Camera bits a node is drawn for
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DrawMask: u32 {
        /// Bit of the default camera
        const CAMERA_0 = 1 << 0;
        const _ = !0;
    }
}

impl CollideMask {
    /// Every bit on
    pub const fn all_on() -> Self {
        Self::from_bits_retain(u32::MAX)
    }

    /// Only bit `index` on; empty when `index` is 32 or more
    pub const fn bit(index: u32) -> Self {
        match 1_u32.checked_shl(index) {
            Some(bits) => Self::from_bits_retain(bits),
            None => Self::empty(),
        }
    }
}

impl DrawMask {
    /// Every bit on
    pub const fn all_on() -> Self {
        Self::from_bits_retain(u32::MAX)
    }

    /// Only bit `index` on; empty when `index` is 32 or more
    pub const fn bit(index: u32) -> Self {
        match 1_u32.checked_shl(index) {
            Some(bits) => Self::from_bits_retain(bits),
            None => Self::empty(),
        }
    }
}

impl fmt::Display for CollideMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.bits())
    }
}

impl fmt::Display for DrawMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_keep_unnamed_bits() {
        let mask = CollideMask::from_bits_retain(0x7);
        assert_eq!((mask & CollideMask::all_on()).bits(), 0x7);
        assert_eq!((mask | CollideMask::bit(4)).bits(), 0x17);
        assert_eq!(DrawMask::all_on().bits(), u32::MAX);
        assert_eq!(CollideMask::bit(1).to_string(), "0x00000002");
    }

    #[test]
    fn test_bit_out_of_range_is_empty() {
        assert_eq!(CollideMask::bit(31).bits(), 0x8000_0000);
        assert!(CollideMask::bit(32).is_empty());
        assert!(DrawMask::bit(40).is_empty());
    }
}
