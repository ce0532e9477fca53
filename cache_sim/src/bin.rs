/// mask with the lowest `len` bits set. `len` may be 64.
#[inline]
pub const fn low_mask(len: u32) -> u64 {
    if len >= u64::BITS {
        u64::MAX
    } else {
        (1 << len) - 1
    }
}

/// mask covering `len` bits starting at bit `start`.
#[inline]
pub const fn field_mask(start: u32, len: u32) -> u64 {
    if start >= u64::BITS {
        0
    } else {
        low_mask(len) << start
    }
}

/// extracts the field described by `mask`, shifted down by `start`.
#[inline]
pub const fn extract(bin: u64, mask: u64, start: u32) -> u64 {
    if start >= u64::BITS {
        0
    } else {
        (bin & mask) >> start
    }
}

/// `bin << amount` that yields 0 instead of overflowing on full-width shifts.
#[inline]
pub const fn shl(bin: u64, amount: u32) -> u64 {
    if amount >= u64::BITS {
        0
    } else {
        bin << amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_mask() {
        assert_eq!(0, low_mask(0));
        assert_eq!(0b11111, low_mask(5));
        assert_eq!(u64::MAX, low_mask(64));
    }
    #[test]
    fn test_field_mask() {
        assert_eq!(0b110000, field_mask(4, 2));
        assert_eq!(0, field_mask(7, 0));
        assert_eq!(!0b11111u64, field_mask(5, 59));
        assert_eq!(0, field_mask(64, 0));
    }
    #[test]
    fn test_extract() {
        let mask = field_mask(5, 4);
        assert_eq!(0b1010, extract(0b1_1010_10101, mask, 5));
        assert_eq!(0, extract(u64::MAX, 0, 64));
    }
}
