use std::fmt;

use bitmask_enum::bitmask;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
/// to unify displaying memory addresses
pub struct Addr(u64);

impl Addr {
    pub fn new(v: u64) -> Self {
        Self(v)
    }
    pub fn inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Kind of a memory access. The discriminants are the trace codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum AccessKind {
    Read = b'r',
    Write = b'w',
}

impl AccessKind {
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Read => write!(f, "read"),
            AccessKind::Write => write!(f, "write"),
        }
    }
}

/// Storage levels of the hierarchy.
#[bitmask(u8)]
pub enum Level {
    L1,
    Victim,
    L2,
    Memory,
}

impl Level {
    fn name(self) -> &'static str {
        if self == Self::L1 {
            "L1"
        } else if self == Self::Victim {
            "victim cache"
        } else if self == Self::L2 {
            "L2"
        } else {
            "memory"
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for l in [Self::L1, Self::Victim, Self::L2, Self::Memory] {
            if self.contains(l) {
                if !first {
                    write!(f, "/")?;
                }
                write!(f, "{}", l.name())?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_kind_codes() {
        assert_eq!(Some(AccessKind::Read), AccessKind::try_from(b'r').ok());
        assert_eq!(Some(AccessKind::Write), AccessKind::try_from(b'w').ok());
        assert!(AccessKind::try_from(b'x').is_err());
        assert_eq!(b'w', u8::from(AccessKind::Write));
    }
    #[test]
    fn test_level_display() {
        assert_eq!("L1", Level::L1.to_string());
        assert_eq!("L1/L2", (Level::L1 | Level::L2).to_string());
        assert_eq!("none", Level::none().to_string());
    }
}
