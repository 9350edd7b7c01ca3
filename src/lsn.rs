// Write-ahead log positions as exchanged on the replication connection.

use std::fmt;
use std::str::FromStr;

/// A position in the upstream's change log. Totally ordered; `Lsn(0)` is the
/// invalid / "from the slot's creation point" position.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Lsn(pub u64);

impl Lsn {
    pub const INVALID: Lsn = Lsn(0);

    /// Parse a Postgres LSN string (e.g., "0/16B6C50") into an Lsn
    pub fn from_pg_string(s: &str) -> Option<Self> {
        let (hi, lo) = s.trim().split_once('/')?;
        let hi = u64::from_str_radix(hi, 16).ok()?;
        let lo = u64::from_str_radix(lo, 16).ok()?;
        if hi > u64::from(u32::MAX) || lo > u64::from(u32::MAX) {
            return None;
        }
        Some(Lsn((hi << 32) | lo))
    }

    /// Convert this Lsn to a Postgres LSN string (e.g., "0/16B6C50")
    pub fn to_pg_string(&self) -> String {
        format!("{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFFFFFF)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pg_string())
    }
}

impl FromStr for Lsn {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lsn::from_pg_string(s).ok_or_else(|| anyhow::anyhow!("invalid LSN: {s:?}"))
    }
}

impl From<u64> for Lsn {
    fn from(val: u64) -> Self {
        Lsn(val)
    }
}

impl From<Lsn> for u64 {
    fn from(lsn: Lsn) -> Self {
        lsn.0
    }
}
