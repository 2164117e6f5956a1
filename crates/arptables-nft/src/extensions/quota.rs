//! `quota` match: stop matching once a byte budget is used up.

use crate::error::{ArpTablesError, Result};
use crate::extension::{Extension, ExtensionKind};

/// `struct xt_quota_info { u64 quota; struct xt_quota_info *master; }`
const QUOTA_INFO_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct Quota;

impl Quota {
    pub fn quota(data: &[u8]) -> u64 {
        data.get(..8)
            .and_then(|b| <[u8; 8]>::try_from(b).ok())
            .map(u64::from_ne_bytes)
            .unwrap_or(0)
    }
}

/// Parse a byte budget. `u64::MAX` is reserved, as `strtoull` uses it to
/// report overflow.
pub fn parse_quota(s: &str) -> Result<u64> {
    let quota = s
        .trim()
        .parse::<u64>()
        .map_err(|e| ArpTablesError::parameter("quota", s, format!("quota invalid: {e}")))?;
    if quota == u64::MAX {
        return Err(ArpTablesError::parameter("quota", s, "quota invalid"));
    }
    Ok(quota)
}

impl Extension for Quota {
    fn name(&self) -> &str {
        "quota"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Match
    }

    fn size(&self) -> usize {
        QUOTA_INFO_SIZE
    }

    fn help(&self) -> &'static str {
        "quota options:\n --quota quota\t\t\tquota (bytes)\n"
    }

    fn parse(&self, option: &str, value: &str, invert: bool, data: &mut [u8]) -> Result<bool> {
        if option != "quota" {
            return Ok(false);
        }
        if invert {
            return Err(ArpTablesError::parameter(
                "quota",
                value,
                "quota: unexpected '!'",
            ));
        }
        let quota = parse_quota(value)?;
        let slot = data.get_mut(..8).ok_or_else(|| {
            ArpTablesError::parameter("quota", value, "match data too short")
        })?;
        slot.copy_from_slice(&quota.to_ne_bytes());
        Ok(true)
    }

    fn print(&self, data: &[u8], _numeric: bool) -> String {
        format!("quota: {} bytes", Self::quota(data))
    }

    fn save(&self, data: &[u8]) -> String {
        format!("--quota {} ", Self::quota(data))
    }
}
