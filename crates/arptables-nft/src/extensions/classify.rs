//! `CLASSIFY` target: set the skb priority to a traffic control class.

use crate::error::{ArpTablesError, Result};
use crate::extension::{Extension, ExtensionKind};

/// `struct xt_classify_target_info { u32 priority; }`
const CLASSIFY_INFO_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct Classify;

impl Classify {
    pub fn priority(data: &[u8]) -> u32 {
        data.get(..4)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .map(u32::from_ne_bytes)
            .unwrap_or(0)
    }
}

/// Parse `MAJOR:MINOR`, both hexadecimal, into a tc handle.
pub fn parse_class(s: &str) -> Result<u32> {
    let invalid = |reason: &str| ArpTablesError::parameter("set-class", s, reason);
    let (major, minor) = s
        .split_once(':')
        .ok_or_else(|| invalid("expected MAJOR:MINOR"))?;
    let major = u16::from_str_radix(major, 16).map_err(|e| invalid(&e.to_string()))?;
    let minor = u16::from_str_radix(minor, 16).map_err(|e| invalid(&e.to_string()))?;
    Ok((u32::from(major) << 16) | u32::from(minor))
}

impl Extension for Classify {
    fn name(&self) -> &str {
        "CLASSIFY"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Target
    }

    fn size(&self) -> usize {
        CLASSIFY_INFO_SIZE
    }

    fn help(&self) -> &'static str {
        "CLASSIFY target options:\n--set-class MAJOR:MINOR    Set skb->priority value (always hexadecimal!)\n"
    }

    fn parse(&self, option: &str, value: &str, invert: bool, data: &mut [u8]) -> Result<bool> {
        if option != "set-class" {
            return Ok(false);
        }
        if invert {
            return Err(ArpTablesError::parameter(
                "set-class",
                value,
                "unexpected '!'",
            ));
        }
        let priority = parse_class(value)?;
        let slot = data.get_mut(..4).ok_or_else(|| {
            ArpTablesError::parameter("set-class", value, "target data too short")
        })?;
        slot.copy_from_slice(&priority.to_ne_bytes());
        Ok(true)
    }

    fn print(&self, data: &[u8], _numeric: bool) -> String {
        let priority = Self::priority(data);
        format!("CLASSIFY set {:x}:{:x} ", priority >> 16, priority & 0xffff)
    }

    fn save(&self, data: &[u8]) -> String {
        let priority = Self::priority(data);
        format!("--set-class {:04x}:{:04x} ", priority >> 16, priority & 0xffff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_class() {
        let mut data = Classify.init_data();
        assert!(Classify.parse("set-class", "1:a", false, &mut data).unwrap());
        assert_eq!(Classify::priority(&data), 0x0001_000a);
        assert_eq!(Classify.print(&data, true), "CLASSIFY set 1:a ");
        assert_eq!(Classify.save(&data), "--set-class 0001:000a ");
    }

    #[test]
    fn test_bad_class() {
        assert!(parse_class("1").is_err());
        assert!(parse_class("x:1").is_err());
        assert!(parse_class("10000:1").is_err());
    }
}
