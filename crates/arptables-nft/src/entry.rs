//! The legacy ARP rule record (`struct arpt_entry`) and its parts.
//!
//! Records are filled either through the field setters below (the option
//! parsing path) or by [`crate::parser::rule_to_entry`] (the kernel path), and
//! are read-only afterwards.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{ArpTablesError, Result};
use crate::extension::ExtensionRegistry;
use crate::flags::InvFlags;

pub const IFNAMSIZ: usize = libc::IFNAMSIZ as usize;
pub const ARPT_DEV_ADDR_LEN_MAX: usize = 16;
pub const ETH_ALEN: usize = 6;
/// `XT_EXTENSION_MAXNAMELEN`, including the terminating NUL.
pub const XT_EXTENSION_MAXNAMELEN: usize = 29;

/// `sizeof(struct arpt_entry)`; the target region starts right after it.
pub const ARPT_ENTRY_SIZE: u16 = 192;
/// `sizeof(struct xt_entry_target)` without data.
pub const XT_TARGET_HEADER_SIZE: usize = 32;
/// `sizeof(struct xt_entry_match)` without data.
pub const XT_MATCH_HEADER_SIZE: usize = 32;
/// Size of the verdict carried by the standard target.
pub const XT_STANDARD_DATA_SIZE: usize = 4;

pub const LABEL_ACCEPT: &str = "ACCEPT";
pub const LABEL_DROP: &str = "DROP";
pub const LABEL_RETURN: &str = "RETURN";

/// Round `len` up to the 8-byte alignment used for xtables payloads.
pub fn xt_align(len: usize) -> usize {
    (len + 7) & !7
}

/// Interface name with its parallel wildcard mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Iface {
    pub name: [u8; IFNAMSIZ],
    pub mask: [u8; IFNAMSIZ],
}

impl Iface {
    /// Parse `eth0` (exact, NUL included in the mask) or `eth+` (prefix).
    pub fn parse(arg: &str) -> Result<Self> {
        let bytes = arg.as_bytes();
        if bytes.len() + 1 > IFNAMSIZ || bytes.contains(&0) {
            return Err(ArpTablesError::InvalidInterface(arg.to_string()));
        }
        let mut iface = Self::default();
        iface.name[..bytes.len()].copy_from_slice(bytes);
        match bytes.last() {
            None => {}
            Some(b'+') => iface.mask[..bytes.len() - 1].fill(0xff),
            Some(_) => {
                if bytes.iter().any(|b| *b == b'/' || *b == b' ') {
                    return Err(ArpTablesError::InvalidInterface(arg.to_string()));
                }
                iface.mask[..bytes.len() + 1].fill(0xff);
            }
        }
        Ok(iface)
    }

    pub fn is_set(&self) -> bool {
        self.name[0] != 0
    }

    pub fn is_wildcard(&self) -> bool {
        self.name_bytes().last() == Some(&b'+')
    }

    /// Name bytes up to (not including) the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|b| *b == 0).unwrap_or(IFNAMSIZ);
        &self.name[..end]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }
}

/// Hardware address with a byte-wise mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DevAddr {
    pub addr: [u8; ARPT_DEV_ADDR_LEN_MAX],
    pub mask: [u8; ARPT_DEV_ADDR_LEN_MAX],
}

impl DevAddr {
    pub fn new(addr: &[u8], mask: &[u8]) -> Result<Self> {
        if addr.len() > ARPT_DEV_ADDR_LEN_MAX || mask.len() > ARPT_DEV_ADDR_LEN_MAX {
            return Err(ArpTablesError::InvalidMacAddress(format_mac(addr)));
        }
        let mut dev = Self::default();
        dev.addr[..addr.len()].copy_from_slice(addr);
        dev.mask[..mask.len()].copy_from_slice(mask);
        Ok(dev)
    }

    /// Parse `aa:bb:cc:dd:ee:ff[/ff:ff:ff:00:00:00]`.
    pub fn parse(arg: &str) -> Result<Self> {
        let (addr, mask) = match arg.split_once('/') {
            Some((addr, mask)) => (parse_mac(addr)?, Some(parse_mac(mask)?)),
            None => (parse_mac(arg)?, None),
        };
        let mask = mask.unwrap_or_else(|| vec![0xff; addr.len()]);
        if mask.len() != addr.len() {
            return Err(ArpTablesError::InvalidMacAddress(arg.to_string()));
        }
        Self::new(&addr, &mask)
    }

    /// An address participates in matching once any mask byte is set.
    pub fn is_set(&self) -> bool {
        self.mask.iter().any(|b| *b != 0)
    }
}

fn parse_mac(s: &str) -> Result<Vec<u8>> {
    let bytes = s
        .split(':')
        .map(|part| {
            if part.is_empty() || part.len() > 2 {
                return None;
            }
            u8::from_str_radix(part, 16).ok()
        })
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| ArpTablesError::InvalidMacAddress(s.to_string()))?;
    if bytes.is_empty() || bytes.len() > ARPT_DEV_ADDR_LEN_MAX {
        return Err(ArpTablesError::InvalidMacAddress(s.to_string()));
    }
    Ok(bytes)
}

/// Lowercase colon-separated hex, as printed by the listing.
pub fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Match part of the record (`struct arpt_arp`). Numeric header fields are
/// kept in host byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpMatch {
    pub src: Ipv4Addr,
    pub tgt: Ipv4Addr,
    pub smsk: Ipv4Addr,
    pub tmsk: Ipv4Addr,
    pub arhln: u8,
    pub arhln_mask: u8,
    pub src_devaddr: DevAddr,
    pub tgt_devaddr: DevAddr,
    pub arpop: u16,
    pub arpop_mask: u16,
    pub arhrd: u16,
    pub arhrd_mask: u16,
    pub arpro: u16,
    pub arpro_mask: u16,
    pub iniface: Iface,
    pub outiface: Iface,
    pub flags: u8,
    pub invflags: InvFlags,
}

impl Default for ArpMatch {
    fn default() -> Self {
        Self {
            src: Ipv4Addr::UNSPECIFIED,
            tgt: Ipv4Addr::UNSPECIFIED,
            smsk: Ipv4Addr::UNSPECIFIED,
            tmsk: Ipv4Addr::UNSPECIFIED,
            arhln: 0,
            arhln_mask: 0,
            src_devaddr: DevAddr::default(),
            tgt_devaddr: DevAddr::default(),
            arpop: 0,
            arpop_mask: 0,
            arhrd: 0,
            arhrd_mask: 0,
            arpro: 0,
            arpro_mask: 0,
            iniface: Iface::default(),
            outiface: Iface::default(),
            flags: 0,
            invflags: InvFlags::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub pcnt: u64,
    pub bcnt: u64,
}

/// Terminal action of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Accept,
    Drop,
    Return,
    /// Jump to a user-defined chain.
    Jump(String),
    /// Target extension with its opaque data.
    Extension {
        name: String,
        revision: u8,
        data: Vec<u8>,
    },
}

impl Action {
    /// Resolve a `-j` argument: reserved verdicts first, then registered
    /// target extensions, then user chain names.
    pub fn resolve(name: &str, registry: &ExtensionRegistry) -> Result<Self> {
        match name {
            LABEL_ACCEPT => return Ok(Self::Accept),
            LABEL_DROP => return Ok(Self::Drop),
            LABEL_RETURN => return Ok(Self::Return),
            _ => {}
        }
        if let Some(ext) = registry.find_target(name) {
            return Ok(Self::Extension {
                name: ext.name().to_string(),
                revision: ext.revision(),
                data: ext.init_data(),
            });
        }
        if is_valid_chain_name(name) {
            return Ok(Self::Jump(name.to_string()));
        }
        Err(ArpTablesError::ActionResolution {
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Accept => LABEL_ACCEPT,
            Self::Drop => LABEL_DROP,
            Self::Return => LABEL_RETURN,
            Self::Jump(chain) => chain,
            Self::Extension { name, .. } => name,
        }
    }

    /// Opaque extension data; empty for standard verdicts.
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Extension { data, .. } => data,
            _ => &[],
        }
    }

    /// `u.target_size` of the corresponding `xt_entry_target`.
    pub fn target_size(&self) -> usize {
        let data_len = match self {
            Self::Extension { data, .. } => data.len(),
            _ => XT_STANDARD_DATA_SIZE,
        };
        xt_align(XT_TARGET_HEADER_SIZE) + xt_align(data_len)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_valid_chain_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() < XT_EXTENSION_MAXNAMELEN
        && !name.starts_with('-')
        && !name.starts_with('!')
        && !name.bytes().any(|b| b == 0 || b.is_ascii_whitespace())
}

/// Match extension attached to a rule, e.g. `-m quota`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtMatch {
    pub name: String,
    pub revision: u8,
    pub data: Vec<u8>,
}

impl ExtMatch {
    /// Start a `-m` match from its registered extension, data zeroed.
    pub fn resolve(name: &str, registry: &ExtensionRegistry) -> Result<Self> {
        let ext = registry
            .find_match(name)
            .ok_or_else(|| ArpTablesError::parameter("-m", name, "no such match extension"))?;
        Ok(Self {
            name: ext.name().to_string(),
            revision: ext.revision(),
            data: ext.init_data(),
        })
    }

    /// `u.match_size` of the corresponding `xt_entry_match`.
    pub fn match_size(&self) -> usize {
        xt_align(XT_MATCH_HEADER_SIZE) + xt_align(self.data.len())
    }
}

fn clamp_offset(offset: usize) -> u16 {
    u16::try_from(offset).unwrap_or(u16::MAX)
}

/// One legacy ARP rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArptEntry {
    pub arp: ArpMatch,
    pub counters: Counters,
    matches: Vec<ExtMatch>,
    target: Option<Action>,
    target_offset: u16,
    next_offset: u16,
}

impl Default for ArptEntry {
    fn default() -> Self {
        Self {
            arp: ArpMatch::default(),
            counters: Counters::default(),
            matches: Vec::new(),
            target: None,
            target_offset: 0,
            next_offset: ARPT_ENTRY_SIZE,
        }
    }
}

impl ArptEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&Action> {
        self.target.as_ref()
    }

    /// Name of the terminal action, empty when none is set.
    pub fn target_name(&self) -> &str {
        self.target.as_ref().map(Action::name).unwrap_or("")
    }

    pub fn target_offset(&self) -> u16 {
        self.target_offset
    }

    pub fn next_offset(&self) -> u16 {
        self.next_offset
    }

    /// Match extensions in evaluation order.
    pub fn matches(&self) -> &[ExtMatch] {
        &self.matches
    }

    /// Append a match extension; the target moves back behind it.
    pub fn add_match(&mut self, ext: ExtMatch) {
        self.matches.push(ext);
        self.update_offsets();
    }

    /// Attach the terminal action and recompute where it sits behind the
    /// fixed entry and its matches.
    pub fn set_target(&mut self, action: Action) {
        self.target = Some(action);
        self.update_offsets();
    }

    fn update_offsets(&mut self) {
        let matches: usize = self.matches.iter().map(ExtMatch::match_size).sum();
        let start = usize::from(ARPT_ENTRY_SIZE) + matches;
        match &self.target {
            Some(action) => {
                self.target_offset = clamp_offset(start);
                self.next_offset = clamp_offset(start + action.target_size());
            }
            None => self.next_offset = clamp_offset(start),
        }
    }

    pub fn set_iniface(&mut self, name: &str, invert: bool) -> Result<()> {
        self.arp.iniface = Iface::parse(name)?;
        self.arp.invflags.set(InvFlags::VIA_IN, invert);
        Ok(())
    }

    pub fn set_outiface(&mut self, name: &str, invert: bool) -> Result<()> {
        self.arp.outiface = Iface::parse(name)?;
        self.arp.invflags.set(InvFlags::VIA_OUT, invert);
        Ok(())
    }

    /// `-s ADDR[/N|/MASK]`
    pub fn set_source(&mut self, arg: &str, invert: bool) -> Result<()> {
        let (addr, mask) = parse_addr_and_mask(arg)?;
        self.arp.src = addr;
        self.arp.smsk = mask;
        self.arp.invflags.set(InvFlags::SRC_IP, invert);
        Ok(())
    }

    /// `-d ADDR[/N|/MASK]`
    pub fn set_target_addr(&mut self, arg: &str, invert: bool) -> Result<()> {
        let (addr, mask) = parse_addr_and_mask(arg)?;
        self.arp.tgt = addr;
        self.arp.tmsk = mask;
        self.arp.invflags.set(InvFlags::TGT_IP, invert);
        Ok(())
    }

    pub fn set_src_mac(&mut self, arg: &str, invert: bool) -> Result<()> {
        self.arp.src_devaddr = DevAddr::parse(arg)?;
        self.arp.invflags.set(InvFlags::SRC_DEVADDR, invert);
        Ok(())
    }

    pub fn set_dst_mac(&mut self, arg: &str, invert: bool) -> Result<()> {
        self.arp.tgt_devaddr = DevAddr::parse(arg)?;
        self.arp.invflags.set(InvFlags::TGT_DEVADDR, invert);
        Ok(())
    }

    /// `--h-length N[/M]`
    pub fn set_hw_len(&mut self, arg: &str, invert: bool) -> Result<()> {
        let (value, mask) = parse_value_and_mask(arg, "h-length", u64::from(u8::MAX))?;
        self.arp.arhln = value as u8;
        self.arp.arhln_mask = mask as u8;
        self.arp.invflags.set(InvFlags::ARPHLN, invert);
        Ok(())
    }

    /// `--opcode NAME|N[/M]`
    pub fn set_opcode(&mut self, arg: &str, invert: bool) -> Result<()> {
        let (value, mask) = match arg.split_once('/') {
            Some((value, mask)) => (value, Some(mask)),
            None => (arg, None),
        };
        let opcode = match opcode_by_name(value) {
            Some(code) => code,
            None => parse_number(value, "opcode", u64::from(u16::MAX))? as u16,
        };
        let mask = match mask {
            Some(mask) => parse_number(mask, "opcode", u64::from(u16::MAX))? as u16,
            None => u16::MAX,
        };
        self.arp.arpop = opcode;
        self.arp.arpop_mask = mask;
        self.arp.invflags.set(InvFlags::ARPOP, invert);
        Ok(())
    }

    /// `--h-type Ethernet|N[/M]`
    pub fn set_hw_type(&mut self, arg: &str, invert: bool) -> Result<()> {
        let (value, mask) = if arg.eq_ignore_ascii_case("ethernet") {
            (1, u64::from(u16::MAX))
        } else {
            parse_value_and_mask(arg, "h-type", u64::from(u16::MAX))?
        };
        self.arp.arhrd = value as u16;
        self.arp.arhrd_mask = mask as u16;
        self.arp.invflags.set(InvFlags::ARPHRD, invert);
        Ok(())
    }

    /// `--proto-type IPv4|N[/M]`; numbers are hexadecimal with or without `0x`.
    pub fn set_proto_type(&mut self, arg: &str, invert: bool) -> Result<()> {
        let (value, mask) = if arg.eq_ignore_ascii_case("ipv4") {
            (0x0800, u16::MAX)
        } else {
            let (value, mask) = match arg.split_once('/') {
                Some((value, mask)) => (value, Some(mask)),
                None => (arg, None),
            };
            let value = parse_hex16(value, "proto-type")?;
            let mask = match mask {
                Some(mask) => parse_hex16(mask, "proto-type")?,
                None => u16::MAX,
            };
            (value, mask)
        };
        self.arp.arpro = value;
        self.arp.arpro_mask = mask;
        self.arp.invflags.set(InvFlags::ARPPRO, invert);
        Ok(())
    }

    /// `-c PKTS BYTES`
    pub fn set_counters(&mut self, pcnt: &str, bcnt: &str) -> Result<()> {
        let pcnt = pcnt
            .parse::<u64>()
            .map_err(|e| ArpTablesError::parameter("pcnt", pcnt, e.to_string()))?;
        let bcnt = bcnt
            .parse::<u64>()
            .map_err(|e| ArpTablesError::parameter("bcnt", bcnt, e.to_string()))?;
        self.counters = Counters { pcnt, bcnt };
        Ok(())
    }
}

/// Names of opcodes 1..=9, in order.
pub const OPCODES: [&str; 9] = [
    "Request",
    "Reply",
    "Request_Reverse",
    "Reply_Reverse",
    "DRARP_Request",
    "DRARP_Reply",
    "DRARP_Error",
    "InARP_Request",
    "ARP_NAK",
];

pub fn opcode_name(opcode: u16) -> Option<&'static str> {
    match opcode {
        0 => None,
        n => OPCODES.get(usize::from(n) - 1).copied(),
    }
}

fn opcode_by_name(name: &str) -> Option<u16> {
    OPCODES
        .iter()
        .position(|op| op.eq_ignore_ascii_case(name))
        .map(|idx| idx as u16 + 1)
}

fn parse_number(s: &str, parameter: &str, max: u64) -> Result<u64> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    }
    .map_err(|e| ArpTablesError::parameter(parameter, s, e.to_string()))?;
    if value > max {
        return Err(ArpTablesError::parameter(
            parameter,
            s,
            format!("value exceeds {max}"),
        ));
    }
    Ok(value)
}

fn parse_hex16(s: &str, parameter: &str) -> Result<u16> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16)
        .map_err(|e| ArpTablesError::parameter(parameter, s, e.to_string()))
}

fn parse_value_and_mask(arg: &str, parameter: &str, max: u64) -> Result<(u64, u64)> {
    match arg.split_once('/') {
        Some((value, mask)) => Ok((
            parse_number(value, parameter, max)?,
            parse_number(mask, parameter, max)?,
        )),
        None => Ok((parse_number(arg, parameter, max)?, max)),
    }
}

/// Parse `a.b.c.d[/N|/a.b.c.d]`; the address is masked like the legacy tool
/// does.
pub fn parse_addr_and_mask(arg: &str) -> Result<(Ipv4Addr, Ipv4Addr)> {
    let invalid = || ArpTablesError::InvalidAddress(arg.to_string());
    let (addr, mask) = match arg.split_once('/') {
        Some((addr, mask)) => (addr, Some(mask)),
        None => (arg, None),
    };
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let mask = match mask {
        None => Ipv4Addr::BROADCAST,
        Some(mask) if mask.contains('.') => mask.parse().map_err(|_| invalid())?,
        Some(bits) => {
            let bits: u32 = bits.parse().map_err(|_| invalid())?;
            if bits > 32 {
                return Err(invalid());
            }
            Ipv4Addr::from(u32::MAX.checked_shl(32 - bits).unwrap_or(0))
        }
    };
    let masked = Ipv4Addr::from(u32::from(addr) & u32::from(mask));
    Ok((masked, mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iface_exact_includes_nul_in_mask() {
        let iface = Iface::parse("eth0").unwrap();
        assert_eq!(iface.name(), "eth0");
        assert_eq!(&iface.mask[..5], &[0xff; 5]);
        assert_eq!(iface.mask[5], 0);
        assert!(!iface.is_wildcard());
    }

    #[test]
    fn test_iface_wildcard_masks_prefix_only() {
        let iface = Iface::parse("wlan+").unwrap();
        assert_eq!(iface.name(), "wlan+");
        assert_eq!(&iface.mask[..4], &[0xff; 4]);
        assert_eq!(iface.mask[4], 0);
        assert!(iface.is_wildcard());
    }

    #[test]
    fn test_iface_too_long() {
        assert!(Iface::parse("abcdefghijklmnop").is_err());
        assert!(Iface::parse("abcdefghijklmno").is_ok());
    }

    #[test]
    fn test_parse_mac_with_mask() {
        let dev = DevAddr::parse("00:11:22:33:44:55/ff:ff:ff:00:00:00").unwrap();
        assert_eq!(&dev.addr[..6], &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(&dev.mask[..6], &[0xff, 0xff, 0xff, 0, 0, 0]);
        assert!(dev.is_set());
        assert!(DevAddr::parse("zz:11:22:33:44:55").is_err());
        assert!(DevAddr::parse("00:11/ff").is_err());
    }

    #[test]
    fn test_parse_addr_prefix_and_dotted_mask() {
        let (addr, mask) = parse_addr_and_mask("10.1.2.3/8").unwrap();
        assert_eq!(addr, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(mask, Ipv4Addr::new(255, 0, 0, 0));

        let (_, mask) = parse_addr_and_mask("10.0.0.0/255.0.255.0").unwrap();
        assert_eq!(mask, Ipv4Addr::new(255, 0, 255, 0));

        let (_, mask) = parse_addr_and_mask("192.168.1.1").unwrap();
        assert_eq!(mask, Ipv4Addr::BROADCAST);

        let (_, mask) = parse_addr_and_mask("0.0.0.0/0").unwrap();
        assert_eq!(mask, Ipv4Addr::UNSPECIFIED);
        assert!(parse_addr_and_mask("10.0.0.0/33").is_err());
    }

    #[test]
    fn test_opcode_names_and_numbers() {
        let mut entry = ArptEntry::new();
        entry.set_opcode("reply", false).unwrap();
        assert_eq!(entry.arp.arpop, 2);
        assert_eq!(entry.arp.arpop_mask, 0xffff);
        entry.set_opcode("8/0xff", true).unwrap();
        assert_eq!(entry.arp.arpop, 8);
        assert_eq!(entry.arp.arpop_mask, 0xff);
        assert!(entry.arp.invflags.contains(InvFlags::ARPOP));
        assert_eq!(opcode_name(9), Some("ARP_NAK"));
        assert_eq!(opcode_name(0), None);
        assert_eq!(opcode_name(10), None);
    }

    #[test]
    fn test_bad_counter_is_parameter_invalid() {
        let mut entry = ArptEntry::new();
        let err = entry.set_counters("12", "lots").unwrap_err();
        assert!(matches!(err, ArpTablesError::ParameterInvalid { .. }));
        entry.set_counters("12", "3400").unwrap();
        assert_eq!(entry.counters, Counters { pcnt: 12, bcnt: 3400 });
    }

    #[test]
    fn test_set_target_computes_offsets() {
        let mut entry = ArptEntry::new();
        entry.set_target(Action::Accept);
        assert_eq!(entry.target_offset(), ARPT_ENTRY_SIZE);
        assert_eq!(entry.next_offset(), ARPT_ENTRY_SIZE + 40);

        entry.set_target(Action::Extension {
            name: "CLASSIFY".to_string(),
            revision: 0,
            data: vec![0; 4],
        });
        assert_eq!(entry.next_offset(), ARPT_ENTRY_SIZE + 40);
        assert_eq!(entry.target_name(), "CLASSIFY");
    }

    #[test]
    fn test_matches_sit_before_target() {
        let registry = ExtensionRegistry::with_defaults();
        let mut entry = ArptEntry::new();
        entry.set_target(Action::Accept);
        entry.add_match(ExtMatch::resolve("quota", &registry).unwrap());
        assert_eq!(entry.matches()[0].match_size(), 48);
        assert_eq!(entry.target_offset(), ARPT_ENTRY_SIZE + 48);
        assert_eq!(entry.next_offset(), ARPT_ENTRY_SIZE + 48 + 40);

        assert!(matches!(
            ExtMatch::resolve("limit", &registry),
            Err(ArpTablesError::ParameterInvalid { .. })
        ));
    }

    #[test]
    fn test_resolve_action() {
        let registry = ExtensionRegistry::with_defaults();
        assert_eq!(Action::resolve("DROP", &registry).unwrap(), Action::Drop);
        assert!(matches!(
            Action::resolve("CLASSIFY", &registry).unwrap(),
            Action::Extension { .. }
        ));
        assert_eq!(
            Action::resolve("my_chain", &registry).unwrap(),
            Action::Jump("my_chain".to_string())
        );
        assert!(matches!(
            Action::resolve("-bogus", &registry),
            Err(ArpTablesError::ActionResolution { .. })
        ));
        assert!(Action::resolve("", &registry).is_err());
    }
}
