//! Listing and save output for legacy records.
//!
//! Token spelling follows arptables exactly; other tools parse and diff it.

use std::fmt::Write as _;
use std::net::Ipv4Addr;

use bitflags::bitflags;

use crate::entry::{format_mac, opcode_name, Action, ArptEntry, DevAddr, ARPT_DEV_ADDR_LEN_MAX, ETH_ALEN};
use crate::extension::{Extension, ExtensionRegistry};
use crate::flags::InvFlags;

bitflags! {
    /// xtables `FMT_*` output flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Format: u32 {
        const NUMERIC = 0x0001;
        const NOCOUNTS = 0x0002;
        const KILOMEGAGIGA = 0x0004;
        const OPTIONS = 0x0008;
        const NOTABLE = 0x0010;
        const NOTARGET = 0x0020;
        const VIA = 0x0040;
        const NONEWLINE = 0x0080;
        const LINENUMBERS = 0x0100;
    }
}

/// Turns addresses into names for non-numeric output.
pub trait AddrResolver {
    fn resolve(&self, addr: Ipv4Addr) -> Option<String>;
}

/// Never resolves; every address prints as a dotted quad.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericResolver;

impl AddrResolver for NumericResolver {
    fn resolve(&self, _addr: Ipv4Addr) -> Option<String> {
        None
    }
}

/// Mask suffix: empty for /32, `/N` for a prefix, dotted otherwise.
pub fn mask_to_dotted(mask: Ipv4Addr) -> String {
    let bits = u32::from(mask);
    if bits == u32::MAX {
        return String::new();
    }
    let ones = bits.leading_ones();
    if bits.checked_shl(ones).unwrap_or(0) == 0 {
        format!("/{ones}")
    } else {
        format!("/{mask}")
    }
}

/// xtables `print_num`, trailing space included.
pub fn format_num(number: u64, format: Format) -> String {
    let notable = format.contains(Format::NOTABLE);
    if !format.contains(Format::KILOMEGAGIGA) {
        return if notable {
            format!("{number} ")
        } else {
            format!("{number:8} ")
        };
    }
    if number <= 99_999 {
        return if notable {
            format!("{number} ")
        } else {
            format!("{number:5} ")
        };
    }
    let mut scaled = number;
    for suffix in ['K', 'M', 'G'] {
        scaled = div_round(scaled);
        if scaled <= 9_999 {
            return if notable {
                format!("{scaled}{suffix} ")
            } else {
                format!("{scaled:4}{suffix} ")
            };
        }
    }
    scaled = div_round(scaled);
    if notable {
        format!("{scaled}T ")
    } else {
        format!("{scaled:4}T ")
    }
}

/// Divide by 1000, rounding half up, without overflowing near `u64::MAX`.
fn div_round(n: u64) -> u64 {
    n / 1000 + u64::from(n % 1000 >= 500)
}

fn mac_and_mask(dev: &DevAddr, len: usize) -> String {
    let mut out = format_mac(&dev.addr[..len]);
    if dev.mask[..len].iter().any(|b| *b != 0xff) {
        out.push('/');
        out.push_str(&format_mac(&dev.mask[..len]));
    }
    out
}

fn neg(entry: &ArptEntry, flag: InvFlags) -> &'static str {
    if entry.arp.invflags.contains(flag) {
        "! "
    } else {
        ""
    }
}

/// Renders records; extension output comes from the registry.
pub struct Renderer<'a> {
    registry: &'a ExtensionRegistry,
    resolver: &'a dyn AddrResolver,
}

impl<'a> Renderer<'a> {
    pub fn new(registry: &'a ExtensionRegistry) -> Self {
        Self {
            registry,
            resolver: &NumericResolver,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn AddrResolver) -> Self {
        self.resolver = resolver;
        self
    }

    fn addr(&self, addr: Ipv4Addr, format: Format) -> String {
        if format.contains(Format::NUMERIC) {
            return addr.to_string();
        }
        self.resolver
            .resolve(addr)
            .unwrap_or_else(|| addr.to_string())
    }

    /// Match clauses shared by listing and save output.
    pub fn fw_details(&self, entry: &ArptEntry, format: Format) -> String {
        let arp = &entry.arp;
        let mut out = String::new();
        let placeholder = if format.contains(Format::NUMERIC) {
            "*"
        } else {
            "any"
        };

        for (flag, iface, inv) in [
            ("-i", &arp.iniface, InvFlags::VIA_IN),
            ("-o", &arp.outiface, InvFlags::VIA_OUT),
        ] {
            let name = if iface.is_set() {
                iface.name()
            } else if format.contains(Format::VIA) {
                placeholder.to_string()
            } else {
                continue;
            };
            let _ = write!(out, "{}{flag} {name} ", neg(entry, inv));
        }

        let hln = match usize::from(arp.arhln) {
            len @ 1..=ARPT_DEV_ADDR_LEN_MAX => len,
            _ => ETH_ALEN,
        };

        if !arp.smsk.is_unspecified() {
            let _ = write!(
                out,
                "{}-s {}{} ",
                neg(entry, InvFlags::SRC_IP),
                self.addr(arp.src, format),
                mask_to_dotted(arp.smsk)
            );
        }
        if arp.src_devaddr.is_set() {
            let _ = write!(
                out,
                "{}--src-mac {} ",
                neg(entry, InvFlags::SRC_DEVADDR),
                mac_and_mask(&arp.src_devaddr, hln)
            );
        }
        if !arp.tmsk.is_unspecified() {
            let _ = write!(
                out,
                "{}-d {}{} ",
                neg(entry, InvFlags::TGT_IP),
                self.addr(arp.tgt, format),
                mask_to_dotted(arp.tmsk)
            );
        }
        if arp.tgt_devaddr.is_set() {
            let _ = write!(
                out,
                "{}--dst-mac {} ",
                neg(entry, InvFlags::TGT_DEVADDR),
                mac_and_mask(&arp.tgt_devaddr, hln)
            );
        }

        if arp.arhln_mask != 0 {
            let _ = write!(out, "{}--h-length {}", neg(entry, InvFlags::ARPHLN), arp.arhln);
            if arp.arhln_mask != u8::MAX {
                let _ = write!(out, "/{}", arp.arhln_mask);
            }
            out.push(' ');
        }

        if arp.arpop_mask != 0 {
            out.push_str(neg(entry, InvFlags::ARPOP));
            match opcode_name(arp.arpop) {
                Some(name) if !format.contains(Format::NUMERIC) => {
                    let _ = write!(out, "--opcode {name}");
                }
                _ => {
                    let _ = write!(out, "--opcode {}", arp.arpop);
                }
            }
            if arp.arpop_mask != u16::MAX {
                let _ = write!(out, "/{}", arp.arpop_mask);
            }
            out.push(' ');
        }

        if arp.arhrd_mask != 0 {
            out.push_str(neg(entry, InvFlags::ARPHRD));
            if arp.arhrd == 1 && !format.contains(Format::NUMERIC) {
                out.push_str("--h-type Ethernet");
            } else {
                let _ = write!(out, "--h-type {}", arp.arhrd);
            }
            if arp.arhrd_mask != u16::MAX {
                let _ = write!(out, "/{}", arp.arhrd_mask);
            }
            out.push(' ');
        }

        if arp.arpro_mask != 0 {
            out.push_str(neg(entry, InvFlags::ARPPRO));
            if arp.arpro == 0x0800 && !format.contains(Format::NUMERIC) {
                out.push_str("--proto-type IPv4");
            } else {
                let _ = write!(out, "--proto-type 0x{:x}", arp.arpro);
            }
            if arp.arpro_mask != u16::MAX {
                let _ = write!(out, "/{:x}", arp.arpro_mask);
            }
            out.push(' ');
        }

        out
    }

    fn target_extension<'b>(
        &'b self,
        entry: &'b ArptEntry,
    ) -> Option<(&'b dyn Extension, &'b [u8])> {
        match entry.target()? {
            Action::Extension { name, data, .. } => self
                .registry
                .find_target(name)
                .map(|ext| (ext.as_ref(), data.as_slice())),
            _ => None,
        }
    }

    /// One line of `arptables -L`.
    pub fn print_firewall(&self, entry: &ArptEntry, num: u32, format: Format) -> String {
        let mut out = String::new();
        if format.contains(Format::LINENUMBERS) {
            let _ = write!(out, "{num} ");
        }
        if let Some(target) = entry.target() {
            if !format.contains(Format::NOTARGET) {
                let _ = write!(out, "-j {} ", target.name());
            }
        }
        out.push_str(&self.fw_details(entry, format));
        for m in entry.matches() {
            match self.registry.find_match(&m.name) {
                Some(ext) => {
                    out.push_str(&ext.print(&m.data, format.contains(Format::NUMERIC)));
                    if !out.ends_with(' ') {
                        out.push(' ');
                    }
                }
                None => {
                    let _ = write!(out, "-m {} ", m.name);
                }
            }
        }
        if let Some((ext, data)) = self.target_extension(entry) {
            out.push_str(&ext.print(data, format.contains(Format::NUMERIC)));
        }
        if !format.contains(Format::NOCOUNTS) {
            out.push_str(", pcnt=");
            out.push_str(&format_num(entry.counters.pcnt, format));
            out.push_str("-- bcnt=");
            out.push_str(&format_num(entry.counters.bcnt, format));
        }
        if !format.contains(Format::NONEWLINE) {
            out.push('\n');
        }
        out
    }

    /// One line of `arptables-save`.
    pub fn save_firewall(&self, entry: &ArptEntry, format: Format) -> String {
        let mut out = self.fw_details(entry, format);
        for m in entry.matches() {
            let _ = write!(out, "-m {} ", m.name);
            if let Some(ext) = self.registry.find_match(&m.name) {
                out.push_str(&ext.save(&m.data));
            }
        }
        if !format.contains(Format::NOCOUNTS) {
            out.push_str("-c ");
            out.push_str(&format_num(entry.counters.pcnt, format));
            out.push_str(&format_num(entry.counters.bcnt, format));
        }
        if let Some(target) = entry.target() {
            if !format.contains(Format::NOTARGET) {
                let _ = write!(out, "-j {} ", target.name());
            }
        }
        if let Some((ext, data)) = self.target_extension(entry) {
            out.push_str(&ext.save(data));
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Counters, ExtMatch};

    const PLAIN: Format = Format::NOCOUNTS.union(Format::NONEWLINE);

    fn details(entry: &ArptEntry, format: Format) -> String {
        let registry = ExtensionRegistry::with_defaults();
        Renderer::new(&registry).fw_details(entry, format)
    }

    #[test]
    fn test_opcode_names() {
        let mut entry = ArptEntry::new();
        entry.set_opcode("1", false).unwrap();
        assert_eq!(details(&entry, PLAIN), "--opcode Request ");
        entry.set_opcode("2", false).unwrap();
        assert_eq!(details(&entry, PLAIN), "--opcode Reply ");
        assert_eq!(details(&entry, PLAIN | Format::NUMERIC), "--opcode 2 ");
        entry.set_opcode("255/0xff", true).unwrap();
        assert_eq!(details(&entry, PLAIN), "! --opcode 255/255 ");
    }

    #[test]
    fn test_proto_and_hw_type() {
        let mut entry = ArptEntry::new();
        entry.set_proto_type("0x800", false).unwrap();
        entry.set_hw_type("1", false).unwrap();
        assert_eq!(details(&entry, PLAIN), "--h-type Ethernet --proto-type IPv4 ");
        assert_eq!(
            details(&entry, PLAIN | Format::NUMERIC),
            "--h-type 1 --proto-type 0x800 "
        );
    }

    #[test]
    fn test_addresses_and_masks() {
        let mut entry = ArptEntry::new();
        entry.set_source("10.1.2.3/8", true).unwrap();
        entry.set_target_addr("192.168.0.0/255.0.255.0", false).unwrap();
        assert_eq!(
            details(&entry, PLAIN),
            "! -s 10.0.0.0/8 -d 192.0.0.0/255.0.255.0 "
        );
        assert_eq!(mask_to_dotted(Ipv4Addr::BROADCAST), "");
        assert_eq!(mask_to_dotted(Ipv4Addr::UNSPECIFIED), "/0");
    }

    #[test]
    fn test_mac_uses_hw_len() {
        let mut entry = ArptEntry::new();
        entry
            .set_src_mac("00:11:22:33:44:55/ff:ff:ff:00:00:00", false)
            .unwrap();
        assert_eq!(
            details(&entry, PLAIN),
            "--src-mac 00:11:22:33:44:55/ff:ff:ff:00:00:00 "
        );
        entry.set_dst_mac("01:02:03:04", true).unwrap();
        entry.set_hw_len("4", false).unwrap();
        assert_eq!(
            details(&entry, PLAIN),
            "--src-mac 00:11:22:33/ff:ff:ff:00 ! --dst-mac 01:02:03:04 --h-length 4 "
        );
    }

    #[test]
    fn test_interface_placeholders() {
        let mut entry = ArptEntry::new();
        entry.set_outiface("eth0", true).unwrap();
        assert_eq!(details(&entry, PLAIN), "! -o eth0 ");
        assert_eq!(details(&entry, PLAIN | Format::VIA), "-i any ! -o eth0 ");
        assert_eq!(
            details(&entry, PLAIN | Format::VIA | Format::NUMERIC),
            "-i * ! -o eth0 "
        );
    }

    #[test]
    fn test_print_num() {
        assert_eq!(format_num(42, Format::empty()), "      42 ");
        assert_eq!(format_num(42, Format::NOTABLE), "42 ");
        let kmg = Format::KILOMEGAGIGA;
        assert_eq!(format_num(99_999, kmg), "99999 ");
        assert_eq!(format_num(123_456, kmg), " 123K ");
        assert_eq!(format_num(12_345_678, kmg | Format::NOTABLE), "12M ");
        assert_eq!(format_num(5_000_000_000_000_000, kmg), "5000T ");
        assert_eq!(format_num(u64::MAX, kmg), "18446744T ");
        assert_eq!(format_num(u64::MAX, Format::NOTABLE), "18446744073709551615 ");
    }

    #[test]
    fn test_counters_near_u64_max() {
        let registry = ExtensionRegistry::with_defaults();
        let renderer = Renderer::new(&registry);
        let mut entry = ArptEntry::new();
        entry.set_counters("0", "18446744073709551615").unwrap();
        entry.set_target(Action::Accept);
        assert_eq!(
            renderer.save_firewall(&entry, Format::KILOMEGAGIGA | Format::NOTABLE),
            "-c 0 18446744T -j ACCEPT \n"
        );
    }

    #[test]
    fn test_print_firewall_layout() {
        let registry = ExtensionRegistry::with_defaults();
        let renderer = Renderer::new(&registry);
        let mut entry = ArptEntry::new();
        entry.set_iniface("eth0", false).unwrap();
        entry.set_target(Action::Drop);
        entry.counters = Counters { pcnt: 1, bcnt: 60 };

        assert_eq!(
            renderer.print_firewall(&entry, 3, Format::LINENUMBERS | Format::NOTABLE),
            "3 -j DROP -i eth0 , pcnt=1 -- bcnt=60 \n"
        );
        assert_eq!(
            renderer.save_firewall(&entry, Format::NOTABLE),
            "-i eth0 -c 1 60 -j DROP \n"
        );
    }

    #[test]
    fn test_extension_output() {
        let registry = ExtensionRegistry::with_defaults();
        let renderer = Renderer::new(&registry);
        let classify = registry.find_target("CLASSIFY").unwrap();
        let mut data = classify.init_data();
        classify.parse("set-class", "1:a", false, &mut data).unwrap();
        let mut entry = ArptEntry::new();
        entry.set_target(Action::Extension {
            name: "CLASSIFY".to_string(),
            revision: 0,
            data,
        });

        assert_eq!(
            renderer.print_firewall(&entry, 0, PLAIN),
            "-j CLASSIFY CLASSIFY set 1:a "
        );
        assert_eq!(
            renderer.save_firewall(&entry, Format::NOCOUNTS),
            "-j CLASSIFY --set-class 0001:000a \n"
        );
    }

    #[test]
    fn test_match_output() {
        let registry = ExtensionRegistry::with_defaults();
        let renderer = Renderer::new(&registry);
        let mut quota = ExtMatch::resolve("quota", &registry).unwrap();
        let ext = registry.find_match("quota").unwrap();
        ext.parse("quota", "2048", false, &mut quota.data).unwrap();
        let mut entry = ArptEntry::new();
        entry.add_match(quota);
        entry.add_match(ExtMatch {
            name: "limit".to_string(),
            revision: 0,
            data: Vec::new(),
        });
        entry.set_target(Action::Drop);

        assert_eq!(
            renderer.print_firewall(&entry, 0, PLAIN),
            "-j DROP quota: 2048 bytes -m limit "
        );
        assert_eq!(
            renderer.save_firewall(&entry, Format::NOCOUNTS),
            "-m quota --quota 2048 -m limit -j DROP \n"
        );
    }

    #[test]
    fn test_resolver_names_unless_numeric() {
        struct Hosts;
        impl AddrResolver for Hosts {
            fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
                (addr == Ipv4Addr::new(10, 0, 0, 1)).then(|| "gw.lan".to_string())
            }
        }
        let registry = ExtensionRegistry::with_defaults();
        let hosts = Hosts;
        let renderer = Renderer::new(&registry).with_resolver(&hosts);
        let mut entry = ArptEntry::new();
        entry.set_source("10.0.0.1", false).unwrap();
        assert_eq!(renderer.fw_details(&entry, PLAIN), "-s gw.lan ");
        assert_eq!(
            renderer.fw_details(&entry, PLAIN | Format::NUMERIC),
            "-s 10.0.0.1 "
        );
    }
}
