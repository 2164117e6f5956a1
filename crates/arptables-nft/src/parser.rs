//! Rebuild an [`ArptEntry`] from a rule's expression list.
//!
//! Field identity comes from payload offsets. Addresses sit behind the
//! variable-length hardware address, so they can only be placed once the
//! hardware length comparison has been seen; anything earlier is skipped.

use std::net::Ipv4Addr;

use tracing::trace;

use crate::entry::{Action, ArptEntry, DevAddr, ExtMatch, Iface, IFNAMSIZ};
use crate::expr::{CmpOp, Expr, ImmediateData, MetaKey, NftRule, PayloadBase, Verdict, NFT_REG_VERDICT};
use crate::flags::{kernel_to_arpt_flags, InvFlags, KernelInvFlags};
use crate::layout::{ArpField, ArpHeaderLayout, ARPHDR_LEN};

/// Load waiting for its comparison.
enum Pending<'a> {
    Nothing,
    Meta(MetaKey),
    Payload {
        offset: u32,
        len: u32,
        mask: Option<&'a [u8]>,
    },
}

/// Decode `rule` into a legacy record. Expressions this family does not use
/// are ignored.
pub fn rule_to_entry(rule: &NftRule) -> ArptEntry {
    let mut entry = ArptEntry::new();
    let mut layout: Option<ArpHeaderLayout> = None;
    let mut pending = Pending::Nothing;

    for expr in rule.exprs() {
        pending = match (expr, pending) {
            (Expr::Counter { packets, bytes }, _) => {
                entry.counters.pcnt = *packets;
                entry.counters.bcnt = *bytes;
                Pending::Nothing
            }
            (Expr::Meta { key, .. }, _) => Pending::Meta(*key),
            (
                Expr::Payload {
                    base: PayloadBase::Network,
                    offset,
                    len,
                    ..
                },
                _,
            ) => Pending::Payload {
                offset: *offset,
                len: *len,
                mask: None,
            },
            (Expr::Bitwise { mask, .. }, Pending::Payload { offset, len, .. }) => {
                Pending::Payload {
                    offset,
                    len,
                    mask: Some(mask.as_slice()),
                }
            }
            (Expr::Cmp { op, data, .. }, Pending::Meta(key)) => {
                parse_iface(&mut entry, key, *op, data);
                Pending::Nothing
            }
            (Expr::Cmp { op, data, .. }, Pending::Payload { offset, len, mask }) => {
                parse_payload(&mut entry, &mut layout, offset, len, mask, *op, data);
                Pending::Nothing
            }
            (
                Expr::Immediate {
                    dreg: NFT_REG_VERDICT,
                    data: ImmediateData::Verdict(verdict),
                },
                _,
            ) => {
                parse_verdict(&mut entry, verdict);
                Pending::Nothing
            }
            (
                Expr::Target {
                    name,
                    revision,
                    info,
                },
                _,
            ) => {
                entry.set_target(Action::Extension {
                    name: name.clone(),
                    revision: clamp_revision(name, *revision),
                    data: info.clone(),
                });
                Pending::Nothing
            }
            (
                Expr::Match {
                    name,
                    revision,
                    info,
                },
                _,
            ) => {
                entry.add_match(ExtMatch {
                    name: name.clone(),
                    revision: clamp_revision(name, *revision),
                    data: info.clone(),
                });
                Pending::Nothing
            }
            (other, _) => {
                trace!("Ignoring expression {}", other);
                Pending::Nothing
            }
        };
    }
    entry
}

fn clamp_revision(name: &str, revision: u32) -> u8 {
    u8::try_from(revision).unwrap_or_else(|_| {
        trace!("Clamping revision {} of {}", revision, name);
        u8::MAX
    })
}

fn parse_iface(entry: &mut ArptEntry, key: MetaKey, op: CmpOp, data: &[u8]) {
    let (iface, kflag) = match key {
        MetaKey::IifName => (&mut entry.arp.iniface, KernelInvFlags::VIA_IN),
        MetaKey::OifName => (&mut entry.arp.outiface, KernelInvFlags::VIA_OUT),
        MetaKey::Other(other) => {
            trace!("Ignoring meta key {}", other);
            return;
        }
    };
    let mut decoded = Iface::default();
    match data.split_last() {
        Some((0, name)) if data.len() <= IFNAMSIZ => {
            decoded.name[..name.len()].copy_from_slice(name);
            decoded.mask[..data.len()].fill(0xff);
        }
        Some(_) if data.len() + 2 <= IFNAMSIZ => {
            decoded.name[..data.len()].copy_from_slice(data);
            decoded.name[data.len()] = b'+';
            decoded.mask[..data.len()].fill(0xff);
        }
        _ => {
            trace!("Ignoring interface match of {} bytes", data.len());
            return;
        }
    }
    *iface = decoded;
    if op == CmpOp::Neq {
        entry.arp.invflags |= kernel_to_arpt_flags(kflag);
    }
}

fn parse_payload(
    entry: &mut ArptEntry,
    layout: &mut Option<ArpHeaderLayout>,
    offset: u32,
    len: u32,
    mask: Option<&[u8]>,
    op: CmpOp,
    data: &[u8],
) {
    let invert = op == CmpOp::Neq;
    let mask = match mask {
        Some(mask) if mask.len() == data.len() => mask.to_vec(),
        _ => vec![0xff; data.len()],
    };
    let field = if offset < ARPHDR_LEN {
        ArpField::fixed(offset)
    } else if let Some(layout) = layout {
        layout.classify(offset, len)
    } else {
        trace!("Skipping payload at {} before hardware length is known", offset);
        return;
    };
    let arp = &mut entry.arp;
    match field {
        Some(ArpField::HwType) => {
            if let (Some(value), Some(mask)) = (be16(data), be16(&mask)) {
                arp.arhrd = value;
                arp.arhrd_mask = mask;
                arp.invflags.set(InvFlags::ARPHRD, invert);
            }
        }
        Some(ArpField::ProtoType) => {
            if let (Some(value), Some(mask)) = (be16(data), be16(&mask)) {
                arp.arpro = value;
                arp.arpro_mask = mask;
                if invert {
                    arp.invflags |= kernel_to_arpt_flags(KernelInvFlags::PROTO);
                }
            }
        }
        Some(ArpField::Opcode) => {
            if let (Some(value), Some(mask)) = (be16(data), be16(&mask)) {
                arp.arpop = value;
                arp.arpop_mask = mask;
                arp.invflags.set(InvFlags::ARPOP, invert);
            }
        }
        Some(ArpField::HwLen) => {
            if let ([hln], [hln_mask]) = (data, mask.as_slice()) {
                arp.arhln = *hln;
                arp.arhln_mask = *hln_mask;
                arp.invflags.set(InvFlags::ARPHLN, invert);
                *layout = Some(ArpHeaderLayout::new(*hln));
            }
        }
        Some(ArpField::ProtoLen) => {}
        Some(ArpField::SrcIp) => {
            if let (Some(addr), Some(mask)) = (ipv4(data), ipv4(&mask)) {
                arp.src = addr;
                arp.smsk = mask;
                if invert {
                    arp.invflags |= kernel_to_arpt_flags(KernelInvFlags::SRC_IP);
                }
            }
        }
        Some(ArpField::TgtIp) => {
            if let (Some(addr), Some(mask)) = (ipv4(data), ipv4(&mask)) {
                arp.tgt = addr;
                arp.tmsk = mask;
                if invert {
                    arp.invflags |= kernel_to_arpt_flags(KernelInvFlags::DST_IP);
                }
            }
        }
        Some(ArpField::SrcDevAddr) => {
            if let Ok(dev) = DevAddr::new(data, &mask) {
                arp.src_devaddr = dev;
                arp.invflags.set(InvFlags::SRC_DEVADDR, invert);
            }
        }
        Some(ArpField::TgtDevAddr) => {
            if let Ok(dev) = DevAddr::new(data, &mask) {
                arp.tgt_devaddr = dev;
                arp.invflags.set(InvFlags::TGT_DEVADDR, invert);
            }
        }
        None => trace!("Ignoring payload at offset {} len {}", offset, len),
    }
}

fn parse_verdict(entry: &mut ArptEntry, verdict: &Verdict) {
    let action = match verdict {
        Verdict::Accept => Action::Accept,
        Verdict::Drop => Action::Drop,
        Verdict::Return => Action::Return,
        Verdict::Jump(chain) | Verdict::Goto(chain) => Action::Jump(chain.clone()),
        Verdict::Continue | Verdict::Break => {
            trace!("Ignoring verdict {:?}", verdict);
            return;
        }
    };
    entry.set_target(action);
}

fn be16(data: &[u8]) -> Option<u16> {
    <[u8; 2]>::try_from(data).ok().map(u16::from_be_bytes)
}

fn ipv4(data: &[u8]) -> Option<Ipv4Addr> {
    <[u8; 4]>::try_from(data).ok().map(Ipv4Addr::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ARPT_ENTRY_SIZE;
    use crate::expr::{Family, NFT_REG_1};

    fn payload(offset: u32, len: u32) -> Expr {
        Expr::Payload {
            dreg: NFT_REG_1,
            base: PayloadBase::Network,
            offset,
            len,
        }
    }

    fn cmp(op: CmpOp, data: &[u8]) -> Expr {
        Expr::Cmp {
            sreg: NFT_REG_1,
            op,
            data: data.to_vec(),
        }
    }

    fn rule(exprs: Vec<Expr>) -> NftRule {
        NftRule::with_exprs(Family::Arp, "filter", "INPUT", exprs)
    }

    #[test]
    fn test_header_fields() {
        let entry = rule_to_entry(&rule(vec![
            payload(0, 2),
            cmp(CmpOp::Eq, &[0, 1]),
            payload(2, 2),
            cmp(CmpOp::Neq, &[0x08, 0x00]),
            payload(6, 2),
            Expr::Bitwise {
                sreg: NFT_REG_1,
                dreg: NFT_REG_1,
                len: 2,
                mask: vec![0, 0xff],
                xor: vec![0, 0],
            },
            cmp(CmpOp::Eq, &[0, 2]),
        ]));
        assert_eq!(entry.arp.arhrd, 1);
        assert_eq!(entry.arp.arhrd_mask, 0xffff);
        assert_eq!(entry.arp.arpro, 0x0800);
        assert_eq!(entry.arp.arpop, 2);
        assert_eq!(entry.arp.arpop_mask, 0x00ff);
        assert_eq!(entry.arp.invflags, InvFlags::ARPPRO);
    }

    #[test]
    fn test_hw_len_inversion_sets_its_own_bit() {
        let entry = rule_to_entry(&rule(vec![payload(4, 1), cmp(CmpOp::Neq, &[6])]));
        assert_eq!(entry.arp.arhln, 6);
        assert_eq!(entry.arp.arhln_mask, 0xff);
        assert_eq!(entry.arp.invflags, InvFlags::ARPHLN);
    }

    #[test]
    fn test_addresses_skipped_without_hw_len() {
        let entry = rule_to_entry(&rule(vec![
            payload(14, 4),
            cmp(CmpOp::Eq, &[10, 0, 0, 1]),
            payload(4, 1),
            cmp(CmpOp::Eq, &[6]),
            payload(22, 4),
            cmp(CmpOp::Eq, &[10, 0, 0, 2]),
        ]));
        assert!(entry.arp.src.is_unspecified());
        assert_eq!(entry.arp.tgt, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(entry.arp.tmsk, Ipv4Addr::BROADCAST);
    }

    #[test]
    fn test_hw_addresses_use_resolved_length() {
        let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        let entry = rule_to_entry(&rule(vec![
            payload(4, 1),
            cmp(CmpOp::Eq, &[6]),
            payload(18, 6),
            cmp(CmpOp::Neq, &mac),
        ]));
        assert_eq!(&entry.arp.tgt_devaddr.addr[..6], &mac);
        assert_eq!(&entry.arp.tgt_devaddr.mask[..6], &[0xff; 6]);
        assert_eq!(entry.arp.tgt_devaddr.mask[6], 0);
        assert_eq!(entry.arp.invflags, InvFlags::TGT_DEVADDR);
    }

    #[test]
    fn test_interfaces() {
        let entry = rule_to_entry(&rule(vec![
            Expr::Meta {
                dreg: NFT_REG_1,
                key: MetaKey::IifName,
            },
            cmp(CmpOp::Eq, b"eth0\0"),
            Expr::Meta {
                dreg: NFT_REG_1,
                key: MetaKey::OifName,
            },
            cmp(CmpOp::Neq, b"wlan"),
        ]));
        assert_eq!(entry.arp.iniface, Iface::parse("eth0").unwrap());
        assert_eq!(entry.arp.outiface, Iface::parse("wlan+").unwrap());
        assert_eq!(entry.arp.invflags, InvFlags::VIA_OUT);
    }

    #[test]
    fn test_verdict_and_counters() {
        let entry = rule_to_entry(&rule(vec![
            Expr::Counter {
                packets: 5,
                bytes: 300,
            },
            Expr::verdict(Verdict::Goto("blocked".to_string())),
        ]));
        assert_eq!(entry.counters.pcnt, 5);
        assert_eq!(entry.counters.bcnt, 300);
        assert_eq!(entry.target_name(), "blocked");
        assert_eq!(entry.target_offset(), ARPT_ENTRY_SIZE);
    }

    #[test]
    fn test_unknown_expressions_tolerated() {
        let entry = rule_to_entry(&rule(vec![
            Expr::Other {
                name: "lookup".to_string(),
            },
            cmp(CmpOp::Eq, &[1, 2, 3]),
            payload(40, 4),
            cmp(CmpOp::Eq, &[1, 2, 3, 4]),
            Expr::verdict(Verdict::Drop),
        ]));
        assert_eq!(entry.arp, ArptEntry::new().arp);
        assert_eq!(entry.target(), Some(&Action::Drop));
    }

    #[test]
    fn test_match_expressions_become_matches() {
        let entry = rule_to_entry(&rule(vec![
            Expr::Match {
                name: "quota".to_string(),
                revision: 300,
                info: vec![0; 16],
            },
            Expr::Counter {
                packets: 0,
                bytes: 0,
            },
            Expr::verdict(Verdict::Accept),
        ]));
        assert_eq!(
            entry.matches(),
            [ExtMatch {
                name: "quota".to_string(),
                revision: u8::MAX,
                data: vec![0; 16],
            }]
        );
        assert_eq!(entry.target_offset(), ARPT_ENTRY_SIZE + 48);
    }
}
