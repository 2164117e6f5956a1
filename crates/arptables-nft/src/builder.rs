//! Compile an [`ArptEntry`] into nf_tables expressions.
//!
//! Emission order is fixed: interfaces, header fields, addresses, match
//! extensions, counter, terminal action. The kernel evaluates left to right, so the counter has to
//! sit right before the verdict.

use tracing::debug;

use crate::entry::{Action, ArptEntry, DevAddr, ExtMatch, Iface, ARPT_DEV_ADDR_LEN_MAX};
use crate::error::{ArpTablesError, Result};
use crate::expr::{CmpOp, Expr, MetaKey, NftRule, PayloadBase, Verdict, NFT_REG_1};
use crate::extension::ExtensionRegistry;
use crate::flags::{arpt_to_kernel_flags, InvFlags, KernelInvFlags};
use crate::layout::{ArpHeaderLayout, AR_HLN, AR_HRD, AR_OP, AR_PLN, AR_PRO, PROTO_ADDR_LEN};

/// Expressions collected for one rule, bounded by what the rule can still
/// take.
struct Staged {
    exprs: Vec<Expr>,
    budget: usize,
}

impl Staged {
    fn new(budget: usize) -> Self {
        Self {
            exprs: Vec::new(),
            budget,
        }
    }

    fn push(&mut self, expr: Expr) -> Result<()> {
        if self.exprs.len() >= self.budget {
            return Err(ArpTablesError::construction(
                expr.name(),
                "rule has no room for more expressions",
            ));
        }
        self.exprs.push(expr);
        Ok(())
    }

    fn iface(&mut self, key: MetaKey, iface: &Iface, invert: bool) -> Result<()> {
        let data = if iface.is_wildcard() {
            let name = iface.name_bytes();
            let prefix = &name[..name.len() - 1];
            if prefix.is_empty() {
                // "+" alone matches every interface.
                return Ok(());
            }
            prefix.to_vec()
        } else {
            let mut data = iface.name_bytes().to_vec();
            data.push(0);
            data
        };
        self.push(Expr::Meta {
            dreg: NFT_REG_1,
            key,
        })?;
        self.push(Expr::Cmp {
            sreg: NFT_REG_1,
            op: CmpOp::inverted(invert),
            data,
        })
    }

    /// Load `value.len()` bytes at `offset`, mask them unless the mask is
    /// all-ones, and compare.
    fn payload(&mut self, offset: u32, value: &[u8], mask: &[u8], invert: bool) -> Result<()> {
        let len = value.len() as u32;
        self.push(Expr::Payload {
            dreg: NFT_REG_1,
            base: PayloadBase::Network,
            offset,
            len,
        })?;
        if mask.iter().any(|b| *b != 0xff) {
            self.push(Expr::Bitwise {
                sreg: NFT_REG_1,
                dreg: NFT_REG_1,
                len,
                mask: mask.to_vec(),
                xor: vec![0; value.len()],
            })?;
        }
        self.push(Expr::Cmp {
            sreg: NFT_REG_1,
            op: CmpOp::inverted(invert),
            data: value.to_vec(),
        })
    }

    fn devaddr(&mut self, offset: u32, hln: usize, dev: &DevAddr, invert: bool) -> Result<()> {
        self.payload(offset, &dev.addr[..hln], &dev.mask[..hln], invert)
    }

    fn ext_match(&mut self, ext: &ExtMatch, registry: &ExtensionRegistry) -> Result<()> {
        if registry.find_match(&ext.name).is_none() {
            return Err(ArpTablesError::construction(
                "match",
                format!("match extension {} is not registered", ext.name),
            ));
        }
        self.push(Expr::Match {
            name: ext.name.clone(),
            revision: u32::from(ext.revision),
            info: ext.data.clone(),
        })
    }

    fn action(&mut self, entry: &ArptEntry, registry: &ExtensionRegistry) -> Result<()> {
        let action = entry
            .target()
            .ok_or_else(|| ArpTablesError::ActionResolution {
                name: String::new(),
            })?;
        let expr = match action {
            Action::Accept => Expr::verdict(Verdict::Accept),
            Action::Drop => Expr::verdict(Verdict::Drop),
            Action::Return => Expr::verdict(Verdict::Return),
            Action::Jump(chain) => Expr::verdict(Verdict::Jump(chain.clone())),
            Action::Extension {
                name,
                revision,
                data,
            } => {
                if registry.find_target(name).is_none() {
                    return Err(ArpTablesError::ActionResolution { name: name.clone() });
                }
                Expr::Target {
                    name: name.clone(),
                    revision: u32::from(*revision),
                    info: data.clone(),
                }
            }
        };
        self.push(expr)
    }
}

/// Append the expressions for `entry` to `rule`. On error the rule is left
/// untouched.
pub fn add_entry(rule: &mut NftRule, entry: &ArptEntry, registry: &ExtensionRegistry) -> Result<()> {
    let arp = &entry.arp;
    let kflags = arpt_to_kernel_flags(arp.invflags);
    let inv = |flag: InvFlags| arp.invflags.contains(flag);
    let mut staged = Staged::new(rule.remaining_capacity());

    if arp.iniface.is_set() {
        staged.iface(
            MetaKey::IifName,
            &arp.iniface,
            kflags.contains(KernelInvFlags::VIA_IN),
        )?;
    }
    if arp.outiface.is_set() {
        staged.iface(
            MetaKey::OifName,
            &arp.outiface,
            kflags.contains(KernelInvFlags::VIA_OUT),
        )?;
    }

    if arp.arhrd != 0 {
        staged.payload(
            AR_HRD,
            &arp.arhrd.to_be_bytes(),
            &arp.arhrd_mask.to_be_bytes(),
            inv(InvFlags::ARPHRD),
        )?;
    }
    if arp.arpro != 0 {
        staged.payload(
            AR_PRO,
            &arp.arpro.to_be_bytes(),
            &arp.arpro_mask.to_be_bytes(),
            inv(InvFlags::ARPPRO),
        )?;
    }
    if arp.arhln != 0 {
        staged.payload(
            AR_HLN,
            &[arp.arhln],
            &[arp.arhln_mask],
            inv(InvFlags::ARPHLN),
        )?;
    }
    staged.payload(AR_PLN, &[PROTO_ADDR_LEN as u8], &[0xff], false)?;
    if arp.arpop != 0 {
        staged.payload(
            AR_OP,
            &arp.arpop.to_be_bytes(),
            &arp.arpop_mask.to_be_bytes(),
            inv(InvFlags::ARPOP),
        )?;
    }

    let layout = ArpHeaderLayout::new(arp.arhln);
    let hln = usize::from(arp.arhln);
    let hw_len_usable = (1..=ARPT_DEV_ADDR_LEN_MAX).contains(&hln);
    let needs_hw_len = |what: &str| {
        ArpTablesError::construction(
            "payload",
            format!("{what} needs a hardware address length between 1 and {ARPT_DEV_ADDR_LEN_MAX}, got {hln}"),
        )
    };
    // Protocol addresses sit behind the hardware address, so without an
    // addrlen match the rule could not be read back.
    let needs_addrlen = |what: &str| {
        ArpTablesError::construction(
            "payload",
            format!("{what} needs a non-zero hardware address length"),
        )
    };

    if arp.src_devaddr.is_set() {
        if !hw_len_usable {
            return Err(needs_hw_len("source hardware address"));
        }
        staged.devaddr(
            layout.src_devaddr(),
            hln,
            &arp.src_devaddr,
            inv(InvFlags::SRC_DEVADDR),
        )?;
    }
    if !arp.src.is_unspecified() {
        if arp.arhln == 0 {
            return Err(needs_addrlen("source IP address"));
        }
        staged.payload(
            layout.src_ip(),
            &arp.src.octets(),
            &arp.smsk.octets(),
            kflags.contains(KernelInvFlags::SRC_IP),
        )?;
    }
    if arp.tgt_devaddr.is_set() {
        if !hw_len_usable {
            return Err(needs_hw_len("target hardware address"));
        }
        staged.devaddr(
            layout.tgt_devaddr(),
            hln,
            &arp.tgt_devaddr,
            inv(InvFlags::TGT_DEVADDR),
        )?;
    }
    if !arp.tgt.is_unspecified() {
        if arp.arhln == 0 {
            return Err(needs_addrlen("target IP address"));
        }
        staged.payload(
            layout.tgt_ip(),
            &arp.tgt.octets(),
            &arp.tmsk.octets(),
            kflags.contains(KernelInvFlags::DST_IP),
        )?;
    }

    for ext in entry.matches() {
        staged.ext_match(ext, registry)?;
    }

    staged.push(Expr::Counter {
        packets: entry.counters.pcnt,
        bytes: entry.counters.bcnt,
    })?;
    staged.action(entry, registry)?;

    debug!(
        "Built {} expressions for {}/{} rule targeting {}",
        staged.exprs.len(),
        rule.table,
        rule.chain,
        entry.target_name()
    );
    rule.extend_exprs(staged.exprs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Family, ImmediateData, NFT_RULE_MAXEXPRS};

    fn rule() -> NftRule {
        NftRule::new(Family::Arp, "filter", "INPUT")
    }

    fn accept_entry() -> ArptEntry {
        let mut entry = ArptEntry::new();
        entry.set_target(Action::Accept);
        entry
    }

    #[test]
    fn test_minimal_rule() {
        let registry = ExtensionRegistry::with_defaults();
        let mut rule = rule();
        add_entry(&mut rule, &accept_entry(), &registry).unwrap();
        let names: Vec<&str> = rule.exprs().iter().map(Expr::name).collect();
        assert_eq!(names, ["payload", "cmp", "counter", "immediate"]);
        assert_eq!(
            rule.exprs()[0],
            Expr::Payload {
                dreg: NFT_REG_1,
                base: PayloadBase::Network,
                offset: 5,
                len: 1
            }
        );
    }

    #[test]
    fn test_counter_precedes_verdict() {
        let registry = ExtensionRegistry::with_defaults();
        let mut entry = accept_entry();
        entry.set_iniface("eth0", false).unwrap();
        entry.set_outiface("eth1", true).unwrap();
        entry.set_hw_type("Ethernet", false).unwrap();
        entry.set_hw_len("6", false).unwrap();
        entry.set_target_addr("10.0.0.1", false).unwrap();
        entry.counters.pcnt = 3;

        let mut rule = rule();
        add_entry(&mut rule, &entry, &registry).unwrap();
        let exprs = rule.exprs();
        let n = exprs.len();
        assert!(matches!(exprs[n - 2], Expr::Counter { packets: 3, .. }));
        assert_eq!(exprs[n - 1], Expr::verdict(Verdict::Accept));
    }

    #[test]
    fn test_interface_inversion_and_wildcard() {
        let registry = ExtensionRegistry::with_defaults();
        let mut entry = accept_entry();
        entry.set_iniface("eth+", true).unwrap();

        let mut rule = rule();
        add_entry(&mut rule, &entry, &registry).unwrap();
        assert_eq!(
            rule.exprs()[1],
            Expr::Cmp {
                sreg: NFT_REG_1,
                op: CmpOp::Neq,
                data: b"eth".to_vec()
            }
        );
    }

    #[test]
    fn test_target_address_offset_follows_hw_len() {
        let registry = ExtensionRegistry::with_defaults();
        let mut entry = accept_entry();
        entry.set_hw_len("8", false).unwrap();
        entry.set_target_addr("192.168.0.0/16", false).unwrap();

        let mut rule = rule();
        add_entry(&mut rule, &entry, &registry).unwrap();
        assert!(rule.exprs().contains(&Expr::Payload {
            dreg: NFT_REG_1,
            base: PayloadBase::Network,
            offset: 8 + 8 + 4 + 4,
            len: 4
        }));
        assert!(rule
            .exprs()
            .iter()
            .any(|e| matches!(e, Expr::Bitwise { mask, .. } if mask == &[255, 255, 0, 0])));
    }

    #[test]
    fn test_hw_address_without_length_fails() {
        let registry = ExtensionRegistry::with_defaults();
        let mut entry = accept_entry();
        entry.set_src_mac("00:11:22:33:44:55", false).unwrap();

        let mut rule = rule();
        let err = add_entry(&mut rule, &entry, &registry).unwrap_err();
        assert!(matches!(err, ArpTablesError::Construction { .. }));
        assert!(rule.is_empty());
    }

    #[test]
    fn test_ip_address_without_length_fails() {
        let registry = ExtensionRegistry::with_defaults();
        type Setter = fn(&mut ArptEntry, &str, bool) -> crate::error::Result<()>;
        let setters: [Setter; 2] = [ArptEntry::set_source, ArptEntry::set_target_addr];
        for set in setters {
            let mut entry = accept_entry();
            entry.set_iniface("eth0", false).unwrap();
            set(&mut entry, "10.0.0.1", false).unwrap();

            let mut rule = rule();
            let err = add_entry(&mut rule, &entry, &registry).unwrap_err();
            assert!(matches!(err, ArpTablesError::Construction { .. }));
            assert!(rule.is_empty());
        }
    }

    #[test]
    fn test_construction_failure_leaves_rule_unchanged() {
        let registry = ExtensionRegistry::with_defaults();
        let mut rule = rule();
        for _ in 0..NFT_RULE_MAXEXPRS - 3 {
            rule.add_expr(Expr::Other {
                name: "pad".to_string(),
            })
            .unwrap();
        }
        let before = rule.clone();
        let err = add_entry(&mut rule, &accept_entry(), &registry).unwrap_err();
        assert!(matches!(
            err,
            ArpTablesError::Construction { ref expr, .. } if expr == "immediate"
        ));
        assert_eq!(rule, before);
    }

    #[test]
    fn test_unresolvable_actions() {
        let registry = ExtensionRegistry::with_defaults();
        let mut rule = rule();
        let err = add_entry(&mut rule, &ArptEntry::new(), &registry).unwrap_err();
        assert!(matches!(err, ArpTablesError::ActionResolution { .. }));

        let mut entry = ArptEntry::new();
        entry.set_target(Action::Extension {
            name: "mangle".to_string(),
            revision: 0,
            data: vec![0; 8],
        });
        let err = add_entry(&mut rule, &entry, &registry).unwrap_err();
        assert!(matches!(
            err,
            ArpTablesError::ActionResolution { ref name } if name == "mangle"
        ));
        assert!(rule.is_empty());
    }

    #[test]
    fn test_match_extensions_precede_counter() {
        let registry = ExtensionRegistry::with_defaults();
        let mut quota = ExtMatch::resolve("quota", &registry).unwrap();
        let ext = registry.find_match("quota").unwrap();
        ext.parse("quota", "5000", false, &mut quota.data).unwrap();
        let mut entry = accept_entry();
        entry.set_opcode("Request", false).unwrap();
        entry.add_match(quota.clone());

        let mut rule = rule();
        add_entry(&mut rule, &entry, &registry).unwrap();
        let names: Vec<&str> = rule.exprs().iter().map(Expr::name).collect();
        assert_eq!(
            names,
            ["payload", "cmp", "payload", "cmp", "match", "counter", "immediate"]
        );
        assert_eq!(
            rule.exprs()[4],
            Expr::Match {
                name: "quota".to_string(),
                revision: 0,
                info: quota.data,
            }
        );

        let mut unknown = accept_entry();
        unknown.add_match(ExtMatch {
            name: "limit".to_string(),
            revision: 0,
            data: vec![0; 8],
        });
        let mut rule = self::rule();
        let err = add_entry(&mut rule, &unknown, &registry).unwrap_err();
        assert!(matches!(
            err,
            ArpTablesError::Construction { ref expr, .. } if expr == "match"
        ));
        assert!(rule.is_empty());
    }

    #[test]
    fn test_jump_and_extension_targets() {
        let registry = ExtensionRegistry::with_defaults();
        let mut entry = ArptEntry::new();
        entry.set_target(Action::resolve("blocked", &registry).unwrap());
        let mut rule = rule();
        add_entry(&mut rule, &entry, &registry).unwrap();
        assert_eq!(
            rule.exprs().last(),
            Some(&Expr::Immediate {
                dreg: 0,
                data: ImmediateData::Verdict(Verdict::Jump("blocked".to_string()))
            })
        );

        entry.set_target(Action::resolve("CLASSIFY", &registry).unwrap());
        let mut rule = self::rule();
        add_entry(&mut rule, &entry, &registry).unwrap();
        assert!(matches!(
            rule.exprs().last(),
            Some(Expr::Target { name, info, .. }) if name == "CLASSIFY" && info.len() == 8
        ));
    }
}
