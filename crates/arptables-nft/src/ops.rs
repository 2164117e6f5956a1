//! Family operations table plugged into the generic nft command layer.

use crate::builder;
use crate::compare;
use crate::entry::ArptEntry;
use crate::error::{ArpTablesError, Result};
use crate::expr::{Family, NftRule};
use crate::extension::ExtensionRegistry;
use crate::parser;
use crate::render::{Format, Renderer};

/// What the command layer needs from one protocol family.
pub trait NftFamilyOps {
    fn family(&self) -> Family;

    /// Append the expressions of `entry` to `rule`.
    fn add(&self, rule: &mut NftRule, entry: &ArptEntry) -> Result<()>;

    fn is_same(&self, a: &ArptEntry, b: &ArptEntry) -> bool;

    fn rule_to_entry(&self, rule: &NftRule) -> ArptEntry;

    /// Decode an installed rule and render it as a listing line.
    fn print_firewall(&self, rule: &NftRule, num: u32, format: Format) -> String;

    fn save_firewall(&self, entry: &ArptEntry, format: Format) -> String;

    fn rule_find(&self, candidate: &ArptEntry, rule: &NftRule) -> bool;
}

#[derive(Debug, Clone)]
pub struct ArpFamilyOps {
    registry: ExtensionRegistry,
}

impl ArpFamilyOps {
    pub fn new(registry: ExtensionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }
}

impl Default for ArpFamilyOps {
    fn default() -> Self {
        Self::new(ExtensionRegistry::with_defaults())
    }
}

impl NftFamilyOps for ArpFamilyOps {
    fn family(&self) -> Family {
        Family::Arp
    }

    fn add(&self, rule: &mut NftRule, entry: &ArptEntry) -> Result<()> {
        if rule.family != self.family() {
            return Err(ArpTablesError::UnsupportedFamily(rule.family.nfproto()));
        }
        builder::add_entry(rule, entry, &self.registry)
    }

    fn is_same(&self, a: &ArptEntry, b: &ArptEntry) -> bool {
        compare::is_same(a, b)
    }

    fn rule_to_entry(&self, rule: &NftRule) -> ArptEntry {
        parser::rule_to_entry(rule)
    }

    fn print_firewall(&self, rule: &NftRule, num: u32, format: Format) -> String {
        let entry = parser::rule_to_entry(rule);
        Renderer::new(&self.registry).print_firewall(&entry, num, format)
    }

    fn save_firewall(&self, entry: &ArptEntry, format: Format) -> String {
        Renderer::new(&self.registry).save_firewall(entry, format)
    }

    fn rule_find(&self, candidate: &ArptEntry, rule: &NftRule) -> bool {
        compare::rule_find(candidate, rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Action;

    #[test]
    fn test_add_then_print() {
        let ops = ArpFamilyOps::default();
        let mut entry = ArptEntry::new();
        entry.set_opcode("Request", false).unwrap();
        entry.set_target(Action::Accept);

        let mut rule = NftRule::new(ops.family(), "filter", "OUTPUT");
        ops.add(&mut rule, &entry).unwrap();
        assert_eq!(
            ops.print_firewall(&rule, 1, Format::NOCOUNTS),
            "-j ACCEPT --opcode Request \n"
        );
        assert!(ops.rule_find(&entry, &rule));
    }
}
