//! Rule equivalence, used to pick the installed rule a delete or replace
//! refers to.

use tracing::debug;

use crate::entry::{ArptEntry, Iface};
use crate::expr::NftRule;
use crate::parser::rule_to_entry;

/// Targets whose data has to match byte for byte, not just by name.
const DATA_SIGNIFICANT_TARGETS: [&str; 2] = ["mangle", "CLASSIFY"];

fn same_iface(a: &Iface, b: &Iface) -> bool {
    a.mask == b.mask
        && a
            .name
            .iter()
            .zip(b.name.iter())
            .zip(a.mask.iter())
            .all(|((x, y), m)| x & m == y & m)
}

/// Interfaces are equal when their masks are equal and the names agree on
/// every masked byte. An all-zero mask therefore matches any name.
pub fn is_same_interfaces(a_in: &Iface, a_out: &Iface, b_in: &Iface, b_out: &Iface) -> bool {
    if !same_iface(a_in, b_in) {
        debug!("different input interface");
        return false;
    }
    if !same_iface(a_out, b_out) {
        debug!("different output interface");
        return false;
    }
    true
}

/// Match-part equivalence of two records.
///
/// The source mask of `a` is compared with the target mask of `b`. Hardware
/// addresses, opcode, hardware type and hardware length are not compared.
pub fn is_same(a: &ArptEntry, b: &ArptEntry) -> bool {
    let (a, b) = (&a.arp, &b.arp);
    if a.src != b.src
        || a.tgt != b.tgt
        || a.smsk != b.tmsk
        || a.arpro != b.arpro
        || a.flags != b.flags
        || a.invflags != b.invflags
    {
        debug!("different src/dst/proto/flags/invflags");
        return false;
    }
    is_same_interfaces(&a.iniface, &a.outiface, &b.iniface, &b.outiface)
}

/// Does installed `rule` correspond to `candidate`?
pub fn rule_find(candidate: &ArptEntry, rule: &NftRule) -> bool {
    let installed = rule_to_entry(rule);
    if !is_same(candidate, &installed) {
        return false;
    }

    let name = candidate.target_name();
    if name != installed.target_name() {
        debug!("different verdict");
        return false;
    }
    if DATA_SIGNIFICANT_TARGETS.contains(&name) {
        let ours = candidate.target().map(|t| t.data()).unwrap_or_default();
        let theirs = installed.target().map(|t| t.data()).unwrap_or_default();
        if ours != theirs {
            debug!("different target data for {}", name);
            return false;
        }
    }
    true
}
