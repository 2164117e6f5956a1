//! Inversion flag vocabularies.
//!
//! The legacy ARP record and the shared nft layer describe "this match is
//! negated" with two unrelated bit layouts. Only interface, protocol address,
//! protocol type and the generic mask have a counterpart on both sides.

use bitflags::bitflags;

bitflags! {
    /// Per-field negation bits of `arpt_arp.invflags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InvFlags: u16 {
        const VIA_IN = 0x0001;
        const VIA_OUT = 0x0002;
        const SRC_IP = 0x0004;
        const TGT_IP = 0x0008;
        const SRC_DEVADDR = 0x0010;
        const TGT_DEVADDR = 0x0020;
        const ARPOP = 0x0040;
        const ARPHRD = 0x0080;
        const ARPPRO = 0x0100;
        const ARPHLN = 0x0200;
        /// Every per-field bit.
        const MASK = 0x03FF;
    }
}

bitflags! {
    /// Negation bits understood by the generic nft interface/address helpers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KernelInvFlags: u8 {
        const VIA_IN = 0x01;
        const VIA_OUT = 0x02;
        const TOS = 0x04;
        const SRC_IP = 0x08;
        const DST_IP = 0x10;
        const FRAG = 0x20;
        const PROTO = 0x40;
        const MASK = 0x7F;
    }
}

const MAPPING: [(InvFlags, KernelInvFlags); 6] = [
    (InvFlags::VIA_IN, KernelInvFlags::VIA_IN),
    (InvFlags::VIA_OUT, KernelInvFlags::VIA_OUT),
    (InvFlags::SRC_IP, KernelInvFlags::SRC_IP),
    (InvFlags::TGT_IP, KernelInvFlags::DST_IP),
    (InvFlags::ARPPRO, KernelInvFlags::PROTO),
    (InvFlags::MASK, KernelInvFlags::MASK),
];

/// Translate legacy inversion bits into the kernel-side vocabulary.
///
/// Multi-bit entries (the generic masks) only map when every bit is present.
pub fn arpt_to_kernel_flags(invflags: InvFlags) -> KernelInvFlags {
    MAPPING
        .iter()
        .filter(|(legacy, _)| invflags.contains(*legacy))
        .fold(KernelInvFlags::empty(), |acc, (_, kernel)| acc | *kernel)
}

/// Translate kernel-side inversion bits back into the legacy vocabulary.
pub fn kernel_to_arpt_flags(flags: KernelInvFlags) -> InvFlags {
    MAPPING
        .iter()
        .filter(|(_, kernel)| flags.contains(*kernel))
        .fold(InvFlags::empty(), |acc, (legacy, _)| acc | *legacy)
}
