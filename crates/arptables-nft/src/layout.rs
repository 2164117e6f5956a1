//! Offsets of the ARP header fields as seen by nf_tables payload expressions.
//!
//! The fixed part is `struct arphdr`; the address region that follows depends
//! on the hardware address length carried in the header itself.

/// `offsetof(struct arphdr, ar_hrd)`
pub const AR_HRD: u32 = 0;
/// `offsetof(struct arphdr, ar_pro)`
pub const AR_PRO: u32 = 2;
/// `offsetof(struct arphdr, ar_hln)`
pub const AR_HLN: u32 = 4;
/// `offsetof(struct arphdr, ar_pln)`
pub const AR_PLN: u32 = 5;
/// `offsetof(struct arphdr, ar_op)`
pub const AR_OP: u32 = 6;
/// `sizeof(struct arphdr)`
pub const ARPHDR_LEN: u32 = 8;

/// Protocol addresses are always IPv4 for this family.
pub const PROTO_ADDR_LEN: u32 = 4;

/// Logical field a payload expression refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpField {
    HwType,
    ProtoType,
    HwLen,
    ProtoLen,
    Opcode,
    SrcDevAddr,
    SrcIp,
    TgtDevAddr,
    TgtIp,
}

impl ArpField {
    /// Fields whose offset does not depend on the hardware address length.
    pub fn fixed(offset: u32) -> Option<Self> {
        match offset {
            AR_HRD => Some(Self::HwType),
            AR_PRO => Some(Self::ProtoType),
            AR_HLN => Some(Self::HwLen),
            AR_PLN => Some(Self::ProtoLen),
            AR_OP => Some(Self::Opcode),
            _ => None,
        }
    }
}

/// Address region layout for one hardware address length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpHeaderLayout {
    hln: u32,
}

impl ArpHeaderLayout {
    pub fn new(hln: u8) -> Self {
        Self { hln: u32::from(hln) }
    }

    pub fn hw_len(&self) -> u32 {
        self.hln
    }

    pub fn src_devaddr(&self) -> u32 {
        ARPHDR_LEN
    }

    pub fn src_ip(&self) -> u32 {
        ARPHDR_LEN + self.hln
    }

    pub fn tgt_devaddr(&self) -> u32 {
        ARPHDR_LEN + self.hln + PROTO_ADDR_LEN
    }

    pub fn tgt_ip(&self) -> u32 {
        ARPHDR_LEN + self.hln + PROTO_ADDR_LEN + PROTO_ADDR_LEN
    }

    /// Classify a payload load of `len` bytes at `offset` in the address
    /// region. Protocol addresses take precedence; a hardware address match
    /// needs a non-empty hardware address of exactly `len` bytes.
    pub fn classify(&self, offset: u32, len: u32) -> Option<ArpField> {
        if offset < ARPHDR_LEN {
            return ArpField::fixed(offset);
        }
        if len == PROTO_ADDR_LEN {
            if offset == self.src_ip() {
                return Some(ArpField::SrcIp);
            }
            if offset == self.tgt_ip() {
                return Some(ArpField::TgtIp);
            }
        }
        if self.hln > 0 && len == self.hln {
            if offset == self.src_devaddr() {
                return Some(ArpField::SrcDevAddr);
            }
            if offset == self.tgt_devaddr() {
                return Some(ArpField::TgtDevAddr);
            }
        }
        None
    }
}
