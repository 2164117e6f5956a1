//! nf_tables expressions and rules as plain values.
//!
//! These mirror the kernel's expression kinds closely enough for
//! [`crate::wire`] to encode them one-to-one; nothing here performs I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArpTablesError, Result};

/// `NFPROTO_ARP`
pub const NFPROTO_ARP: u8 = 3;

/// Upper bound the kernel enforces on expressions per rule.
pub const NFT_RULE_MAXEXPRS: usize = 128;

pub const NFT_REG_VERDICT: u32 = 0;
pub const NFT_REG_1: u32 = 1;

/// Protocol family a rule belongs to. Only ARP is modelled; the value is still
/// threaded explicitly through every translation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Arp,
}

impl Family {
    pub fn nfproto(self) -> u8 {
        match self {
            Family::Arp => NFPROTO_ARP,
        }
    }

    pub fn from_nfproto(value: u8) -> Result<Self> {
        match value {
            NFPROTO_ARP => Ok(Family::Arp),
            other => Err(ArpTablesError::UnsupportedFamily(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    IifName,
    OifName,
    Other(u32),
}

impl MetaKey {
    pub fn as_u32(self) -> u32 {
        match self {
            MetaKey::IifName => 6,
            MetaKey::OifName => 7,
            MetaKey::Other(key) => key,
        }
    }

    pub fn from_u32(key: u32) -> Self {
        match key {
            6 => MetaKey::IifName,
            7 => MetaKey::OifName,
            other => MetaKey::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadBase {
    LinkLayer,
    Network,
    Transport,
}

impl PayloadBase {
    pub fn as_u32(self) -> u32 {
        match self {
            PayloadBase::LinkLayer => 0,
            PayloadBase::Network => 1,
            PayloadBase::Transport => 2,
        }
    }

    pub fn from_u32(base: u32) -> Option<Self> {
        match base {
            0 => Some(PayloadBase::LinkLayer),
            1 => Some(PayloadBase::Network),
            2 => Some(PayloadBase::Transport),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    pub fn inverted(invert: bool) -> Self {
        if invert {
            CmpOp::Neq
        } else {
            CmpOp::Eq
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            CmpOp::Eq => 0,
            CmpOp::Neq => 1,
            CmpOp::Lt => 2,
            CmpOp::Lte => 3,
            CmpOp::Gt => 4,
            CmpOp::Gte => 5,
        }
    }

    pub fn from_u32(op: u32) -> Option<Self> {
        match op {
            0 => Some(CmpOp::Eq),
            1 => Some(CmpOp::Neq),
            2 => Some(CmpOp::Lt),
            3 => Some(CmpOp::Lte),
            4 => Some(CmpOp::Gt),
            5 => Some(CmpOp::Gte),
            _ => None,
        }
    }
}

/// Netfilter verdicts, including the nf_tables chain control codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Drop,
    Accept,
    Continue,
    Break,
    Return,
    Jump(String),
    Goto(String),
}

pub const NF_DROP: i32 = 0;
pub const NF_ACCEPT: i32 = 1;
pub const NFT_CONTINUE: i32 = -1;
pub const NFT_BREAK: i32 = -2;
pub const NFT_JUMP: i32 = -3;
pub const NFT_GOTO: i32 = -4;
pub const NFT_RETURN: i32 = -5;

impl Verdict {
    pub fn code(&self) -> i32 {
        match self {
            Verdict::Drop => NF_DROP,
            Verdict::Accept => NF_ACCEPT,
            Verdict::Continue => NFT_CONTINUE,
            Verdict::Break => NFT_BREAK,
            Verdict::Return => NFT_RETURN,
            Verdict::Jump(_) => NFT_JUMP,
            Verdict::Goto(_) => NFT_GOTO,
        }
    }

    pub fn chain(&self) -> Option<&str> {
        match self {
            Verdict::Jump(chain) | Verdict::Goto(chain) => Some(chain),
            _ => None,
        }
    }

    pub fn from_code(code: i32, chain: Option<String>) -> Result<Self> {
        let needs_chain = |chain: Option<String>| {
            chain.ok_or_else(|| ArpTablesError::decode("verdict", "jump without chain"))
        };
        match code {
            NF_DROP => Ok(Verdict::Drop),
            NF_ACCEPT => Ok(Verdict::Accept),
            NFT_CONTINUE => Ok(Verdict::Continue),
            NFT_BREAK => Ok(Verdict::Break),
            NFT_RETURN => Ok(Verdict::Return),
            NFT_JUMP => Ok(Verdict::Jump(needs_chain(chain)?)),
            NFT_GOTO => Ok(Verdict::Goto(needs_chain(chain)?)),
            other => Err(ArpTablesError::decode(
                "verdict",
                format!("unknown code {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImmediateData {
    Value(Vec<u8>),
    Verdict(Verdict),
}

/// One expression of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Meta {
        dreg: u32,
        key: MetaKey,
    },
    Payload {
        dreg: u32,
        base: PayloadBase,
        offset: u32,
        len: u32,
    },
    Bitwise {
        sreg: u32,
        dreg: u32,
        len: u32,
        mask: Vec<u8>,
        xor: Vec<u8>,
    },
    Cmp {
        sreg: u32,
        op: CmpOp,
        data: Vec<u8>,
    },
    Counter {
        packets: u64,
        bytes: u64,
    },
    Immediate {
        dreg: u32,
        data: ImmediateData,
    },
    /// xtables target invoked through the compat layer.
    Target {
        name: String,
        revision: u32,
        info: Vec<u8>,
    },
    /// xtables match invoked through the compat layer.
    Match {
        name: String,
        revision: u32,
        info: Vec<u8>,
    },
    /// Anything this crate does not interpret.
    Other {
        name: String,
    },
}

impl Expr {
    pub fn name(&self) -> &str {
        match self {
            Expr::Meta { .. } => "meta",
            Expr::Payload { .. } => "payload",
            Expr::Bitwise { .. } => "bitwise",
            Expr::Cmp { .. } => "cmp",
            Expr::Counter { .. } => "counter",
            Expr::Immediate { .. } => "immediate",
            Expr::Target { .. } => "target",
            Expr::Match { .. } => "match",
            Expr::Other { name } => name,
        }
    }

    pub fn verdict(verdict: Verdict) -> Self {
        Expr::Immediate {
            dreg: NFT_REG_VERDICT,
            data: ImmediateData::Verdict(verdict),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Meta { dreg, key } => write!(f, "[ meta load {} => reg {dreg} ]", key.as_u32()),
            Expr::Payload {
                dreg,
                base,
                offset,
                len,
            } => write!(
                f,
                "[ payload load {len}b @ base {} + {offset} => reg {dreg} ]",
                base.as_u32()
            ),
            Expr::Bitwise {
                sreg, dreg, mask, ..
            } => write!(f, "[ bitwise reg {dreg} = (reg={sreg} & {}) ]", hex(mask)),
            Expr::Cmp { sreg, op, data } => {
                write!(f, "[ cmp {:?} reg {sreg} {} ]", op, hex(data))
            }
            Expr::Counter { packets, bytes } => {
                write!(f, "[ counter pkts {packets} bytes {bytes} ]")
            }
            Expr::Immediate { dreg, data } => match data {
                ImmediateData::Verdict(verdict) => write!(
                    f,
                    "[ immediate reg {dreg} {:?} {} ]",
                    verdict,
                    verdict.chain().unwrap_or("")
                ),
                ImmediateData::Value(value) => {
                    write!(f, "[ immediate reg {dreg} {} ]", hex(value))
                }
            },
            Expr::Target { name, revision, .. } => {
                write!(f, "[ target name {name} rev {revision} ]")
            }
            Expr::Match { name, revision, .. } => {
                write!(f, "[ match name {name} rev {revision} ]")
            }
            Expr::Other { name } => write!(f, "[ {name} ]"),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    let digits: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("0x{digits}")
}

/// One nf_tables rule with its ordered expression list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftRule {
    pub family: Family,
    pub table: String,
    pub chain: String,
    pub handle: Option<u64>,
    exprs: Vec<Expr>,
}

impl NftRule {
    pub fn new(family: Family, table: &str, chain: &str) -> Self {
        Self {
            family,
            table: table.to_string(),
            chain: chain.to_string(),
            handle: None,
            exprs: Vec::new(),
        }
    }

    /// Rule as delivered by a list operation.
    pub fn with_exprs(family: Family, table: &str, chain: &str, exprs: Vec<Expr>) -> Self {
        Self {
            exprs,
            ..Self::new(family, table, chain)
        }
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn remaining_capacity(&self) -> usize {
        NFT_RULE_MAXEXPRS.saturating_sub(self.exprs.len())
    }

    pub fn add_expr(&mut self, expr: Expr) -> Result<()> {
        if self.remaining_capacity() == 0 {
            return Err(ArpTablesError::construction(
                expr.name(),
                format!("rule already holds {NFT_RULE_MAXEXPRS} expressions"),
            ));
        }
        self.exprs.push(expr);
        Ok(())
    }

    /// Append a batch built elsewhere; all or nothing.
    pub fn extend_exprs(&mut self, exprs: Vec<Expr>) -> Result<()> {
        if exprs.len() > self.remaining_capacity() {
            let name = exprs.first().map(|e| e.name().to_string()).unwrap_or_default();
            return Err(ArpTablesError::construction(
                name,
                format!("rule would exceed {NFT_RULE_MAXEXPRS} expressions"),
            ));
        }
        self.exprs.extend(exprs);
        Ok(())
    }
}
