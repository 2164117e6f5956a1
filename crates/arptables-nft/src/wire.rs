//! nf_tables netlink attribute codec for rules and their expressions.
//!
//! Only the message body is handled here (nfgenmsg plus attributes); the
//! netlink header and the socket belong to the transport.

use tracing::trace;

use crate::error::{ArpTablesError, Result};
use crate::expr::{CmpOp, Expr, Family, ImmediateData, MetaKey, NftRule, PayloadBase, Verdict};

const NFNETLINK_V0: u8 = 0;
const NFGENMSG_LEN: usize = 4;

const NLA_F_NESTED: u16 = 1 << 15;
const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
const NLA_HDRLEN: usize = 4;
const NLA_ALIGNTO: usize = 4;

const NFTA_RULE_TABLE: u16 = 1;
const NFTA_RULE_CHAIN: u16 = 2;
const NFTA_RULE_HANDLE: u16 = 3;
const NFTA_RULE_EXPRESSIONS: u16 = 4;

const NFTA_LIST_ELEM: u16 = 1;

const NFTA_EXPR_NAME: u16 = 1;
const NFTA_EXPR_DATA: u16 = 2;

const NFTA_META_DREG: u16 = 1;
const NFTA_META_KEY: u16 = 2;

const NFTA_PAYLOAD_DREG: u16 = 1;
const NFTA_PAYLOAD_BASE: u16 = 2;
const NFTA_PAYLOAD_OFFSET: u16 = 3;
const NFTA_PAYLOAD_LEN: u16 = 4;

const NFTA_BITWISE_SREG: u16 = 1;
const NFTA_BITWISE_DREG: u16 = 2;
const NFTA_BITWISE_LEN: u16 = 3;
const NFTA_BITWISE_MASK: u16 = 4;
const NFTA_BITWISE_XOR: u16 = 5;

const NFTA_CMP_SREG: u16 = 1;
const NFTA_CMP_OP: u16 = 2;
const NFTA_CMP_DATA: u16 = 3;

const NFTA_COUNTER_BYTES: u16 = 1;
const NFTA_COUNTER_PACKETS: u16 = 2;

const NFTA_IMMEDIATE_DREG: u16 = 1;
const NFTA_IMMEDIATE_DATA: u16 = 2;

const NFTA_DATA_VALUE: u16 = 1;
const NFTA_DATA_VERDICT: u16 = 2;

const NFTA_VERDICT_CODE: u16 = 1;
const NFTA_VERDICT_CHAIN: u16 = 2;

// Same numbering for NFTA_MATCH_*.
const NFTA_TARGET_NAME: u16 = 1;
const NFTA_TARGET_REV: u16 = 2;
const NFTA_TARGET_INFO: u16 = 3;

/// Body of an NFT_MSG_NEWRULE message: nfgenmsg followed by the rule
/// attributes.
pub fn rule_payload(rule: &NftRule) -> Result<Vec<u8>> {
    let mut buf = vec![rule.family.nfproto(), NFNETLINK_V0, 0, 0];
    push_attr_string(&mut buf, NFTA_RULE_TABLE, &rule.table)?;
    push_attr_string(&mut buf, NFTA_RULE_CHAIN, &rule.chain)?;
    if let Some(handle) = rule.handle {
        push_attr_u64(&mut buf, NFTA_RULE_HANDLE, handle)?;
    }
    push_attr_nested(&mut buf, NFTA_RULE_EXPRESSIONS, |exprs| {
        encode_exprs_into(exprs, rule.exprs())
    })?;
    Ok(buf)
}

/// Decode a rule message body as delivered by a dump.
pub fn parse_rule_payload(payload: &[u8]) -> Result<NftRule> {
    if payload.len() < NFGENMSG_LEN {
        return Err(ArpTablesError::decode("nfgenmsg", "short message"));
    }
    let family = Family::from_nfproto(payload[0])?;
    let mut table = None;
    let mut chain = None;
    let mut handle = None;
    let mut exprs = Vec::new();
    for attr in parse_attrs(&payload[NFGENMSG_LEN..]) {
        match attr.attr_type {
            NFTA_RULE_TABLE => table = Some(parse_string(&attr.payload)),
            NFTA_RULE_CHAIN => chain = Some(parse_string(&attr.payload)),
            NFTA_RULE_HANDLE => handle = Some(parse_u64(&attr.payload, "rule handle")?),
            NFTA_RULE_EXPRESSIONS => exprs = decode_exprs(&attr.payload)?,
            _ => {}
        }
    }
    let table = table.ok_or_else(|| ArpTablesError::decode("rule", "missing table"))?;
    let chain = chain.ok_or_else(|| ArpTablesError::decode("rule", "missing chain"))?;
    let mut rule = NftRule::with_exprs(family, &table, &chain, exprs);
    rule.handle = handle;
    Ok(rule)
}

/// Encode an expression list as the contents of `NFTA_RULE_EXPRESSIONS`.
///
/// Fails when an attribute would not fit the 16-bit netlink length field.
pub fn encode_exprs(exprs: &[Expr]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_exprs_into(&mut buf, exprs)?;
    Ok(buf)
}

fn encode_exprs_into(buf: &mut Vec<u8>, exprs: &[Expr]) -> Result<()> {
    for expr in exprs {
        append_expr(buf, expr.name(), |data| encode_expr_data(data, expr))?;
    }
    Ok(())
}

fn encode_expr_data(buf: &mut Vec<u8>, expr: &Expr) -> Result<()> {
    match expr {
        Expr::Meta { dreg, key } => {
            push_attr_u32(buf, NFTA_META_DREG, *dreg)?;
            push_attr_u32(buf, NFTA_META_KEY, key.as_u32())?;
        }
        Expr::Payload {
            dreg,
            base,
            offset,
            len,
        } => {
            push_attr_u32(buf, NFTA_PAYLOAD_DREG, *dreg)?;
            push_attr_u32(buf, NFTA_PAYLOAD_BASE, base.as_u32())?;
            push_attr_u32(buf, NFTA_PAYLOAD_OFFSET, *offset)?;
            push_attr_u32(buf, NFTA_PAYLOAD_LEN, *len)?;
        }
        Expr::Bitwise {
            sreg,
            dreg,
            len,
            mask,
            xor,
        } => {
            push_attr_u32(buf, NFTA_BITWISE_SREG, *sreg)?;
            push_attr_u32(buf, NFTA_BITWISE_DREG, *dreg)?;
            push_attr_u32(buf, NFTA_BITWISE_LEN, *len)?;
            push_attr_nested(buf, NFTA_BITWISE_MASK, |data| {
                push_attr_bytes(data, NFTA_DATA_VALUE, mask)
            })?;
            push_attr_nested(buf, NFTA_BITWISE_XOR, |data| {
                push_attr_bytes(data, NFTA_DATA_VALUE, xor)
            })?;
        }
        Expr::Cmp { sreg, op, data } => {
            push_attr_u32(buf, NFTA_CMP_SREG, *sreg)?;
            push_attr_u32(buf, NFTA_CMP_OP, op.as_u32())?;
            push_attr_nested(buf, NFTA_CMP_DATA, |cmp| {
                push_attr_bytes(cmp, NFTA_DATA_VALUE, data)
            })?;
        }
        Expr::Counter { packets, bytes } => {
            push_attr_u64(buf, NFTA_COUNTER_BYTES, *bytes)?;
            push_attr_u64(buf, NFTA_COUNTER_PACKETS, *packets)?;
        }
        Expr::Immediate { dreg, data } => {
            push_attr_u32(buf, NFTA_IMMEDIATE_DREG, *dreg)?;
            push_attr_nested(buf, NFTA_IMMEDIATE_DATA, |imm| match data {
                ImmediateData::Value(value) => push_attr_bytes(imm, NFTA_DATA_VALUE, value),
                ImmediateData::Verdict(verdict) => push_attr_nested(imm, NFTA_DATA_VERDICT, |v| {
                    push_attr_u32(v, NFTA_VERDICT_CODE, verdict.code() as u32)?;
                    if let Some(chain) = verdict.chain() {
                        push_attr_string(v, NFTA_VERDICT_CHAIN, chain)?;
                    }
                    Ok(())
                }),
            })?;
        }
        Expr::Target {
            name,
            revision,
            info,
        }
        | Expr::Match {
            name,
            revision,
            info,
        } => {
            push_attr_string(buf, NFTA_TARGET_NAME, name)?;
            push_attr_u32(buf, NFTA_TARGET_REV, *revision)?;
            push_attr_bytes(buf, NFTA_TARGET_INFO, info)?;
        }
        Expr::Other { .. } => {}
    }
    Ok(())
}

/// Decode the contents of `NFTA_RULE_EXPRESSIONS`.
pub fn decode_exprs(buf: &[u8]) -> Result<Vec<Expr>> {
    let mut exprs = Vec::new();
    for elem in parse_attrs(buf) {
        if elem.attr_type != NFTA_LIST_ELEM {
            continue;
        }
        let mut name = None;
        let mut data = Vec::new();
        for attr in parse_attrs(&elem.payload) {
            match attr.attr_type {
                NFTA_EXPR_NAME => name = Some(parse_string(&attr.payload)),
                NFTA_EXPR_DATA => data = attr.payload,
                _ => {}
            }
        }
        let name = name.ok_or_else(|| ArpTablesError::decode("expression", "missing name"))?;
        exprs.push(decode_expr(&name, &data)?);
    }
    Ok(exprs)
}

fn decode_expr(name: &str, data: &[u8]) -> Result<Expr> {
    let attrs = ExprAttrs::new(name, data);
    let expr = match name {
        "meta" => Expr::Meta {
            dreg: attrs.u32(NFTA_META_DREG)?,
            key: MetaKey::from_u32(attrs.u32(NFTA_META_KEY)?),
        },
        "payload" => {
            let base = attrs.u32(NFTA_PAYLOAD_BASE)?;
            match PayloadBase::from_u32(base) {
                Some(base) => Expr::Payload {
                    dreg: attrs.u32(NFTA_PAYLOAD_DREG)?,
                    base,
                    offset: attrs.u32(NFTA_PAYLOAD_OFFSET)?,
                    len: attrs.u32(NFTA_PAYLOAD_LEN)?,
                },
                None => {
                    trace!("Keeping payload with unknown base {} as opaque", base);
                    opaque(name)
                }
            }
        }
        "bitwise" => Expr::Bitwise {
            sreg: attrs.u32(NFTA_BITWISE_SREG)?,
            dreg: attrs.u32(NFTA_BITWISE_DREG)?,
            len: attrs.u32(NFTA_BITWISE_LEN)?,
            mask: attrs.data_value(NFTA_BITWISE_MASK)?,
            xor: attrs.data_value(NFTA_BITWISE_XOR)?,
        },
        "cmp" => {
            let op = attrs.u32(NFTA_CMP_OP)?;
            match CmpOp::from_u32(op) {
                Some(op) => Expr::Cmp {
                    sreg: attrs.u32(NFTA_CMP_SREG)?,
                    op,
                    data: attrs.data_value(NFTA_CMP_DATA)?,
                },
                None => {
                    trace!("Keeping cmp with unknown op {} as opaque", op);
                    opaque(name)
                }
            }
        }
        "counter" => Expr::Counter {
            packets: attrs.u64(NFTA_COUNTER_PACKETS)?,
            bytes: attrs.u64(NFTA_COUNTER_BYTES)?,
        },
        "immediate" => Expr::Immediate {
            dreg: attrs.u32(NFTA_IMMEDIATE_DREG)?,
            data: decode_immediate(attrs.get(NFTA_IMMEDIATE_DATA)?)?,
        },
        "target" | "match" => {
            let name_attr = parse_string(attrs.get(NFTA_TARGET_NAME)?);
            let revision = attrs.u32(NFTA_TARGET_REV)?;
            let info = attrs.get(NFTA_TARGET_INFO)?.to_vec();
            if name == "target" {
                Expr::Target {
                    name: name_attr,
                    revision,
                    info,
                }
            } else {
                Expr::Match {
                    name: name_attr,
                    revision,
                    info,
                }
            }
        }
        other => opaque(other),
    };
    Ok(expr)
}

fn opaque(name: &str) -> Expr {
    Expr::Other {
        name: name.to_string(),
    }
}

fn decode_immediate(buf: &[u8]) -> Result<ImmediateData> {
    for attr in parse_attrs(buf) {
        match attr.attr_type {
            NFTA_DATA_VALUE => return Ok(ImmediateData::Value(attr.payload)),
            NFTA_DATA_VERDICT => {
                let mut code = None;
                let mut chain = None;
                for v in parse_attrs(&attr.payload) {
                    match v.attr_type {
                        NFTA_VERDICT_CODE => {
                            code = Some(parse_u32(&v.payload, "verdict code")? as i32)
                        }
                        NFTA_VERDICT_CHAIN => chain = Some(parse_string(&v.payload)),
                        _ => {}
                    }
                }
                let code =
                    code.ok_or_else(|| ArpTablesError::decode("verdict", "missing code"))?;
                return Ok(ImmediateData::Verdict(Verdict::from_code(code, chain)?));
            }
            _ => {}
        }
    }
    Err(ArpTablesError::decode("immediate", "missing data"))
}

/// Attributes of one expression, looked up by type.
struct ExprAttrs<'a> {
    expr: &'a str,
    attrs: Vec<Attr>,
}

impl<'a> ExprAttrs<'a> {
    fn new(expr: &'a str, data: &[u8]) -> Self {
        Self {
            expr,
            attrs: parse_attrs(data),
        }
    }

    fn get(&self, attr_type: u16) -> Result<&[u8]> {
        self.attrs
            .iter()
            .find(|a| a.attr_type == attr_type)
            .map(|a| a.payload.as_slice())
            .ok_or_else(|| {
                ArpTablesError::decode(self.expr, format!("missing attribute {attr_type}"))
            })
    }

    fn u32(&self, attr_type: u16) -> Result<u32> {
        parse_u32(self.get(attr_type)?, self.expr)
    }

    fn u64(&self, attr_type: u16) -> Result<u64> {
        parse_u64(self.get(attr_type)?, self.expr)
    }

    /// Payload of a nested `NFTA_DATA_VALUE`.
    fn data_value(&self, attr_type: u16) -> Result<Vec<u8>> {
        parse_attrs(self.get(attr_type)?)
            .into_iter()
            .find(|a| a.attr_type == NFTA_DATA_VALUE)
            .map(|a| a.payload)
            .ok_or_else(|| ArpTablesError::decode(self.expr, "missing data value"))
    }
}

fn append_expr(
    exprs: &mut Vec<u8>,
    name: &str,
    build: impl FnOnce(&mut Vec<u8>) -> Result<()>,
) -> Result<()> {
    push_attr_nested(exprs, NFTA_LIST_ELEM, |elem| {
        push_attr_string(elem, NFTA_EXPR_NAME, name)?;
        push_attr_nested(elem, NFTA_EXPR_DATA, build)
    })
}

fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Attribute length including its header, checked against the u16 field.
fn attr_len(attr_type: u16, len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        ArpTablesError::construction(
            "attribute",
            format!("attribute {attr_type} is {len} bytes, limit is {}", u16::MAX),
        )
    })
}

fn push_attr_bytes(buf: &mut Vec<u8>, attr_type: u16, data: &[u8]) -> Result<()> {
    let len = NLA_HDRLEN + data.len();
    let encoded = attr_len(attr_type, len)?;
    let aligned = nla_align(len);
    buf.extend_from_slice(&encoded.to_ne_bytes());
    buf.extend_from_slice(&attr_type.to_ne_bytes());
    buf.extend_from_slice(data);
    if aligned > len {
        buf.resize(buf.len() + (aligned - len), 0);
    }
    Ok(())
}

fn push_attr_nested(
    buf: &mut Vec<u8>,
    attr_type: u16,
    build: impl FnOnce(&mut Vec<u8>) -> Result<()>,
) -> Result<()> {
    let start = buf.len();
    buf.extend_from_slice(&[0u8; NLA_HDRLEN]);
    build(buf)?;
    let len = buf.len() - start;
    let encoded = attr_len(attr_type, len)?;
    let attr_type = attr_type | NLA_F_NESTED;
    buf[start..start + 2].copy_from_slice(&encoded.to_ne_bytes());
    buf[start + 2..start + 4].copy_from_slice(&attr_type.to_ne_bytes());
    let aligned = nla_align(len);
    if aligned > len {
        buf.resize(buf.len() + (aligned - len), 0);
    }
    Ok(())
}

/// Strings go out NUL-terminated; interior NULs cut the string short.
fn push_attr_string(buf: &mut Vec<u8>, attr_type: u16, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    let mut data = Vec::with_capacity(end + 1);
    data.extend_from_slice(&bytes[..end]);
    data.push(0);
    push_attr_bytes(buf, attr_type, &data)
}

fn push_attr_u32(buf: &mut Vec<u8>, attr_type: u16, value: u32) -> Result<()> {
    push_attr_bytes(buf, attr_type, &value.to_be_bytes())
}

fn push_attr_u64(buf: &mut Vec<u8>, attr_type: u16, value: u64) -> Result<()> {
    push_attr_bytes(buf, attr_type, &value.to_be_bytes())
}

struct Attr {
    attr_type: u16,
    payload: Vec<u8>,
}

fn parse_attrs(buf: &[u8]) -> Vec<Attr> {
    let mut attrs = Vec::new();
    let mut offset = 0usize;
    while offset + NLA_HDRLEN <= buf.len() {
        let len = u16::from_ne_bytes([buf[offset], buf[offset + 1]]) as usize;
        let attr_type = u16::from_ne_bytes([buf[offset + 2], buf[offset + 3]])
            & !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);
        if len < NLA_HDRLEN || offset + len > buf.len() {
            break;
        }
        attrs.push(Attr {
            attr_type,
            payload: buf[offset + NLA_HDRLEN..offset + len].to_vec(),
        });
        offset += nla_align(len);
    }
    attrs
}

fn parse_u32(buf: &[u8], what: &str) -> Result<u32> {
    let bytes: [u8; 4] = buf
        .try_into()
        .map_err(|_| ArpTablesError::decode(what, format!("expected 4 bytes, got {}", buf.len())))?;
    Ok(u32::from_be_bytes(bytes))
}

fn parse_u64(buf: &[u8], what: &str) -> Result<u64> {
    let bytes: [u8; 8] = buf
        .try_into()
        .map_err(|_| ArpTablesError::decode(what, format!("expected 8 bytes, got {}", buf.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn parse_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
