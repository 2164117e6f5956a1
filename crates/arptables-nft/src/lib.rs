//! # arptables-nft
//!
//! Translation layer that lets the legacy `arptables` rule model run on top of
//! nf_tables. The kernel only knows ordered expression lists; arptables
//! thinks in fixed `struct arpt_entry` records. This crate converts between
//! the two.
//!
//! ## Features
//!
//! - **Builder**: record to expression list, in kernel evaluation order
//! - **Parser**: expression list back to a record, placing address matches
//!   by their offset in the ARP header
//! - **Equivalence**: pick the installed rule a delete or replace refers to
//! - **Renderer**: `arptables -L` and `arptables-save` output
//! - **Extensions**: pluggable match/target extensions (`quota`, `CLASSIFY`)
//! - **Wire codec**: nf_tables netlink attributes for rules
//!
//! Sockets, batching and command line handling live elsewhere.
//!
//! ## Usage
//!
//! ```no_run
//! use arptables_nft::*;
//!
//! fn main() -> Result<()> {
//!     let ops = ArpFamilyOps::default();
//!
//!     let mut entry = ArptEntry::new();
//!     entry.set_iniface("eth0", false)?;
//!     entry.set_opcode("Request", false)?;
//!     entry.set_target(Action::resolve("DROP", ops.registry())?);
//!
//!     let mut rule = NftRule::new(Family::Arp, "filter", "INPUT");
//!     ops.add(&mut rule, &entry)?;
//!     let payload = wire::rule_payload(&rule)?;
//!     // hand `payload` to the netlink transport
//!     # let _ = payload;
//!
//!     print!("{}", ops.print_firewall(&rule, 1, Format::LINENUMBERS));
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod compare;
pub mod config;
pub mod entry;
pub mod error;
pub mod expr;
pub mod extension;
pub mod extensions;
pub mod flags;
pub mod layout;
pub mod logging;
pub mod ops;
pub mod parser;
pub mod render;
pub mod wire;

pub use builder::add_entry;
pub use compare::{is_same, is_same_interfaces, rule_find};
pub use config::{ArpTablesConfig, LoggingConfig};
pub use entry::{Action, ArpMatch, ArptEntry, Counters, DevAddr, ExtMatch, Iface};
pub use error::{ArpTablesError, Result};
pub use expr::{CmpOp, Expr, Family, ImmediateData, MetaKey, NftRule, PayloadBase, Verdict};
pub use extension::{Extension, ExtensionKind, ExtensionRegistry};
pub use flags::{arpt_to_kernel_flags, kernel_to_arpt_flags, InvFlags, KernelInvFlags};
pub use layout::{ArpField, ArpHeaderLayout};
pub use ops::{ArpFamilyOps, NftFamilyOps};
pub use parser::rule_to_entry;
pub use render::{AddrResolver, Format, NumericResolver, Renderer};
