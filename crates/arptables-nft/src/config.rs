use std::env;

use serde::{Deserialize, Serialize};

use crate::expr::Family;

pub const DEFAULT_PROGRAM_NAME: &str = "arptables";
pub const DEFAULT_TABLE: &str = "filter";
pub const DEFAULT_KMOD: &str = "arp_tables";
pub const DEFAULT_PROC_EXISTS: &str = "/proc/net/arp_tables_names";
pub const DEFAULT_LIBPREFIX: &str = "libarp_";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Static description of the ARP family plus the ambient settings of the
/// tool built on top of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpTablesConfig {
    pub program_name: String,
    pub table: String,
    pub family: Family,
    pub kmod: String,
    pub proc_exists: String,
    pub libprefix: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ArpTablesConfig {
    fn default() -> Self {
        Self {
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
            table: DEFAULT_TABLE.to_string(),
            family: Family::Arp,
            kmod: DEFAULT_KMOD.to_string(),
            proc_exists: DEFAULT_PROC_EXISTS.to_string(),
            libprefix: DEFAULT_LIBPREFIX.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ArpTablesConfig {
    pub fn from_env() -> Self {
        let table = env::var("ARPTABLES_TABLE")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());
        let level = env::var("ARPTABLES_LOG_LEVEL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let enabled = env::var("ARPTABLES_LOG")
            .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("off")))
            .unwrap_or(true);
        Self {
            table,
            logging: LoggingConfig { enabled, level },
            ..Self::default()
        }
    }
}
