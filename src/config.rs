//! Typed run configuration, mirroring the original's `flat_config1` defaults
//! and its `key=value` override mechanism.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::constants::DEFAULT_TRANS_CACHE_CAPACITY;

/// Which migration strategy the controller runs when it decides to act on
/// a slow-tier access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "verbatim")]
pub enum SwapPolicy {
    FastSwap,
    SlowSwap,
    SmartSwap,
    NoSwap,
}

/// Whether a migration-eligible slow-tier access is suppressed stochastically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "verbatim")]
pub enum BypassPolicy {
    Never,
    Probability,
}

/// Which scalar the meta cache tracks as "hotness" per region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "verbatim")]
pub enum ReplPolicy {
    Random,
    Lru,
    LruLip,
    Lfu,
}

impl fmt::Display for SwapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for BypassPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for ReplPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Run configuration for a single simulation.
///
/// Field names match the original's config keys exactly, since those names
/// are also the vocabulary accepted on the CLI as `key=value` overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub fast_cap: u64,
    pub slow_cap: u64,
    pub fast_read_lat: u64,
    pub fast_write_lat: u64,
    pub slow_read_lat: u64,
    pub slow_write_lat: u64,
    pub fast_block: u64,
    pub swap_policy: SwapPolicy,
    pub bypass_policy: BypassPolicy,
    pub bypass_probability: f64,
    pub repl_policy: ReplPolicy,
    pub trans_cache_capacity: u64,
}

impl Default for Config {
    /// Mirrors `flat_config1` from the original tool.
    fn default() -> Self {
        Config {
            fast_cap: 0x1003fff,
            slow_cap: 0x100ffff,
            fast_read_lat: 1,
            fast_write_lat: 1,
            slow_read_lat: 2,
            slow_write_lat: 2,
            fast_block: 4,
            swap_policy: SwapPolicy::SmartSwap,
            bypass_policy: BypassPolicy::Probability,
            bypass_probability: 0.5,
            repl_policy: ReplPolicy::Lru,
            trans_cache_capacity: DEFAULT_TRANS_CACHE_CAPACITY as u64,
        }
    }
}

impl Config {
    /// Applies `key=value` overrides in order, warning and skipping unknown
    /// keys rather than failing the run. An unparsable value for a *known*
    /// key is a hard error, since silently keeping a stale/default value
    /// there would make the reported statistics describe a different run
    /// than the one the user asked for.
    pub fn apply_overrides<'a>(&mut self, overrides: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for raw in overrides {
            let Some((key, value)) = raw.split_once('=') else {
                warn!("ignoring malformed override `{raw}` (expected key=value)");
                continue;
            };
            self.apply_one(key, value)
                .with_context(|| format!("failed to apply override `{raw}`"))?;
        }
        Ok(())
    }

    fn apply_one(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "fast_cap" => self.fast_cap = parse_u64(value)?,
            "slow_cap" => self.slow_cap = parse_u64(value)?,
            "fast_read_lat" => self.fast_read_lat = parse_u64(value)?,
            "fast_write_lat" => self.fast_write_lat = parse_u64(value)?,
            "slow_read_lat" => self.slow_read_lat = parse_u64(value)?,
            "slow_write_lat" => self.slow_write_lat = parse_u64(value)?,
            "fast_block" => self.fast_block = parse_u64(value)?,
            "trans_cache_capacity" => self.trans_cache_capacity = parse_u64(value)?,
            "bypass_probability" => {
                self.bypass_probability = value
                    .parse::<f64>()
                    .with_context(|| format!("`{value}` is not a valid float"))?
            }
            "swap_policy" => {
                self.swap_policy = SwapPolicy::from_str_variant(value)?;
            }
            "bypass_policy" => {
                self.bypass_policy = BypassPolicy::from_str_variant(value)?;
            }
            "repl_policy" => {
                self.repl_policy = ReplPolicy::from_str_variant(value)?;
            }
            _ => {
                warn!("ignoring unknown config key `{key}`");
            }
        }
        info!("config: {key} = {value}");
        Ok(())
    }

    /// Renders the configuration sorted by key, matching the original's
    /// `print_config`.
    pub fn sorted_fields(&self) -> BTreeMap<&'static str, String> {
        let mut fields = BTreeMap::new();
        fields.insert("bypass_policy", self.bypass_policy.to_string());
        fields.insert("bypass_probability", self.bypass_probability.to_string());
        fields.insert("fast_block", self.fast_block.to_string());
        fields.insert("fast_cap", format!("{:#x}", self.fast_cap));
        fields.insert("fast_read_lat", self.fast_read_lat.to_string());
        fields.insert("fast_write_lat", self.fast_write_lat.to_string());
        fields.insert("repl_policy", self.repl_policy.to_string());
        fields.insert("slow_cap", format!("{:#x}", self.slow_cap));
        fields.insert("slow_read_lat", self.slow_read_lat.to_string());
        fields.insert("slow_write_lat", self.slow_write_lat.to_string());
        fields.insert("swap_policy", self.swap_policy.to_string());
        fields.insert("trans_cache_capacity", self.trans_cache_capacity.to_string());
        fields
    }
}

fn parse_u64(value: &str) -> Result<u64> {
    if let Some(hex) = value.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).with_context(|| format!("`{value}` is not valid hex"))
    } else {
        value
            .parse::<u64>()
            .with_context(|| format!("`{value}` is not a valid integer"))
    }
}

/// Small helper trait so `apply_one` can look variants up by their exact
/// name, the same vocabulary the CLI's `--help` advertises via `ValueEnum`.
trait FromStrVariant: Sized {
    fn from_str_variant(value: &str) -> Result<Self>;
}

macro_rules! impl_from_str_variant {
    ($ty:ty) => {
        impl FromStrVariant for $ty {
            fn from_str_variant(value: &str) -> Result<Self> {
                <$ty as ValueEnum>::from_str(value, false)
                    .map_err(|_| anyhow::anyhow!("`{value}` is not a valid {}", stringify!($ty)))
            }
        }
    };
}

impl_from_str_variant!(SwapPolicy);
impl_from_str_variant!(BypassPolicy);
impl_from_str_variant!(ReplPolicy);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original() {
        let config = Config::default();
        assert_eq!(config.fast_cap, 0x1003fff);
        assert_eq!(config.swap_policy, SwapPolicy::SmartSwap);
        assert_eq!(config.repl_policy, ReplPolicy::Lru);
    }

    #[test]
    fn override_known_key() {
        let mut config = Config::default();
        config.apply_overrides(["swap_policy=FastSwap", "fast_block=2"]).unwrap();
        assert_eq!(config.swap_policy, SwapPolicy::FastSwap);
        assert_eq!(config.fast_block, 2);
    }

    #[test]
    fn unknown_key_is_ignored_not_fatal() {
        let mut config = Config::default();
        assert!(config.apply_overrides(["not_a_real_key=1"]).is_ok());
    }

    #[test]
    fn bad_enum_value_is_fatal() {
        let mut config = Config::default();
        assert!(config.apply_overrides(["swap_policy=Bogus"]).is_err());
    }

    #[test]
    fn hex_and_decimal_capacities_both_parse() {
        let mut config = Config::default();
        config.apply_overrides(["fast_cap=0x100", "slow_cap=256"]).unwrap();
        assert_eq!(config.fast_cap, 0x100);
        assert_eq!(config.slow_cap, 256);
    }
}
