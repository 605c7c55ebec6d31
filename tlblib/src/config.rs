use std::fmt::{Display, Formatter};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

/// The shape of one simulated cache: total entries, and how many of them share an index group
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheGeometry {
    pub capacity: u32,
    pub ways: u32,
}

impl CacheGeometry {
    pub fn new(capacity: u32, ways: u32) -> Self {
        Self { capacity, ways }
    }

    /// Checks the geometry can be split into way sets, returning the distance between two slots of
    /// the same way set
    ///
    /// The distance need not be a power of two. Set starts are taken with `key & (step - 1)`,
    /// which stays below `step` either way, some starts are just never selected
    ///
    /// # Arguments
    ///
    /// * `cache`: Name of the cache, used in the error message
    ///
    /// returns: Result<u32, ConfigError>
    pub fn validate(&self, cache: &'static str) -> Result<u32, ConfigError> {
        let Self { capacity, ways } = *self;
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity { cache });
        }
        if ways == 0 {
            return Err(ConfigError::ZeroWays { cache });
        }
        if ways > capacity {
            return Err(ConfigError::WaysExceedCapacity { cache, capacity, ways });
        }
        if capacity % ways != 0 {
            return Err(ConfigError::UnevenWays { cache, capacity, ways });
        }
        Ok(capacity / ways)
    }
}

/// The hardware design being simulated. The discriminants are the selectors used on the command
/// line
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationMode {
    #[serde(alias = "ntlb")]
    NestedTlb = 0,
    #[serde(alias = "pwc-ept")]
    PwcExtendedPaging = 1,
    #[serde(alias = "pwc-noept")]
    PwcNoExtendedPaging = 2,
    #[serde(alias = "full")]
    Combined = 3,
}

impl SimulationMode {
    pub const ALL: [SimulationMode; 4] = [
        SimulationMode::NestedTlb,
        SimulationMode::PwcExtendedPaging,
        SimulationMode::PwcNoExtendedPaging,
        SimulationMode::Combined,
    ];

    /// Whether the mode simulates the page-granular nested TLB
    pub fn uses_nested_tlb(self) -> bool {
        matches!(self, SimulationMode::NestedTlb | SimulationMode::Combined)
    }

    /// Whether the mode simulates the descriptor page-walk cache
    pub fn uses_page_walk_cache(self) -> bool {
        !matches!(self, SimulationMode::NestedTlb)
    }
}

impl TryFrom<u32> for SimulationMode {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| ConfigError::UnknownMode(value.to_string()))
    }
}

impl FromStr for SimulationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(selector) = s.parse::<u32>() {
            return Self::try_from(selector);
        }
        match s.to_ascii_lowercase().as_str() {
            "ntlb" => Ok(SimulationMode::NestedTlb),
            "pwc-ept" => Ok(SimulationMode::PwcExtendedPaging),
            "pwc-noept" => Ok(SimulationMode::PwcNoExtendedPaging),
            "full" => Ok(SimulationMode::Combined),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl Display for SimulationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SimulationMode::NestedTlb => "NTLB",
            SimulationMode::PwcExtendedPaging => "PWC_EPT",
            SimulationMode::PwcNoExtendedPaging => "PWC_NOEPT",
            SimulationMode::Combined => "FULL",
        })
    }
}

/// Everything needed to run one batch
///
/// The primary TLB is never simulated, its size and associativity only select which traces were
/// recorded with it. Its associativity is shared by every simulated cache
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub tlb_size: u32,
    pub tlb_ways: u32,
    pub nested_tlb_size: u32,
    pub pwc_size: u32,
    pub mode: SimulationMode,
}

impl SimulationConfig {
    pub fn nested_tlb_geometry(&self) -> CacheGeometry {
        CacheGeometry::new(self.nested_tlb_size, self.tlb_ways)
    }

    pub fn pwc_geometry(&self) -> CacheGeometry {
        CacheGeometry::new(self.pwc_size, self.tlb_ways)
    }

    /// The file name fragment identifying traces recorded with this primary TLB, e.g. `_64.4`
    pub fn trace_suffix(&self) -> String {
        format!("_{}.{}", self.tlb_size, self.tlb_ways)
    }

    /// Validates the geometry of every cache the selected mode will build
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.uses_nested_tlb() {
            self.nested_tlb_geometry().validate("nested TLB")?;
        }
        if self.mode.uses_page_walk_cache() {
            self.pwc_geometry().validate("page walk cache")?;
        }
        Ok(())
    }
}
