use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Default market used when no configuration exists
pub const DEFAULT_MARKET_ID: &str = "MKT001";
pub const DEFAULT_MARKET_LABEL: &str = "Will BTC close above $100k?";

/// Threshold defaults applied when a config omits them
pub const DEFAULT_THRESHOLD1: Decimal = dec!(1.0);
pub const DEFAULT_THRESHOLD2: Decimal = dec!(0.95);
pub const DEFAULT_THRESHOLD3: Decimal = dec!(0.90);

/// A market as stored by the configuration service.
///
/// Field names follow the camelCase JSON written by the CRUD service; any
/// other fields in the record are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketConfig {
    pub market_id: String,
    pub market_label: String,
    #[serde(default)]
    pub threshold1: Option<Decimal>,
    #[serde(default)]
    pub threshold2: Option<Decimal>,
    #[serde(default)]
    pub threshold3: Option<Decimal>,
}

impl MarketConfig {
    pub fn new(market_id: &str, market_label: &str) -> Self {
        Self {
            market_id: market_id.to_string(),
            market_label: market_label.to_string(),
            threshold1: None,
            threshold2: None,
            threshold3: None,
        }
    }

    /// Set all three thresholds
    pub fn with_thresholds(mut self, t1: Decimal, t2: Decimal, t3: Decimal) -> Self {
        self.threshold1 = Some(t1);
        self.threshold2 = Some(t2);
        self.threshold3 = Some(t3);
        self
    }

    /// The built-in fallback market
    pub fn default_market() -> Self {
        Self::new(DEFAULT_MARKET_ID, DEFAULT_MARKET_LABEL).with_thresholds(
            DEFAULT_THRESHOLD1,
            DEFAULT_THRESHOLD2,
            DEFAULT_THRESHOLD3,
        )
    }

    /// Thresholds with defaults filled in, in column order
    pub fn thresholds(&self) -> [Decimal; 3] {
        [
            self.threshold1.unwrap_or(DEFAULT_THRESHOLD1),
            self.threshold2.unwrap_or(DEFAULT_THRESHOLD2),
            self.threshold3.unwrap_or(DEFAULT_THRESHOLD3),
        ]
    }
}

/// Synthetic YES/NO prices for one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePair {
    pub yes: Decimal,
    pub no: Decimal,
}

/// Threshold flag value as written to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Flag {
    Yes,
    No,
}

impl Flag {
    pub fn from_bool(below: bool) -> Self {
        if below {
            Flag::Yes
        } else {
            Flag::No
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Yes => "YES",
            Flag::No => "NO",
        }
    }

    pub fn classification(&self) -> Classification {
        match self {
            Flag::Yes => Classification::Deviation,
            Flag::No => Classification::Normal,
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// RGB colour with channels in 0..=1, as the Sheets API expects
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

/// Presentation marker for a flag cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Sum fell below the threshold
    Deviation,
    Normal,
}

impl Classification {
    pub fn color(&self) -> Rgb {
        match self {
            // light red
            Classification::Deviation => Rgb {
                red: 0.97,
                green: 0.84,
                blue: 0.85,
            },
            // light green
            Classification::Normal => Rgb {
                red: 0.83,
                green: 0.93,
                blue: 0.85,
            },
        }
    }
}
