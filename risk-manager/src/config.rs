//! Risk engine configuration

use common::TradeDefaults;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Overall risk engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Session-wide loss and stake limits
    #[serde(default)]
    pub limits: RiskLimits,

    /// Safety mode triggers and cooldown
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Circuit breaker configuration
    #[serde(default)]
    pub circuit_breakers: CircuitBreakerConfig,

    /// Burst-of-losses detection
    #[serde(default)]
    pub rapid_loss: RapidLossConfig,

    /// Optional emergency recovery once the ladder is exhausted
    #[serde(default)]
    pub last_resort: LastResortConfig,

    /// Fallbacks for order fields a strategy step leaves open
    #[serde(default)]
    pub trade_defaults: TradeDefaults,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            limits: RiskLimits::default(),
            safety: SafetyConfig::default(),
            circuit_breakers: CircuitBreakerConfig::default(),
            rapid_loss: RapidLossConfig::default(),
            last_resort: LastResortConfig::default(),
            trade_defaults: TradeDefaults::default(),
        }
    }
}

/// Loss ceilings and stake bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Daily loss ceiling (account currency)
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit: Decimal,

    /// Absolute loss ceiling for the session
    #[serde(default = "default_max_loss_limit")]
    pub max_loss_limit: Decimal,

    /// Consecutive losses before the breaker trips
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,

    /// Balance must cover this many times the next stake
    #[serde(default = "default_min_balance_multiplier")]
    pub min_balance_multiplier: Decimal,

    /// Largest share of the balance a single stake may take (percent)
    #[serde(default = "default_max_risk_percentage")]
    pub max_risk_percentage: Decimal,

    /// Smallest stake the venue accepts
    #[serde(default = "default_min_stake")]
    pub min_stake: Decimal,

    /// Every emitted amount is clamped to this
    #[serde(default = "default_max_stake")]
    pub max_stake: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            daily_loss_limit: default_daily_loss_limit(),
            max_loss_limit: default_max_loss_limit(),
            max_consecutive_losses: default_max_consecutive_losses(),
            min_balance_multiplier: default_min_balance_multiplier(),
            max_risk_percentage: default_max_risk_percentage(),
            min_stake: default_min_stake(),
            max_stake: default_max_stake(),
        }
    }
}

fn default_daily_loss_limit() -> Decimal {
    dec!(100)
}

fn default_max_loss_limit() -> Decimal {
    dec!(200)
}

fn default_max_consecutive_losses() -> u32 {
    8
}

fn default_min_balance_multiplier() -> Decimal {
    dec!(3)
}

fn default_max_risk_percentage() -> Decimal {
    dec!(25)
}

fn default_min_stake() -> Decimal {
    dec!(0.35)
}

fn default_max_stake() -> Decimal {
    dec!(1000)
}

/// Safety mode entry rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// How long safety mode lasts once entered (minutes)
    #[serde(default = "default_safety_cooldown_minutes")]
    pub cooldown_minutes: i64,

    /// Recovery attempts that force safety mode
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,

    /// Balance below `base_stake × balance_floor_multiplier` forces safety mode
    #[serde(default = "default_balance_floor_multiplier")]
    pub balance_floor_multiplier: Decimal,

    /// Consecutive losses ≥ strategy max × this factor force safety mode
    #[serde(default = "default_consecutive_loss_factor")]
    pub consecutive_loss_factor: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_safety_cooldown_minutes(),
            max_recovery_attempts: default_max_recovery_attempts(),
            balance_floor_multiplier: default_balance_floor_multiplier(),
            consecutive_loss_factor: default_consecutive_loss_factor(),
        }
    }
}

fn default_safety_cooldown_minutes() -> i64 {
    15
}

fn default_max_recovery_attempts() -> u32 {
    5
}

fn default_balance_floor_multiplier() -> Decimal {
    dec!(3)
}

fn default_consecutive_loss_factor() -> u32 {
    2
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Whether circuit breakers are enabled
    #[serde(default = "default_circuit_breakers_enabled")]
    pub enabled: bool,

    /// Cooldown period after circuit breaker trigger (in minutes)
    #[serde(default = "default_breaker_cooldown_minutes")]
    pub cooldown_minutes: i64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_minutes: 30,
        }
    }
}

fn default_circuit_breakers_enabled() -> bool {
    true
}

fn default_breaker_cooldown_minutes() -> i64 {
    30
}

/// Rapid-loss detection and exponential cooldown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RapidLossConfig {
    #[serde(default = "default_rapid_loss_enabled")]
    pub enabled: bool,

    /// Qualifying losses inside the window that trigger a cooldown
    #[serde(default = "default_rapid_max_losses")]
    pub max_losses: usize,

    #[serde(default = "default_time_window_ms")]
    pub time_window_ms: i64,

    /// Only losses of at least `base_stake × min_stake_multiplier` count
    #[serde(default = "default_min_stake_multiplier")]
    pub min_stake_multiplier: Decimal,

    #[serde(default = "default_initial_cooldown_ms")]
    pub initial_cooldown_ms: i64,

    #[serde(default = "default_cooldown_multiplier")]
    pub cooldown_multiplier: u32,

    #[serde(default = "default_max_cooldown_ms")]
    pub max_cooldown_ms: i64,

    /// Upper bound on remembered loss events
    #[serde(default = "default_max_tracked_losses")]
    pub max_tracked_losses: usize,
}

impl Default for RapidLossConfig {
    fn default() -> Self {
        Self {
            enabled: default_rapid_loss_enabled(),
            max_losses: default_rapid_max_losses(),
            time_window_ms: default_time_window_ms(),
            min_stake_multiplier: default_min_stake_multiplier(),
            initial_cooldown_ms: default_initial_cooldown_ms(),
            cooldown_multiplier: default_cooldown_multiplier(),
            max_cooldown_ms: default_max_cooldown_ms(),
            max_tracked_losses: default_max_tracked_losses(),
        }
    }
}

fn default_rapid_loss_enabled() -> bool {
    true
}

fn default_rapid_max_losses() -> usize {
    3
}

fn default_time_window_ms() -> i64 {
    60_000
}

fn default_min_stake_multiplier() -> Decimal {
    Decimal::ONE
}

fn default_initial_cooldown_ms() -> i64 {
    300_000
}

fn default_cooldown_multiplier() -> u32 {
    2
}

fn default_max_cooldown_ms() -> i64 {
    3_600_000
}

fn default_max_tracked_losses() -> usize {
    50
}

/// Emergency recovery used after the compounding ladder runs out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastResortConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Stake is `total_loss × multiplier`, subject to the stake limits
    #[serde(default = "default_last_resort_multiplier")]
    pub multiplier: Decimal,
}

impl Default for LastResortConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            multiplier: default_last_resort_multiplier(),
        }
    }
}

fn default_last_resort_multiplier() -> Decimal {
    dec!(12)
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<RiskConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: RiskConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load a TOML file with `RISK__SECTION__KEY` environment overrides on top.
///
/// `env` replaces the process environment when given.
pub fn load_layered_config(
    path: &str,
    env: Option<config::Map<String, String>>,
) -> anyhow::Result<RiskConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::new(path, config::FileFormat::Toml).required(false))
        .add_source(
            config::Environment::with_prefix("RISK")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Save configuration to TOML file
pub fn save_config(config: &RiskConfig, path: &str) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Create a default configuration file template
pub fn create_config_template(path: &str) -> anyhow::Result<()> {
    std::fs::write(path, CONFIG_TEMPLATE)?;
    Ok(())
}

const CONFIG_TEMPLATE: &str = "# Digit-contract risk engine configuration
# Loss ceilings, safety mode triggers and circuit breakers

[limits]
# Daily loss ceiling (account currency)
daily_loss_limit = 100.0

# Absolute loss ceiling for the session
max_loss_limit = 200.0

# Consecutive losses before the circuit breaker trips
max_consecutive_losses = 8

# Balance must cover this many times the next stake
min_balance_multiplier = 3.0

# Largest share of the balance a single stake may take (percent)
max_risk_percentage = 25.0

# Venue stake bounds
min_stake = 0.35
max_stake = 1000.0

[safety]
# Safety mode duration (minutes)
cooldown_minutes = 15

# Recovery attempts that force safety mode
max_recovery_attempts = 5

# Balance below base stake x this forces safety mode
balance_floor_multiplier = 3.0

# Consecutive losses >= strategy max x this force safety mode
consecutive_loss_factor = 2

[circuit_breakers]
enabled = true

# Cooldown period after circuit breaker trigger (minutes)
cooldown_minutes = 30

[rapid_loss]
enabled = true

# Qualifying losses within the window that trip the detector
max_losses = 3
time_window_ms = 60000

# Only losses of at least base stake x this count
min_stake_multiplier = 1.0

# Cooldown = initial x multiplier^(triggers - 1), capped at max
initial_cooldown_ms = 300000
cooldown_multiplier = 2
max_cooldown_ms = 3600000

max_tracked_losses = 50

[last_resort]
# Emergency DIGITDIFF trade sized at total loss x multiplier
enabled = false
multiplier = 12.0

[trade_defaults]
symbol = \"R_100\"
currency = \"USD\"
basis = \"stake\"
contract_type = \"DIGITEVEN\"
contract_duration_value = 1
contract_duration_units = \"t\"
";
