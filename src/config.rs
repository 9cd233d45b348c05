use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every field is optional so the YAML file,
/// CLI overrides, and built-in defaults can layer cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// e.g. "info" | "debug"
    pub log_level: Option<String>,
    pub clock: Option<ClockConfig>,
    pub companion: Option<CompanionConfig>,
    pub battery: Option<BatteryConfig>,
    /// Override for the weather slot file location.
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClockConfig {
    pub twenty_four_hour: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompanionConfig {
    /// Bridge address, `host:port`.
    pub addr: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatteryConfig {
    /// Sysfs capacity file to watch.
    pub capacity_path: Option<String>,
    pub poll_secs: Option<u64>,
}

impl Config {
    pub fn twenty_four_hour(&self) -> bool {
        self.clock
            .as_ref()
            .and_then(|c| c.twenty_four_hour)
            .unwrap_or(true)
    }

    pub fn companion_addr(&self) -> String {
        self.companion
            .as_ref()
            .and_then(|c| c.addr.clone())
            .unwrap_or_else(|| "127.0.0.1:9977".to_string())
    }

    pub fn battery_capacity_path(&self) -> String {
        self.battery
            .as_ref()
            .and_then(|b| b.capacity_path.clone())
            .unwrap_or_else(|| "/sys/class/power_supply/battery/capacity".to_string())
    }

    pub fn battery_poll_secs(&self) -> u64 {
        self.battery.as_ref().and_then(|b| b.poll_secs).unwrap_or(30)
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "mooseface", about = "MooseFace watchface daemon", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level (alias for --log-level debug)
    #[arg(short = 'v', long, alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// true = 24h clock, false = 12h clock
    #[arg(long, action = ArgAction::Set)]
    pub twenty_four_hour: Option<bool>,
    /// Companion bridge address, host:port
    #[arg(long)]
    pub companion_addr: Option<String>,
    /// Weather slot file location
    #[arg(long)]
    pub store_path: Option<PathBuf>,
    /// Sysfs battery capacity file
    #[arg(long)]
    pub battery_path: Option<String>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();

    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, &cli);

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/mooseface/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/mooseface/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/mooseface.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["mooseface.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()  { dst.log_level = src.log_level; }
    if src.store_path.is_some() { dst.store_path = src.store_path; }
    match (&mut dst.clock, src.clock) {
        (None, Some(c)) => dst.clock = Some(c),
        (Some(d), Some(s)) => {
            if s.twenty_four_hour.is_some() { d.twenty_four_hour = s.twenty_four_hour; }
        }
        _ => {}
    }
    match (&mut dst.companion, src.companion) {
        (None, Some(c)) => dst.companion = Some(c),
        (Some(d), Some(s)) => {
            if s.addr.is_some() { d.addr = s.addr; }
        }
        _ => {}
    }
    match (&mut dst.battery, src.battery) {
        (None, Some(c)) => dst.battery = Some(c),
        (Some(d), Some(s)) => {
            if s.capacity_path.is_some() { d.capacity_path = s.capacity_path; }
            if s.poll_secs.is_some()     { d.poll_secs = s.poll_secs; }
        }
        _ => {}
    }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }
    if cli.debug               { cfg.log_level = Some("debug".to_string()); }
    if cli.store_path.is_some() { cfg.store_path = cli.store_path.clone(); }

    if let Some(v) = cli.twenty_four_hour {
        cfg.clock.get_or_insert_with(Default::default).twenty_four_hour = Some(v);
    }
    if let Some(addr) = cli.companion_addr.clone() {
        cfg.companion.get_or_insert_with(Default::default).addr = Some(addr);
    }
    if let Some(path) = cli.battery_path.clone() {
        cfg.battery.get_or_insert_with(Default::default).capacity_path = Some(path);
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let addr = cfg.companion_addr();
    if addr.is_empty() || !addr.contains(':') {
        return Err(ConfigError::Validation(format!(
            "companion addr must be host:port, got {:?}",
            addr
        )));
    }
    if cfg.battery_poll_secs() == 0 {
        return Err(ConfigError::Validation(
            "battery poll_secs must be > 0".into(),
        ));
    }
    if let Some(level) = cfg.log_level.as_deref() {
        match level {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "log_level must be error|warn|info|debug|trace, got {:?}",
                    level
                )));
            }
        }
    }
    Ok(())
}
