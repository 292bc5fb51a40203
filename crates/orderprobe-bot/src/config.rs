//! Application configuration.

use std::time::Duration;

use chrono::Weekday;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderprobe_core::{parse_hhmm, OrderRequest, OrderSide, Price, Quantity, TradingWindow};
use orderprobe_engine::ProbeConfig;
use orderprobe_gateway::PaperConfig;

use crate::error::{AppError, AppResult};
use crate::scheduler::SchedulerConfig;

/// Venue the service probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// In-process simulated venue.
    #[default]
    Paper,
    /// Real venue through a linked adapter.
    Live,
}

/// The probe order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Instrument symbol (e.g. "2330").
    pub symbol: String,
    pub side: OrderSide,
    /// Limit price. Should sit far from the market so the order never trades.
    pub price: Decimal,
    /// Quantity in venue units. Default: 1.
    #[serde(default = "default_quantity")]
    pub quantity: u64,
    /// Venue account to trade from. Default: the session's first account.
    #[serde(default)]
    pub account: Option<String>,
}

fn default_quantity() -> u64 {
    1
}

/// When probes may run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingHoursConfig {
    /// Window start, venue-local `HH:MM`.
    pub start_time: String,
    /// Window end, venue-local `HH:MM`, inclusive to the minute.
    pub end_time: String,
    /// Pause between probes (seconds). Default: 60.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Venue-local UTC offset (hours). Default: 8.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// Days probes may run. Default: Monday to Friday.
    #[serde(default = "TradingWindow::business_days")]
    pub weekdays: Vec<Weekday>,
    /// Recheck period outside the window (seconds). Default: 60.
    #[serde(default = "default_idle_poll_seconds")]
    pub idle_poll_seconds: u64,
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_utc_offset_hours() -> i32 {
    8
}

fn default_idle_poll_seconds() -> u64 {
    60
}

/// Probe timeouts and safety behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Wait for the acknowledgment event (ms). Default: 10,000.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    /// Wait for the cancel acknowledgment (ms). Default: 10,000.
    #[serde(default = "default_cancel_timeout_ms")]
    pub cancel_timeout_ms: u64,
    /// Poll once when a cancel is not acknowledged. Default: true.
    #[serde(default = "default_true")]
    pub reconcile_on_cancel_timeout: bool,
    /// Stop probing after a probe order fills. Default: true.
    #[serde(default = "default_true")]
    pub halt_on_fill_escape: bool,
}

fn default_ack_timeout_ms() -> u64 {
    10_000
}

fn default_cancel_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ack_timeout_ms: default_ack_timeout_ms(),
            cancel_timeout_ms: default_cancel_timeout_ms(),
            reconcile_on_cancel_timeout: true,
            halt_on_fill_escape: true,
        }
    }
}

/// Latency collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Collector endpoint receiving the JSON POST.
    pub url: String,
    /// Broker identity written into every record.
    pub broker_name: String,
    /// Per-request timeout (ms). Default: 5,000.
    #[serde(default = "default_report_timeout_ms")]
    pub timeout_ms: u64,
    /// When false, records are only logged. Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_report_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Statistics summary period (seconds). 0 disables. Default: 3600.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_stats_interval_secs() -> u64 {
    3600
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: OperatingMode,
    pub order: OrderConfig,
    pub trading_hours: TradingHoursConfig,
    #[serde(default)]
    pub probe: ProbeSettings,
    pub report: ReportConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Paper,
            order: OrderConfig {
                symbol: "2330".to_string(),
                side: OrderSide::Buy,
                price: Decimal::ONE,
                quantity: default_quantity(),
                account: None,
            },
            trading_hours: TradingHoursConfig {
                start_time: "09:00".to_string(),
                end_time: "13:30".to_string(),
                interval_seconds: default_interval_seconds(),
                utc_offset_hours: default_utc_offset_hours(),
                weekdays: TradingWindow::business_days(),
                idle_poll_seconds: default_idle_poll_seconds(),
            },
            probe: ProbeSettings::default(),
            report: ReportConfig {
                url: "http://localhost:8080/latency".to_string(),
                broker_name: "paper".to_string(),
                timeout_ms: default_report_timeout_ms(),
                enabled: true,
            },
            paper: PaperConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and ranges.
    pub fn validate(&self) -> AppResult<()> {
        if self.order.symbol.trim().is_empty() {
            return Err(AppError::Config("order.symbol must not be empty".to_string()));
        }
        self.order_request()?;
        self.trading_window()?;

        let hours = &self.trading_hours;
        if hours.interval_seconds == 0 {
            return Err(AppError::Config(
                "trading_hours.interval_seconds must be positive".to_string(),
            ));
        }
        if hours.idle_poll_seconds == 0 {
            return Err(AppError::Config(
                "trading_hours.idle_poll_seconds must be positive".to_string(),
            ));
        }
        if self.probe.ack_timeout_ms == 0 || self.probe.cancel_timeout_ms == 0 {
            return Err(AppError::Config("probe timeouts must be positive".to_string()));
        }
        if self.report.broker_name.trim().is_empty() {
            return Err(AppError::Config("report.broker_name must not be empty".to_string()));
        }
        if self.report.enabled
            && !(self.report.url.starts_with("http://") || self.report.url.starts_with("https://"))
        {
            return Err(AppError::Config(format!(
                "report.url must be an http(s) URL, got {:?}",
                self.report.url
            )));
        }
        Ok(())
    }

    /// The probe order described by `[order]`.
    pub fn order_request(&self) -> AppResult<OrderRequest> {
        let price = Price::positive(self.order.price)?;
        let quantity = Quantity::positive(self.order.quantity)?;
        let request = OrderRequest::new(self.order.symbol.trim(), self.order.side, price, quantity);
        Ok(match &self.order.account {
            Some(account) => request.with_account(account.clone()),
            None => request,
        })
    }

    /// The trading window described by `[trading_hours]`.
    pub fn trading_window(&self) -> AppResult<TradingWindow> {
        let hours = &self.trading_hours;
        let window = TradingWindow::new(
            parse_hhmm(&hours.start_time)?,
            parse_hhmm(&hours.end_time)?,
            hours.weekdays.clone(),
            hours.utc_offset_hours,
        )?;
        Ok(window)
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            broker: self.report.broker_name.clone(),
            ack_timeout: Duration::from_millis(self.probe.ack_timeout_ms),
            cancel_timeout: Duration::from_millis(self.probe.cancel_timeout_ms),
            reconcile_on_cancel_timeout: self.probe.reconcile_on_cancel_timeout,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.trading_hours.interval_seconds),
            idle_poll: Duration::from_secs(self.trading_hours.idle_poll_seconds),
            halt_on_fill_escape: self.probe.halt_on_fill_escape,
            max_probes: None,
        }
    }

    pub fn is_paper_mode(&self) -> bool {
        self.mode == OperatingMode::Paper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
mode = "paper"

[order]
symbol = "2330"
side = "buy"
price = 500.0
quantity = 1

[trading_hours]
start_time = "09:00"
end_time = "13:30"
interval_seconds = 30

[report]
url = "http://collector.local/latency"
broker_name = "sinotrade"
"#;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.is_paper_mode());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_sample_with_defaults() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.order.price, dec!(500));
        assert_eq!(config.trading_hours.utc_offset_hours, 8);
        assert_eq!(config.trading_hours.idle_poll_seconds, 60);
        assert_eq!(config.trading_hours.weekdays.len(), 5);
        assert_eq!(config.probe.ack_timeout_ms, 10_000);
        assert!(config.probe.halt_on_fill_escape);
        assert_eq!(config.report.timeout_ms, 5_000);
        assert!(config.report.enabled);

        let probe = config.probe_config();
        assert_eq!(probe.broker, "sinotrade");
        assert_eq!(probe.ack_timeout, Duration::from_secs(10));

        let request = config.order_request().unwrap();
        assert_eq!(request.symbol, "2330");
        assert_eq!(request.side, OrderSide::Buy);
        assert_eq!(request.price.inner(), dec!(500));
        assert_eq!(request.quantity, Quantity(1));
    }

    #[test]
    fn test_weekdays_and_account() {
        let text = SAMPLE.replace(
            "interval_seconds = 30",
            "interval_seconds = 30\nweekdays = [\"Mon\", \"Wed\"]",
        )
        .replace("quantity = 1", "quantity = 1\naccount = \"9A95-1234567\"");
        let config = AppConfig::from_toml(&text).unwrap();
        assert_eq!(config.trading_hours.weekdays, vec![Weekday::Mon, Weekday::Wed]);
        assert_eq!(
            config.order_request().unwrap().account.as_deref(),
            Some("9A95-1234567")
        );
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let text = SAMPLE.replace("price = 500.0", "price = 0");
        assert!(AppConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_zero_quantity() {
        let text = SAMPLE.replace("quantity = 1", "quantity = 0");
        assert!(AppConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let text = SAMPLE.replace("interval_seconds = 30", "interval_seconds = 0");
        assert!(AppConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_bad_window() {
        let text = SAMPLE.replace("end_time = \"13:30\"", "end_time = \"08:00\"");
        assert!(AppConfig::from_toml(&text).is_err());

        let text = SAMPLE.replace("start_time = \"09:00\"", "start_time = \"9am\"");
        assert!(AppConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_missing_section() {
        let text = SAMPLE.replace("[report]", "[reporting]");
        assert!(matches!(AppConfig::from_toml(&text), Err(AppError::Config(_))));
    }

    #[test]
    fn test_disabled_report_allows_empty_url() {
        let text = SAMPLE.replace(
            "url = \"http://collector.local/latency\"",
            "url = \"\"\nenabled = false",
        );
        let config = AppConfig::from_toml(&text).unwrap();
        assert!(!config.report.enabled);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("orderprobe-config-{}.toml", std::process::id()));
        std::fs::write(&path, SAMPLE).unwrap();
        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.report.broker_name, "sinotrade");

        assert!(AppConfig::from_file("/nonexistent/orderprobe.toml").is_err());
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string(&AppConfig::default()).unwrap();
        assert!(toml_str.contains("mode"));
        assert!(toml_str.contains("broker_name"));
    }
}
