use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::extract::Selectors;

/// Runtime settings, layered from config files and environment variables.
/// Every field has a working default, so the binary runs without any file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub collector: CollectorConfig,
    pub selectors: SelectorConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Landing page opened before the operator takes over.
    pub home_url: String,
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub nav_retry_attempts: u32,
    pub nav_retry_delay_ms: u64,
    /// Poll interval while waiting for the start button click.
    pub start_poll_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            home_url: "https://shopping.naver.com/ns/home".to_string(),
            headless: false,
            chrome_path: None,
            user_agent: None,
            window_width: 1920,
            window_height: 1080,
            nav_retry_attempts: 3,
            nav_retry_delay_ms: 2000,
            start_poll_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Fraction of the viewport height advanced per scroll step.
    pub scroll_fraction: f64,
    pub settle_ms: u64,
    /// Longer settle after the forced bottom jump.
    pub final_settle_ms: u64,
    /// Passes the content height must stay unchanged before stopping.
    pub idle_height_rounds: u32,
    /// Passes the unique item count must stay unchanged before stopping.
    pub idle_item_rounds: u32,
    /// Transient evaluation failures tolerated back to back.
    pub max_consecutive_failures: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            scroll_fraction: 0.8,
            settle_ms: 1500,
            final_settle_ms: 2000,
            idle_height_rounds: 10,
            idle_item_rounds: 10,
            max_consecutive_failures: 5,
        }
    }
}

/// CSS selectors addressing one product card and its fields. These track
/// the site's generated class names and change often, which is why they
/// live in configuration rather than code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub card: String,
    pub title: String,
    pub seller: String,
    pub price: String,
    pub shipping_badge: String,
    pub shipping_fee: String,
    pub thumbnail_img: String,
    pub background: String,
    pub link: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: "li.compositeCardContainer_composite_card_container__jr8cb.composite_card_container"
                .to_string(),
            title: "strong.productCardTitle_product_card_title__eQupA".to_string(),
            seller: "span.productCardMallLink_mall_name__5oWPw".to_string(),
            price: "span.priceTag_number__1QW0R".to_string(),
            shipping_badge: "span.productCardDeliveryBadge_text__OrtL_".to_string(),
            shipping_fee: "span.productCardDeliveryFeeInfo_delivery_text__54pei".to_string(),
            thumbnail_img: "img.autoFitImg_auto_fit_img__fIpj4, \
                            img.productCardThumbnail_image__Li6iz, \
                            img[class*=\"thumbnail\"], img[class*=\"product\"]"
                .to_string(),
            background: "div[style*=\"background-image\"]".to_string(),
            link: "a.productCardLink_link__bCGy9".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: String,
    /// Whether report progress is mirrored into the live page.
    pub overlay: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: "results".to_string(),
            overlay: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "MAGPIE_"
            .add_source(Environment::with_prefix("MAGPIE").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Chrome path from the conventional variable when not set explicitly
        if config.session.chrome_path.is_none() {
            config.session.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.session.home_url).is_err() {
            return Err(ConfigError::Message("Invalid home URL format".into()));
        }

        if self.session.nav_retry_attempts == 0 {
            return Err(ConfigError::Message(
                "Session nav_retry_attempts must be greater than 0".into(),
            ));
        }

        if self.session.window_width == 0 || self.session.window_height == 0 {
            return Err(ConfigError::Message(
                "Session window size must be greater than 0".into(),
            ));
        }

        if !(self.collector.scroll_fraction > 0.0 && self.collector.scroll_fraction <= 1.0) {
            return Err(ConfigError::Message(
                "Collector scroll_fraction must be within (0, 1]".into(),
            ));
        }

        if self.collector.settle_ms == 0 || self.collector.final_settle_ms == 0 {
            return Err(ConfigError::Message(
                "Collector settle waits must be greater than 0".into(),
            ));
        }

        if self.collector.idle_height_rounds == 0 || self.collector.idle_item_rounds == 0 {
            return Err(ConfigError::Message(
                "Collector idle rounds must be greater than 0".into(),
            ));
        }

        if self.collector.max_consecutive_failures == 0 {
            return Err(ConfigError::Message(
                "Collector max_consecutive_failures must be greater than 0".into(),
            ));
        }

        if let Err(e) = Selectors::compile(&self.selectors) {
            return Err(ConfigError::Message(format!("Selector config invalid: {}", e)));
        }

        if self.report.output_dir.trim().is_empty() {
            return Err(ConfigError::Message(
                "Report output_dir must not be empty".into(),
            ));
        }

        Ok(())
    }
}
