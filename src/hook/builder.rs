//! Builder for [`LogstashHook`].
//!
//! Exposes transport selection, timeout tuning, TLS configuration, the
//! overflow policy and reconnect backoff. [`HookSettings`] is the
//! deserialisable form of the same inputs so hosts can load them from a
//! configuration file.

use std::time::Duration;

use serde::Deserialize;

use crate::{
    formatter::{JsonFormatter, LogstashFormatter, TextFormatter},
    handler::HookError,
    log_record::Fields,
};

use super::{
    config::{BackoffPolicy, DEFAULT_KEEP_ALIVE_PERIOD, HookOptions, OverflowPolicy},
    handler::LogstashHook,
    transport::{Protocol, TlsOptions},
};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(HookError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Wire layout produced by the built hook.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatterKind {
    /// JSON with `@timestamp`/`message` keys and the `@version`/`type`
    /// baseline.
    #[default]
    Logstash,
    /// JSON with `time`/`msg` keys; defaults are used verbatim.
    Json,
    /// `key=value` text lines; defaults are used verbatim.
    Text,
}

#[derive(Clone, Debug, Default)]
struct TlsConfig {
    domain: Option<String>,
    insecure: bool,
}

/// Overrides for the reconnect backoff.
#[derive(Clone, Debug, Default)]
pub struct BackoffOverrides {
    base_ms: Option<u64>,
    cap_ms: Option<u64>,
    jitter: bool,
}

impl BackoffOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the first (or fixed) wait in milliseconds.
    pub fn with_base_ms(mut self, base_ms: u64) -> Self {
        self.base_ms = Some(base_ms);
        self
    }

    /// Override the longest wait in milliseconds.
    pub fn with_cap_ms(mut self, cap_ms: u64) -> Self {
        self.cap_ms = Some(cap_ms);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn apply(&self, policy: &mut BackoffPolicy) -> Result<(), HookError> {
        if let Some(base) = self.base_ms {
            ensure_positive!(base, "backoff_base_ms")?;
            policy.base = Duration::from_millis(base);
            // A lone base keeps the interval fixed.
            if self.cap_ms.is_none() {
                policy.cap = policy.base;
            }
        }
        if let Some(cap) = self.cap_ms {
            ensure_positive!(cap, "backoff_cap_ms")?;
            policy.cap = Duration::from_millis(cap).max(policy.base);
        }
        policy.jitter = self.jitter;
        Ok(())
    }
}

/// Builder for constructing [`LogstashHook`] instances.
#[derive(Clone, Debug, Default)]
pub struct HookBuilder {
    protocol: Option<String>,
    address: Option<String>,
    capacity: Option<usize>,
    synchronous: bool,
    enqueue_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    flush_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
    keep_alive: bool,
    keep_alive_period_ms: Option<u64>,
    overflow: Option<OverflowPolicy>,
    formatter: FormatterKind,
    fields: Fields,
    tls: Option<TlsConfig>,
    backoff: BackoffOverrides,
}

impl HookBuilder {
    /// Create a new builder with no destination configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ship to `address` using the named `protocol` (`tcp`, `udp`, `unix`, ...).
    pub fn with_destination(
        mut self,
        protocol: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        self.protocol = Some(protocol.into());
        self.address = Some(address.into());
        self
    }

    pub fn with_tcp(self, address: impl Into<String>) -> Self {
        self.with_destination("tcp", address)
    }

    pub fn with_udp(self, address: impl Into<String>) -> Self {
        self.with_destination("udp", address)
    }

    pub fn with_unix_path(self, path: impl Into<String>) -> Self {
        self.with_destination("unix", path)
    }

    /// Configure TLS using the provided domain and validation policy.
    pub fn with_tls(mut self, domain: Option<String>, insecure: bool) -> Self {
        self.tls = Some(TlsConfig { domain, insecure });
        self
    }

    option_setter!(
        #[doc = "Set the bounded channel capacity."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(
        #[doc = "How long `fire` may wait for room in a full channel."]
        with_enqueue_timeout_ms,
        enqueue_timeout_ms,
        u64
    );
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(with_flush_timeout_ms, flush_timeout_ms, u64);
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);
    option_setter!(with_overflow, overflow, OverflowPolicy);

    /// Ship every record on the calling thread instead of the dispatcher.
    pub fn synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    /// Enable TCP keep-alive; the period defaults to 30 seconds.
    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    pub fn with_keep_alive_period_ms(mut self, period_ms: u64) -> Self {
        self.keep_alive = true;
        self.keep_alive_period_ms = Some(period_ms);
        self
    }

    pub fn with_formatter(mut self, formatter: FormatterKind) -> Self {
        self.formatter = formatter;
        self
    }

    /// Default attributes added to every record.
    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Override backoff timings using the provided overrides.
    pub fn with_backoff(mut self, overrides: BackoffOverrides) -> Self {
        self.backoff = overrides;
        self
    }

    /// Seed a builder from deserialised settings.
    pub fn from_settings(settings: HookSettings) -> Self {
        let HookSettings {
            protocol,
            address,
            capacity,
            synchronous,
            enqueue_timeout_ms,
            connect_timeout_ms,
            write_timeout_ms,
            flush_timeout_ms,
            warn_interval_ms,
            keep_alive,
            keep_alive_period_ms,
            overflow,
            formatter,
            fields,
            tls,
            tls_domain,
            tls_insecure,
            backoff_base_ms,
            backoff_cap_ms,
            backoff_jitter,
        } = settings;
        Self {
            protocol: Some(protocol),
            address: Some(address),
            capacity,
            synchronous,
            enqueue_timeout_ms,
            connect_timeout_ms,
            write_timeout_ms,
            flush_timeout_ms,
            warn_interval_ms,
            keep_alive: keep_alive || keep_alive_period_ms.is_some(),
            keep_alive_period_ms,
            overflow,
            formatter,
            fields,
            tls: (tls || tls_domain.is_some()).then_some(TlsConfig {
                domain: tls_domain,
                insecure: tls_insecure,
            }),
            backoff: BackoffOverrides {
                base_ms: backoff_base_ms,
                cap_ms: backoff_cap_ms,
                jitter: backoff_jitter,
            },
        }
    }

    /// Validate the inputs and connect.
    pub fn build(&self) -> Result<LogstashHook, HookError> {
        let (protocol, address) = self.destination()?;
        let options = self.build_options()?;
        LogstashHook::with_options(protocol, address, self.build_formatter(), options)
    }

    fn destination(&self) -> Result<(&str, &str), HookError> {
        let (Some(protocol), Some(address)) = (&self.protocol, &self.address) else {
            return Err(HookError::InvalidConfig(
                "logstash hook requires a protocol and address".into(),
            ));
        };
        Ok((protocol.as_str(), address.as_str()))
    }

    fn validate(&self) -> Result<(), HookError> {
        self.validate_destination()?;
        self.validate_capacity()?;
        self.validate_timeouts()?;
        Ok(())
    }

    fn validate_destination(&self) -> Result<(), HookError> {
        let (protocol, address) = self.destination()?;
        if protocol.trim().is_empty() {
            return Err(HookError::InvalidConfig("protocol must not be empty".into()));
        }
        if address.trim().is_empty() {
            return Err(HookError::InvalidConfig("address must not be empty".into()));
        }
        let protocol: Protocol = protocol.parse().map_err(HookError::InvalidConfig)?;
        if self.tls.is_some() && !protocol.is_tcp() {
            return Err(HookError::InvalidConfig(
                "tls is only supported for tcp protocols".into(),
            ));
        }
        Ok(())
    }

    fn validate_capacity(&self) -> Result<(), HookError> {
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), HookError> {
        let periods = [
            (self.connect_timeout_ms, "connect_timeout_ms"),
            (self.write_timeout_ms, "write_timeout_ms"),
            (self.flush_timeout_ms, "flush_timeout_ms"),
            (self.warn_interval_ms, "warn_interval_ms"),
            (self.keep_alive_period_ms, "keep_alive_period_ms"),
        ];
        for (value, field) in periods {
            if let Some(value) = value {
                ensure_positive!(value, field)?;
            }
        }
        Ok(())
    }

    pub(crate) fn build_options(&self) -> Result<HookOptions, HookError> {
        self.validate()?;
        let mut options = HookOptions::default();
        self.apply_optional_fields(&mut options);
        options.tls = self.build_tls_options()?;
        self.backoff.apply(&mut options.backoff)?;
        Ok(options)
    }

    fn apply_optional_fields(&self, options: &mut HookOptions) {
        if self.synchronous {
            options.capacity = None;
        } else if let Some(capacity) = self.capacity {
            options.capacity = Some(capacity);
        }
        if let Some(timeout) = self.enqueue_timeout_ms {
            options.enqueue_timeout = Duration::from_millis(timeout);
        }
        if let Some(timeout) = self.connect_timeout_ms {
            options.connect_timeout = Duration::from_millis(timeout);
        }
        if let Some(timeout) = self.write_timeout_ms {
            options.write_timeout = Duration::from_millis(timeout);
        }
        if let Some(timeout) = self.flush_timeout_ms {
            options.flush_timeout = Duration::from_millis(timeout);
        }
        if let Some(interval) = self.warn_interval_ms {
            options.warn_interval = Duration::from_millis(interval);
        }
        if self.keep_alive {
            options.keep_alive = Some(
                self.keep_alive_period_ms
                    .map_or(DEFAULT_KEEP_ALIVE_PERIOD, Duration::from_millis),
            );
        }
        if let Some(overflow) = self.overflow {
            options.overflow = overflow;
        }
    }

    fn build_tls_options(&self) -> Result<Option<TlsOptions>, HookError> {
        let Some(tls_cfg) = &self.tls else {
            return Ok(None);
        };
        let (_, address) = self.destination()?;
        let domain = tls_cfg
            .domain
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| host_of(address).to_owned());
        Ok(Some(TlsOptions {
            domain,
            insecure_skip_verify: tls_cfg.insecure,
        }))
    }

    fn build_formatter(&self) -> LogstashFormatter {
        let fields = self.fields.clone();
        match self.formatter {
            FormatterKind::Logstash => LogstashFormatter::logstash(fields),
            FormatterKind::Json => LogstashFormatter::new(JsonFormatter::default(), fields),
            FormatterKind::Text => LogstashFormatter::new(TextFormatter::default(), fields),
        }
    }
}

/// Host part of a `host:port` address, without IPv6 brackets.
fn host_of(address: &str) -> &str {
    let host = address.rsplit_once(':').map_or(address, |(host, _)| host);
    match host.trim_start_matches('[').trim_end_matches(']') {
        "" => "localhost",
        host => host,
    }
}

impl From<HookSettings> for HookBuilder {
    fn from(settings: HookSettings) -> Self {
        Self::from_settings(settings)
    }
}

/// Deserialisable hook configuration.
///
/// Only `protocol` and `address` are required; every other key falls back
/// to the [`HookOptions`] defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookSettings {
    pub protocol: String,
    pub address: String,
    pub capacity: Option<usize>,
    pub synchronous: bool,
    pub enqueue_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub flush_timeout_ms: Option<u64>,
    pub warn_interval_ms: Option<u64>,
    pub keep_alive: bool,
    pub keep_alive_period_ms: Option<u64>,
    pub overflow: Option<OverflowPolicy>,
    pub formatter: FormatterKind,
    pub fields: Fields,
    pub tls: bool,
    pub tls_domain: Option<String>,
    pub tls_insecure: bool,
    pub backoff_base_ms: Option<u64>,
    pub backoff_cap_ms: Option<u64>,
    pub backoff_jitter: bool,
}
