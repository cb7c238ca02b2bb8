//! Startup configuration. Read once from the environment, immutable afterwards.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::http::StatusCode;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_ERROR_STATUS: StatusCode = StatusCode::SERVICE_UNAVAILABLE;

/// Where and how to reach the obs-websocket server.
#[derive(Clone)]
pub struct ObsEndpoint {
    pub url: Url,
    pub password: String,
    /// Upper bound for the handshake and for each request.
    pub timeout: Duration,
}

impl ObsEndpoint {
    pub fn new(host: &str, port: u16, password: impl Into<String>) -> Result<Self, ConfigError> {
        let url = ws_url(host, port)?;
        Ok(Self {
            url,
            password: password.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// Keep the password out of logs.
impl fmt::Debug for ObsEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObsEndpoint")
            .field("url", &self.url.as_str())
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub obs: ObsEndpoint,
    pub listen_addr: SocketAddr,
    /// Status returned alongside a `# Error:` body.
    pub error_status: StatusCode,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests don't have to touch process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| lookup(var).ok_or(ConfigError::Missing(var));

        let host = required("OBS_HOST")?;
        let port = parse_port("OBS_PORT", &required("OBS_PORT")?)?;
        let password = required("OBS_PASSWORD")?;
        let listen_port = parse_port("LISTEN_PORT", &required("LISTEN_PORT")?)?;

        let timeout_ms = match lookup("OBS_TIMEOUT_MS") {
            Some(v) => match v.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => return Err(invalid("OBS_TIMEOUT_MS", &v, "expected a positive integer")),
            },
            None => DEFAULT_TIMEOUT_MS,
        };

        let error_status = match lookup("METRICS_ERROR_STATUS") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .ok_or_else(|| invalid("METRICS_ERROR_STATUS", &v, "expected an HTTP status code"))?,
            None => DEFAULT_ERROR_STATUS,
        };

        let listen_ip = match lookup("LISTEN_ADDR") {
            Some(v) => v
                .trim()
                .parse::<IpAddr>()
                .map_err(|e| invalid("LISTEN_ADDR", &v, &e.to_string()))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let obs = ObsEndpoint::new(&host, port, password)?
            .with_timeout(Duration::from_millis(timeout_ms));

        Ok(Self {
            obs,
            listen_addr: SocketAddr::new(listen_ip, listen_port),
            error_status,
        })
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_addr.set_port(port);
        self
    }
}

fn parse_port(var: &'static str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| invalid(var, value, &e.to_string()))
}

fn ws_url(host: &str, port: u16) -> Result<Url, ConfigError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(invalid("OBS_HOST", host, "empty host"));
    }
    // Bare IPv6 literals need brackets inside a URL.
    let authority = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    Url::parse(&format!("ws://{authority}")).map_err(|e| invalid("OBS_HOST", host, &e.to_string()))
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Command line. Environment carries everything else.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub port: Option<u16>,
}

pub fn usage(prog: &str) -> String {
    format!("Usage: {prog} [--port PORT|-p PORT]\n\nReads OBS_HOST, OBS_PORT, OBS_PASSWORD and LISTEN_PORT from the environment (or .env).")
}

/// `Err` carries the text to print; `help` is true when it was asked for.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, (String, bool)> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "obs_exporter".into());
    let mut port: Option<String> = None;

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err((usage(&prog), true)),
            "--port" | "-p" => match it.next() {
                Some(v) => port = Some(v),
                None => return Err((format!("Missing value for {arg}. {}", usage(&prog)), false)),
            },
            _ if arg.starts_with("--port=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    port = Some(v.to_string());
                }
            }
            _ => return Err((format!("Unexpected argument {arg:?}. {}", usage(&prog)), false)),
        }
    }

    let port = match port {
        Some(p) => Some(
            p.parse::<u16>()
                .map_err(|_| (format!("Invalid port {p:?}. {}", usage(&prog)), false))?,
        ),
        None => None,
    };
    Ok(ParsedArgs { port })
}
