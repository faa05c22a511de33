use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub kitchen: KitchenConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Where the reception listens for kitchens (and where kitchens connect)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    #[serde(default = "default_link_host")]
    pub host: IpAddr,
    #[serde(default = "default_link_port")]
    pub port: u16,
}

impl LinkConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: default_link_host(),
            port: default_link_port(),
        }
    }
}

fn default_link_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_link_port() -> u16 {
    4242
}

/// Kitchen settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KitchenConfig {
    /// Pizzas a kitchen cooks at the same time.
    #[serde(default = "default_cooks")]
    pub cooks: usize,
    /// Scales every pizza's base cooking time (0.5 = twice as fast).
    #[serde(default = "default_cooking_multiplier")]
    pub cooking_multiplier: f64,
    /// How long a kitchen waits for an answer to an assignment request
    /// before it gives up on the ticket.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl KitchenConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            cooks: default_cooks(),
            cooking_multiplier: default_cooking_multiplier(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_cooks() -> usize {
    3
}

fn default_cooking_multiplier() -> f64 {
    1.0
}

fn default_request_timeout_ms() -> u64 {
    5000
}

/// Status endpoint served by the reception
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_http_host")]
    pub host: IpAddr,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl HttpConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

fn default_http_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_http_port() -> u16 {
    8080
}
