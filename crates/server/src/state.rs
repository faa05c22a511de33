use plazza_core::Config;

use crate::reception::Reception;

/// Shared application state
pub struct AppState {
    config: Config,
    reception: Reception,
}

impl AppState {
    pub fn new(config: Config, reception: Reception) -> Self {
        Self { config, reception }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reception(&self) -> &Reception {
        &self.reception
    }
}
