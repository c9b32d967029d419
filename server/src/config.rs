use merge_arcade_shared::config::BoardConfig;
use std::path::PathBuf;
use std::str::FromStr;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub tick_rate_hz: u32,
    pub broadcast_rate_hz: u32,
    /// Seed for board RNGs. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    /// JSON snapshot of users and scores. `None` keeps everything in memory.
    pub data_path: Option<PathBuf>,
    /// Required in `X-Admin-Password` for the admin API. `None` disables it.
    pub admin_password: Option<String>,
    /// Externally reachable URL used for the share link and QR code
    pub public_url: Option<String>,
    pub leaderboard_size: usize,
    /// Recent scores shown per user in the admin overview
    pub admin_recent_scores: usize,
    pub max_sessions: usize,
    pub max_drops_per_sec: u32,
    pub max_message_bytes: usize,
    /// bcrypt rounds for stored passwords
    pub password_cost: u32,
    /// CORS origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    pub board: BoardConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            tick_rate_hz: 60,
            broadcast_rate_hz: 30,
            rng_seed: None,
            data_path: Some(PathBuf::from("data/arcade.json")),
            admin_password: None,
            public_url: None,
            leaderboard_size: 10,
            admin_recent_scores: 5,
            max_sessions: 256,
            max_drops_per_sec: 10,
            max_message_bytes: 1024,
            password_cost: 10,
            allowed_origins: Vec::new(),
            board: BoardConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `ARCADE_*` environment variables.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();

        if let Some(v) = lookup("ARCADE_LISTEN_ADDR") {
            config.listen_addr = v;
        }
        if let Some(v) = lookup("ARCADE_TICK_RATE_HZ") {
            config.tick_rate_hz = parse_var("ARCADE_TICK_RATE_HZ", &v)?;
        }
        if let Some(v) = lookup("ARCADE_BROADCAST_RATE_HZ") {
            config.broadcast_rate_hz = parse_var("ARCADE_BROADCAST_RATE_HZ", &v)?;
        }
        if let Some(v) = lookup("ARCADE_RNG_SEED") {
            config.rng_seed = Some(parse_var("ARCADE_RNG_SEED", &v)?);
        }
        if let Some(v) = lookup("ARCADE_DATA_PATH") {
            // Empty disables persistence
            config.data_path = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("ARCADE_ADMIN_PASSWORD") {
            config.admin_password = (!v.is_empty()).then_some(v);
        }
        if let Some(v) = lookup("ARCADE_PUBLIC_URL") {
            config.public_url = (!v.is_empty()).then_some(v);
        }
        if let Some(v) = lookup("ARCADE_LEADERBOARD_SIZE") {
            config.leaderboard_size = parse_var("ARCADE_LEADERBOARD_SIZE", &v)?;
        }
        if let Some(v) = lookup("ARCADE_ADMIN_RECENT_SCORES") {
            config.admin_recent_scores = parse_var("ARCADE_ADMIN_RECENT_SCORES", &v)?;
        }
        if let Some(v) = lookup("ARCADE_MAX_SESSIONS") {
            config.max_sessions = parse_var("ARCADE_MAX_SESSIONS", &v)?;
        }
        if let Some(v) = lookup("ARCADE_MAX_DROPS_PER_SEC") {
            config.max_drops_per_sec = parse_var("ARCADE_MAX_DROPS_PER_SEC", &v)?;
        }
        if let Some(v) = lookup("ARCADE_MAX_MESSAGE_BYTES") {
            config.max_message_bytes = parse_var("ARCADE_MAX_MESSAGE_BYTES", &v)?;
        }
        if let Some(v) = lookup("ARCADE_PASSWORD_COST") {
            config.password_cost = parse_var("ARCADE_PASSWORD_COST", &v)?;
        }
        if let Some(v) = lookup("ARCADE_ALLOWED_ORIGINS") {
            config.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 240 {
            return Err("tick_rate_hz must be within 1..=240".to_string());
        }
        if self.broadcast_rate_hz == 0 || self.broadcast_rate_hz > self.tick_rate_hz {
            return Err("broadcast_rate_hz must be within 1..=tick_rate_hz".to_string());
        }
        if self.leaderboard_size == 0 || self.leaderboard_size > 100 {
            return Err("leaderboard_size must be within 1..=100".to_string());
        }
        if self.admin_recent_scores == 0 || self.admin_recent_scores > 50 {
            return Err("admin_recent_scores must be within 1..=50".to_string());
        }
        if self.max_sessions == 0 {
            return Err("max_sessions must be > 0".to_string());
        }
        if self.max_drops_per_sec == 0 {
            return Err("max_drops_per_sec must be > 0".to_string());
        }
        if self.max_message_bytes < 64 {
            return Err("max_message_bytes must be >= 64".to_string());
        }
        if !(4..=31).contains(&self.password_cost) {
            return Err("password_cost must be within 4..=31".to_string());
        }
        self.board.validate().map_err(|e| format!("board: {}", e))
    }

    /// Ticks between two board_state pushes
    pub fn broadcast_every_n(&self) -> u32 {
        (self.tick_rate_hz / self.broadcast_rate_hz).max(1)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} has an invalid value: {:?}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_server_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("ARCADE_LISTEN_ADDR", "127.0.0.1:8080"),
            ("ARCADE_RNG_SEED", "42"),
            ("ARCADE_DATA_PATH", ""),
            ("ARCADE_ADMIN_PASSWORD", "hunter22"),
            ("ARCADE_ALLOWED_ORIGINS", "http://a.test, http://b.test,"),
            ("ARCADE_MAX_MESSAGE_BYTES", "2048"),
            ("ARCADE_ADMIN_RECENT_SCORES", "3"),
            ("ARCADE_PASSWORD_COST", "4"),
        ]))
        .unwrap();
        assert_eq!(config.max_message_bytes, 2048);
        assert_eq!(config.admin_recent_scores, 3);
        assert_eq!(config.password_cost, 4);
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.rng_seed, Some(42));
        assert!(config.data_path.is_none());
        assert_eq!(config.admin_password.as_deref(), Some("hunter22"));
        assert_eq!(config.allowed_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn malformed_number_is_reported() {
        let err = ServerConfig::from_lookup(lookup_from(&[("ARCADE_TICK_RATE_HZ", "fast")]))
            .unwrap_err();
        assert!(err.contains("ARCADE_TICK_RATE_HZ"));
    }

    #[test]
    fn broadcast_faster_than_tick_invalid() {
        let config = ServerConfig {
            tick_rate_hz: 30,
            broadcast_rate_hz: 60,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_password_cost_invalid() {
        let config = ServerConfig {
            password_cost: 3,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("password_cost"));
    }

    #[test]
    fn invalid_board_is_reported() {
        let mut config = ServerConfig::default();
        config.board.width = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.starts_with("board:"));
    }

    #[test]
    fn broadcast_interval_in_ticks() {
        let config = ServerConfig::default();
        assert_eq!(config.broadcast_every_n(), 2);
    }
}
