/*!
Start-up configuration. Every setting has a default; an optional TOML file
overrides any of them.

```toml
host = "127.0.0.1"
port = 8080
data_file = "/var/lib/fyp-portal/portal.dat"
admin_username = "admin"
admin_password = "change-me"
session_ttl_hours = 12
seed_demo_data = false
```
*/
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;

pub const CONFIG_ENV_VAR: &str = "FYP_PORTAL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "fyp-portal.toml";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    host: Option<String>,
    port: Option<u16>,
    data_file: Option<PathBuf>,
    admin_username: Option<String>,
    admin_password: Option<String>,
    session_ttl_hours: Option<i64>,
    seed_demo_data: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Cfg {
    pub addr: SocketAddr,
    pub data_file: PathBuf,
    pub default_admin_username: String,
    pub default_admin_password: String,
    pub session_ttl: Duration,
    pub seed_demo_data: bool,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_file: PathBuf::from("data/portal.dat"),
            default_admin_username: "admin".to_owned(),
            default_admin_password: "admin".to_owned(),
            session_ttl: Duration::hours(48),
            seed_demo_data: true,
        }
    }
}

impl Cfg {
    pub fn from_toml(text: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(text)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse()
                    .map_err(|e| format!("Error parsing {:?} as IP address: {}", &s, &e))?,
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(p) = cf.data_file {
            c.data_file = p;
        }
        if let Some(s) = cf.admin_username {
            if s.is_empty() {
                return Err("admin_username may not be empty".to_owned());
            }
            c.default_admin_username = s;
        }
        if let Some(s) = cf.admin_password {
            if s.is_empty() {
                return Err("admin_password may not be empty".to_owned());
            }
            c.default_admin_password = s;
        }
        if let Some(h) = cf.session_ttl_hours {
            if h <= 0 {
                return Err(format!("session_ttl_hours must be positive, not {}", h));
            }
            c.session_ttl = Duration::hours(h);
        }
        if let Some(b) = cf.seed_demo_data {
            c.seed_demo_data = b;
        }

        Ok(c)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file {}: {}", path.display(), &e))?;
        Self::from_toml(&file_contents)
    }

    /// Reads the file named by `FYP_PORTAL_CONFIG`, or `fyp-portal.toml`.
    /// A missing file just means defaults.
    pub fn load() -> Result<Self, String> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        if path.exists() {
            log::info!("Reading configuration from {}.", path.display());
            Self::from_file(&path)
        } else {
            log::info!("No config file at {}; using defaults.", path.display());
            Ok(Self::default())
        }
    }
}
