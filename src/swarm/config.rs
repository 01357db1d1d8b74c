//! Swarm configuration and list loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::Channel;
use crate::error::{Error, Result};
use crate::proxy::ProxyEndpoint;
use crate::{Destination, DEFAULT_DESTINATION_HOST, DEFAULT_DESTINATION_PORT, DEFAULT_LAUNCH_DELAY_MS};

/// Runtime configuration for a swarm run.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Chat service every tunnel leads to
    pub destination: Destination,
    /// Channel every session joins
    pub channel: Channel,
    /// Pause between launches
    pub launch_delay: Duration,
}

impl SwarmConfig {
    /// Configuration with the default destination and pacing.
    pub fn new(channel: Channel) -> Self {
        Self {
            destination: Destination::default(),
            channel,
            launch_delay: Duration::from_millis(DEFAULT_LAUNCH_DELAY_MS),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.destination.host.is_empty() {
            return Err(Error::config("destination_host cannot be empty"));
        }
        if self.destination.host.len() > 255 {
            return Err(Error::config("destination_host longer than 255 bytes"));
        }
        if self.destination.port == 0 {
            return Err(Error::config("destination_port cannot be 0"));
        }
        Ok(())
    }
}

/// Configuration file format (TOML).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfigFile {
    /// Account list, one `username:oauth:token` per line
    pub accounts_file: PathBuf,
    /// Proxy list, one record per line
    pub proxies_file: PathBuf,
    /// Channel to join; prompted for when absent
    pub channel: Option<String>,
    /// Chat service host
    pub destination_host: String,
    /// Chat service port
    pub destination_port: u16,
    /// Pause between launches (milliseconds)
    pub launch_delay_ms: u64,
}

impl Default for SwarmConfigFile {
    fn default() -> Self {
        Self {
            accounts_file: PathBuf::from("accounts.txt"),
            proxies_file: PathBuf::from("proxies.txt"),
            channel: None,
            destination_host: DEFAULT_DESTINATION_HOST.to_string(),
            destination_port: DEFAULT_DESTINATION_PORT,
            launch_delay_ms: DEFAULT_LAUNCH_DELAY_MS,
        }
    }
}

impl SwarmConfigFile {
    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Convert to runtime configuration with the given channel.
    pub fn to_config(&self, channel: Channel) -> Result<SwarmConfig> {
        let config = SwarmConfig {
            destination: Destination::new(self.destination_host.clone(), self.destination_port),
            channel,
            launch_delay: Duration::from_millis(self.launch_delay_ms),
        };
        config.validate()?;
        Ok(config)
    }
}

/// An account record and the 1-based file line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    /// Line number in the list file
    pub line: usize,
    /// Unparsed record text, trimmed
    pub text: String,
}

/// Non-empty, non-comment lines of a list file, trimmed, with 1-based line numbers.
fn records(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

/// Raw account records from list text. Parsing happens at launch.
pub fn parse_account_list(content: &str) -> Vec<AccountRecord> {
    records(content)
        .map(|(line, text)| AccountRecord {
            line,
            text: text.to_string(),
        })
        .collect()
}

/// Proxy endpoints from list text, skipping records that do not parse.
pub fn parse_proxy_list(content: &str) -> Vec<ProxyEndpoint> {
    records(content)
        .filter_map(|(line, record)| match record.parse::<ProxyEndpoint>() {
            Ok(proxy) => Some(proxy),
            Err(e) => {
                tracing::warn!("Skipping proxy on line {}: {}", line, e);
                None
            }
        })
        .collect()
}

/// Load an account list file.
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<AccountRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(parse_account_list(&content))
}

/// Load a proxy list file. An empty pool is an error.
pub fn load_proxies(path: impl AsRef<Path>) -> Result<Vec<ProxyEndpoint>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;

    let proxies = parse_proxy_list(&content);
    if proxies.is_empty() {
        return Err(Error::config(format!("no valid proxies in {}", path.display())));
    }
    Ok(proxies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_file_defaults() {
        let file: SwarmConfigFile = toml::from_str("").unwrap();
        assert_eq!(file, SwarmConfigFile::default());
        assert_eq!(file.destination_port, 6667);
        assert_eq!(file.launch_delay_ms, 500);
        assert!(file.channel.is_none());
    }

    #[test]
    fn test_config_file_parse() {
        let file: SwarmConfigFile = toml::from_str(
            r#"
            accounts_file = "/etc/swarm/accounts.txt"
            channel = "somechannel"
            destination_host = "chat.example"
            destination_port = 6697
            launch_delay_ms = 0
            "#,
        )
        .unwrap();

        let config = file.to_config(Channel::new("other").unwrap()).unwrap();
        assert_eq!(file.accounts_file, PathBuf::from("/etc/swarm/accounts.txt"));
        assert_eq!(file.proxies_file, PathBuf::from("proxies.txt"));
        assert_eq!(file.channel.as_deref(), Some("somechannel"));
        assert_eq!(config.destination, Destination::new("chat.example", 6697));
        assert_eq!(config.launch_delay, Duration::ZERO);
    }

    #[test]
    fn test_config_file_serialization() {
        let file = SwarmConfigFile {
            channel: Some("foo".into()),
            ..Default::default()
        };
        let text = toml::to_string_pretty(&file).unwrap();
        let restored: SwarmConfigFile = toml::from_str(&text).unwrap();
        assert_eq!(file, restored);
    }

    #[test]
    fn test_validation() {
        let mut config = SwarmConfig::new(Channel::new("foo").unwrap());
        assert!(config.validate().is_ok());

        config.destination.port = 0;
        assert!(config.validate().is_err());

        config.destination = Destination::new("", 6667);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_lists() {
        let accounts = parse_account_list("a:oauth:1\n\n  # comment\n b:oauth:2 \r\nbroken\n");
        let texts: Vec<&str> = accounts.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a:oauth:1", "b:oauth:2", "broken"]);

        let proxies = parse_proxy_list("1.2.3.4:1080\nhttp://bad:1\nsocks5://u:p@[::1]:9050\n");
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[1].host(), "[::1]");
    }

    #[test]
    fn test_account_lines_count_skipped_lines() {
        let accounts = parse_account_list("# accounts\n\nu0:oauth:t0\nbroken\n");
        assert_eq!(
            accounts,
            vec![
                AccountRecord { line: 3, text: "u0:oauth:t0".into() },
                AccountRecord { line: 4, text: "broken".into() },
            ]
        );
    }

    #[test]
    fn test_load_files() {
        let mut accounts = tempfile::NamedTempFile::new().unwrap();
        writeln!(accounts, "user1:oauth:abcd").unwrap();
        writeln!(accounts, "user2:oauth:oauth:efgh").unwrap();
        assert_eq!(load_accounts(accounts.path()).unwrap().len(), 2);

        let mut proxies = tempfile::NamedTempFile::new().unwrap();
        writeln!(proxies, "proxy.example:1080").unwrap();
        assert_eq!(load_proxies(proxies.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_load_proxies_empty_pool() {
        let mut proxies = tempfile::NamedTempFile::new().unwrap();
        writeln!(proxies, "not a proxy:xx").unwrap();
        writeln!(proxies, "# nothing else").unwrap();
        let err = load_proxies(proxies.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_accounts("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
