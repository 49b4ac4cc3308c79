use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum ProxySpec {
    Open {
        host: String,
        port: u16,
    },
    Credentialed {
        username: String,
        password: String,
        host: String,
        port: u16,
    },
}

impl ProxySpec {
    /// Proxy URL in the form WebDriver manual proxy capabilities expect.
    /// Credentials are percent-encoded.
    pub fn to_url(&self) -> anyhow::Result<String> {
        let mut url = Url::parse(&format!("http://{}/", self.endpoint()))
            .with_context(|| format!("Proxy host `{}` is not valid", self.endpoint()))?;

        if let ProxySpec::Credentialed {
            username, password, ..
        } = self
        {
            url.set_username(username)
                .map_err(|_| anyhow!("Proxy URL cannot carry a username"))?;
            url.set_password(Some(password))
                .map_err(|_| anyhow!("Proxy URL cannot carry a password"))?;
        }

        Ok(url.to_string())
    }

    /// Host and port only, safe to log.
    pub fn endpoint(&self) -> String {
        match self {
            ProxySpec::Open { host, port } | ProxySpec::Credentialed { host, port, .. } => {
                format!("{}:{}", host, port)
            }
        }
    }
}

fn parse_host_port(s: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Proxy `{}` is missing a port", s))?;
    if host.is_empty() {
        bail!("Proxy `{}` is missing a host", s);
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| anyhow!("Proxy port `{}` is not a number", port))?;

    Ok((host.to_string(), port))
}

impl FromStr for ProxySpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("http://")
            .unwrap_or(s)
            .trim_end_matches('/');

        match s.rsplit_once('@') {
            Some((auth, host_port)) => {
                let (username, password) = auth
                    .split_once(':')
                    .ok_or_else(|| anyhow!("Proxy credentials must be `user:pass`"))?;
                let (host, port) = parse_host_port(host_port)?;

                Ok(ProxySpec::Credentialed {
                    username: username.to_string(),
                    password: password.to_string(),
                    host,
                    port,
                })
            }
            None => {
                let (host, port) = parse_host_port(s)?;
                Ok(ProxySpec::Open { host, port })
            }
        }
    }
}
