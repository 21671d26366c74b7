use std::{
    fmt,
    net::{Ipv6Addr, SocketAddr, ToSocketAddrs},
    str::FromStr,
};

use eyre::{WrapErr, eyre};

/// A server to query, written as `host`, `host:port`, `[v6]:port` or a bare
/// IPv6 address. Without a port the protocol's default port is used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: Option<u16>,
}

impl Target {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Look up the address to send to, falling back to `default_port`.
    pub fn resolve(&self, default_port: u16) -> eyre::Result<SocketAddr> {
        let port = self.port.unwrap_or(default_port);
        (self.host.as_str(), port)
            .to_socket_addrs()
            .wrap_err_with(|| format!("couldn't resolve {}", self.host))?
            .next()
            .ok_or_else(|| eyre!("{} didn't resolve to any addresses", self.host))
    }
}

impl FromStr for Target {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(eyre!("target can't be empty"));
        }

        // [::1]:25565 or [::1]
        if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| eyre!("invalid target {s} (missing ])"))?;
            let port = match after {
                "" => None,
                _ => {
                    let port = after
                        .strip_prefix(':')
                        .ok_or_else(|| eyre!("invalid target {s} (expected : after ])"))?;
                    Some(parse_port(s, port)?)
                }
            };
            return Ok(Target::new(host, port));
        }

        // a bare ipv6 address has more than one colon and no port
        if s.parse::<Ipv6Addr>().is_ok() {
            return Ok(Target::new(s, None));
        }

        match s.split_once(':') {
            Some((host, port)) if !host.is_empty() => {
                Ok(Target::new(host, Some(parse_port(s, port)?)))
            }
            Some(_) => Err(eyre!("invalid target {s} (missing host)")),
            None => Ok(Target::new(s, None)),
        }
    }
}

fn parse_port(target: &str, port: &str) -> eyre::Result<u16> {
    port.parse()
        .wrap_err_with(|| format!("invalid port in target {target}"))
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bracketed = self.host.contains(':');
        match (bracketed, self.port) {
            (true, Some(port)) => write!(f, "[{}]:{port}", self.host),
            (false, Some(port)) => write!(f, "{}:{port}", self.host),
            (_, None) => f.write_str(&self.host),
        }
    }
}

#[cfg(test)]
mod test {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(
            "play.example.net".parse::<Target>().unwrap(),
            Target::new("play.example.net", None)
        );
        assert_eq!(
            " 10.0.0.5:25566 ".parse::<Target>().unwrap(),
            Target::new("10.0.0.5", Some(25566))
        );
        assert_eq!(
            "[::1]:19132".parse::<Target>().unwrap(),
            Target::new("::1", Some(19132))
        );
        assert_eq!("[::1]".parse::<Target>().unwrap(), Target::new("::1", None));
        assert_eq!(
            "2001:db8::1".parse::<Target>().unwrap(),
            Target::new("2001:db8::1", None)
        );
    }

    #[test]
    fn test_parse_invalid_targets() {
        for invalid in ["", ":25565", "host:", "host:65536", "host:port", "[::1", "[::1]x"] {
            assert!(
                invalid.parse::<Target>().is_err(),
                "{invalid:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_display_roundtrips() {
        for target in ["example.com", "example.com:25565", "[::1]:25565", "::1"] {
            assert_eq!(target.parse::<Target>().unwrap().to_string(), target);
        }
    }

    #[test]
    fn test_resolve_uses_default_port() {
        let addr = Target::new("127.0.0.1", None).resolve(25565).unwrap();
        assert_eq!(
            addr,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 25565)
        );

        let addr = Target::new("127.0.0.1", Some(1)).resolve(25565).unwrap();
        assert_eq!(addr.port(), 1);
    }
}
