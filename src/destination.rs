use std::fmt;

use crate::error::{KovriError, KovriResult};

/// One candidate of a client tunnel's `dest` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Destination hostname, e.g. `irc.echelon.i2p`
    pub host: String,
    /// Destination port; the tunnel's `dest_port` unless given inline
    pub port: u16,
}

impl Destination {
    /// Parse a single `host[:port]` candidate
    pub fn parse(spec: &str, default_port: u16) -> KovriResult<Self> {
        let spec = spec.trim();
        let (host, port) = match spec.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str.trim().parse::<u16>().map_err(|_| {
                    KovriError::Config(format!("Invalid destination port '{port_str}' in '{spec}'"))
                })?;
                (host.trim(), port)
            }
            None => (spec, default_port),
        };

        if host.is_empty() {
            return Err(KovriError::Config(format!(
                "Invalid destination '{spec}': empty host"
            )));
        }

        Ok(Destination {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Split a raw `dest` value into its comma-separated candidates.
///
/// Supported formats:
/// - "host" (e.g., "irc.echelon.i2p")
/// - "host:port" (e.g., "irc.echelon.i2p:6667")
/// - comma-separated lists of either (e.g., "a.i2p:6667, b.i2p")
pub fn parse_destinations(raw: &str, default_port: u16) -> KovriResult<Vec<Destination>> {
    let destinations = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| Destination::parse(part, default_port))
        .collect::<KovriResult<Vec<_>>>()?;

    if destinations.is_empty() {
        return Err(KovriError::Config(format!(
            "Destination list '{raw}' names no destination"
        )));
    }
    Ok(destinations)
}
