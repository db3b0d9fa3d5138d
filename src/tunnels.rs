//! Tunnel definitions (tunnels.conf).
//!
//! Each INI section describes one tunnel and is named after it:
//!
//! ```ini
//! [IRC]
//! type = irc
//! address = 127.0.0.1
//! port = 6669
//! dest = irc.echelon.i2p
//! dest_port = 6667
//!
//! [MyServer]
//! type = server
//! port = 8080
//! in_port = 80
//! keys = server-keys.dat
//! white_list = aaa.b32.i2p,bbb.b32.i2p
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    attribute::Key,
    destination::{Destination, parse_destinations},
    error::{KovriError, KovriResult},
    ini::{self, Section},
};

const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Tunnel family selected by the `type` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelKind {
    Client,
    Irc,
    Server,
    Http,
}

impl TunnelKind {
    pub fn from_type(value: &str) -> Option<Self> {
        [
            (Key::Client, TunnelKind::Client),
            (Key::Irc, TunnelKind::Irc),
            (Key::Server, TunnelKind::Server),
            (Key::Http, TunnelKind::Http),
        ]
        .into_iter()
        .find(|(key, _)| key.as_str() == value)
        .map(|(_, kind)| kind)
    }

    pub fn key(self) -> Key {
        match self {
            TunnelKind::Client => Key::Client,
            TunnelKind::Irc => Key::Irc,
            TunnelKind::Server => Key::Server,
            TunnelKind::Http => Key::Http,
        }
    }

    /// Client and IRC tunnels connect out to a remote destination
    pub fn is_client(self) -> bool {
        matches!(self, TunnelKind::Client | TunnelKind::Irc)
    }

    /// Server and HTTP tunnels publish a local service
    pub fn is_server(self) -> bool {
        !self.is_client()
    }
}

/// How the access list of a server tunnel is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AclMode {
    #[default]
    None,
    Whitelist,
    Blacklist,
}

/// Whitelist/blacklist gating of a server tunnel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControl {
    pub entries: Vec<String>,
    pub mode: AclMode,
}

impl AccessControl {
    /// Build from raw `white_list`/`black_list` values; a non-empty
    /// whitelist always wins
    pub fn from_lists(white: &str, black: &str) -> Self {
        let (list, mode) = if !white.trim().is_empty() {
            (white, AclMode::Whitelist)
        } else if !black.trim().is_empty() {
            (black, AclMode::Blacklist)
        } else {
            return Self::default();
        };

        let entries = list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect();
        Self { entries, mode }
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != AclMode::None
    }
}

/// One tunnel of tunnels.conf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelDescriptor {
    /// Section name
    pub name: String,
    pub kind: TunnelKind,
    pub address: String,
    pub port: u16,
    /// Raw destination list (client tunnels)
    pub dest: Option<String>,
    pub dest_port: Option<u16>,
    /// Keys file; always present for server tunnels
    pub keys: Option<String>,
    pub in_port: Option<u16>,
    pub acl: AccessControl,
}

impl TunnelDescriptor {
    /// Candidates of `dest`, each defaulting to `dest_port`
    pub fn destinations(&self) -> KovriResult<Vec<Destination>> {
        match &self.dest {
            Some(dest) => parse_destinations(dest, self.dest_port.unwrap_or(0)),
            None => Ok(Vec::new()),
        }
    }
}

/// Read and parse the tunnels file at `path`.
///
/// Any invalid section fails the whole file.
pub fn load(path: &Path) -> KovriResult<Vec<TunnelDescriptor>> {
    let document = ini::read(path)?;
    let tunnels = parse_document(document, path)?;
    info!("Loaded {} tunnel(s) from {}", tunnels.len(), path.display());
    Ok(tunnels)
}

/// Parse tunnel definitions held in memory
pub fn parse_str(content: &str) -> KovriResult<Vec<TunnelDescriptor>> {
    let origin = ini::inline_origin();
    let document = ini::parse(content, &origin)?;
    parse_document(document, &origin)
}

fn parse_document(document: ini::Document, file: &Path) -> KovriResult<Vec<TunnelDescriptor>> {
    if let Some((key, _)) = document.globals.first() {
        return Err(KovriError::Syntax {
            path: file.to_path_buf(),
            message: format!("'{key}' is outside of any tunnel section"),
        });
    }

    document
        .sections
        .iter()
        .map(|section| SectionReader { section, file }.read_tunnel())
        .collect()
}

struct SectionReader<'a> {
    section: &'a Section,
    file: &'a Path,
}

impl SectionReader<'_> {
    fn read_tunnel(&self) -> KovriResult<TunnelDescriptor> {
        let name = self.section.name.clone();
        if let Some(key) = ini::repeated_key(&self.section.entries) {
            return Err(KovriError::Syntax {
                path: self.file_path(),
                message: format!("'{key}' is set more than once in tunnel '{name}'"),
            });
        }
        let type_value = self.required(Key::Type)?;
        let kind = TunnelKind::from_type(type_value).ok_or_else(|| KovriError::UnknownTunnelType {
            name: name.clone(),
            kind: type_value.to_string(),
            file: self.file_path(),
        })?;

        let mut tunnel = TunnelDescriptor {
            name,
            kind,
            address: self.optional(Key::Address).unwrap_or(DEFAULT_ADDRESS).to_string(),
            port: self.port(Key::Port)?,
            dest: None,
            dest_port: None,
            keys: None,
            in_port: None,
            acl: AccessControl::default(),
        };

        if kind.is_client() {
            // Kept verbatim; see `TunnelDescriptor::destinations`
            tunnel.dest = Some(self.required(Key::Dest)?.to_string());
            tunnel.dest_port = Some(self.optional_port(Key::DestPort)?);
            tunnel.keys = self.optional(Key::Keys).map(str::to_string);
        } else {
            tunnel.in_port = Some(self.optional_port(Key::InPort)?);
            // Persistent private keys
            tunnel.keys = Some(self.required(Key::Keys)?.to_string());
            tunnel.acl = AccessControl::from_lists(
                self.optional(Key::Whitelist).unwrap_or(""),
                self.optional(Key::Blacklist).unwrap_or(""),
            );
        }

        debug!(
            "Parsed {} tunnel '{}' on {}:{}",
            kind.key(),
            tunnel.name,
            tunnel.address,
            tunnel.port
        );
        Ok(tunnel)
    }

    fn file_path(&self) -> PathBuf {
        self.file.to_path_buf()
    }

    fn optional(&self, key: Key) -> Option<&str> {
        self.section.get(key.as_str())
    }

    fn required(&self, key: Key) -> KovriResult<&str> {
        self.optional(key).ok_or_else(|| KovriError::MissingField {
            tunnel: self.section.name.clone(),
            field: key.as_str(),
            file: self.file_path(),
        })
    }

    fn parse_port(&self, key: Key, raw: &str) -> KovriResult<u16> {
        raw.trim().parse::<u16>().map_err(|e| KovriError::FieldParse {
            tunnel: self.section.name.clone(),
            field: key.as_str(),
            cause: format!("'{raw}': {e}"),
        })
    }

    fn port(&self, key: Key) -> KovriResult<u16> {
        let raw = self.required(key)?;
        self.parse_port(key, raw)
    }

    /// Absent ports default to 0
    fn optional_port(&self, key: Key) -> KovriResult<u16> {
        match self.optional(key) {
            Some(raw) => self.parse_port(key, raw),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_client_tunnel_defaults() {
        let tunnels = parse_str("[foo]\ntype = client\ndest = foo.i2p\nport = 1234\n").unwrap();
        assert_eq!(tunnels.len(), 1);

        let tunnel = &tunnels[0];
        assert_eq!(tunnel.name, "foo");
        assert_eq!(tunnel.kind, TunnelKind::Client);
        assert_eq!(tunnel.dest.as_deref(), Some("foo.i2p"));
        assert_eq!(tunnel.port, 1234);
        assert_eq!(tunnel.address, "127.0.0.1");
        assert_eq!(tunnel.dest_port, Some(0));
        assert_eq!(tunnel.keys, None);
        assert_eq!(tunnel.in_port, None);
        assert!(!tunnel.acl.is_enabled());
    }

    #[test]
    fn test_irc_tunnel_destinations() {
        let tunnels = parse_str(
            "[IRC]\ntype = irc\naddress = 0.0.0.0\nport = 6669\n\
             dest = irc.echelon.i2p, irc.postman.i2p:6668\ndest_port = 6667\nkeys = irc-keys.dat\n",
        )
        .unwrap();
        let tunnel = &tunnels[0];
        assert_eq!(tunnel.kind, TunnelKind::Irc);
        assert_eq!(tunnel.address, "0.0.0.0");
        assert_eq!(tunnel.keys.as_deref(), Some("irc-keys.dat"));
        assert_eq!(
            tunnel.dest.as_deref(),
            Some("irc.echelon.i2p, irc.postman.i2p:6668")
        );

        let destinations: Vec<String> = tunnel
            .destinations()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(destinations, vec!["irc.echelon.i2p:6667", "irc.postman.i2p:6668"]);
    }

    #[test]
    fn test_server_tunnel_whitelist_wins() {
        let tunnels = parse_str(
            "[web]\ntype = http\nport = 8080\nin_port = 80\nkeys = web.dat\n\
             white_list = a.b32.i2p, b.b32.i2p\nblack_list = c.b32.i2p\n",
        )
        .unwrap();
        let tunnel = &tunnels[0];
        assert_eq!(tunnel.kind, TunnelKind::Http);
        assert_eq!(tunnel.in_port, Some(80));
        assert_eq!(tunnel.keys.as_deref(), Some("web.dat"));
        assert_eq!(tunnel.dest, None);
        assert_eq!(tunnel.acl.mode, AclMode::Whitelist);
        assert_eq!(tunnel.acl.entries, vec!["a.b32.i2p", "b.b32.i2p"]);
    }

    #[test]
    fn test_server_tunnel_blacklist_and_none() {
        let tunnels = parse_str(
            "[a]\ntype = server\nport = 1\nkeys = a.dat\nwhite_list =\nblack_list = x.i2p\n\n\
             [b]\ntype = server\nport = 2\nkeys = b.dat\n",
        )
        .unwrap();
        assert_eq!(tunnels[0].acl.mode, AclMode::Blacklist);
        assert_eq!(tunnels[0].acl.entries, vec!["x.i2p"]);
        assert_eq!(tunnels[0].in_port, Some(0));
        assert_eq!(tunnels[1].acl, AccessControl::default());
    }

    #[test]
    fn test_sections_keep_file_order() {
        let tunnels = parse_str(
            "[second]\ntype = client\ndest = b.i2p\nport = 2\n\n\
             [first]\ntype = client\ndest = a.i2p\nport = 1\n",
        )
        .unwrap();
        let names: Vec<_> = tunnels.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn test_unknown_type_fails_whole_file() {
        let err = parse_str(
            "[ok]\ntype = client\ndest = a.i2p\nport = 1\n\n[bad]\ntype = ftp\nport = 21\n",
        )
        .unwrap_err();
        match err {
            KovriError::UnknownTunnelType { name, kind, .. } => {
                assert_eq!(name, "bad");
                assert_eq!(kind, "ftp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_fields() {
        let err = parse_str("[t]\nport = 1\n").unwrap_err();
        assert!(matches!(err, KovriError::MissingField { field: "type", .. }));

        let err = parse_str("[t]\ntype = client\nport = 1\n").unwrap_err();
        assert!(matches!(err, KovriError::MissingField { field: "dest", .. }));

        let err = parse_str("[t]\ntype = server\nport = 1\n").unwrap_err();
        assert!(matches!(err, KovriError::MissingField { field: "keys", .. }));

        let err = parse_str("[t]\ntype = irc\ndest = a.i2p\n").unwrap_err();
        assert!(matches!(err, KovriError::MissingField { field: "port", .. }));
    }

    #[test]
    fn test_bad_port_is_field_parse_error() {
        let err = parse_str("[t]\ntype = client\ndest = a.i2p\nport = abc\n").unwrap_err();
        match err {
            KovriError::FieldParse { tunnel, field, .. } => {
                assert_eq!(tunnel, "t");
                assert_eq!(field, "port");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err =
            parse_str("[t]\ntype = server\nport = 1\nkeys = k\nin_port = 65536\n").unwrap_err();
        assert!(matches!(err, KovriError::FieldParse { field: "in_port", .. }));
    }

    #[test]
    fn test_key_outside_section_is_rejected() {
        let err = parse_str("type = client\n").unwrap_err();
        assert!(matches!(err, KovriError::Syntax { .. }));
    }

    #[test]
    fn test_repeated_section_names_give_separate_tunnels() {
        let tunnels = parse_str(
            "[a]\ntype = client\ndest = x.i2p\nport = 1\n\n\
             [a]\ntype = client\ndest = y.i2p\nport = 2\n",
        )
        .unwrap();
        let parsed: Vec<_> = tunnels
            .iter()
            .map(|t| (t.name.as_str(), t.dest.as_deref(), t.port))
            .collect();
        assert_eq!(
            parsed,
            vec![("a", Some("x.i2p"), 1), ("a", Some("y.i2p"), 2)]
        );
    }

    #[test]
    fn test_repeated_key_is_rejected() {
        let err = parse_str(
            "[srv]\ntype = server\nport = 1\nkeys = k.dat\nkeys = other.dat\n",
        )
        .unwrap_err();
        match err {
            KovriError::Syntax { message, .. } => {
                assert!(message.contains("'keys'"), "{message}");
                assert!(message.contains("srv"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_windows_key_path_is_kept() {
        let tunnels =
            parse_str("[srv]\ntype = server\nport = 1\nkeys = C:\\kovri\\keys.dat\n").unwrap();
        assert_eq!(tunnels[0].keys.as_deref(), Some(r"C:\kovri\keys.dat"));
    }

    #[test]
    fn test_load_names_file_in_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunnels.conf");
        fs::write(&path, "[x]\ntype = socks\nport = 1\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("tunnels.conf"));

        fs::write(&path, "[x]\ntype = client\ndest = a.i2p\nport = 1\n").unwrap();
        assert_eq!(load(&path).unwrap().len(), 1);

        let err = load(&dir.path().join("missing.conf")).unwrap_err();
        assert!(matches!(err, KovriError::Io { .. }));
    }

    #[test]
    fn test_shipped_tunnels_file() {
        let tunnels = parse_str(include_str!("../pkg/tunnels.conf")).unwrap();
        let kinds: Vec<_> = tunnels.iter().map(|t| (t.name.as_str(), t.kind)).collect();
        assert_eq!(
            kinds,
            vec![("IRC", TunnelKind::Irc), ("MyServer", TunnelKind::Server)]
        );
        assert_eq!(tunnels[0].dest_port, Some(6667));
        assert_eq!(tunnels[1].keys.as_deref(), Some("server-keys.dat"));
    }

    #[test]
    fn test_empty_file_has_no_tunnels() {
        assert!(parse_str("").unwrap().is_empty());
    }
}
