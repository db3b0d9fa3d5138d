/// Semantic keys of the tunnel definitions file.
///
/// `Type`, `Address`, `Port` and `Keys` are shared by every tunnel; `Client`,
/// `Irc`, `Server` and `Http` are the accepted values of `type`; the rest are
/// specific to one tunnel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Type,
    Client,
    Irc,
    Server,
    Http,
    Dest,
    DestPort,
    InPort,
    Whitelist,
    Blacklist,
    Address,
    Port,
    Keys,
}

impl Key {
    /// Every key, in declaration order
    pub const ALL: [Key; 13] = [
        Key::Type,
        Key::Client,
        Key::Irc,
        Key::Server,
        Key::Http,
        Key::Dest,
        Key::DestPort,
        Key::InPort,
        Key::Whitelist,
        Key::Blacklist,
        Key::Address,
        Key::Port,
        Key::Keys,
    ];

    /// Textual form used in the tunnels file
    pub fn as_str(self) -> &'static str {
        match self {
            // Section types
            Key::Type => "type",
            Key::Client => "client",
            Key::Irc => "irc",
            Key::Server => "server",
            Key::Http => "http",
            // Client tunnels
            Key::Dest => "dest",
            Key::DestPort => "dest_port",
            // Server tunnels
            Key::InPort => "in_port",
            Key::Whitelist => "white_list",
            Key::Blacklist => "black_list",
            // Any tunnel
            Key::Address => "address",
            Key::Port => "port",
            Key::Keys => "keys",
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
