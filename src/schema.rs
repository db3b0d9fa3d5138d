use std::{fmt, ops::RangeInclusive, sync::OnceLock};

use clap::{Arg, ArgAction, Command};
use rand::Rng;

use crate::paths::DataDir;

/// Range the default listening port is drawn from when none is configured
pub const RANDOM_PORT_RANGE: RangeInclusive<u16> = 9111..=30777;

pub const HELP: &str = "help";
pub const HELP_WITH: &str = "help-with";

/// Random listening port, drawn once per process
pub fn default_port() -> u16 {
    static PORT: OnceLock<u16> = OnceLock::new();
    *PORT.get_or_init(|| rand::thread_rng().gen_range(RANDOM_PORT_RANGE))
}

/// Logical group an option is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionGroup {
    System,
    Network,
    Client,
}

impl OptionGroup {
    pub const ALL: [OptionGroup; 3] = [
        OptionGroup::System,
        OptionGroup::Network,
        OptionGroup::Client,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OptionGroup::System => "system",
            OptionGroup::Network => "network",
            OptionGroup::Client => "client",
        }
    }
}

/// Value type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Int,
    Bool,
    StringList,
}

/// A typed option value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::String(s) => f.write_str(s),
            OptionValue::Int(i) => write!(f, "{i}"),
            OptionValue::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            OptionValue::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::String(_) => OptionKind::String,
            OptionValue::Int(_) => OptionKind::Int,
            OptionValue::Bool(_) => OptionKind::Bool,
            OptionValue::List(_) => OptionKind::StringList,
        }
    }
}

impl OptionKind {
    fn value_name(self) -> &'static str {
        match self {
            OptionKind::String => "STRING",
            OptionKind::Int => "INT",
            OptionKind::Bool => "BOOL",
            OptionKind::StringList => "LIST",
        }
    }

    /// Convert raw tokens into a value of this kind.
    ///
    /// Scalar kinds use the last token; lists keep every token.
    pub fn convert(self, mut tokens: Vec<String>) -> Result<OptionValue, String> {
        if self == OptionKind::StringList {
            return Ok(OptionValue::List(tokens));
        }
        let raw = tokens.pop().ok_or_else(|| "missing value".to_string())?;
        self.convert_scalar(raw.trim())
    }

    fn convert_scalar(self, raw: &str) -> Result<OptionValue, String> {
        match self {
            OptionKind::String => Ok(OptionValue::String(raw.to_string())),
            OptionKind::Int => raw
                .parse::<i64>()
                .map(OptionValue::Int)
                .map_err(|e| format!("'{raw}' is not an integer: {e}")),
            OptionKind::Bool => parse_bool(raw).map(OptionValue::Bool),
            OptionKind::StringList => Ok(OptionValue::List(vec![raw.to_string()])),
        }
    }

    /// Convert a single config-file value into a value of this kind
    pub fn convert_file_value(self, raw: &str) -> Result<OptionValue, String> {
        let tokens = match self {
            OptionKind::StringList => raw
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            _ => vec![raw.to_string()],
        };
        self.convert(tokens)
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("'{raw}' is not a boolean (expected 1 or 0)")),
    }
}

/// Declaration of one recognised option
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub short: Option<char>,
    pub kind: OptionKind,
    pub default: OptionValue,
    pub multitoken: bool,
    pub group: OptionGroup,
    pub help: &'static str,
}

impl OptionSpec {
    fn new(group: OptionGroup, name: &'static str, default: OptionValue) -> Self {
        let kind = default.kind();
        Self {
            name,
            short: None,
            kind,
            default,
            multitoken: kind == OptionKind::StringList,
            group,
            help: "",
        }
    }

    fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    fn help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    fn arg(&self) -> Arg {
        let mut arg = Arg::new(self.name)
            .long(self.name)
            .value_name(self.kind.value_name())
            .help(self.help);
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        match self.kind {
            // A bare bool flag means "enabled"
            OptionKind::Bool => arg
                .num_args(0..=1)
                .default_missing_value("1")
                .action(ArgAction::Set),
            OptionKind::Int | OptionKind::String => arg.num_args(1).action(ArgAction::Set),
            OptionKind::StringList if self.multitoken => {
                arg.num_args(1..).action(ArgAction::Append)
            }
            OptionKind::StringList => arg.num_args(1).action(ArgAction::Append),
        }
    }
}

fn string(group: OptionGroup, name: &'static str, default: &str) -> OptionSpec {
    OptionSpec::new(group, name, OptionValue::String(default.to_string()))
}

fn int(group: OptionGroup, name: &'static str, default: i64) -> OptionSpec {
    OptionSpec::new(group, name, OptionValue::Int(default))
}

fn boolean(group: OptionGroup, name: &'static str, default: bool) -> OptionSpec {
    OptionSpec::new(group, name, OptionValue::Bool(default))
}

/// The full set of options accepted on the command line and in kovri.conf
#[derive(Debug, Clone)]
pub struct Schema {
    options: Vec<OptionSpec>,
}

impl Schema {
    /// Declare every option, taking default locations from `data_dir`
    pub fn new(data_dir: &DataDir) -> Self {
        use OptionGroup::{Client, Network, System};

        let options = vec![
            // system
            string(System, "host", "127.0.0.1")
                .help("The external IP (deprecated).\nDefault: external interface"),
            int(System, "port", i64::from(default_port()))
                .short('p')
                .help("Port to listen on.\nDefault: random (then saved to router.info)"),
            string(System, "data-dir", &data_dir.root().to_string_lossy())
                .help("Directory holding router data, config files and logs"),
            boolean(System, "daemon", false)
                .short('d')
                .help("Enable or disable daemon mode\n1 = enabled, 0 = disabled"),
            string(System, "service", "")
                .short('s')
                .help("Windows only:\n--service install  # installs service\n--service remove   # removes service"),
            boolean(System, "log-to-console", true)
                .help("Enable or disable console log output\n1 = enabled, 0 = disabled"),
            boolean(System, "log-to-file", true)
                .help("Enable or disable logging to file\n1 = enabled, 0 = disabled"),
            string(System, "log-file-name", "")
                .help("Sets log filename\nDefault (with daily rotation): <data-dir>/logs/kovri.<date>.log"),
            int(System, "log-level", 3).help(
                "Log level threshold\n0 = fatal\n1 = error fatal\n2 = warn error fatal\n\
                 3 = info warn error fatal\n4 = debug info warn error fatal\n\
                 5 = trace debug info warn error fatal",
            ),
            OptionSpec::new(System, "log-levels", OptionValue::List(Vec::new())).help(
                "Log levels to report, overrides log-level.\n\
                 Options: fatal error warn info debug trace\n\
                 Example: --log-levels warn error  # warn/error only",
            ),
            string(System, "kovriconf", "")
                .short('c')
                .help("Config file; options given on the command line take precedence.\nDefault: <data-dir>/kovri.conf"),
            string(System, "tunnelsconf", "")
                .short('t')
                .help("Tunnels config file\nDefault: <data-dir>/tunnels.conf"),
            // network
            boolean(Network, "v6", false)
                .short('6')
                .help("1 to enable IPv6\n1 = enabled, 0 = disabled"),
            boolean(Network, "floodfill", false)
                .short('f')
                .help("1 to enable router as floodfill\n1 = enabled, 0 = disabled"),
            string(Network, "bandwidth", "L")
                .short('b')
                .help("L if bandwidth is limited to 32Kbs/sec, O if not\nAlways O if floodfill"),
            boolean(Network, "enable-ssu", true)
                .help("Enable SSU transport\n1 = enabled, 0 = disabled"),
            boolean(Network, "enable-ntcp", true)
                .help("Enable NTCP transport\n1 = enabled, 0 = disabled"),
            string(Network, "reseed-from", "")
                .short('r')
                .help("File or URL from which to reseed"),
            boolean(Network, "reseed-skip-ssl-check", false)
                .help("Skip SSL check for reseed host. Useful for custom reseed servers"),
            // client
            int(Client, "httpproxyport", 4446).help("The HTTP Proxy port to listen on"),
            string(Client, "httpproxyaddress", "127.0.0.1")
                .help("The HTTP Proxy address to listen on"),
            int(Client, "socksproxyport", 4447).help("The SOCKS Proxy port to listen on"),
            string(Client, "socksproxyaddress", "127.0.0.1")
                .help("The SOCKS Proxy address to listen on"),
            string(Client, "proxykeys", "")
                .help("Optional keys file for proxy's local destination"),
            int(Client, "i2pcontrolport", 0)
                .help("Port of I2P control service (usually 7650)\nI2PControl is disabled if not specified"),
            string(Client, "i2pcontroladdress", "127.0.0.1")
                .help("Address of I2P control service"),
            string(Client, "i2pcontrolpassword", "itoopie").help("I2P control service password"),
        ];

        Self { options }
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|spec| spec.name == name)
    }

    pub fn group(&self, group: OptionGroup) -> impl Iterator<Item = &OptionSpec> {
        self.options.iter().filter(move |spec| spec.group == group)
    }

    /// Command-line parser covering the help group and every option group
    pub fn command(&self) -> Command {
        let mut cmd = Command::new("kovri")
            .about("The Kovri I2P router")
            .disable_help_flag(true)
            .disable_version_flag(true)
            .arg(Arg::new(HELP).short('h').long(HELP).action(ArgAction::SetTrue))
            .arg(
                Arg::new(HELP_WITH)
                    .long(HELP_WITH)
                    .value_name("TOPIC")
                    .num_args(1)
                    .action(ArgAction::Set),
            );
        for spec in &self.options {
            cmd = cmd.arg(spec.arg());
        }
        cmd
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(&DataDir::default())
    }
}
