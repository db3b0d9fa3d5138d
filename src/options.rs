//! Command-line and kovri.conf merging.
//!
//! Precedence, highest first:
//! 1. Command-line arguments
//! 2. The kovri.conf configuration file
//! 3. Built-in defaults

use std::{
    collections::{BTreeMap, HashMap, hash_map::Entry},
    ffi::OsString,
    path::{Path, PathBuf},
};

use clap::ArgMatches;
use tracing::debug;

use crate::{
    error::{KovriError, KovriResult},
    ini,
    paths::DataDir,
    schema::{HELP, HELP_WITH, OptionValue, Schema},
    usage::{self, HelpTopic},
};

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    CommandLine,
    ConfigFile,
    Default,
}

/// Final value of one option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOption {
    pub value: OptionValue,
    pub source: ValueSource,
}

/// Every option of the schema with exactly one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    values: BTreeMap<&'static str, ResolvedOption>,
    config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn get(&self, name: &str) -> Option<&ResolvedOption> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ResolvedOption)> {
        self.values.iter().map(|(name, opt)| (*name, opt))
    }

    /// The configuration file that was merged, if any
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    fn lookup(&self, name: &str) -> KovriResult<&ResolvedOption> {
        self.get(name)
            .ok_or_else(|| KovriError::Config(format!("unknown option '{name}'")))
    }

    pub fn source(&self, name: &str) -> KovriResult<ValueSource> {
        Ok(self.lookup(name)?.source)
    }

    /// True when neither the command line nor the config file set `name`
    pub fn is_defaulted(&self, name: &str) -> KovriResult<bool> {
        Ok(self.source(name)? == ValueSource::Default)
    }

    pub fn string(&self, name: &str) -> KovriResult<&str> {
        match &self.lookup(name)?.value {
            OptionValue::String(s) => Ok(s),
            other => Err(mismatch(name, "a string", other)),
        }
    }

    pub fn int(&self, name: &str) -> KovriResult<i64> {
        match &self.lookup(name)?.value {
            OptionValue::Int(i) => Ok(*i),
            other => Err(mismatch(name, "an integer", other)),
        }
    }

    pub fn boolean(&self, name: &str) -> KovriResult<bool> {
        match &self.lookup(name)?.value {
            OptionValue::Bool(b) => Ok(*b),
            other => Err(mismatch(name, "a boolean", other)),
        }
    }

    pub fn list(&self, name: &str) -> KovriResult<&[String]> {
        match &self.lookup(name)?.value {
            OptionValue::List(items) => Ok(items),
            other => Err(mismatch(name, "a list", other)),
        }
    }

    /// Data directory layout selected by `data-dir`
    pub fn data_dir(&self) -> KovriResult<DataDir> {
        Ok(DataDir::new(self.string("data-dir")?))
    }

    /// `tunnelsconf` when given, else `<data-dir>/tunnels.conf`
    pub fn tunnels_file(&self) -> KovriResult<PathBuf> {
        match self.string("tunnelsconf")? {
            "" => Ok(self.data_dir()?.tunnels_file()),
            path => Ok(PathBuf::from(path)),
        }
    }
}

fn mismatch(name: &str, expected: &str, found: &OptionValue) -> KovriError {
    KovriError::Config(format!("option '{name}' is not {expected} (found '{found}')"))
}

/// Outcome of option resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Continue startup with these options
    Run(ResolvedConfig),
    /// Print this text and stop without error
    Exit(String),
}

/// Options given explicitly on the command line
struct CommandLine {
    values: HashMap<&'static str, OptionValue>,
    help: bool,
    help_with: Option<String>,
}

/// Merges command-line arguments and kovri.conf against a [`Schema`]
#[derive(Debug, Clone)]
pub struct OptionResolver {
    schema: Schema,
}

impl OptionResolver {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Resolve `args` (including the binary name) against the config file at
    /// `default_config`, unless `--kovriconf` names another one
    pub fn resolve<I, T>(&self, args: I, default_config: &Path) -> KovriResult<Resolution>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = self.parse_command_line(args)?;
        self.finish(cli, default_config)
    }

    /// Like [`resolve`](Self::resolve), with the config file defaulting to
    /// `<data-dir>/kovri.conf`
    pub fn resolve_default<I, T>(&self, args: I) -> KovriResult<Resolution>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = self.parse_command_line(args)?;
        let data_dir = match cli.values.get("data-dir") {
            Some(OptionValue::String(dir)) => DataDir::new(dir),
            _ => match self.schema.get("data-dir").map(|spec| &spec.default) {
                Some(OptionValue::String(dir)) => DataDir::new(dir),
                _ => DataDir::default(),
            },
        };
        self.finish(cli, &data_dir.config_file())
    }

    fn finish(&self, cli: CommandLine, default_config: &Path) -> KovriResult<Resolution> {
        if let Some(text) = self.help_text(&cli) {
            return Ok(Resolution::Exit(text));
        }

        let config_file = match cli.values.get("kovriconf") {
            Some(OptionValue::String(path)) if !path.is_empty() => PathBuf::from(path),
            _ => default_config.to_path_buf(),
        };
        let file_values = self.read_config_file(&config_file)?;

        Ok(Resolution::Run(self.merge(cli.values, file_values, Some(config_file))))
    }

    fn help_text(&self, cli: &CommandLine) -> Option<String> {
        if cli.help {
            return Some(usage::overview());
        }
        cli.help_with
            .as_deref()
            .map(|topic| usage::render_topic(&self.schema, &HelpTopic::parse(topic)))
    }

    fn parse_command_line<I, T>(&self, args: I) -> KovriResult<CommandLine>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.schema.command().try_get_matches_from(args)?;

        let mut values = HashMap::new();
        for spec in self.schema.options() {
            let Some(tokens) = raw_values(&matches, spec.name) else {
                continue;
            };
            let value = spec
                .kind
                .convert(tokens)
                .map_err(|e| KovriError::Usage(format!("invalid value for --{}: {e}", spec.name)))?;
            values.insert(spec.name, value);
        }

        Ok(CommandLine {
            values,
            help: matches.get_flag(HELP),
            help_with: matches.get_one::<String>(HELP_WITH).cloned(),
        })
    }

    fn read_config_file(&self, path: &Path) -> KovriResult<HashMap<&'static str, OptionValue>> {
        let document = ini::read(path)?;
        debug!("Read configuration file {}", path.display());

        if let Some(section) = document.sections.first() {
            return Err(KovriError::Config(format!(
                "unexpected section [{}] in {}",
                section.name,
                path.display()
            )));
        }

        let mut values = HashMap::new();
        for (key, raw) in document.globals {
            let spec = self.schema.get(&key).ok_or_else(|| {
                KovriError::Config(format!("unrecognised option '{key}' in {}", path.display()))
            })?;
            let value = spec.kind.convert_file_value(&raw).map_err(|e| {
                KovriError::Config(format!("invalid value for '{key}' in {}: {e}", path.display()))
            })?;
            match values.entry(spec.name) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                // Repeated lines of a multitoken option accumulate
                Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                    (OptionValue::List(items), OptionValue::List(more)) if spec.multitoken => {
                        items.extend(more)
                    }
                    _ => {
                        return Err(KovriError::Config(format!(
                            "option '{key}' is set more than once in {}",
                            path.display()
                        )));
                    }
                },
            }
        }
        Ok(values)
    }

    fn merge(
        &self,
        mut cli: HashMap<&'static str, OptionValue>,
        mut file: HashMap<&'static str, OptionValue>,
        config_file: Option<PathBuf>,
    ) -> ResolvedConfig {
        let values = self
            .schema
            .options()
            .iter()
            .map(|spec| {
                let resolved = if let Some(value) = cli.remove(spec.name) {
                    ResolvedOption {
                        value,
                        source: ValueSource::CommandLine,
                    }
                } else if let Some(value) = file.remove(spec.name) {
                    ResolvedOption {
                        value,
                        source: ValueSource::ConfigFile,
                    }
                } else {
                    ResolvedOption {
                        value: spec.default.clone(),
                        source: ValueSource::Default,
                    }
                };
                (spec.name, resolved)
            })
            .collect();

        ResolvedConfig {
            values,
            config_file,
        }
    }
}

impl Default for OptionResolver {
    fn default() -> Self {
        Self::new(Schema::default())
    }
}

fn raw_values(matches: &ArgMatches, name: &str) -> Option<Vec<String>> {
    matches
        .get_many::<String>(name)
        .map(|values| values.cloned().collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn resolver(dir: &TempDir) -> OptionResolver {
        OptionResolver::new(Schema::new(&DataDir::new(dir.path())))
    }

    fn write_conf(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("kovri.conf");
        fs::write(&path, content).unwrap();
        path
    }

    fn run(resolution: Resolution) -> ResolvedConfig {
        match resolution {
            Resolution::Run(config) => config,
            Resolution::Exit(text) => panic!("unexpected exit: {text}"),
        }
    }

    #[test]
    fn test_defaults_when_unset() {
        let dir = TempDir::new().unwrap();
        let conf = write_conf(&dir, "");
        let resolver = resolver(&dir);
        let config = run(resolver.resolve(["kovri"], &conf).unwrap());

        for spec in resolver.schema().options() {
            let resolved = config.get(spec.name).unwrap();
            assert_eq!(resolved.value, spec.default, "{}", spec.name);
            assert!(config.is_defaulted(spec.name).unwrap());
            assert_eq!(resolved.value.kind(), spec.kind);
        }
        assert_eq!(config.string("host").unwrap(), "127.0.0.1");
        assert_eq!(config.int("httpproxyport").unwrap(), 4446);
        assert!(config.boolean("log-to-console").unwrap());
        assert!(config.list("log-levels").unwrap().is_empty());
    }

    #[test]
    fn test_command_line_beats_file() {
        let dir = TempDir::new().unwrap();
        let conf = write_conf(&dir, "host = 10.0.0.1\nport = 20000\nfloodfill = 1\n");
        let config = run(resolver(&dir)
            .resolve(["kovri", "--host", "192.168.1.2", "-p", "12345"], &conf)
            .unwrap());

        assert_eq!(config.string("host").unwrap(), "192.168.1.2");
        assert_eq!(config.int("port").unwrap(), 12345);
        assert_eq!(config.source("port").unwrap(), ValueSource::CommandLine);
        assert!(config.boolean("floodfill").unwrap());
        assert_eq!(config.source("floodfill").unwrap(), ValueSource::ConfigFile);
        assert!(config.is_defaulted("bandwidth").unwrap());
        assert_eq!(config.config_file(), Some(conf.as_path()));
    }

    #[test]
    fn test_bool_flags_and_lists() {
        let dir = TempDir::new().unwrap();
        let conf = write_conf(&dir, "log-levels = info, warn\n");
        let config = run(resolver(&dir)
            .resolve(["kovri", "-d", "--enable-ssu", "0", "-6"], &conf)
            .unwrap());

        assert!(config.boolean("daemon").unwrap());
        assert!(!config.boolean("enable-ssu").unwrap());
        assert!(config.boolean("v6").unwrap());
        assert_eq!(config.list("log-levels").unwrap(), ["info", "warn"]);

        let config = run(resolver(&dir)
            .resolve(["kovri", "--log-levels", "warn", "error"], &conf)
            .unwrap());
        assert_eq!(config.list("log-levels").unwrap(), ["warn", "error"]);
    }

    #[test]
    fn test_unknown_flag_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let conf = write_conf(&dir, "");
        let err = resolver(&dir).resolve(["kovri", "--bogus"], &conf).unwrap_err();
        assert!(matches!(err, KovriError::Usage(_)));

        let err = resolver(&dir)
            .resolve(["kovri", "--port", "high"], &conf)
            .unwrap_err();
        assert!(matches!(err, KovriError::Usage(_)));
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.conf");
        let err = resolver(&dir).resolve(["kovri"], &missing).unwrap_err();
        match err {
            KovriError::Io { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_kovriconf_overrides_default_path() {
        let dir = TempDir::new().unwrap();
        let custom = dir.path().join("custom.conf");
        fs::write(&custom, "bandwidth = O\n").unwrap();
        let missing = dir.path().join("nope.conf");
        let custom_arg = custom.to_string_lossy().to_string();

        let config = run(resolver(&dir)
            .resolve(["kovri".to_string(), "-c".to_string(), custom_arg], &missing)
            .unwrap());
        assert_eq!(config.string("bandwidth").unwrap(), "O");
    }

    #[test]
    fn test_resolve_default_reads_from_data_dir() {
        let dir = TempDir::new().unwrap();
        write_conf(&dir, "i2pcontrolport = 7650\n");
        let data_dir = dir.path().to_string_lossy().to_string();

        let config = run(OptionResolver::default()
            .resolve_default(["kovri".to_string(), "--data-dir".to_string(), data_dir])
            .unwrap());
        assert_eq!(config.int("i2pcontrolport").unwrap(), 7650);
        assert_eq!(config.tunnels_file().unwrap(), dir.path().join("tunnels.conf"));
    }

    #[test]
    fn test_bad_file_entries_are_rejected() {
        let dir = TempDir::new().unwrap();
        let conf = write_conf(&dir, "unknown-option = 1\n");
        let err = resolver(&dir).resolve(["kovri"], &conf).unwrap_err();
        assert!(matches!(err, KovriError::Config(_)));

        let conf = write_conf(&dir, "help = 1\n");
        assert!(resolver(&dir).resolve(["kovri"], &conf).is_err());

        let conf = write_conf(&dir, "daemon = perhaps\n");
        let err = resolver(&dir).resolve(["kovri"], &conf).unwrap_err();
        assert!(err.to_string().contains("daemon"));
    }

    #[test]
    fn test_repeated_file_option_is_rejected() {
        let dir = TempDir::new().unwrap();
        let conf = write_conf(&dir, "port = 1\nport = 2\n");
        let err = resolver(&dir).resolve(["kovri"], &conf).unwrap_err();
        match err {
            KovriError::Config(message) => assert!(message.contains("'port'"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_repeated_log_levels_accumulate() {
        let dir = TempDir::new().unwrap();
        let conf = write_conf(&dir, "log-levels = warn\nlog-levels = error, info\n");
        match resolver(&dir).resolve(["kovri"], &conf).unwrap() {
            Resolution::Run(options) => {
                assert_eq!(options.list("log-levels").unwrap(), ["warn", "error", "info"]);
                assert_eq!(options.source("log-levels").unwrap(), ValueSource::ConfigFile);
            }
            Resolution::Exit(text) => panic!("unexpected exit: {text}"),
        }
    }

    #[test]
    fn test_windows_paths_survive_the_file() {
        let dir = TempDir::new().unwrap();
        let conf = write_conf(&dir, "log-file-name = C:\\kovri\\logs\\kovri.log\n");
        match resolver(&dir).resolve(["kovri"], &conf).unwrap() {
            Resolution::Run(options) => assert_eq!(
                options.string("log-file-name").unwrap(),
                r"C:\kovri\logs\kovri.log"
            ),
            Resolution::Exit(text) => panic!("unexpected exit: {text}"),
        }
    }

    #[test]
    fn test_help_stops_before_reading_config() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.conf");
        let resolver = resolver(&dir);

        match resolver.resolve(["kovri", "-h"], &missing).unwrap() {
            Resolution::Exit(text) => assert!(text.contains("--help-with")),
            Resolution::Run(_) => panic!("help must stop startup"),
        }
        match resolver
            .resolve(["kovri", "--help-with", "client"], &missing)
            .unwrap()
        {
            Resolution::Exit(text) => assert!(text.contains("--httpproxyport")),
            Resolution::Run(_) => panic!("help must stop startup"),
        }
        match resolver.resolve(["kovri", "--help-with", ""], &missing).unwrap() {
            Resolution::Exit(text) => assert!(text.contains("Try using --help")),
            Resolution::Run(_) => panic!("help must stop startup"),
        }
    }

    #[test]
    fn test_shipped_config_file() {
        let dir = TempDir::new().unwrap();
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("pkg/kovri.conf");
        let config = run(resolver(&dir).resolve(["kovri"], &shipped).unwrap());
        assert_eq!(config.source("httpproxyport").unwrap(), ValueSource::ConfigFile);
        assert_eq!(config.int("log-level").unwrap(), 3);
        assert!(config.is_defaulted("port").unwrap());
    }

    #[test]
    fn test_accessor_kind_mismatch() {
        let dir = TempDir::new().unwrap();
        let conf = write_conf(&dir, "");
        let config = run(resolver(&dir).resolve(["kovri"], &conf).unwrap());
        assert!(config.int("host").is_err());
        assert!(config.string("missing").is_err());
    }
}
