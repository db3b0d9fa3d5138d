use std::fmt::Write as _;

use crate::schema::{OptionGroup, OptionKind, OptionSpec, OptionValue, Schema};

const HELP_OVERVIEW: &str = "\
General usage:

$ kovri

A random port will be generated with each use.
You can specify a port with the --port option
or you can set one in the config file instead.

Read kovri.conf and tunnels.conf for more options

Help with a specific option group:

  --help-with all | system | network | client

Examples:

List all options:
$ kovri --help-with all

List only system-related options:
$ kovri --help-with system
";

/// What `--help-with` asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelpTopic {
    All,
    Group(OptionGroup),
    Unknown(String),
}

impl HelpTopic {
    pub fn parse(topic: &str) -> Self {
        match topic {
            "all" => HelpTopic::All,
            other => OptionGroup::ALL
                .into_iter()
                .find(|g| g.name() == other)
                .map(HelpTopic::Group)
                .unwrap_or_else(|| HelpTopic::Unknown(other.to_string())),
        }
    }
}

/// Text printed for a bare `--help`
pub fn overview() -> String {
    HELP_OVERVIEW.to_string()
}

/// Text printed for `--help-with <topic>`
pub fn render_topic(schema: &Schema, topic: &HelpTopic) -> String {
    match topic {
        HelpTopic::All => OptionGroup::ALL
            .into_iter()
            .map(|group| render_group(schema, group))
            .collect::<Vec<_>>()
            .join("\n"),
        HelpTopic::Group(group) => render_group(schema, *group),
        HelpTopic::Unknown(name) => format!("Unknown option '{name}'\nTry using --help\n"),
    }
}

/// Usage block for one option group
pub fn render_group(schema: &Schema, group: OptionGroup) -> String {
    let rows: Vec<(String, &OptionSpec)> = schema
        .group(group)
        .map(|spec| (signature(spec), spec))
        .collect();
    let width = rows.iter().map(|(sig, _)| sig.len()).max().unwrap_or(0) + 2;

    let mut out = format!("{}:\n", group.name());
    for (sig, spec) in rows {
        let mut lines = spec.help.lines();
        let _ = writeln!(out, "  {sig:<width$}{}", lines.next().unwrap_or(""));
        for line in lines {
            let _ = writeln!(out, "  {:<width$}{line}", "");
        }
    }
    out
}

fn signature(spec: &OptionSpec) -> String {
    let mut sig = match spec.short {
        Some(short) => format!("-{short} [ --{} ]", spec.name),
        None => format!("--{}", spec.name),
    };
    match spec.kind {
        OptionKind::StringList => sig.push_str(" arg ..."),
        _ => sig.push_str(" arg"),
    }
    match &spec.default {
        OptionValue::List(items) if items.is_empty() => {}
        default => {
            let _ = write!(sig, " (={default})");
        }
    }
    sig
}
