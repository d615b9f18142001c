use std::sync::LazyLock;

/// Process-wide defaults, read once from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct VmConfig {
    /// Default limit on executed instructions, `u64::MAX` means no limit.
    pub op_limit: u64,
    /// Log the parsed instruction listing at debug level instead of trace.
    pub dump_program: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig { op_limit: u64::MAX, dump_program: false }
    }
}

/// The trimmed value of `key`, `None` when unset or blank.
fn env_value(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_flag(key: &str, value: &str) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => true,
        "0" | "no" | "false" | "off" => false,
        _ => panic!("{key} must be a boolean (1/0, yes/no, true/false, on/off), got {value:?}"),
    }
}

/// Accepts `_` as a digit separator, `WHITESPACE_OP_LIMIT=10_000_000`.
fn parse_limit(key: &str, value: &str) -> u64 {
    value
        .replace('_', "")
        .parse()
        .unwrap_or_else(|err| panic!("{key} must be an unsigned integer, got {value:?}: {err}"))
}

fn create_config() -> VmConfig {
    let defaults = VmConfig::default();
    VmConfig {
        op_limit: env_value("WHITESPACE_OP_LIMIT")
            .map_or(defaults.op_limit, |v| parse_limit("WHITESPACE_OP_LIMIT", &v)),
        dump_program: env_value("WHITESPACE_DUMP_PROGRAM")
            .map_or(defaults.dump_program, |v| parse_flag("WHITESPACE_DUMP_PROGRAM", &v)),
    }
}

static CONFIG: LazyLock<VmConfig> = LazyLock::new(create_config);

pub fn get_config() -> &'static VmConfig {
    &CONFIG
}
