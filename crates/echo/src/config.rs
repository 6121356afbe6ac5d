//! Configuration read once at startup, per SPEC_FULL.md §10.3.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" => Ok(Self::Warning),
            other => Err(format!("invalid --log_level {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: LogLevel,
    /// `--pdb`: accepted for CLI parity with the original interpreter, but
    /// since this crate has no debugger integration it only raises
    /// `log_level` to `Debug` rather than launching anything.
    pub pdb: bool,
    /// Prefix inserted into user-visible representations of built-in types
    /// (default `"e"`).
    pub e_prefix: String,
    pub echo_debug: bool,
    pub echo_dump_insts: bool,
    pub echo_dump_code: bool,
    pub debug_print_imports: bool,
    pub debug_print_bytecode_line: bool,
}

impl Config {
    #[must_use]
    pub fn from_env_and_flags(mut log_level: LogLevel, pdb: bool) -> Self {
        let env_flag = |name: &str| std::env::var(name).is_ok_and(|v| v != "0" && !v.is_empty());
        if pdb {
            log_level = LogLevel::Debug;
        }
        Self {
            log_level,
            pdb,
            e_prefix: std::env::var("E_PREFIX").unwrap_or_else(|_| "e".to_owned()),
            echo_debug: env_flag("ECHO_DEBUG") || log_level == LogLevel::Debug,
            echo_dump_insts: env_flag("ECHO_DUMP_INSTS"),
            echo_dump_code: env_flag("ECHO_DUMP_CODE"),
            debug_print_imports: env_flag("DEBUG_PRINT_IMPORTS"),
            debug_print_bytecode_line: env_flag("DEBUG_PRINT_BYTECODE_LINE"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env_and_flags(LogLevel::Warning, false)
    }
}
