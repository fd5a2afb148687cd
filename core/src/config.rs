use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing::warn;

/// Compilation setting, both process-wide and per namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilePolicy {
    #[default]
    #[serde(alias = "yes", alias = "all")]
    Default,
    #[serde(alias = "no")]
    Off,
    Min,
}

impl CompilePolicy {
    /// Combine the process-wide setting with a namespace setting.
    /// A namespace may only switch compilation further off.
    pub fn restricted_by(self, namespace: CompilePolicy) -> CompilePolicy {
        match namespace {
            CompilePolicy::Off | CompilePolicy::Min => namespace,
            CompilePolicy::Default => self,
        }
    }

    /// Whether per-signature inference and codegen may run.
    pub fn allows_specialization(self) -> bool {
        self == CompilePolicy::Default
    }

    /// Whether any native code may be generated (including generic wrappers).
    pub fn allows_codegen(self) -> bool {
        self != CompilePolicy::Off
    }
}

impl FromStr for CompilePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" | "yes" | "all" => Ok(CompilePolicy::Default),
            "off" | "no" => Ok(CompilePolicy::Off),
            "min" => Ok(CompilePolicy::Min),
            other => Err(anyhow!("unknown compile setting '{}'", other)),
        }
    }
}

impl fmt::Display for CompilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilePolicy::Default => write!(f, "default"),
            CompilePolicy::Off => write!(f, "off"),
            CompilePolicy::Min => write!(f, "min"),
        }
    }
}

pub const ENV_COMPILE: &str = "OCRT_COMPILE";
pub const ENV_TRACE_COMPILE: &str = "OCRT_TRACE_COMPILE";
pub const ENV_MAX_NATIVE_NODES: &str = "OCRT_MAX_NATIVE_NODES";

/// Configures an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Process-wide compile setting.
    pub compile: CompilePolicy,
    /// File that receives one JSON line per freshly compiled specialization.
    pub trace_compile: Option<PathBuf>,
    /// Bodies with more expression nodes than this are left to the interpreter.
    pub max_native_body_nodes: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            compile: CompilePolicy::Default,
            trace_compile: None,
            max_native_body_nodes: 4096,
        }
    }
}

impl RuntimeOptions {
    /// Read options from `OCRT_*` environment variables, keeping defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(raw) = lookup(ENV_COMPILE) {
            match raw.parse() {
                Ok(policy) => options.compile = policy,
                Err(err) => warn!(target: "ocrt::config", %err, "ignoring {}", ENV_COMPILE),
            }
        }
        if let Some(raw) = lookup(ENV_TRACE_COMPILE)
            && !raw.trim().is_empty()
        {
            options.trace_compile = Some(PathBuf::from(raw.trim()));
        }
        if let Some(raw) = lookup(ENV_MAX_NATIVE_NODES) {
            match raw.trim().parse() {
                Ok(limit) => options.max_native_body_nodes = limit,
                Err(err) => warn!(target: "ocrt::config", %err, "ignoring {}", ENV_MAX_NATIVE_NODES),
            }
        }
        options
    }

    pub fn from_toml_str(src: &str) -> Result<Self> {
        toml::from_str(src).map_err(|e| anyhow!("invalid runtime options: {}", e))
    }

    pub fn with_compile(mut self, compile: CompilePolicy) -> Self {
        self.compile = compile;
        self
    }

    pub fn with_trace_compile(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_compile = Some(path.into());
        self
    }

    pub fn with_max_native_body_nodes(mut self, limit: usize) -> Self {
        self.max_native_body_nodes = limit;
        self
    }
}
