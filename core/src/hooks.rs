use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::method::MethodInstance;

/// Notified once per method instance that was freshly compiled.
pub trait PrecompileHook: Send + Sync {
    fn record(&self, instance: &MethodInstance);
}

/// One compiled specialization, as written to the trace file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecompileRecord {
    pub template: String,
    pub namespace: String,
    pub signature: String,
}

impl PrecompileRecord {
    pub fn of(instance: &MethodInstance) -> Self {
        let template = instance.template();
        Self {
            template: template.name().to_string(),
            namespace: template.namespace().name().to_string(),
            signature: instance.signature().to_string(),
        }
    }
}

/// Collects precompile records and, when given a path, appends each as a JSON
/// line to that file.
#[derive(Debug, Default)]
pub struct TraceCompile {
    path: Option<PathBuf>,
    records: Mutex<Vec<PrecompileRecord>>,
}

impl TraceCompile {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn records(&self) -> Vec<PrecompileRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn append(path: &Path, record: &PrecompileRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl PrecompileHook for TraceCompile {
    fn record(&self, instance: &MethodInstance) {
        let record = PrecompileRecord::of(instance);
        debug!(
            target: "ocrt::hooks",
            template = %record.template,
            signature = %record.signature,
            "precompile record"
        );
        if let Some(path) = &self.path
            && let Err(err) = Self::append(path, &record)
        {
            warn!(target: "ocrt::hooks", path = %path.display(), %err, "failed to write precompile record");
        }
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{CodeBody, Expr};
    use crate::method::{Namespace, Template};
    use crate::typ::Type;
    use std::sync::Arc;

    fn instance() -> MethodInstance {
        let t = Arc::new(Template::new(Namespace::new("Demo"), "double", 2, false, CodeBody::new(Expr::slot(1))));
        MethodInstance::new(t, Type::tuple([Type::Nil, Type::Int]))
    }

    #[test]
    fn records_are_kept_in_memory_without_a_path() {
        let hook = TraceCompile::default();
        hook.record(&instance());
        let records = hook.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].template, "double");
        assert_eq!(records[0].namespace, "Demo");
        assert_eq!(records[0].signature, "Tuple{Nil, Int}");
    }

    #[test]
    fn unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let hook = TraceCompile::new(Some(dir.path().join("missing").join("trace.jsonl")));
        hook.record(&instance());
        assert_eq!(hook.records().len(), 1);
    }
}
