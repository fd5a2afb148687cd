use std::sync::Arc;

use crate::typ::Type;
use crate::util::fast_map::{FastDashMap, fast_dash_map_new};

use super::{MethodInstance, Template};

/// Concurrent map from (template, signature) to its method instance.
///
/// Lookups for the same key converge on one instance. Entries are never removed.
#[derive(Debug)]
pub struct SpecializationTable {
    instances: FastDashMap<(u64, Type), Arc<MethodInstance>>,
}

impl Default for SpecializationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecializationTable {
    pub fn new() -> Self {
        Self {
            instances: fast_dash_map_new(),
        }
    }

    pub fn get_or_create(&self, template: &Arc<Template>, signature: Type) -> Arc<MethodInstance> {
        let key = (template.id(), signature.clone());
        if let Some(found) = self.instances.get(&key) {
            return found.value().clone();
        }
        self.instances
            .entry(key)
            .or_insert_with(|| Arc::new(MethodInstance::new(template.clone(), signature)))
            .value()
            .clone()
    }

    pub fn get(&self, template: &Template, signature: &Type) -> Option<Arc<MethodInstance>> {
        self.instances
            .get(&(template.id(), signature.clone()))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
