// registry.rs - Task registry for looking up wrappers by name

use std::collections::BTreeMap;

use crate::core::{Result, TaskError};

use super::traits::Task;
use super::{
    AntsAi, ApplyTransforms, Atropos, CreateJacobianDeterminantImage, ImageMath, MultiplyImages,
    N4BiasFieldCorrection, Registration, RegistrationSyn, RegistrationSynQuick, ThresholdImage,
};

/// Name-indexed set of task wrappers.
///
/// Built on demand; there is no process-wide instance.
pub struct TaskRegistry {
    tasks: BTreeMap<String, Box<dyn Task>>,
}

impl TaskRegistry {
    /// Registry with every built-in wrapper; fails if a schema is malformed
    pub fn new() -> Result<Self> {
        let mut registry = Self::empty();

        registry.register_task(Box::new(MultiplyImages::new()?));
        registry.register_task(Box::new(CreateJacobianDeterminantImage::new()?));
        registry.register_task(Box::new(ImageMath::new()?));
        registry.register_task(Box::new(ThresholdImage::new()?));
        registry.register_task(Box::new(N4BiasFieldCorrection::new()?));
        registry.register_task(Box::new(ApplyTransforms::new()?));
        registry.register_task(Box::new(Atropos::new()?));
        registry.register_task(Box::new(AntsAi::new()?));
        registry.register_task(Box::new(Registration::new()?));
        registry.register_task(Box::new(RegistrationSyn::new()?));
        registry.register_task(Box::new(RegistrationSynQuick::new()?));

        Ok(registry)
    }

    pub fn empty() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    /// Register a task under its own name
    pub fn register_task(&mut self, task: Box<dyn Task>) {
        self.tasks.insert(task.name().to_string(), task);
    }

    /// Get a task by name
    pub fn get_task(&self, name: &str) -> Option<&dyn Task> {
        self.tasks.get(name).map(|t| t.as_ref())
    }

    /// Like `get_task`, with an error naming the missing task
    pub fn require_task(&self, name: &str) -> Result<&dyn Task> {
        self.get_task(name).ok_or_else(|| TaskError::UnknownTask {
            name: name.to_string(),
        })
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// (name, executable, description) of every task, sorted by name
    pub fn list_tasks(&self) -> Vec<(&str, &str, &str)> {
        self.tasks
            .values()
            .map(|t| (t.name(), t.executable(), t.description()))
            .collect()
    }

    pub fn get_task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tasks() {
        let registry = TaskRegistry::new().unwrap();
        assert_eq!(registry.get_task_names().len(), 11);
        assert!(registry.has_task("multiply_images"));
        assert_eq!(
            registry.get_task("registration_syn_quick").unwrap().executable(),
            "antsRegistrationSyNQuick.sh"
        );
        assert!(matches!(
            registry.require_task("warp_everything"),
            Err(TaskError::UnknownTask { .. })
        ));
    }
}
