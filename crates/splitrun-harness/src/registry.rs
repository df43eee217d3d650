//! Test registry - explicit mapping from case names to executables

use crate::case::{CaseContext, CaseError, Executable, FnCase};
use crate::discovery::{DiscoveredCase, Discovery};
use crate::error::{HarnessError, HarnessResult};
use crate::pattern::TestFilter;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A case known to the registry
#[derive(Clone)]
pub struct RegisteredCase {
    pub name: String,
    /// Source file, for discovered cases
    pub file: Option<PathBuf>,
    pub executable: Arc<dyn Executable>,
}

impl fmt::Debug for RegisteredCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCase")
            .field("name", &self.name)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

/// All cases of a project, ordered by name
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    cases: BTreeMap<String, RegisteredCase>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executable under a name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        executable: impl Executable + 'static,
    ) -> HarnessResult<()> {
        self.insert(name.into(), None, Arc::new(executable))
    }

    /// Register a closure as a case
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> HarnessResult<()>
    where
        F: Fn(&mut CaseContext) -> Result<(), CaseError> + Send + Sync + 'static,
    {
        self.register(name, FnCase::new(f))
    }

    /// Register every discovered case, skipping names already taken
    ///
    /// Returns the names that collided with an existing registration.
    pub fn extend_discovered<F>(&mut self, discovery: &Discovery, mut factory: F) -> Vec<String>
    where
        F: FnMut(&DiscoveredCase) -> Arc<dyn Executable>,
    {
        let mut collisions = Vec::new();
        for case in &discovery.cases {
            if self.contains(&case.name) {
                collisions.push(case.name.clone());
                continue;
            }
            let executable = factory(case);
            self.cases.insert(
                case.name.clone(),
                RegisteredCase {
                    name: case.name.clone(),
                    file: Some(case.file.clone()),
                    executable,
                },
            );
        }
        collisions
    }

    fn insert(
        &mut self,
        name: String,
        file: Option<PathBuf>,
        executable: Arc<dyn Executable>,
    ) -> HarnessResult<()> {
        if name.trim().is_empty() {
            return Err(HarnessError::InvalidCaseName(name));
        }
        if self.cases.contains_key(&name) {
            return Err(HarnessError::DuplicateCase(name));
        }
        self.cases.insert(
            name.clone(),
            RegisteredCase {
                name,
                file,
                executable,
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cases.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredCase> {
        self.cases.get(name)
    }

    /// Every case name, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cases.keys().map(String::as_str)
    }

    pub fn cases(&self) -> impl Iterator<Item = &RegisteredCase> {
        self.cases.values()
    }

    /// Cases selected by a filter, in name order
    pub fn select(&self, filter: &TestFilter) -> Vec<&RegisteredCase> {
        self.cases
            .values()
            .filter(|case| filter.matches(&case.name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
