use crate::manager::RuntimeManager;
use crate::CoreError;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub type SharedManager = Arc<Mutex<RuntimeManager>>;

/// Named runtime managers for a process. Callers that want one runtime per
/// process create a registry once and share it; nothing here is global.
#[derive(Default)]
pub struct SessionRegistry {
    managers: Mutex<BTreeMap<String, SharedManager>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the manager registered under `name`, creating it with `make`
    /// on first use.
    pub fn get_or_create(
        &self,
        name: &str,
        make: impl FnOnce() -> RuntimeManager,
    ) -> Result<SharedManager, CoreError> {
        let mut managers = self.managers.lock().map_err(|_| CoreError::Poisoned)?;
        let manager = managers
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(make())));
        Ok(Arc::clone(manager))
    }

    pub fn get(&self, name: &str) -> Result<Option<SharedManager>, CoreError> {
        let managers = self.managers.lock().map_err(|_| CoreError::Poisoned)?;
        Ok(managers.get(name).map(Arc::clone))
    }

    /// Unregister `name`. The manager's session, if any, is left running;
    /// call `teardown` on it first to release the backend.
    pub fn remove(&self, name: &str) -> Result<Option<SharedManager>, CoreError> {
        let mut managers = self.managers.lock().map_err(|_| CoreError::Poisoned)?;
        Ok(managers.remove(name))
    }

    pub fn names(&self) -> Result<Vec<String>, CoreError> {
        let managers = self.managers.lock().map_err(|_| CoreError::Poisoned)?;
        Ok(managers.keys().cloned().collect())
    }
}
