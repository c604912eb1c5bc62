// Controllers addressed by class name and method name

use crate::{Error, Reply, Request};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A named group of handler methods.
///
/// Methods are looked up by name at registration and again at dispatch. A
/// method must answer with [`Reply::Response`]; anything else is a contract
/// violation reported by the dispatcher.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    /// Names of the methods this controller answers to
    fn methods(&self) -> &[&'static str];

    /// Invoke `method` with the request
    async fn call(&self, method: &str, request: Request) -> Result<Reply, Error>;

    fn has_method(&self, method: &str) -> bool {
        self.methods().contains(&method)
    }
}

/// Controllers keyed by their fully qualified class name (`namespace::Class`).
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: Controller>(&mut self, class: impl Into<String>, controller: C) {
        self.controllers.insert(class.into(), Arc::new(controller));
    }

    pub fn register_arc(&mut self, class: impl Into<String>, controller: Arc<dyn Controller>) {
        self.controllers.insert(class.into(), controller);
    }

    pub fn get(&self, class: &str) -> Option<&Arc<dyn Controller>> {
        self.controllers.get(class)
    }

    /// Look up `class` and check it exposes `method`.
    pub fn resolve(&self, class: &str, method: &str) -> Result<Arc<dyn Controller>, Error> {
        let controller = self
            .controllers
            .get(class)
            .ok_or_else(|| Error::TargetNotFound(format!("controller {} is not registered", class)))?;
        if !controller.has_method(method) {
            return Err(Error::TargetNotFound(format!(
                "controller {} has no method {}",
                class, method
            )));
        }
        Ok(controller.clone())
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.controllers.keys().collect();
        names.sort();
        f.debug_struct("ControllerRegistry")
            .field("controllers", &names)
            .finish()
    }
}
