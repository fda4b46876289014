//! Module registry and loading.
//!
//! # Responsibilities
//! - Map module names to descriptors (class descriptor or factory)
//! - Load module sources at most once per class (memoized loader)
//! - Instantiate and initialize the module for a request
//!
//! # Design Decisions
//! - Descriptor kind is fixed at registration time (closed enum)
//! - Loading is an injected capability, not global state
//! - Relative source paths resolve against the loader's base directory

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ModuleConfig;
use crate::mvc::di::Di;
use crate::mvc::error::ConfigurationError;

/// Class name used when a descriptor leaves it empty.
pub const DEFAULT_MODULE_CLASS: &str = "Module";

/// Per-module initialization hooks.
pub trait ModuleDefinition: Send {
    /// Register class loaders for the module. Runs before `register_services`.
    fn register_autoloaders(&self, _di: &mut Di) {}

    /// Register the module's services (controllers, view, shared values).
    fn register_services(&self, di: &mut Di);
}

/// Descriptor pointing at a module class, optionally with its source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    pub class_name: String,
    pub path: Option<PathBuf>,
}

type FactoryFn = dyn Fn(&mut Di) -> Box<dyn ModuleDefinition> + Send + Sync;

/// How a module is obtained.
#[derive(Clone)]
pub enum ModuleDescriptor {
    Class(ClassDescriptor),
    Factory(Arc<FactoryFn>),
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleDescriptor::Class(c) => f.debug_tuple("Class").field(c).finish(),
            ModuleDescriptor::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Loads module sources.
pub trait ModuleLoader: Send + Sync {
    /// Whether `class` has already been loaded.
    fn is_loaded(&self, class: &str) -> bool;

    /// Load `path` for `class` unless already loaded.
    fn ensure_loaded(&self, class: &str, path: &Path) -> Result<(), ConfigurationError>;
}

/// Loader that checks module sources on disk and remembers loaded classes.
#[derive(Debug, Default)]
pub struct FileModuleLoader {
    base_dir: Option<PathBuf>,
    loaded: DashMap<String, PathBuf>,
}

impl FileModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative module paths against `dir`.
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
            loaded: DashMap::new(),
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ModuleLoader for FileModuleLoader {
    fn is_loaded(&self, class: &str) -> bool {
        self.loaded.contains_key(class)
    }

    fn ensure_loaded(&self, class: &str, path: &Path) -> Result<(), ConfigurationError> {
        if self.is_loaded(class) {
            return Ok(());
        }

        let resolved = self.resolve(path);
        if !resolved.exists() {
            return Err(ConfigurationError::ModulePathMissing { path: resolved });
        }

        tracing::info!(class = %class, path = ?resolved, "Module source loaded");
        self.loaded.entry(class.to_string()).or_insert(resolved);
        Ok(())
    }
}

/// Name → descriptor map. Read-only once the application starts serving.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, ModuleDescriptor>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(modules: &[ModuleConfig]) -> Self {
        let mut registry = Self::new();
        for m in modules {
            registry.register_class(&m.name, m.class_name.as_deref().unwrap_or(""), m.path.clone());
        }
        registry
    }

    pub fn register_class(
        &mut self,
        name: &str,
        class_name: &str,
        path: Option<PathBuf>,
    ) -> &mut Self {
        let class_name = if class_name.is_empty() {
            DEFAULT_MODULE_CLASS.to_string()
        } else {
            class_name.to_string()
        };
        self.modules.insert(
            name.to_string(),
            ModuleDescriptor::Class(ClassDescriptor { class_name, path }),
        );
        self
    }

    pub fn register_factory<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&mut Di) -> Box<dyn ModuleDefinition> + Send + Sync + 'static,
    {
        self.modules
            .insert(name.to_string(), ModuleDescriptor::Factory(Arc::new(factory)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Resolve and initialize module `name` inside the request scope `di`.
    pub fn start(
        &self,
        name: &str,
        di: &mut Di,
        loader: &dyn ModuleLoader,
    ) -> Result<Box<dyn ModuleDefinition>, ConfigurationError> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| ConfigurationError::ModuleNotRegistered(name.to_string()))?;

        match descriptor {
            ModuleDescriptor::Class(class) => {
                if let Some(path) = &class.path {
                    loader.ensure_loaded(&class.class_name, path)?;
                }

                let module = di
                    .module_class(&class.class_name)
                    .ok_or_else(|| ConfigurationError::UnknownClass(class.class_name.clone()))?;

                module.register_autoloaders(di);
                module.register_services(di);
                Ok(module)
            }
            ModuleDescriptor::Factory(factory) => Ok(factory(di)),
        }
    }
}
