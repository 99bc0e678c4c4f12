use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use indexmap::IndexMap;
use waypoint_config::{Hook, Labels};
use waypoint_factory::{ComponentType, Mapper, ReleaseFn};

/// Describes which plugin a component came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentInfo {
    pub component_type: ComponentType,
    pub name: String,
}

impl fmt::Display for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.component_type, self.name)
    }
}

/// Hooks grouped by their `when` value, in declaration order within each
/// group.
pub type Hooks = IndexMap<String, Vec<Hook>>;

/// Groups hooks by their `when` value.
pub fn group_hooks(hooks: Vec<Hook>) -> Hooks {
    let mut grouped = Hooks::new();
    for hook in hooks {
        grouped.entry(hook.when.clone()).or_default().push(hook);
    }
    grouped
}

/// A configured plugin for one stage of one app.
///
/// The plugin is released by [`Component::close`], or on drop if it was never
/// closed. Either way it is released exactly once.
pub struct Component<T: ?Sized> {
    value: Box<T>,
    info: ComponentInfo,
    hooks: Hooks,
    labels: Labels,
    mappers: Vec<Mapper>,
    release: Mutex<Option<ReleaseFn>>,
}

impl<T: ?Sized> Component<T> {
    pub(crate) fn new(
        value: Box<T>,
        info: ComponentInfo,
        hooks: Hooks,
        labels: Labels,
        mappers: Vec<Mapper>,
        release: ReleaseFn,
    ) -> Self {
        Self {
            value,
            info,
            hooks,
            labels,
            mappers,
            release: Mutex::new(Some(release)),
        }
    }

    /// The configured plugin.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn info(&self) -> &ComponentInfo {
        &self.info
    }

    pub fn component_type(&self) -> ComponentType {
        self.info.component_type
    }

    /// The plugin name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Hooks to run at the given point, e.g. `"before"`.
    pub fn hooks_for(&self, when: &str) -> &[Hook] {
        self.hooks.get(when).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn mappers(&self) -> &[Mapper] {
        &self.mappers
    }

    pub fn mapper(&self, name: &str) -> Option<&Mapper> {
        self.mappers.iter().find(|mapper| mapper.name() == name)
    }

    /// Releases the plugin. Only the first call does anything; later calls
    /// return `Ok(())`.
    pub fn close(&self) -> anyhow::Result<()> {
        let release = self
            .release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match release {
            Some(release) => {
                tracing::debug!(component = %self.info, "releasing component");
                release()
            }
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<T: ?Sized> Drop for Component<T> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(component = %self.info, "failed to release component: {err:?}");
        }
    }
}

impl<T: ?Sized> fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("info", &self.info)
            .field("hooks", &self.hooks)
            .field("labels", &self.labels)
            .field("mappers", &self.mappers)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
