// src/core/hooks.rs

use crate::models::SiteRecord;
use std::collections::BTreeMap;
use std::fmt;

/// Event fired on every freshly resolved site record, before it is cached.
pub const SITE_ALIAS_ALTER: &str = "site-alias-alter";

pub type RecordHook = Box<dyn Fn(&mut SiteRecord) + Send + Sync>;

/// Named events mapped to ordered lists of record hooks.
#[derive(Default)]
pub struct HookRegistry {
    handlers: BTreeMap<String, Vec<RecordHook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(event, hooks)| (event.as_str(), hooks.len()))
            .collect();
        f.debug_struct("HookRegistry").field("handlers", &counts).finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` to run after every hook already registered for `event`.
    pub fn on<F>(&mut self, event: &str, hook: F)
    where
        F: Fn(&mut SiteRecord) + Send + Sync + 'static,
    {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(Box::new(hook));
    }

    /// Runs the hooks of `event` in registration order. Returns how many ran.
    pub fn alter(&self, event: &str, record: &mut SiteRecord) -> usize {
        let Some(hooks) = self.handlers.get(event) else {
            return 0;
        };
        for hook in hooks {
            hook(record);
        }
        log::trace!("Ran {} '{}' hook(s) on '{}'", hooks.len(), event, record.name);
        hooks.len()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map_or(0, Vec::len)
    }
}
