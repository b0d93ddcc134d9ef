use std::sync::Arc;

use indexmap::IndexMap;

use crate::ToolHandler;

/// `toolSlug -> handler`, modeled on the same type-erased-by-trait-object
/// registry shape used elsewhere in this stack for tool dispatch.
/// `IndexMap` keeps insertion order, which is incidental here (handlers
/// aren't shown to an LLM) but costs nothing to keep.
pub struct HandlerRegistry {
    handlers: IndexMap<String, Arc<dyn ToolHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: IndexMap::new(),
        }
    }

    /// Registers a handler under its own [`ToolHandler::slug`]. Panics on a
    /// duplicate slug — this only ever runs once at process startup, and a
    /// collision there is a programming error, not a runtime condition.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let slug = handler.slug().to_string();
        if self.handlers.insert(slug.clone(), handler).is_some() {
            unreachable!("duplicate handler registered for slug '{slug}'");
        }
    }

    pub fn get(&self, slug: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(slug).cloned()
    }

    pub fn slugs(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
