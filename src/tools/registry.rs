//! The Tool Registry: a read-mostly map of tool name to implementation.
//! Mutations only happen during startup.

use crate::tools::tool::ArcTool;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, ArcTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: ArcTool) {
        self.tools
            .write()
            .expect("tool registry lock poisoned")
            .insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<ArcTool> {
        self.tools.read().expect("tool registry lock poisoned").get(name).cloned()
    }

    pub fn list(&self) -> Vec<ArcTool> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}
