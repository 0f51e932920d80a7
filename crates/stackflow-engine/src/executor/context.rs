use std::collections::HashMap;

use crate::graph::PortValue;

/// Values produced during one run, keyed by `(node id, output port)`.
///
/// Each cell is written once, by the node that owns it. Created per run and
/// dropped with it.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    cells: HashMap<(String, String), PortValue>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a produced value.
    ///
    /// # Panics
    ///
    /// Panics if the cell was already written. Only a scheduling bug can
    /// cause that, and continuing would silently replace a consumed value.
    pub fn put(&mut self, node_id: &str, port: &str, value: PortValue) {
        let key = (node_id.to_string(), port.to_string());
        if self.cells.contains_key(&key) {
            panic!("execution context cell {}.{} written twice", node_id, port);
        }
        self.cells.insert(key, value);
    }

    pub fn get(&self, node_id: &str, port: &str) -> Option<&PortValue> {
        self.cells.get(&(node_id.to_string(), port.to_string()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let mut ctx = ExecutionContext::new();
        assert!(ctx.get("q1", "query").is_none());

        ctx.put("q1", "query", PortValue::Text("What is X?".into()));
        assert_eq!(
            ctx.get("q1", "query"),
            Some(&PortValue::Text("What is X?".into()))
        );
        assert!(ctx.get("q1", "other").is_none());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    #[should_panic(expected = "written twice")]
    fn test_second_write_panics() {
        let mut ctx = ExecutionContext::new();
        ctx.put("l1", "output", PortValue::GeneratedText("a".into()));
        ctx.put("l1", "output", PortValue::GeneratedText("b".into()));
    }
}
