//! Skill Dispatcher (spec §4.8, C8).
//!
//! Registry mapping a skill name to a handler closure. Execution on an
//! unknown name returns `None`; the whole dispatcher can be disabled, in
//! which case every lookup behaves as unknown.

use std::collections::HashMap;

pub type SkillHandler = Box<dyn Fn(&HashMap<String, String>) -> Option<String> + Send + Sync>;

pub struct SkillDispatcher {
    handlers: HashMap<String, SkillHandler>,
    enabled: bool,
}

impl SkillDispatcher {
    pub fn new() -> Self {
        Self { handlers: HashMap::new(), enabled: true }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn register(&mut self, name: impl Into<String>, handler: SkillHandler) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    pub fn has(&self, name: &str) -> bool {
        self.enabled && self.handlers.contains_key(name)
    }

    pub fn list(&self) -> Vec<&str> {
        if !self.enabled {
            return Vec::new();
        }
        self.handlers.keys().map(|s| s.as_str()).collect()
    }

    /// Executes the named skill; `None` if disabled, unknown, or the
    /// handler itself declines to answer.
    pub fn execute(&self, name: &str, kwargs: &HashMap<String, String>) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.handlers.get(name).and_then(|h| h(kwargs))
    }
}

impl Default for SkillDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_skill_returns_none() {
        let d = SkillDispatcher::new();
        assert_eq!(d.execute("weather", &HashMap::new()), None);
    }

    #[test]
    fn registered_skill_runs_its_handler() {
        let mut d = SkillDispatcher::new();
        d.register(
            "echo",
            Box::new(|kw| kw.get("text").cloned()),
        );
        let mut kw = HashMap::new();
        kw.insert("text".to_string(), "hi".to_string());
        assert_eq!(d.execute("echo", &kw), Some("hi".to_string()));
    }

    #[test]
    fn disabled_dispatcher_answers_nothing() {
        let mut d = SkillDispatcher::new();
        d.register("echo", Box::new(|_| Some("x".to_string())));
        d.set_enabled(false);
        assert_eq!(d.execute("echo", &HashMap::new()), None);
        assert!(!d.has("echo"));
        assert!(d.list().is_empty());
    }

    #[test]
    fn unregister_removes_handler() {
        let mut d = SkillDispatcher::new();
        d.register("echo", Box::new(|_| Some("x".to_string())));
        assert!(d.unregister("echo"));
        assert!(!d.has("echo"));
    }
}
