//! Key naming for the score store.
//!
//! Every key carries the owning project id as its first segment; nothing
//! below this module concatenates key strings by hand, which is what keeps
//! cross-project reads structurally impossible.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys {
    project: String,
}

impl Keys {
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub fn recency(&self) -> String {
        format!("{}:recency", self.project)
    }

    #[must_use]
    pub fn frequency(&self) -> String {
        format!("{}:frequency", self.project)
    }

    #[must_use]
    pub fn tag(&self, tag: &str) -> String {
        format!("{}:tag:{tag}", self.project)
    }

    #[must_use]
    pub fn tag_prefix(&self) -> String {
        format!("{}:tag:", self.project)
    }

    #[must_use]
    pub fn path_tags(&self, path: &str) -> String {
        format!("{}:ptags:{path}", self.project)
    }

    #[must_use]
    pub fn transitions(&self, from: &str) -> String {
        format!("{}:trans:{from}", self.project)
    }

    #[must_use]
    pub fn transition_counts(&self, from: &str) -> String {
        format!("{}:transcnt:{from}", self.project)
    }

    #[must_use]
    pub fn session_seq(&self, session: &str) -> String {
        format!("{}:seq:{session}", self.project)
    }

    #[must_use]
    pub fn sessions(&self) -> String {
        format!("{}:sessions", self.project)
    }

    #[must_use]
    pub fn prediction(&self, id: &str) -> String {
        format!("{}:pred:{id}", self.project)
    }

    #[must_use]
    pub fn rolling_predictions(&self) -> String {
        format!("{}:rolling:preds", self.project)
    }

    #[must_use]
    pub fn tuner_arm(&self, index: usize) -> String {
        format!("{}:tuner:arm:{index}", self.project)
    }

    #[must_use]
    pub fn counters(&self) -> String {
        format!("{}:counters", self.project)
    }

    #[must_use]
    pub fn intent_timeline(&self) -> String {
        format!("{}:intent:timeline", self.project)
    }

    #[must_use]
    pub fn intent_cache(&self, fingerprint: &str) -> String {
        format!("{}:icache:{fingerprint}", self.project)
    }

    #[must_use]
    pub fn latency(&self, operation: &str) -> String {
        format!("{}:latency:{operation}", self.project)
    }

    #[must_use]
    pub fn latency_prefix(&self) -> String {
        format!("{}:latency:", self.project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_project_scoped() {
        let a = Keys::new("p1");
        let b = Keys::new("p2");
        assert_eq!(a.recency(), "p1:recency");
        assert_ne!(a.tag("api"), b.tag("api"));
        assert!(a.transitions("src/auth.rs").starts_with("p1:trans:"));
    }
}
