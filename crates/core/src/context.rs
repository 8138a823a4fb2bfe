//! Per-call request context.

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

/// Context threaded explicitly through every command and port call.
///
/// Carries the instance (top-level tenant), the acting principal and an
/// optional deadline. It is immutable; concurrent commands for different
/// instances never share one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    instance_id: String,
    actor_id: String,
    actor_org_id: Option<String>,
    request_id: Uuid,
    deadline: Option<Instant>,
}

impl CommandContext {
    pub fn new(instance_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            actor_id: actor_id.into(),
            actor_org_id: None,
            request_id: Uuid::now_v7(),
            deadline: None,
        }
    }

    /// Organization the actor belongs to (used as default resource owner).
    pub fn with_actor_org(mut self, org_id: impl Into<String>) -> Self {
        self.actor_org_id = Some(org_id.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline relative to now, keeping an earlier existing one.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        match self.deadline {
            Some(existing) if existing <= candidate => self,
            _ => self.with_deadline(candidate),
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn actor_org_id(&self) -> Option<&str> {
        self.actor_org_id.as_deref()
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_keeps_earlier_deadline() {
        let early = Instant::now() + Duration::from_millis(10);
        let ctx = CommandContext::new("instance", "actor")
            .with_deadline(early)
            .with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(early));
    }

    #[tokio::test]
    async fn with_timeout_sets_deadline_when_absent() {
        let ctx = CommandContext::new("instance", "actor").with_timeout(Duration::from_secs(1));
        assert!(ctx.deadline().is_some());
        assert_eq!(ctx.instance_id(), "instance");
        assert_eq!(ctx.actor_id(), "actor");
        assert_eq!(ctx.actor_org_id(), None);
    }
}
