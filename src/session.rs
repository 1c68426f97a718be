use std::time::Duration;

use tracing::{debug, info};

use crate::model::{Principal, Role, User};

/// The logged-in principal of one sidecar, if any. Never holds a secret.
#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Option<Principal>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits out the simulated round trip, then checks the credentials.
    /// Failure does not say which field was wrong.
    pub fn login(&mut self, users: &[User], username: &str, secret: &str, delay: Duration) -> bool {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let found = users
            .iter()
            .find(|u| u.username == username && u.secret.as_deref() == Some(secret));
        match found {
            Some(u) => {
                info!(username, role = ?u.role, "login succeeded");
                self.current = Some(Principal::from(u));
                true
            }
            None => {
                info!(username, "login rejected");
                false
            }
        }
    }

    pub fn logout(&mut self) {
        if let Some(p) = self.current.take() {
            info!(username = %p.username, "logged out");
        }
    }

    /// Refresh the principal from the user collection. Returns true when the
    /// principal actually changed. A principal whose record disappeared is
    /// left alone.
    pub fn sync(&mut self, users: &[User]) -> bool {
        let Some(current) = self.current.as_ref() else {
            return false;
        };
        let Some(record) = users.iter().find(|u| u.id == current.id) else {
            return false;
        };
        let fresh = Principal::from(record);
        if fresh == *current {
            return false;
        }
        debug!(id = %fresh.id, "principal refreshed from store");
        self.current = Some(fresh);
        true
    }

    /// Follow an id rewrite so the session keeps pointing at the same record.
    pub fn rename(&mut self, old_id: &str, new_id: &str) {
        if let Some(p) = self.current.as_mut() {
            if p.id == old_id {
                p.id = new_id.to_string();
            }
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.current.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.current.as_ref().map(|p| p.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    /// Landing view the presentation layer routes to.
    pub fn home_view(&self) -> &'static str {
        match self.role() {
            None => "login",
            Some(Role::Admin) => "admin",
            Some(Role::Teacher) => "teacher",
            Some(Role::Student) => "student/summary",
        }
    }
}
