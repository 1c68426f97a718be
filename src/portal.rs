use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::model::{Message, MessageDraft, Semester, User};
use crate::persist::Persistence;
use crate::session::Session;
use crate::store::{ChangeSet, Collection, Collections, EntityStore};

/// Application context for one attached workspace: the store, its storage
/// adapter and the session, built once and handed to every consumer.
///
/// Every mutation runs store → write-through → session refresh, in that
/// order, before returning.
pub struct Portal {
    workspace: PathBuf,
    config: PortalConfig,
    store: EntityStore,
    storage: Persistence,
    session: Session,
    /// External changes applied since the last `take_external_changes`.
    external: ChangeSet,
}

impl Portal {
    pub fn open(workspace: &Path) -> Result<Portal> {
        let config = PortalConfig::load(workspace);
        let mut storage = Persistence::open(workspace)?;
        let data = storage.load()?;
        info!(workspace = %workspace.display(), writer = storage.writer_id(), "workspace opened");
        Ok(Portal {
            workspace: workspace.to_path_buf(),
            config,
            store: EntityStore::new(crate::defaults::subjects(), data),
            storage,
            session: Session::new(),
            external: ChangeSet::none(),
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn commit(&mut self, changes: ChangeSet) -> Result<ChangeSet> {
        self.storage.write_through(self.store.collections(), changes)?;
        if changes.contains(Collection::Users) {
            self.session.sync(self.store.users());
        }
        Ok(changes)
    }

    pub fn add_user(&mut self, user: User) -> Result<ChangeSet> {
        if let Some(dup) = self
            .store
            .users()
            .iter()
            .find(|u| u.id == user.id || u.username == user.username)
        {
            warn!(id = %user.id, username = %user.username, clashes_with = %dup.id, "adding user with duplicate id or username");
        }
        let changes = self.store.add_user(user);
        self.commit(changes)
    }

    pub fn update_user(&mut self, user: User) -> Result<ChangeSet> {
        let changes = self.store.update_user(user);
        self.commit(changes)
    }

    pub fn update_student_id(&mut self, old_id: &str, new_id: &str) -> Result<ChangeSet> {
        let changes = self.store.update_student_id(old_id, new_id);
        if !changes.is_empty() {
            info!(old_id, new_id, ?changes, "student id rewritten");
            self.session.rename(old_id, new_id);
        }
        self.commit(changes)
    }

    pub fn delete_user(&mut self, id: &str, confirmed: bool) -> Result<ChangeSet> {
        if !confirmed {
            return Err(PortalError::ConfirmationRequired);
        }
        let changes = self.store.delete_user(id);
        if !changes.is_empty() {
            info!(id, ?changes, "user deleted");
        }
        self.commit(changes)
    }

    pub fn update_grade(
        &mut self,
        student_id: &str,
        subject_id: &str,
        semester: Semester,
        score: Option<f64>,
    ) -> Result<ChangeSet> {
        let changes = self
            .store
            .update_grade(student_id, subject_id, semester, score);
        self.commit(changes)
    }

    pub fn update_attendance(
        &mut self,
        student_id: &str,
        subject_id: &str,
        absences: u32,
        justified: Option<u32>,
    ) -> Result<ChangeSet> {
        let changes = self
            .store
            .update_attendance(student_id, subject_id, absences, justified);
        self.commit(changes)
    }

    pub fn send_message(&mut self, draft: MessageDraft) -> Result<Message> {
        let (msg, changes) = self.store.send_message(draft);
        self.commit(changes)?;
        Ok(msg)
    }

    pub fn reply_message(&mut self, id: &str, response: &str) -> Result<ChangeSet> {
        let changes = self.store.reply_message(id, response);
        self.commit(changes)
    }

    pub fn mark_as_read(&mut self, id: &str) -> Result<ChangeSet> {
        let changes = self.store.mark_as_read(id);
        self.commit(changes)
    }

    pub fn delete_message(&mut self, id: &str, confirmed: bool) -> Result<ChangeSet> {
        if !confirmed {
            return Err(PortalError::ConfirmationRequired);
        }
        let changes = self.store.delete_message(id);
        self.commit(changes)
    }

    pub fn login(&mut self, username: &str, secret: &str) -> bool {
        let delay = self.config.login_delay();
        self.session
            .login(self.store.users(), username, secret, delay)
    }

    pub fn logout(&mut self) {
        self.session.logout();
    }

    pub fn save_all(&mut self) -> Result<()> {
        let delay = self.config.save_delay();
        self.storage.save_all(self.store.collections(), delay)
    }

    /// Pull in whatever other sidecars wrote since the last call. The
    /// changes are also kept until `take_external_changes` drains them.
    pub fn sync_external(&mut self) -> Result<ChangeSet> {
        let mut changes = ChangeSet::none();
        for data in self.storage.poll_external()? {
            changes.merge(self.store.replace(data));
        }
        if !changes.is_empty() {
            info!(?changes, "applied external changes");
            self.external.merge(changes);
        }
        if changes.contains(Collection::Users) {
            self.session.sync(self.store.users());
        }
        Ok(changes)
    }

    pub fn take_external_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.external)
    }

    /// Replace every collection (backup restore) and persist the result.
    pub fn restore(&mut self, data: Collections) -> Result<ChangeSet> {
        let changes = self.store.replace_all(data);
        self.commit(changes)
    }

    /// Erase stored data and reseed from defaults. Like a fresh start, this
    /// also ends the session.
    pub fn reset_to_defaults(&mut self, confirmed: bool) -> Result<()> {
        if !confirmed {
            return Err(PortalError::ConfirmationRequired);
        }
        self.storage.clear()?;
        let data = self.storage.load()?;
        self.store.replace_all(data);
        self.session.logout();
        warn!(workspace = %self.workspace.display(), "reset to defaults");
        Ok(())
    }
}
