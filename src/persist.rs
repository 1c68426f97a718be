//! Durable key-value storage of the four mutable collections, shared by every
//! sidecar attached to the same workspace.
//!
//! Each collection lives under its own key as a JSON array. Writes go
//! straight through on every change. Other sidecars notice them through
//! `PRAGMA data_version` plus a monotonic revision clock and replace their
//! in-memory copy wholesale; the last write to a key wins.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::store::{ChangeSet, Collection, CollectionData, Collections};

pub fn digest(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

pub struct Persistence {
    conn: Connection,
    writer: String,
    last_revision: i64,
    last_data_version: i64,
}

impl Persistence {
    pub fn open(workspace: &Path) -> Result<Persistence> {
        let conn = db::open_db(workspace)?;
        let last_data_version = data_version(&conn)?;
        Ok(Persistence {
            conn,
            writer: Uuid::new_v4().to_string(),
            last_revision: 0,
            last_data_version,
        })
    }

    pub fn writer_id(&self) -> &str {
        &self.writer
    }

    /// Read every collection, seeding whatever is missing or unreadable and
    /// writing the seed back straight away.
    pub fn load(&mut self) -> Result<Collections> {
        let mut data = Collections::default();
        let mut seeded = ChangeSet::none();

        for c in Collection::ALL {
            let row: Option<(String, String)> = self
                .conn
                .query_row(
                    "SELECT value, digest FROM kv_entries WHERE key = ?",
                    [c.key()],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;

            let parsed = match row {
                None => {
                    debug!(key = c.key(), "no stored value, seeding defaults");
                    None
                }
                Some((value, stored_digest)) => decode(c, &value, &stored_digest),
            };
            let loaded = match parsed {
                Some(v) => v,
                None => {
                    seeded = seeded.with(c);
                    Collections::seed_of(c)
                }
            };
            data.replace(loaded);
        }

        self.last_revision = current_revision(&self.conn)?;
        self.write_through(&data, seeded)?;
        self.last_data_version = data_version(&self.conn)?;
        Ok(data)
    }

    /// Persist the changed collections now, in one transaction.
    pub fn write_through(&mut self, data: &Collections, changes: ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        tx.execute("UPDATE kv_clock SET revision = revision + 1 WHERE id = 1", [])?;
        let revision: i64 =
            tx.query_row("SELECT revision FROM kv_clock WHERE id = 1", [], |r| r.get(0))?;
        let now = Utc::now().to_rfc3339();
        for c in changes.iter() {
            let value = data.to_json(c)?;
            tx.execute(
                "INSERT INTO kv_entries(key, value, digest, revision, writer, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   digest = excluded.digest,
                   revision = excluded.revision,
                   writer = excluded.writer,
                   updated_at = excluded.updated_at",
                params![c.key(), value, digest(&value), revision, self.writer, now],
            )?;
        }
        tx.commit()?;
        debug!(revision, ?changes, "wrote through");
        Ok(())
    }

    /// Explicit save: waits out the simulated round trip, then rewrites every key.
    pub fn save_all(&mut self, data: &Collections, delay: Duration) -> Result<()> {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.write_through(data, ChangeSet::all())?;
        info!("saved all collections");
        Ok(())
    }

    /// Collections other sidecars wrote since the last poll. Own writes and
    /// unreadable values are skipped.
    pub fn poll_external(&mut self) -> Result<Vec<CollectionData>> {
        let dv = data_version(&self.conn)?;
        if dv == self.last_data_version {
            return Ok(Vec::new());
        }
        self.last_data_version = dv;

        let mut stmt = self.conn.prepare(
            "SELECT key, value, digest, revision, writer
             FROM kv_entries
             WHERE revision > ?
             ORDER BY revision",
        )?;
        let rows = stmt
            .query_map([self.last_revision], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut out = Vec::new();
        for (key, value, stored_digest, revision, writer) in rows {
            self.last_revision = self.last_revision.max(revision);
            if writer == self.writer {
                continue;
            }
            let Some(c) = Collection::from_key(&key) else {
                continue;
            };
            if let Some(data) = decode(c, &value, &stored_digest) {
                debug!(key, revision, writer, "external change");
                out.push(data);
            }
        }
        Ok(out)
    }

    /// Erase the four keys. The caller reloads afterwards, which reseeds.
    pub fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for c in Collection::ALL {
            tx.execute("DELETE FROM kv_entries WHERE key = ?", [c.key()])?;
        }
        tx.commit()?;
        warn!("cleared all stored collections");
        Ok(())
    }
}

fn decode(c: Collection, value: &str, stored_digest: &str) -> Option<CollectionData> {
    if !stored_digest.is_empty() && stored_digest != digest(value) {
        warn!(key = c.key(), "stored value failed its digest check");
        return None;
    }
    match CollectionData::parse(c, value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key = c.key(), error = %e, "stored value is not valid JSON for this collection");
            None
        }
    }
}

fn data_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA data_version", [], |r| r.get(0))
}

fn current_revision(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT revision FROM kv_clock WHERE id = 1", [], |r| r.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Semester;
    use crate::store::EntityStore;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn raw_value(ws: &Path, key: &str) -> Option<String> {
        let conn = Connection::open(ws.join(db::DB_FILE)).expect("raw open");
        conn.query_row("SELECT value FROM kv_entries WHERE key = ?", [key], |r| r.get(0))
            .optional()
            .expect("raw query")
    }

    #[test]
    fn first_load_seeds_and_writes_back() {
        let ws = temp_dir("iesportal-persist-seed");
        let mut p = Persistence::open(&ws).expect("open");
        let data = p.load().expect("load");
        assert_eq!(data.users, crate::defaults::users());
        assert_eq!(data.grades, crate::defaults::grades());
        for c in Collection::ALL {
            assert!(raw_value(&ws, c.key()).is_some(), "{} not written", c.key());
        }
        assert!(raw_value(&ws, "ies_subjects").is_none());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn reload_round_trips_by_value() {
        let ws = temp_dir("iesportal-persist-roundtrip");
        let mut p = Persistence::open(&ws).expect("open");
        let mut store = EntityStore::new(crate::defaults::subjects(), p.load().expect("load"));
        let c1 = store.update_grade("2984619", "sub2", Semester::Second, Some(5.5));
        let c2 = store.update_attendance("2984619", "sub4", 2, Some(1));
        p.write_through(store.collections(), c1).expect("write grades");
        p.write_through(store.collections(), c2).expect("write attendance");
        drop(p);

        let mut p2 = Persistence::open(&ws).expect("reopen");
        let reloaded = p2.load().expect("reload");
        assert_eq!(&reloaded, store.collections());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn unparsable_or_tampered_values_fall_back_to_seed() {
        let ws = temp_dir("iesportal-persist-corrupt");
        {
            let mut p = Persistence::open(&ws).expect("open");
            p.load().expect("load");
        }
        {
            let conn = Connection::open(ws.join(db::DB_FILE)).expect("raw open");
            conn.execute(
                "UPDATE kv_entries SET value = '{not json', digest = '' WHERE key = 'ies_users'",
                [],
            )
            .expect("corrupt users");
            conn.execute(
                "UPDATE kv_entries SET value = '[]' WHERE key = 'ies_grades'",
                [],
            )
            .expect("tamper grades");
        }
        let mut p = Persistence::open(&ws).expect("reopen");
        let data = p.load().expect("load");
        assert_eq!(data.users, crate::defaults::users());
        assert_eq!(data.grades, crate::defaults::grades());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn second_adapter_sees_external_writes_only() {
        let ws = temp_dir("iesportal-persist-external");
        let mut a = Persistence::open(&ws).expect("open a");
        let mut store_a = EntityStore::new(crate::defaults::subjects(), a.load().expect("load a"));
        let mut b = Persistence::open(&ws).expect("open b");
        b.load().expect("load b");
        assert!(b.poll_external().expect("poll idle").is_empty());

        let changes = store_a.mark_as_read("msg2");
        a.write_through(store_a.collections(), changes).expect("write a");
        assert!(a.poll_external().expect("own poll").is_empty());

        let seen = b.poll_external().expect("poll b");
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            CollectionData::Messages(m) => assert_eq!(m, &store_a.collections().messages),
            other => panic!("unexpected collection {:?}", other.collection()),
        }
        assert!(b.poll_external().expect("poll again").is_empty());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn clear_then_load_reseeds() {
        let ws = temp_dir("iesportal-persist-clear");
        let mut p = Persistence::open(&ws).expect("open");
        let mut store = EntityStore::new(crate::defaults::subjects(), p.load().expect("load"));
        let changes = store.delete_user("1209362");
        p.write_through(store.collections(), changes).expect("write");
        p.clear().expect("clear");
        assert!(raw_value(&ws, "ies_users").is_none());
        let data = p.load().expect("reload");
        assert_eq!(data.users, crate::defaults::users());
        let _ = std::fs::remove_dir_all(ws);
    }
}
