//! Keyed record store for playbooks and jobs.
//!
//! Records live in memory behind a mutex and, when opened on a root
//! directory, are snapshotted to `<root>/records.yaml` after every mutation.
//! A mutation is applied to a copy first and only becomes visible once the
//! snapshot has been written, so a failed write leaves the store unchanged.

use crate::error::{PlaysError, Result};
use crate::job::Job;
use crate::paths;
use crate::playbook::Playbook;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Records {
    /// Shared by playbooks and jobs.
    pub next_id: u64,
    #[serde(default)]
    pub playbooks: BTreeMap<u64, Playbook>,
    #[serde(default)]
    pub jobs: BTreeMap<u64, Job>,
}

impl Default for Records {
    fn default() -> Self {
        Self {
            next_id: 1,
            playbooks: BTreeMap::new(),
            jobs: BTreeMap::new(),
        }
    }
}

pub struct Repository {
    path: Option<PathBuf>,
    records: Mutex<Records>,
}

impl Repository {
    /// Open (or start) the record file under `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let path = paths::records_path(root);
        let records = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_yaml::from_str(&data)?
        } else {
            Records::default()
        };
        Ok(Self {
            path: Some(path),
            records: Mutex::new(records),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Mutex::new(Records::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `f` to a copy of the records, persist it, then publish it.
    fn mutate<T>(&self, f: impl FnOnce(&mut Records) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        if let Some(path) = &self.path {
            let data = serde_yaml::to_string(&next)?;
            crate::io::atomic_write(path, data.as_bytes())?;
        }
        *guard = next;
        Ok(out)
    }

    /// Reserve the next identifier.
    pub fn next_id(&self) -> Result<u64> {
        self.mutate(|r| {
            let id = r.next_id;
            r.next_id += 1;
            Ok(id)
        })
    }

    // -----------------------------------------------------------------------
    // Playbooks
    // -----------------------------------------------------------------------

    pub fn list_playbooks(&self) -> Vec<Playbook> {
        self.lock().playbooks.values().cloned().collect()
    }

    pub fn get_playbook(&self, id: u64) -> Result<Playbook> {
        self.lock()
            .playbooks
            .get(&id)
            .cloned()
            .ok_or(PlaysError::PlaybookNotFound(id))
    }

    /// Insert or replace a playbook record.
    pub fn put_playbook(&self, playbook: Playbook) -> Result<()> {
        self.mutate(|r| {
            r.playbooks.insert(playbook.id, playbook);
            Ok(())
        })
    }

    pub fn remove_playbook(&self, id: u64) -> Result<Playbook> {
        self.mutate(|r| r.playbooks.remove(&id).ok_or(PlaysError::PlaybookNotFound(id)))
    }

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    pub fn list_jobs(&self) -> Vec<Job> {
        self.lock().jobs.values().cloned().collect()
    }

    pub fn get_job(&self, id: u64) -> Result<Job> {
        self.lock()
            .jobs
            .get(&id)
            .cloned()
            .ok_or(PlaysError::JobNotFound(id))
    }

    /// Insert or replace a job record.
    pub fn put_job(&self, job: Job) -> Result<()> {
        self.mutate(|r| {
            r.jobs.insert(job.id, job);
            Ok(())
        })
    }

    pub fn remove_job(&self, id: u64) -> Result<Job> {
        self.mutate(|r| r.jobs.remove(&id).ok_or(PlaysError::JobNotFound(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobDraft;
    use crate::playbook::PlaybookDraft;
    use crate::types::JobStatus;
    use tempfile::TempDir;

    fn playbook(id: u64) -> Playbook {
        Playbook::new(
            id,
            PlaybookDraft {
                name: format!("pb-{id}"),
                description: String::new(),
                content: "- hosts: all\n".into(),
                created_by: 1,
            },
        )
    }

    fn job(id: u64, playbook_id: u64) -> Job {
        Job::new(
            id,
            &JobDraft {
                playbook_id,
                assigned_to: 1,
                status: JobStatus::Planned,
                start_time: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn ids_are_shared_and_increasing() {
        let repo = Repository::in_memory();
        assert_eq!(repo.next_id().unwrap(), 1);
        assert_eq!(repo.next_id().unwrap(), 2);
        assert_eq!(repo.next_id().unwrap(), 3);
    }

    #[test]
    fn missing_records_are_typed_errors() {
        let repo = Repository::in_memory();
        assert!(matches!(
            repo.get_playbook(4),
            Err(PlaysError::PlaybookNotFound(4))
        ));
        assert!(matches!(repo.get_job(5), Err(PlaysError::JobNotFound(5))));
        assert!(matches!(
            repo.remove_job(5),
            Err(PlaysError::JobNotFound(5))
        ));
    }

    #[test]
    fn put_get_remove() {
        let repo = Repository::in_memory();
        repo.put_playbook(playbook(1)).unwrap();
        repo.put_job(job(2, 1)).unwrap();
        assert_eq!(repo.get_playbook(1).unwrap().name, "pb-1");
        assert_eq!(repo.list_jobs().len(), 1);
        repo.remove_playbook(1).unwrap();
        assert!(repo.list_playbooks().is_empty());
        assert_eq!(repo.get_job(2).unwrap().playbook_id, 1);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let repo = Repository::open(dir.path()).unwrap();
            let pb_id = repo.next_id().unwrap();
            repo.put_playbook(playbook(pb_id)).unwrap();
            let job_id = repo.next_id().unwrap();
            repo.put_job(job(job_id, pb_id)).unwrap();
        }
        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.get_playbook(1).unwrap().content, "- hosts: all\n");
        assert_eq!(repo.get_job(2).unwrap().status, JobStatus::Planned);
        assert_eq!(repo.next_id().unwrap(), 3);
    }

    #[test]
    fn failed_persist_leaves_records_unchanged() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        repo.put_playbook(playbook(1)).unwrap();

        // Replace the snapshot's directory entry with a directory so the
        // rename fails.
        let records = dir.path().join("records.yaml");
        std::fs::remove_file(&records).unwrap();
        std::fs::create_dir(&records).unwrap();
        std::fs::write(records.join("blocker"), "x").unwrap();

        assert!(repo.put_playbook(playbook(2)).is_err());
        assert_eq!(repo.list_playbooks().len(), 1);
    }
}
