//! In-process store for tests and local runs without Postgres.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vframe_models::{Notification, ProcessingJob};

use crate::error::{DbError, DbResult};
use crate::store::{NotificationStore, ProcessingJobStore};

#[derive(Default)]
struct Tables {
    jobs: Vec<ProcessingJob>,
    notifications: Vec<Notification>,
}

/// Keeps rows in insertion order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn jobs(&self) -> Vec<ProcessingJob> {
        self.tables
            .lock()
            .map(|t| t.jobs.clone())
            .unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.tables
            .lock()
            .map(|t| t.notifications.clone())
            .unwrap_or_default()
    }

    fn check(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("memory store disabled".to_string()));
        }
        Ok(())
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> DbResult<T>) -> DbResult<T> {
        self.check()?;
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| DbError::Unavailable("memory store poisoned".to_string()))?;
        f(&mut tables)
    }
}

#[async_trait]
impl ProcessingJobStore for MemoryStore {
    async fn create_job(&self, job: &ProcessingJob) -> DbResult<()> {
        self.with_tables(|t| {
            t.jobs.push(job.clone());
            Ok(())
        })
    }

    async fn update_job(&self, job: &ProcessingJob) -> DbResult<()> {
        self.with_tables(|t| match t.jobs.iter_mut().find(|j| j.id == job.id) {
            Some(row) => {
                *row = job.clone();
                Ok(())
            }
            None => Err(DbError::not_found("processing_jobs", &job.id)),
        })
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_notification(&self, notification: &Notification) -> DbResult<()> {
        self.with_tables(|t| {
            t.notifications.push(notification.clone());
            Ok(())
        })
    }

    async fn update_notification(&self, notification: &Notification) -> DbResult<()> {
        self.with_tables(|t| match t.notifications.iter_mut().find(|n| n.id == notification.id) {
            Some(row) => {
                *row = notification.clone();
                Ok(())
            }
            None => Err(DbError::not_found("notifications", &notification.id)),
        })
    }
}
