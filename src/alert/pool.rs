//! Bounded fire-and-forget task pool for alert side effects.
//!
//! Jobs are queued with a non-blocking send. A full queue rejects the job
//! instead of stalling the caller. Each job runs under `catch_unwind`, and its
//! error or panic is logged and dropped at this boundary.

use anyhow::{anyhow, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

struct Task {
    name: &'static str,
    job: Job,
}

pub struct TaskPool {
    tx: SyncSender<Task>,
    pending: Arc<AtomicUsize>,
    workers: usize,
}

impl TaskPool {
    pub fn new(workers: usize, queue_depth: usize) -> Result<Self> {
        if workers == 0 {
            return Err(anyhow!("task pool needs at least one worker"));
        }
        let (tx, rx) = mpsc::sync_channel::<Task>(queue_depth);
        let rx = Arc::new(Mutex::new(rx));
        let pending = Arc::new(AtomicUsize::new(0));

        for i in 0..workers {
            let rx = Arc::clone(&rx);
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name(format!("alert-worker-{}", i))
                .spawn(move || worker_loop(rx, pending))
                .map_err(|e| anyhow!("failed to spawn alert worker: {}", e))?;
        }

        Ok(Self { tx, pending, workers })
    }

    /// Queue a job. Returns false when the queue is full or closed.
    pub fn spawn<F>(&self, name: &'static str, job: F) -> bool
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let task = Task {
            name,
            job: Box::new(job),
        };
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                log::warn!("alert queue full, dropping {}", task.name);
                false
            }
            Err(TrySendError::Disconnected(task)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                log::error!("alert workers gone, dropping {}", task.name);
                false
            }
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Block until no job is pending or `timeout` passes. Returns true when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.pending() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

fn worker_loop(rx: Arc<Mutex<Receiver<Task>>>, pending: Arc<AtomicUsize>) {
    loop {
        let task = {
            let Ok(guard) = rx.lock() else {
                log::error!("alert queue lock poisoned, worker exiting");
                return;
            };
            match guard.recv() {
                Ok(task) => task,
                Err(_) => return,
            }
        };

        let name = task.name;
        match panic::catch_unwind(AssertUnwindSafe(task.job)) {
            Ok(Ok(())) => log::debug!("{} done", name),
            Ok(Err(e)) => log::error!("{} failed: {:#}", name, e),
            Err(payload) => log::error!("{} panicked: {}", name, panic_message(&*payload)),
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc::channel;

    #[test]
    fn runs_jobs_off_thread() {
        let pool = TaskPool::new(2, 4).unwrap();
        let (tx, rx) = channel();
        assert!(pool.spawn("whoami", move || {
            tx.send(thread::current().name().map(str::to_string))
                .map_err(|e| anyhow!("send: {}", e))
        }));

        let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(worker.unwrap().starts_with("alert-worker-"));
        assert!(pool.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn failures_and_panics_do_not_kill_workers() {
        let pool = TaskPool::new(1, 4).unwrap();
        assert!(pool.spawn("fails", || Err(anyhow!("transport down"))));
        assert!(pool.spawn("panics", || panic!("audio device exploded")));

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        assert!(pool.spawn("after", move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }));

        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let pool = TaskPool::new(1, 1).unwrap();
        let (release_tx, release_rx) = channel::<()>();
        let (started_tx, started_rx) = channel::<()>();

        assert!(pool.spawn("blocker", move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            Ok(())
        }));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(pool.spawn("queued", || Ok(())));
        let started = Instant::now();
        assert!(!pool.spawn("overflow", || Ok(())));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(pool.pending(), 2);

        release_tx.send(()).unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn rejects_zero_workers() {
        assert!(TaskPool::new(0, 4).is_err());
        assert_eq!(TaskPool::new(3, 4).unwrap().workers(), 3);
    }
}
