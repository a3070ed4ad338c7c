use std::{thread::JoinHandle, time::Duration};

/// A single slot for a task that runs once after a delay on its own thread.
///
/// Scheduling a new task waits for the previous one to finish first, and dropping the slot
/// waits for the pending task. There is no cancellation.
#[derive(Debug)]
pub struct DeferredTask {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl DeferredTask {
    pub fn new(name: impl Into<String>) -> Self {
        DeferredTask { name: name.into(), handle: None }
    }

    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.join();
        let spawned = std::thread::Builder::new().name(self.name.clone()).spawn(move || {
            std::thread::sleep(delay);
            task();
        });
        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(err) => log::error!("Failed to start {} thread: {}", self.name, err),
        }
    }

    /// Wait for the pending task, if any.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} thread panicked", self.name);
            }
        }
    }
}

impl Drop for DeferredTask {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_runs_once_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut task = DeferredTask::new("test-deferred");
        let c = counter.clone();
        task.schedule(Duration::from_millis(20), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(0, counter.load(Ordering::SeqCst));
        task.join();
        assert_eq!(1, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn test_reschedule_waits_for_previous() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut task = DeferredTask::new("test-deferred");
        for i in 0..3 {
            let order = order.clone();
            task.schedule(Duration::from_millis(10), move || order.lock().unwrap().push(i));
        }
        drop(task);
        assert_eq!(vec![0, 1, 2], *order.lock().unwrap());
    }
}
