use super::Logger;
use crate::Error;
use crate::internal;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Periodic background flush. Stops on [`stop`](Self::stop) or drop.
#[derive(Debug)]
pub struct FlushDaemon {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl FlushDaemon {
    pub(super) fn spawn(logger: Logger, interval: Duration) -> Result<Self, Error> {
        let (stop, ticks) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("driftlog-flush-daemon".to_string())
            .spawn(move || {
                loop {
                    match ticks.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(e) = logger.flush() {
                                internal::error("DAEMON", &format!("periodic flush failed: {e}"));
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                internal::debug("DAEMON", "flush daemon stopped");
            })?;
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Signals the daemon and waits for its current flush, if any, to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            internal::error("DAEMON", "flush daemon panicked");
        }
    }
}

impl Drop for FlushDaemon {
    fn drop(&mut self) {
        self.shutdown();
    }
}
