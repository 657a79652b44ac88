// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{Builder, JoinHandle};
use std::time::Duration;

/// A named thread that runs a closure once per interval until it is stopped.
///
/// Stopping is prompt: the thread waits on a channel with a timeout instead
/// of sleeping, so dropping the sending side wakes it up immediately.
pub struct Ticker {
    stop: Option<Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a ticker. When `immediate` is set the closure runs once as soon
    /// as the thread starts, otherwise the first run happens one interval in.
    pub fn spawn<F>(
        name: impl Into<String>,
        interval: Duration,
        immediate: bool,
        mut f: F,
    ) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, stopped) = channel::<()>();
        let join_handle = Builder::new().name(name.into()).spawn(move || {
            if immediate {
                f();
            }
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => f(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        })?;
        Ok(Self {
            stop: Some(stop),
            join_handle: Some(join_handle),
        })
    }

    /// Signal the thread to exit. Does not wait for it.
    pub fn stop(&mut self) {
        self.stop.take();
    }

    /// Signal the thread to exit and hand back its join handle.
    pub fn shutdown(mut self) -> Option<JoinHandle<()>> {
        self.stop();
        self.join_handle.take()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn fires_immediately_and_periodically() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let t = Ticker::spawn("test", Duration::from_millis(20), true, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .expect("spawn ticker");

        std::thread::sleep(Duration::from_millis(150));
        let h = t.shutdown().expect("join handle");
        h.join().expect("join");
        assert!(count.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn delayed_start() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let t = Ticker::spawn("test", Duration::from_secs(60), false, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .expect("spawn ticker");
        std::thread::sleep(Duration::from_millis(50));
        t.shutdown().expect("join handle").join().expect("join");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_is_prompt() {
        let t = Ticker::spawn("test", Duration::from_secs(60), false, || {})
            .expect("spawn ticker");
        let start = Instant::now();
        t.shutdown().expect("join handle").join().expect("join");
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
