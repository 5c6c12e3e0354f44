//! Background image prefetching.
//!
//! [`BackgroundImageLoader`] owns one low-priority worker thread that warms
//! images queued with [`add_to_prefetch_queue`](BackgroundImageLoader::add_to_prefetch_queue)
//! before the GUI first requests them.
//!
//! ```text
//!   GUI thread                              worker thread
//!   ──────────                              ─────────────
//!   add_to_prefetch_queue(id)               loop {
//!     lock manager, queue id,                 acquire semaphore   (blocks)
//!     release semaphore ──────────────────►   lock manager
//!                                             prefetch_now()      (one id)
//!   request_image_resource(id)                read prefetch_delay
//!     lock manager, load synchronously        unlock manager
//!                                             sleep(delay)
//!                                           }
//! ```
//!
//! Both threads go through the same `parking_lot::Mutex`, so the cache
//! never sees concurrent mutation. The semaphore is attached to the
//! [`ResourceManager`] on spawn, so queueing through either the loader or
//! the locked manager wakes the worker. A direct request from the GUI thread can
//! overtake queued prefetches; completion order is not queue order.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::backend::GraphicsBackend;
use crate::image::ImageId;
use crate::resource::ResourceManager;

/// Resource manager shared between the GUI thread and the loader.
pub type SharedResourceManager<B> = Arc<Mutex<ResourceManager<B>>>;

/// Counting semaphore plus the stop flag the worker checks on every wake.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    permits: Mutex<usize>,
    cond: Condvar,
    stop: AtomicBool,
}

impl Signal {
    pub(crate) fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.cond.notify_one();
    }

    /// Blocks until a permit is available. Returns `false` once stopped.
    fn acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        while *permits == 0 && !self.stopped() {
            self.cond.wait(&mut permits);
        }
        if self.stopped() {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Sleeps for `delay`, returning early only when stopped.
    fn pause(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        let mut permits = self.permits.lock();
        while !self.stopped() {
            if self.cond.wait_until(&mut permits, deadline).timed_out() {
                break;
            }
        }
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        let _permits = self.permits.lock();
        self.cond.notify_all();
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn permits(&self) -> usize {
        *self.permits.lock()
    }
}

/// Worker thread draining a resource manager's prefetch queue.
pub struct BackgroundImageLoader<B> {
    manager: SharedResourceManager<B>,
    signal: Arc<Signal>,
    thread: Option<JoinHandle<()>>,
}

impl<B> std::fmt::Debug for BackgroundImageLoader<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundImageLoader")
            .field("running", &self.thread.is_some())
            .field("signal", &self.signal)
            .finish()
    }
}

impl<B> BackgroundImageLoader<B>
where
    B: GraphicsBackend + Send + 'static,
{
    /// Starts the worker thread.
    ///
    /// Ids already queued on `manager` are processed right away.
    pub fn spawn(manager: SharedResourceManager<B>) -> io::Result<Self> {
        let signal = Arc::new(Signal::default());
        manager.lock().attach_prefetch_signal(Arc::clone(&signal));

        let thread = {
            let manager = Arc::clone(&manager);
            let signal = Arc::clone(&signal);
            thread::Builder::new()
                .name("imgcache-prefetch".into())
                .spawn(move || run(&manager, &signal))
        };
        let thread = match thread {
            Ok(thread) => thread,
            Err(err) => {
                manager.lock().detach_prefetch_signal(&signal);
                return Err(err);
            },
        };
        debug!("background image loader started");
        Ok(Self {
            manager,
            signal,
            thread: Some(thread),
        })
    }

    pub fn manager(&self) -> &SharedResourceManager<B> {
        &self.manager
    }

    /// Queues `id`; see [`ResourceManager::add_to_prefetch_queue`].
    pub fn add_to_prefetch_queue(&self, id: ImageId) -> bool {
        self.manager.lock().add_to_prefetch_queue(id)
    }

    /// Cancels a prefetch; see [`ResourceManager::remove_from_prefetch_queue`].
    pub fn remove_from_prefetch_queue(&self, id: ImageId) -> bool {
        self.manager.lock().remove_from_prefetch_queue(id)
    }
}

impl<B> BackgroundImageLoader<B> {
    /// Stops and joins the worker thread, then detaches from the manager.
    ///
    /// Locks the manager, as does dropping the loader; the caller must not
    /// hold that lock.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.signal.stop();
        if thread.join().is_err() {
            warn!("background image loader panicked");
        } else {
            debug!("background image loader stopped");
        }
        self.manager.lock().detach_prefetch_signal(&self.signal);
    }
}

impl<B> Drop for BackgroundImageLoader<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<B: GraphicsBackend>(manager: &Mutex<ResourceManager<B>>, signal: &Signal) {
    while signal.acquire() {
        let delay = {
            let mut manager = manager.lock();
            let outcome = manager.prefetch_now();
            trace!(
                released = outcome.released,
                step = ?outcome.step,
                remaining = outcome.remaining,
                "prefetch step"
            );
            manager.prefetch_delay()
        };
        signal.pause(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cache::ImageCache;
    use crate::image::{ImageInfo, PixelFormat};
    use crate::policy::ReplacementPolicyKind;

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn shared_manager() -> SharedResourceManager<MemoryBackend> {
        let mut backend = MemoryBackend::new();
        backend.add_image("a.png", ImageInfo::new(4, 4, PixelFormat::A8));
        backend.add_image("b.png", ImageInfo::new(4, 4, PixelFormat::A8));
        let cache = ImageCache::new(
            backend,
            1024,
            ReplacementPolicyKind::Lru,
            ReplacementPolicyKind::Lru,
        );
        let mut manager = ResourceManager::with_cache(cache);
        manager.set_prefetch_delay(Duration::from_millis(1));
        manager.register_image_resource("a.png", ImageId(1), false);
        manager.register_image_resource("b.png", ImageId(2), false);
        Arc::new(Mutex::new(manager))
    }

    #[test]
    fn semaphore_counts_permits() {
        let signal = Signal::default();
        signal.release();
        signal.release();
        assert!(signal.acquire());
        assert!(signal.acquire());
        signal.stop();
        assert!(!signal.acquire());
    }

    #[test]
    fn worker_prefetches_queued_images() {
        let manager = shared_manager();
        let loader = BackgroundImageLoader::spawn(Arc::clone(&manager)).unwrap();
        assert!(loader.add_to_prefetch_queue(ImageId(1)));
        assert!(loader.add_to_prefetch_queue(ImageId(2)));

        assert!(wait_for(|| {
            let manager = manager.lock();
            manager.is_loaded(ImageId(1)) && manager.is_loaded(ImageId(2))
        }));
        assert_eq!(manager.lock().image_request_count(ImageId(1)), Some(0));
        loader.shutdown();
    }

    #[test]
    fn cancelled_prefetch_is_released_by_worker() {
        let manager = shared_manager();
        let loader = BackgroundImageLoader::spawn(Arc::clone(&manager)).unwrap();
        loader.add_to_prefetch_queue(ImageId(1));
        assert!(wait_for(|| manager.lock().is_loaded(ImageId(1))));

        assert!(loader.remove_from_prefetch_queue(ImageId(1)));
        assert!(wait_for(|| !manager.lock().is_loaded(ImageId(1))));
        drop(loader);
    }

    #[test]
    fn queueing_on_the_locked_manager_wakes_worker() {
        let manager = shared_manager();
        let loader = BackgroundImageLoader::spawn(Arc::clone(&manager)).unwrap();

        assert!(manager.lock().add_to_prefetch_queue(ImageId(1)));
        assert!(wait_for(|| manager.lock().is_loaded(ImageId(1))));
        assert_eq!(manager.lock().prefetch_queue_len(), 0);

        assert!(manager.lock().remove_from_prefetch_queue(ImageId(1)));
        assert!(wait_for(|| !manager.lock().is_loaded(ImageId(1))));
        loader.shutdown();
    }

    #[test]
    fn shutdown_detaches_semaphore() {
        let manager = shared_manager();
        let loader = BackgroundImageLoader::spawn(Arc::clone(&manager)).unwrap();
        let signal = Arc::clone(&loader.signal);
        loader.shutdown();

        manager.lock().add_to_prefetch_queue(ImageId(2));
        assert_eq!(signal.permits(), 0);
        assert_eq!(manager.lock().prefetch_queue_len(), 1);
    }

    #[test]
    fn ids_queued_before_spawn_are_processed() {
        let manager = shared_manager();
        manager.lock().add_to_prefetch_queue(ImageId(2));
        let _loader = BackgroundImageLoader::spawn(Arc::clone(&manager)).unwrap();
        assert!(wait_for(|| manager.lock().is_loaded(ImageId(2))));
    }

    #[test]
    fn shutdown_interrupts_long_delay() {
        let manager = shared_manager();
        manager.lock().set_prefetch_delay(Duration::from_secs(60));
        let loader = BackgroundImageLoader::spawn(Arc::clone(&manager)).unwrap();
        loader.add_to_prefetch_queue(ImageId(1));
        assert!(wait_for(|| manager.lock().is_loaded(ImageId(1))));

        let started = Instant::now();
        loader.shutdown();
        assert!(started.elapsed() < Duration::from_secs(30));
    }
}
