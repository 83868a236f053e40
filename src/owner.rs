//! Dedicated owner thread for backends that do not bring a native loop.
//!
//! The thread builds the backend and the factory itself, hands the factory
//! back, then services marshaled calls until shut down. The backend is
//! disposed on the same thread before it exits.

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel as channel;

use crate::backend::NativeBackend;
use crate::config::BindingConfig;
use crate::error::{BindingError, Result};
use crate::factory::WindowFactory;

/// Disposes the factory however the loop ends, so no caller waits on a
/// thread that is gone and the backend never outlives its thread.
struct ShutdownGuard(Arc<WindowFactory>);

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        let stranded = self.0.dispatcher().pending();
        if stranded > 0 {
            log::error!("Owner loop exited with {} calls still queued", stranded);
        }
        if let Err(e) = self.0.dispose() {
            log::error!("Failed to dispose window factory: {}", e);
            self.0.shutdown();
        }
    }
}

pub struct OwnerThread {
    factory: Arc<WindowFactory>,
    thread_id: ThreadId,
    join: Option<JoinHandle<()>>,
}

impl OwnerThread {
    /// Start the owner thread and wait until its factory is ready.
    ///
    /// `make_backend` runs on the new thread, so the backend never leaves it.
    pub fn spawn<F>(config: &BindingConfig, make_backend: F) -> Result<Self>
    where
        F: FnOnce(&BindingConfig) -> Box<dyn NativeBackend> + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        let thread_config = config.clone();

        let join = thread::Builder::new()
            .name(config.owner_thread_name.clone())
            .spawn(move || {
                let factory = match WindowFactory::new(make_backend(&thread_config)) {
                    Ok(factory) => factory,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };

                let _guard = ShutdownGuard(Arc::clone(&factory));
                if tx.send(Ok(Arc::clone(&factory))).is_err() {
                    return;
                }

                match factory.dispatcher().run() {
                    Ok(executed) => log::debug!(
                        "Owner thread {:?} exiting after {} calls",
                        thread_config.owner_thread_name,
                        executed
                    ),
                    Err(e) => log::error!("Owner loop failed: {}", e),
                }
            })?;

        // A closed channel means the thread died before reporting back.
        let factory = rx.recv().map_err(|_| BindingError::DispatcherUnavailable)??;
        Ok(Self {
            factory,
            thread_id: join.thread().id(),
            join: Some(join),
        })
    }

    pub fn factory(&self) -> &Arc<WindowFactory> {
        &self.factory
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Stop the dispatcher and wait for the thread to finish.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.factory.shutdown();
        match self.join.take() {
            Some(join) => join.join().map_err(|_| {
                log::error!("Owner thread panicked");
                BindingError::DispatcherUnavailable
            }),
            None => Ok(()),
        }
    }
}

impl Drop for OwnerThread {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for OwnerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerThread")
            .field("thread_id", &self.thread_id)
            .field("running", &self.join.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WindowKind;
    use crate::error::BackendError;
    use crate::factory::Widget;
    use crate::geometry::Rect;
    use crate::headless::HeadlessBackend;
    use crate::test_support::{RecordingBackend, TestWidget};

    #[test]
    fn test_spawn_names_thread_and_binds_factory() {
        let config = BindingConfig::default().with_owner_thread_name("ui-owner");
        let owner =
            OwnerThread::spawn(&config, |config| Box::new(HeadlessBackend::new(config))).unwrap();

        let name = owner
            .factory()
            .invoke(|| thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(name.as_deref(), Some("ui-owner"));
        assert_eq!(owner.factory().dispatcher().owner(), owner.thread_id());
        assert!(owner.factory().invoke_required());
    }

    #[test]
    fn test_anchor_failure_is_reported_to_spawner() {
        let recorder = RecordingBackend::new(&BindingConfig::default());
        recorder.refuse_creations("no display");
        let backend = recorder.clone();

        let err = OwnerThread::spawn(&BindingConfig::default(), move |_| backend.boxed()).unwrap_err();

        assert!(matches!(
            err,
            BindingError::BackendCreationFailure {
                kind: WindowKind::Anchor,
                source: BackendError::Refused(_),
            }
        ));
    }

    #[test]
    fn test_panicking_backend_builder_does_not_hang_spawner() {
        let err = OwnerThread::spawn(&BindingConfig::default(), |_| -> Box<dyn NativeBackend> {
            panic!("display unavailable")
        })
        .unwrap_err();
        assert!(matches!(err, BindingError::DispatcherUnavailable));
    }

    #[test]
    fn test_shutdown_joins_and_rejects_later_calls() {
        let recorder = RecordingBackend::new(&BindingConfig::default());
        let backend = recorder.clone();
        let owner = OwnerThread::spawn(&BindingConfig::default(), move |_| backend.boxed()).unwrap();
        let factory = Arc::clone(owner.factory());

        factory
            .create_popup_window(&TestWidget::new(), Rect::new(0, 0, 4, 4))
            .unwrap();
        owner.shutdown().unwrap();

        assert!(!factory.dispatcher().is_running());
        assert!(matches!(factory.invoke(|| ()), Err(BindingError::DispatcherUnavailable)));
    }

    #[test]
    fn test_backend_is_released_on_owner_thread() {
        let recorder = RecordingBackend::new(&BindingConfig::default());
        let backend = recorder.clone();
        let owner = OwnerThread::spawn(&BindingConfig::default(), move |_| backend.boxed()).unwrap();
        let owner_id = owner.thread_id();
        let factory = Arc::clone(owner.factory());

        let widget = TestWidget::new();
        let popup = factory
            .create_popup_window(&widget, Rect::new(0, 0, 4, 4))
            .unwrap();
        owner.shutdown().unwrap();

        assert_eq!(recorder.dropped_on(), vec![owner_id]);
        assert!(!recorder.headless.contains(factory.anchor().raw));
        assert!(!recorder.headless.contains(popup.raw));
        assert!(!widget.native_slot().is_materialized());

        // The last handle to the factory goes away on this thread.
        drop(factory);
        assert_eq!(recorder.dropped_on(), vec![owner_id]);
    }

    #[test]
    fn test_panicking_call_leaves_owner_serving() {
        let owner = OwnerThread::spawn(&BindingConfig::default(), |config| {
            Box::new(HeadlessBackend::new(config))
        })
        .unwrap();
        let factory = Arc::clone(owner.factory());

        let caught = thread::spawn({
            let factory = Arc::clone(&factory);
            move || factory.invoke(|| -> u32 { panic!("handler bug") })
        })
        .join();
        assert!(caught.is_err());

        assert_eq!(factory.invoke(|| 5).unwrap(), 5);
    }
}
