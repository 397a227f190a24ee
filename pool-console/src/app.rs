// SPDX-License-Identifier: GPL-3.0-only

//! Console wiring and the single-threaded event loop

use std::future::Future;
use std::io::Write;
use std::rc::Rc;

use pool_contracts::{Action, DispatchError, ZfsMiddleware};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

use crate::dispatcher::Dispatcher;
use crate::stores::{SchemaStore, SessionStore, SubscriptionStore, VolumeStore};
use crate::views::StorageView;
use crate::views::text::format_page;

/// The dispatcher, its stores and the Storage view, wired together
pub struct Console<M> {
    dispatcher: Rc<Dispatcher>,
    volumes: Rc<VolumeStore>,
    session: Rc<SessionStore>,
    schema: Rc<SchemaStore>,
    subscriptions: Rc<SubscriptionStore>,
    view: StorageView<M>,
}

impl<M> std::fmt::Debug for Console<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("dispatcher", &self.dispatcher)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl<M: ZfsMiddleware> Console<M> {
    pub fn new(middleware: Rc<M>) -> Self {
        let dispatcher = Rc::new(Dispatcher::new());
        let volumes = Rc::new(VolumeStore::new());
        let session = Rc::new(SessionStore::new());
        let schema = Rc::new(SchemaStore::new());
        let subscriptions = Rc::new(SubscriptionStore::new());

        dispatcher.register(schema.clone());
        dispatcher.register(session.clone());
        dispatcher.register(subscriptions.clone());
        dispatcher.register(volumes.clone());

        let view = StorageView::new(Rc::clone(&volumes), middleware);

        Self {
            dispatcher,
            volumes,
            session,
            schema,
            subscriptions,
            view,
        }
    }

    pub fn dispatcher(&self) -> &Rc<Dispatcher> {
        &self.dispatcher
    }

    pub fn volumes(&self) -> &VolumeStore {
        &self.volumes
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn schema(&self) -> &SchemaStore {
        &self.schema
    }

    pub fn subscriptions(&self) -> &SubscriptionStore {
        &self.subscriptions
    }

    pub fn view(&self) -> &StorageView<M> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut StorageView<M> {
        &mut self.view
    }

    pub fn dispatch(&self, action: Action) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(&action)
    }

    /// Dispatch every action already queued, without waiting for more.
    /// Returns how many were dispatched.
    pub fn pump(&self, receiver: &mut UnboundedReceiver<Action>) -> usize {
        let mut dispatched = 0;
        loop {
            match receiver.try_recv() {
                Ok(action) => {
                    if let Err(error) = self.dispatch(action) {
                        tracing::warn!(%error, "action dropped");
                    }
                    dispatched += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return dispatched,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after the first render with pools loaded
    pub once: bool,
    pub show_datasets: bool,
}

/// Mount the Storage view, feed queued actions to the dispatcher and print
/// the page whenever it changes. Returns after `shutdown` resolves, the
/// action channel closes, or (with `once`) the first loaded render; the view
/// is unmounted before returning.
pub async fn run<M, W, S>(
    console: &mut Console<M>,
    mut actions: UnboundedReceiver<Action>,
    options: RunOptions,
    out: &mut W,
    shutdown: S,
) -> anyhow::Result<()>
where
    M: ZfsMiddleware,
    W: Write,
    S: Future<Output = ()>,
{
    if let Err(error) = console.view_mut().mount() {
        tracing::warn!(%error, "storage view mounted with errors");
    }

    let mut last_page = String::new();
    let mut print = |console: &Console<M>, out: &mut W| -> std::io::Result<()> {
        let page = format_page(&console.view().render(), options.show_datasets);
        if page != last_page {
            writeln!(out, "{page}")?;
            out.flush()?;
            last_page = page;
        }
        Ok(())
    };
    print(&*console, &mut *out)?;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            action = actions.recv() => {
                let Some(action) = action else {
                    tracing::warn!("action channel closed");
                    break;
                };
                if let Err(error) = console.dispatch(action) {
                    tracing::warn!(%error, "action dropped");
                }
                // Settle everything already queued before printing.
                console.pump(&mut actions);
                print(&*console, &mut *out)?;

                if options.once && console.view().is_initialized() {
                    break;
                }
            }
            () = &mut shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    if let Err(error) = console.view_mut().unmount() {
        tracing::warn!(%error, "storage view unmounted with errors");
    }

    Ok(())
}
