//! Surface controller: the subscription table and the dispatch loop
//!
//! Owns the device driver, the per-pad handler registrations and the
//! background task that turns inbound MIDI into handler invocations.
//!
//! Concurrency contract: handlers run synchronously on the dispatch task,
//! in registration order for a given pad, in arrival order across pads.
//! Registration is allowed while the loop is running; the table sits
//! behind an async `RwLock` so loop reads and caller writes are
//! serialized. LED writes go through a mutex-guarded output connection
//! and may be issued from any thread, including from inside a handler.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::codec::{self, Brightness, PadAddress, PadEdge, Region};
use crate::error::Error;
use crate::launchpad::{LaunchpadDriver, PadEvent};

/// Callback invoked on one press or release edge of one pad
pub type PadCallback = Arc<dyn Fn() + Send + Sync>;

/// Capability object handling both edges of one pad.
///
/// `bind` registers one of these for press and release at once; the
/// implementation decides what "press" means (key injection, logging, ...)
/// so the controller never embeds that logic itself.
pub trait PadHandler: Send + Sync {
    fn press(&self);
    fn release(&self);
}

/// Per-pad handler slots, one ordered sequence per edge
#[derive(Default)]
struct Slots {
    press: Vec<PadCallback>,
    release: Vec<PadCallback>,
}

type SubscriptionTable = HashMap<PadAddress, Slots>;

/// Dispatch loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Stopped,
}

/// The surface controller
pub struct Surface {
    driver: LaunchpadDriver,
    table: Arc<RwLock<SubscriptionTable>>,
    state: RunState,
    shutdown_tx: Option<watch::Sender<bool>>,
    loop_handle: Option<JoinHandle<()>>,
}

impl Surface {
    /// Wrap a (typically already connected) driver
    pub fn new(driver: LaunchpadDriver) -> Self {
        Self {
            driver,
            table: Arc::new(RwLock::new(HashMap::new())),
            state: RunState::NotStarted,
            shutdown_tx: None,
            loop_handle: None,
        }
    }

    /// Current loop state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Register a callback for presses of one pad.
    ///
    /// Appends to the pad's press sequence; earlier registrations keep
    /// their invocation priority. Out-of-range addresses register nothing.
    pub async fn on_press(&self, region: Region, index: u8, callback: PadCallback) -> Result<(), Error> {
        let addr = PadAddress::new(region, index)?;
        self.table
            .write()
            .await
            .entry(addr)
            .or_default()
            .press
            .push(callback);
        Ok(())
    }

    /// Register a callback for releases of one pad
    pub async fn on_release(&self, region: Region, index: u8, callback: PadCallback) -> Result<(), Error> {
        let addr = PadAddress::new(region, index)?;
        self.table
            .write()
            .await
            .entry(addr)
            .or_default()
            .release
            .push(callback);
        Ok(())
    }

    /// Register a capability object for both edges of one pad
    pub async fn bind(
        &self,
        region: Region,
        index: u8,
        handler: Arc<dyn PadHandler>,
    ) -> Result<(), Error> {
        let addr = PadAddress::new(region, index)?;
        let mut table = self.table.write().await;
        let slots = table.entry(addr).or_default();

        let pressed = handler.clone();
        slots.press.push(Arc::new(move || pressed.press()));
        slots.release.push(Arc::new(move || handler.release()));
        Ok(())
    }

    /// Set one pad's LED; range errors match the subscribe operations
    pub fn set_led(&self, region: Region, index: u8, green: Brightness, red: Brightness) -> Result<()> {
        self.driver.set_led(region, index, green, red)
    }

    /// Set a grid LED by (row, col)
    pub fn set_grid_led(&self, row: u8, col: u8, green: Brightness, red: Brightness) -> Result<()> {
        self.driver.set_grid_led(row, col, green, red)
    }

    /// Turn the whole surface off
    pub fn clear_all(&self) -> Result<()> {
        self.driver.clear_all()
    }

    /// Start the dispatch loop on a background task and return immediately.
    ///
    /// Errors if the loop was already started; the `NotStarted → Running →
    /// Stopped` progression is one-way.
    pub fn run(&mut self) -> Result<(), Error> {
        if self.state != RunState::NotStarted {
            return Err(Error::AlreadyRunning);
        }

        let events = self
            .driver
            .take_event_receiver()
            .ok_or(Error::NotConnected)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.loop_handle = Some(spawn_dispatch_loop(events, self.table.clone(), shutdown_rx));
        self.shutdown_tx = Some(shutdown_tx);
        self.state = RunState::Running;
        Ok(())
    }

    /// Signal the dispatch loop to stop and wait for it to finish.
    ///
    /// A no-op unless the loop is running.
    pub async fn stop(&mut self) {
        if self.state != RunState::Running {
            return;
        }

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.loop_handle.take() {
            if let Err(e) = handle.await {
                warn!("Dispatch loop task failed: {}", e);
            }
        }
        self.state = RunState::Stopped;
    }

    /// Release the MIDI connections. Call after `stop`.
    pub fn disconnect(&mut self) {
        self.driver.disconnect();
    }
}

/// Spawn the drain-decode-dispatch cycle on its own task.
///
/// The midir input callback is the producer; awaiting the channel replaces
/// the original busy-poll, so an idle surface costs nothing. The loop ends
/// when the shutdown signal flips or the channel closes (input connection
/// gone) - the latter is logged as a warning rather than dying silently.
fn spawn_dispatch_loop(
    mut events: mpsc::Receiver<PadEvent>,
    table: Arc<RwLock<SubscriptionTable>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Dispatch loop started");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => dispatch(&table, &event).await,
                    None => {
                        warn!("Input event stream closed, dispatch loop terminating");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    info!("Dispatch loop stopped");
                    break;
                }
            }
        }
    })
}

/// Decode one inbound event and invoke its registered handlers
async fn dispatch(table: &RwLock<SubscriptionTable>, event: &PadEvent) {
    let Some((addr, edge)) = codec::decode(&event.message) else {
        trace!("Ignoring non-button message: {}", event.message);
        return;
    };

    debug!("Pad event: {} {:?}", addr, edge);

    // Clone the handlers out so none run under the table lock; a handler
    // is then free to trigger further registrations without deadlock.
    let callbacks: Vec<PadCallback> = {
        let table = table.read().await;
        match table.get(&addr) {
            // Unbound addresses are a silent no-op; lookup never inserts.
            None => return,
            Some(slots) => match edge {
                PadEdge::Press => slots.press.clone(),
                PadEdge::Release => slots.release.clone(),
            },
        }
    };

    for callback in &callbacks {
        callback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn test_surface() -> Surface {
        Surface::new(LaunchpadDriver::new("test_in", "test_out"))
    }

    fn pad_event(message: MidiMessage) -> PadEvent {
        PadEvent {
            timestamp: Instant::now(),
            raw: message.encode().to_vec(),
            message,
        }
    }

    fn counting(counter: &Arc<AtomicUsize>) -> PadCallback {
        let counter = counter.clone();
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn wait_until(counter: &Arc<AtomicUsize>, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while counter.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("callback was not invoked in time");
    }

    #[tokio::test]
    async fn test_callbacks_fire_in_registration_order() {
        let surface = test_surface();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = order.clone();
            surface
                .on_press(
                    Region::Grid,
                    5,
                    Arc::new(move || order.lock().unwrap().push(tag)),
                )
                .await
                .unwrap();
        }

        let press = pad_event(MidiMessage::NoteOn {
            note: 5,
            velocity: 127,
        });
        dispatch(&surface.table, &press).await;

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_out_of_range_subscription_registers_nothing() {
        let surface = test_surface();
        let counter = Arc::new(AtomicUsize::new(0));

        let err = surface
            .on_press(Region::Grid, 64, counting(&counter))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 64, .. }));

        let err = surface
            .on_release(Region::CommandRow, 8, counting(&counter))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 8, .. }));

        assert!(surface.table.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_press_does_not_invoke_release_slot() {
        let surface = test_surface();
        let presses = Arc::new(AtomicUsize::new(0));

        surface
            .on_press(Region::Grid, 0, counting(&presses))
            .await
            .unwrap();

        // Press at note 0 fires the handler exactly once.
        let press = pad_event(MidiMessage::NoteOn {
            note: 0,
            velocity: 127,
        });
        dispatch(&surface.table, &press).await;
        assert_eq!(presses.load(Ordering::SeqCst), 1);

        // Release hits the (empty) release slot: nothing fires, no error.
        let release = pad_event(MidiMessage::NoteOff {
            note: 0,
            velocity: 0,
        });
        dispatch(&surface.table, &release).await;
        assert_eq!(presses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbound_address_is_silently_dropped() {
        let surface = test_surface();

        let press = pad_event(MidiMessage::NoteOn {
            note: 17,
            velocity: 127,
        });
        dispatch(&surface.table, &press).await;

        // Lookup must not create an entry.
        assert!(surface.table.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_intermediate_values_do_not_dispatch() {
        let surface = test_surface();
        let counter = Arc::new(AtomicUsize::new(0));

        surface
            .on_press(Region::CommandRow, 0, counting(&counter))
            .await
            .unwrap();
        surface
            .on_release(Region::CommandRow, 0, counting(&counter))
            .await
            .unwrap();

        let sweep = pad_event(MidiMessage::ControlChange {
            control: 104,
            value: 64,
        });
        dispatch(&surface.table, &sweep).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bind_routes_both_edges() {
        struct Recorder {
            presses: AtomicUsize,
            releases: AtomicUsize,
        }

        impl PadHandler for Recorder {
            fn press(&self) {
                self.presses.fetch_add(1, Ordering::SeqCst);
            }
            fn release(&self) {
                self.releases.fetch_add(1, Ordering::SeqCst);
            }
        }

        let surface = test_surface();
        let recorder = Arc::new(Recorder {
            presses: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        });

        surface
            .bind(Region::CommandColumn, 3, recorder.clone())
            .await
            .unwrap();

        // Column 3 lives at note 56.
        let press = pad_event(MidiMessage::NoteOn {
            note: 56,
            velocity: 127,
        });
        let release = pad_event(MidiMessage::NoteOff {
            note: 56,
            velocity: 0,
        });
        dispatch(&surface.table, &press).await;
        dispatch(&surface.table, &release).await;
        dispatch(&surface.table, &press).await;

        assert_eq!(recorder.presses.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loop_dispatches_then_stops_on_signal() {
        let surface = test_surface();
        let counter = Arc::new(AtomicUsize::new(0));
        surface
            .on_press(Region::Grid, 9, counting(&counter))
            .await
            .unwrap();

        let (event_tx, event_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_dispatch_loop(event_rx, surface.table.clone(), shutdown_rx);

        // Grid index 9 is note 17.
        let press = pad_event(MidiMessage::NoteOn {
            note: 17,
            velocity: 127,
        });
        event_tx.send(press.clone()).await.unwrap();
        event_tx.send(press).await.unwrap();
        wait_until(&counter, 2).await;

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_loop_terminates_when_stream_closes() {
        let surface = test_surface();
        let (event_tx, event_rx) = mpsc::channel::<PadEvent>(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_dispatch_loop(event_rx, surface.table.clone(), shutdown_rx);

        drop(event_tx);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not notice the closed stream")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_twice_errors_and_stop_transitions() {
        let mut surface = test_surface();

        assert_eq!(surface.state(), RunState::NotStarted);
        surface.run().unwrap();
        assert_eq!(surface.state(), RunState::Running);

        assert!(matches!(surface.run(), Err(Error::AlreadyRunning)));

        surface.stop().await;
        assert_eq!(surface.state(), RunState::Stopped);

        // Stopped is terminal.
        assert!(matches!(surface.run(), Err(Error::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_registration_after_run_is_accepted() {
        let mut surface = test_surface();
        surface.run().unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        surface
            .on_press(Region::Grid, 0, counting(&counter))
            .await
            .unwrap();

        surface.stop().await;
    }
}
