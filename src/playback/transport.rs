//! Wall-clock driver for a [`Player`].
//!
//! Two recurring timers run against one shared player: the tick timer while
//! playing and the seek timer while a smooth seek is in flight. Each timer is a
//! thread sleeping on `recv_timeout`; dropping its stop sender cancels it.
//! Every timer carries the epoch it was started in and exits without touching
//! the player once the epoch has moved on, so a cancelled timer never fires
//! a stale tick.

use super::player::{NoteOutput, Player};
use super::types::{Navigation, TickOutcome};
use crate::pitch::Pitch;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

/// A recurring callback on its own thread.
pub struct TimerTask {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TimerTask {
    /// Call `body` every `interval` until it breaks or the task is cancelled.
    pub fn spawn<F>(interval: Duration, mut body: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if body().is_break() {
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stop the timer. Safe to call more than once.
    pub fn cancel(&mut self) {
        self.stop.take();
    }

    /// Block until the timer stops on its own.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("timer thread panicked");
            }
        }
    }
}

impl Drop for TimerTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock<O: NoteOutput>(player: &Mutex<Player<O>>) -> MutexGuard<'_, Player<O>> {
    player.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Transport<O: NoteOutput + 'static> {
    player: Arc<Mutex<Player<O>>>,
    tick_epoch: Arc<AtomicU64>,
    seek_epoch: Arc<AtomicU64>,
    tick_task: Option<TimerTask>,
    seek_task: Option<TimerTask>,
}

impl<O: NoteOutput + 'static> Transport<O> {
    pub fn new(player: Player<O>) -> Self {
        Self {
            player: Arc::new(Mutex::new(player)),
            tick_epoch: Arc::new(AtomicU64::new(0)),
            seek_epoch: Arc::new(AtomicU64::new(0)),
            tick_task: None,
            seek_task: None,
        }
    }

    /// Shared handle to the player, for renderers polling its state.
    pub fn player(&self) -> Arc<Mutex<Player<O>>> {
        Arc::clone(&self.player)
    }

    pub fn with_player<R>(&self, f: impl FnOnce(&mut Player<O>) -> R) -> R {
        f(&mut lock(&self.player))
    }

    pub fn is_playing(&self) -> bool {
        self.with_player(|player| player.is_playing())
    }

    /// Start or stop playback and its tick timer. Returns whether playback is
    /// now running.
    pub fn toggle_play(&mut self) -> bool {
        let (playing, epoch, amount, interval) = {
            let mut player = lock(&self.player);
            let playing = player.toggle_play();
            let epoch = self.tick_epoch.fetch_add(1, Ordering::SeqCst) + 1;
            let config = player.config();
            (playing, epoch, config.tick_amount, config.tick_interval())
        };
        self.tick_task.take();

        if playing {
            let player = Arc::clone(&self.player);
            let current = Arc::clone(&self.tick_epoch);
            self.tick_task = Some(TimerTask::spawn(interval, move || {
                let mut player = lock(&player);
                if current.load(Ordering::SeqCst) != epoch {
                    trace!(epoch, "stale tick timer");
                    return ControlFlow::Break(());
                }
                match player.tick(amount) {
                    TickOutcome::Continue => ControlFlow::Continue(()),
                    TickOutcome::Stopped => ControlFlow::Break(()),
                }
            }));
        }
        playing
    }

    pub fn stop(&mut self) {
        {
            let mut player = lock(&self.player);
            player.stop();
            self.tick_epoch.fetch_add(1, Ordering::SeqCst);
        }
        self.tick_task.take();
    }

    /// Animate the position to `target`, cancelling any seek in flight.
    pub fn seek_smooth(&mut self, target: i64) {
        let epoch = {
            let mut player = lock(&self.player);
            player.begin_seek(target);
            self.seek_epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.spawn_seek_task(epoch);
    }

    /// Smooth-seek to a navigation target. Returns the target, if any.
    pub fn navigate(&mut self, navigation: Navigation) -> Option<i64> {
        let target = self.with_player(|player| player.navigation_target(navigation))?;
        self.seek_smooth(target);
        Some(target)
    }

    /// Jump straight to `position`, cancelling any seek in flight.
    pub fn seek_to(&mut self, position: i64) {
        {
            let mut player = lock(&self.player);
            player.seek_to(position);
            self.seek_epoch.fetch_add(1, Ordering::SeqCst);
        }
        self.seek_task.take();
    }

    pub fn note_on(&self, pitch: Pitch) {
        self.with_player(|player| player.note_on(pitch));
    }

    pub fn note_off(&self, pitch: Pitch) {
        self.with_player(|player| player.note_off(pitch));
    }

    /// Block until the tick timer ends on its own, which happens when playback
    /// reaches the end of the score. Returns immediately when not playing.
    pub fn wait_until_stopped(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.join();
        }
    }

    fn spawn_seek_task(&mut self, epoch: u64) {
        self.seek_task.take();
        let interval = self.with_player(|player| player.config().seek_interval());
        let player = Arc::clone(&self.player);
        let current = Arc::clone(&self.seek_epoch);
        self.seek_task = Some(TimerTask::spawn(interval, move || {
            let mut player = lock(&player);
            if current.load(Ordering::SeqCst) != epoch {
                return ControlFlow::Break(());
            }
            if player.seek_step() {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        }));
    }
}

impl<O: NoteOutput + 'static> Drop for Transport<O> {
    fn drop(&mut self) {
        self.tick_epoch.fetch_add(1, Ordering::SeqCst);
        self.seek_epoch.fetch_add(1, Ordering::SeqCst);
    }
}
