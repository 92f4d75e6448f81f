//! Alarm override state machine.
//!
//! While any sounding alarm is tracked the stereo is switched to the alarm
//! input, optionally turned up and unmuted, and the alarm sound is played
//! in a loop. When the last alarm clears, the state captured on entry is
//! put back through a fixed, spaced sequence of commands.
//!
//! The machine runs as a single task that owns the tracker, the snapshot
//! and the pending sequence. Notifications reach it over a channel, so the
//! "tracker became empty" check can never race with a new alarm.

use crate::alarm::{AlarmTracker, Notification};
use crate::command::Command;
use crate::config::Config;
use crate::controller::Controller;
use crate::codec::ZONE_COUNT;
use crate::error::{FusionError, Result};
use crate::playback::AudioPlayer;
use crate::sequence::{Sequence, SETTLE_DELAY};
use crate::types::DeviceStateSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

/// Where the override machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Overriding,
    Restoring,
}

/// Observable state of the override machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideStatus {
    pub phase: Phase,
    pub active_alarms: usize,
}

/// Alarm related options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSettings {
    /// Display name of the input the alarm audio is wired to
    pub input: String,
    /// Apply `volumes` while overriding
    pub set_volume: bool,
    pub volumes: [u32; ZONE_COUNT],
    /// Unmute a muted stereo while overriding
    pub unmute: bool,
}

impl From<&Config> for AlarmSettings {
    fn from(config: &Config) -> Self {
        Self {
            input: config.alarm_input.clone(),
            set_volume: config.alarm_set_volume,
            volumes: config.alarm_volumes(),
            unmute: config.alarm_unmute,
        }
    }
}

/// Handle to the running alarm override task
pub struct AlarmOverride {
    notify_tx: mpsc::UnboundedSender<Vec<Notification>>,
    status_rx: watch::Receiver<OverrideStatus>,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

impl AlarmOverride {
    /// Spawn the override task
    ///
    /// Without a player the stereo is still reconfigured and restored,
    /// only the sound loop is skipped.
    pub fn start(
        settings: AlarmSettings,
        controller: Controller,
        player: Option<Arc<dyn AudioPlayer>>,
    ) -> Self {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(OverrideStatus {
            phase: Phase::Idle,
            active_alarms: 0,
        });
        let (stop_tx, _) = broadcast::channel(1);
        let stop_rx = stop_tx.subscribe();
        let alarm_output_rx = controller.subscribe_alarm_output();

        let task = OverrideTask {
            settings,
            controller,
            player,
            tracker: AlarmTracker::new(),
            phase: Phase::Idle,
            status_tx,
            episode: None,
            steps: Sequence::new(),
            deadline: None,
            last_sent: None,
            playback: None,
        };

        let handle = tokio::spawn(task.run(notify_rx, stop_rx, alarm_output_rx));

        Self {
            notify_tx,
            status_rx,
            stop_tx: Some(stop_tx),
            task_handle: Some(handle),
        }
    }

    /// Feed one batch of notification updates
    pub fn notify(&self, batch: Vec<Notification>) -> Result<()> {
        self.notify_tx
            .send(batch)
            .map_err(|_| FusionError::ChannelError("alarm override stopped".to_string()))
    }

    pub fn status(&self) -> OverrideStatus {
        *self.status_rx.borrow()
    }

    pub fn phase(&self) -> Phase {
        self.status().phase
    }

    /// Watch phase and alarm count changes
    pub fn subscribe_status(&self) -> watch::Receiver<OverrideStatus> {
        self.status_rx.clone()
    }

    /// Stop the task, dropping any pending step and the running sound
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
        }
    }
}

/// Per-episode state, alive from override entry until restore completes
struct Episode {
    id: Uuid,
    snapshot: DeviceStateSnapshot,
    powered_on: bool,
    volume_applied: bool,
    unmute_applied: bool,
    playback_halted: bool,
}

struct OverrideTask {
    settings: AlarmSettings,
    controller: Controller,
    player: Option<Arc<dyn AudioPlayer>>,
    tracker: AlarmTracker,
    phase: Phase,
    status_tx: watch::Sender<OverrideStatus>,
    episode: Option<Episode>,
    steps: Sequence,
    deadline: Option<Instant>,
    last_sent: Option<Instant>,
    playback: Option<JoinHandle<Result<()>>>,
}

impl OverrideTask {
    async fn run(
        mut self,
        mut notify_rx: mpsc::UnboundedReceiver<Vec<Notification>>,
        mut stop_rx: broadcast::Receiver<()>,
        mut alarm_output_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = stop_rx.recv() => {
                    tracing::info!("Alarm override stopped");
                    break;
                }
                batch = notify_rx.recv() => match batch {
                    Some(batch) => self.on_notifications(batch),
                    None => break,
                },
                Ok(()) = alarm_output_rx.changed() => {
                    let enabled = *alarm_output_rx.borrow_and_update();
                    if !enabled && !self.tracker.is_empty() {
                        tracing::info!(
                            "Alarm output disabled, releasing {:?}",
                            self.tracker.paths()
                        );
                        self.tracker.clear();
                        self.evaluate();
                    }
                }
                _ = sleep_until(self.deadline.unwrap_or_else(Instant::now)),
                    if self.deadline.is_some() =>
                {
                    self.deadline = None;
                    if let Some(step) = self.steps.pop() {
                        self.execute(&step.command);
                    }
                    self.advance();
                }
                result = join_playback(&mut self.playback), if self.playback.is_some() => {
                    self.playback = None;
                    self.on_playback_done(result);
                }
            }
        }

        if let Some(handle) = self.playback.take() {
            handle.abort();
        }
        if !self.steps.is_empty() {
            tracing::info!("Dropping {} pending step(s)", self.steps.len());
        }
    }

    fn on_notifications(&mut self, batch: Vec<Notification>) {
        if !self.controller.alarm_output_enabled() {
            tracing::debug!("Alarm output disabled, ignoring {} notification(s)", batch.len());
            return;
        }

        let change = self.tracker.apply(&batch);
        if change.added > 0 || change.removed > 0 {
            tracing::debug!(
                "Alarms: +{} -{} ({} active)",
                change.added,
                change.removed,
                self.tracker.len()
            );
            self.publish_status();
        }
        self.evaluate();
    }

    /// Move the machine forward based on the tracker and in-flight work
    fn evaluate(&mut self) {
        match self.phase {
            Phase::Idle => {
                if !self.tracker.is_empty() {
                    self.begin_override();
                }
            }
            Phase::Overriding => {
                if !self.tracker.is_empty() {
                    if self.playback.is_none() {
                        self.start_playback();
                    }
                } else if self.playback.is_none() && self.steps.is_empty() {
                    self.begin_restore();
                }
            }
            // New alarms wait until the restore has finished
            Phase::Restoring => {}
        }
    }

    fn begin_override(&mut self) {
        if self.controller.device().is_none() {
            tracing::error!("Not overriding stereo for alarm: {}", FusionError::NoDevice);
            return;
        }

        let view = self.controller.view();
        let snapshot = match view.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Not overriding stereo for alarm: {}", e);
                return;
            }
        };

        let id = Uuid::new_v4();
        tracing::info!(
            episode = %id,
            "Overriding stereo for {} alarm(s), saved {:?}",
            self.tracker.len(),
            snapshot
        );

        let mut seq = Sequence::new();
        seq.wait(self.remaining_settle());

        let powered_on = !snapshot.powered;
        if powered_on {
            seq.send(Command::PowerOn);
        }

        match view.find_source(&self.settings.input) {
            Some(source) => {
                seq.send(Command::SetSource {
                    source: Some(source),
                });
            }
            None => tracing::warn!(episode = %id, "unknown input: {}", self.settings.input),
        }

        seq.wait(SETTLE_DELAY);
        let volume_applied = self.settings.set_volume;
        if volume_applied {
            seq.send(Command::all_volumes(self.settings.volumes));
        }

        seq.wait(SETTLE_DELAY);
        let unmute_applied = self.settings.unmute && snapshot.muted;
        if unmute_applied {
            seq.send(Command::Unmute);
        }

        self.episode = Some(Episode {
            id,
            snapshot,
            powered_on,
            volume_applied,
            unmute_applied,
            playback_halted: false,
        });
        self.steps = seq;
        self.set_phase(Phase::Overriding);

        self.start_playback();
        self.advance();
    }

    fn begin_restore(&mut self) {
        let Some(episode) = self.episode.as_ref() else {
            self.set_phase(Phase::Idle);
            return;
        };
        let snapshot = &episode.snapshot;

        tracing::info!(episode = %episode.id, "Alarms cleared, restoring stereo");

        let mut seq = Sequence::new();
        seq.wait(self.remaining_settle());
        if episode.volume_applied {
            seq.send(Command::all_volumes(snapshot.zone_volumes));
        }

        seq.wait(SETTLE_DELAY);
        if episode.unmute_applied {
            seq.send(Command::Mute);
        }

        seq.wait(SETTLE_DELAY);
        seq.send(Command::SetSource {
            source: Some(snapshot.source_id.clone()),
        });

        if episode.powered_on {
            seq.wait(SETTLE_DELAY).send(Command::PowerOff);
        }

        self.steps = seq;
        self.set_phase(Phase::Restoring);
        self.advance();
    }

    fn finish_restore(&mut self) {
        if let Some(episode) = self.episode.take() {
            tracing::info!(episode = %episode.id, "Stereo restored");
        }
        self.set_phase(Phase::Idle);
    }

    /// Send every step that is due now and arm the timer for the next one
    fn advance(&mut self) {
        while let Some(delay) = self.steps.next_delay() {
            if !delay.is_zero() {
                self.deadline = Some(Instant::now() + delay);
                return;
            }
            if let Some(step) = self.steps.pop() {
                self.execute(&step.command);
            }
        }

        self.deadline = None;
        if self.phase == Phase::Restoring {
            self.finish_restore();
        }
        self.evaluate();
    }

    fn execute(&mut self, command: &Command) {
        let episode = self.episode.as_ref().map(|e| e.id);
        tracing::debug!(episode = ?episode, "alarm step: {:?}", command);

        // A failed step never aborts the sequence
        if let Err(e) = self.controller.send(command) {
            tracing::error!(episode = ?episode, "Failed to send {}: {}", command.name(), e);
        }
        self.last_sent = Some(Instant::now());
    }

    /// Time left before another command may follow the last one sent
    fn remaining_settle(&self) -> Duration {
        self.last_sent
            .map(|t| SETTLE_DELAY.saturating_sub(t.elapsed()))
            .unwrap_or_default()
    }

    fn start_playback(&mut self) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        if self.episode.as_ref().map_or(true, |e| e.playback_halted) {
            return;
        }

        tracing::debug!("play");
        self.playback = Some(tokio::spawn(player.play()));
    }

    fn on_playback_done(&mut self, result: Result<()>) {
        match result {
            Ok(()) => tracing::debug!("Alarm sound cycle complete"),
            Err(e) => {
                tracing::error!("failed to play sound: {}", e);
                if let Some(episode) = self.episode.as_mut() {
                    episode.playback_halted = true;
                }
            }
        }
        self.evaluate();
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::debug!("Alarm override {:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;
        self.publish_status();
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(OverrideStatus {
            phase: self.phase,
            active_alarms: self.tracker.len(),
        });
    }
}

async fn join_playback(handle: &mut Option<JoinHandle<Result<()>>>) -> Result<()> {
    match handle {
        Some(handle) => match handle.await {
            Ok(result) => result,
            Err(e) => Err(FusionError::PlaybackFailure(e.to_string())),
        },
        None => std::future::pending().await,
    }
}
