use crate::config::Config;
use crate::error::{FusionError, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::path::Path;
use tokio::process::Command;

/// External audio player that sounds one alarm cycle per call
///
/// The returned future resolves once the cycle has finished: `Ok` for a
/// clean exit, `PlaybackFailure` if the player could not start or failed.
pub trait AudioPlayer: Send + Sync {
    fn play(&self) -> BoxFuture<'static, Result<()>>;
}

/// Plays the alarm file by spawning a command line player
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Player and arguments from the plugin options
    pub fn from_config(config: &Config, asset_dir: &Path) -> Self {
        let file = config.alarm_audio_path(asset_dir);
        Self::new(config.alarm_audio_player.clone(), config.player_args(&file))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl AudioPlayer for CommandPlayer {
    fn play(&self) -> BoxFuture<'static, Result<()>> {
        let program = self.program.clone();
        let args = self.args.clone();

        async move {
            tracing::debug!("sound command: {} {:?}", program, args);

            let status = Command::new(&program)
                .args(&args)
                .kill_on_drop(true)
                .status()
                .await
                .map_err(|e| {
                    FusionError::PlaybackFailure(format!("failed to start {}: {}", program, e))
                })?;

            if status.success() {
                Ok(())
            } else {
                Err(FusionError::PlaybackFailure(format!("{} exited with {}", program, status)))
            }
        }
        .boxed()
    }
}
