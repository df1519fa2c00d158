use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Plays an audio asset. Runs on an alert worker, so blocking until playback
/// ends is fine; implementations must stop after their timeout.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, asset: &Path) -> Result<()>;
}

#[cfg(target_os = "macos")]
const DEFAULT_PLAYER: &str = "afplay";
#[cfg(not(target_os = "macos"))]
const DEFAULT_PLAYER: &str = "aplay";

/// Plays audio by running an external command with the asset path appended.
#[derive(Clone, Debug)]
pub struct CommandAudioPlayer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAudioPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Platform default player (`afplay` on macOS, `aplay` elsewhere).
    pub fn system_default(timeout: Duration) -> Self {
        let args = if DEFAULT_PLAYER == "aplay" {
            vec!["-q".to_string()]
        } else {
            Vec::new()
        };
        Self::new(DEFAULT_PLAYER, args, timeout)
    }
}

impl AudioPlayer for CommandAudioPlayer {
    fn play(&self, asset: &Path) -> Result<()> {
        if !asset.exists() {
            return Err(anyhow!("sound asset {} not found", asset.display()));
        }
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(asset)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn audio player '{}'", self.program))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait().context("poll audio player")? {
                if status.success() {
                    return Ok(());
                }
                return Err(anyhow!("audio player '{}' exited with {}", self.program, status));
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!(
                    "audio player '{}' timed out after {:?}",
                    self.program,
                    self.timeout
                ));
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
}

/// In-process playback through the default output device.
///
/// Each call opens its own output stream: `rodio` streams are not `Send`, and
/// alert workers come and go.
#[cfg(feature = "audio-rodio")]
#[derive(Clone, Debug)]
pub struct RodioAudioPlayer {
    timeout: Duration,
}

#[cfg(feature = "audio-rodio")]
impl RodioAudioPlayer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(feature = "audio-rodio")]
impl AudioPlayer for RodioAudioPlayer {
    fn play(&self, asset: &Path) -> Result<()> {
        use rodio::{Decoder, OutputStream, Sink};
        use std::fs::File;
        use std::io::BufReader;

        let file = File::open(asset).with_context(|| format!("open {}", asset.display()))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| anyhow!("failed to decode {}: {}", asset.display(), e))?;
        let (_stream, handle) = OutputStream::try_default()
            .map_err(|e| anyhow!("failed to create audio output stream: {}", e))?;
        let sink =
            Sink::try_new(&handle).map_err(|e| anyhow!("failed to create audio sink: {}", e))?;
        sink.append(source);

        let deadline = Instant::now() + self.timeout;
        while !sink.empty() {
            if Instant::now() >= deadline {
                sink.stop();
                return Err(anyhow!(
                    "playback of {} cut off after {:?}",
                    asset.display(),
                    self.timeout
                ));
            }
            thread::sleep(Duration::from_millis(20));
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_asset_is_an_error() {
        let player = CommandAudioPlayer::new("true", Vec::new(), Duration::from_secs(1));
        assert!(player.play(Path::new("/nonexistent/alert.wav")).is_err());
    }

    #[test]
    fn command_success_and_failure() {
        let asset = NamedTempFile::new().unwrap();

        let ok = CommandAudioPlayer::new("true", Vec::new(), Duration::from_secs(5));
        assert!(ok.play(asset.path()).is_ok());

        let failing = CommandAudioPlayer::new("false", Vec::new(), Duration::from_secs(5));
        assert!(failing.play(asset.path()).is_err());
    }

    #[test]
    fn hung_player_is_killed() {
        let asset = NamedTempFile::new().unwrap();
        // The appended asset path lands in $0 and is ignored.
        let player = CommandAudioPlayer::new(
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string()],
            Duration::from_millis(100),
        );
        let started = Instant::now();
        let err = player.play(asset.path()).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
