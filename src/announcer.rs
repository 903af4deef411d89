// Spoken announcements. The pollers only see the `Announcer` trait; the speech
// queue is owned by the application root and speaks one message at a time.

use crate::preferences::VoiceId;
use std::time::Duration;
use tokio::sync::mpsc;

/// Sink for announcement messages. Must not block the caller.
pub trait Announcer: Send + Sync {
    fn announce(&self, message: String, voice: VoiceId);
}

/// Speech command configuration, e.g. `say -v <voice> <message>`.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Program to run; None only logs the message.
    pub command: Option<String>,
    /// Upper bound for one utterance.
    pub timeout: Duration,
}

/// Serial message queue drained by one background task.
pub struct SpeechQueue {
    tx: mpsc::UnboundedSender<(String, VoiceId)>,
}

impl SpeechQueue {
    /// Spawns the speaking task. It exits once every `SpeechQueue` clone is dropped
    /// and the queue is drained.
    pub fn spawn(config: SpeechConfig) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, VoiceId)>();
        let handle = tokio::spawn(async move {
            while let Some((message, voice)) = rx.recv().await {
                speak(&config, &message, &voice).await;
            }
            tracing::debug!("speech queue shutting down");
        });
        (Self { tx }, handle)
    }
}

impl Announcer for SpeechQueue {
    fn announce(&self, message: String, voice: VoiceId) {
        if self.tx.send((message, voice)).is_err() {
            tracing::debug!("speech queue closed, dropping announcement");
        }
    }
}

async fn speak(config: &SpeechConfig, message: &str, voice: &VoiceId) {
    tracing::info!(voice = voice.as_str(), message, "announce");
    let Some(program) = config.command.as_deref() else {
        return;
    };
    let status = tokio::time::timeout(
        config.timeout,
        tokio::process::Command::new(program)
            .arg("-v")
            .arg(voice.as_str())
            .arg(message)
            .kill_on_drop(true)
            .status(),
    )
    .await;
    match status {
        Ok(Ok(s)) if s.success() => {}
        Ok(Ok(s)) => {
            tracing::warn!(command = program, status = %s, operation = "speak", "speech command failed");
        }
        Ok(Err(e)) => {
            tracing::warn!(command = program, error = %e, operation = "speak", "unable to run speech command");
        }
        Err(_) => {
            tracing::warn!(command = program, operation = "speak", "speech command timed out");
        }
    }
}
