use numag_experiment::ToneConfig;
use rodio::source::{SineWave, Source};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::time::Duration;
use tracing::{debug, warn};

/// Fixation tone. Audio failures never stop a session.
pub struct Beeper {
    // Dropping the stream silences every sink
    _stream: OutputStream,
    handle: OutputStreamHandle,
    tone: ToneConfig,
}

impl Beeper {
    pub fn open(tone: &ToneConfig) -> Option<Self> {
        if !tone.enabled {
            debug!("Fixation tone disabled");
            return None;
        }
        match OutputStream::try_default() {
            Ok((stream, handle)) => Some(Self {
                _stream: stream,
                handle,
                tone: tone.clone(),
            }),
            Err(err) => {
                warn!("No audio output ({err}); running without fixation tone");
                None
            }
        }
    }

    pub fn beep(&self) {
        let source = SineWave::new(self.tone.frequency_hz)
            .take_duration(Duration::from_secs_f32(self.tone.duration_secs))
            .amplify(self.tone.volume);
        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.append(source);
                sink.detach();
            }
            Err(err) => warn!("Cannot play fixation tone: {err}"),
        }
    }
}
