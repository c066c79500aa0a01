use std::f32::consts::PI;
use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::error;
use rodio::{OutputStream, Sink, Source};

use super::controller::AlertSink;

const SAMPLE_RATE: u32 = 44100;
const RING_GAIN: f32 = 0.25;
/// Fraction of each second that carries tone; the rest is silence.
const RING_DUTY: f32 = 0.7;
/// Ratio of the second pulse to the base tone (roughly a major third).
const THIRD_UP: f32 = 1.26;

enum RingCommand {
    Start { tone_hz: f32, volume: f32 },
    Stop,
}

/// Audible alarm backed by a dedicated audio thread. rodio's output
/// stream is not Send, so the thread owns it and the rest of the crate
/// talks to it over a channel.
pub struct RingtoneSink {
    tx: Mutex<Option<Sender<RingCommand>>>,
    tone_hz: f32,
    volume: f32,
}

impl RingtoneSink {
    pub fn new(tone_hz: f32, volume: f32) -> Self {
        Self {
            tx: Mutex::new(None),
            tone_hz,
            volume,
        }
    }

    fn ensure_thread(&self) -> Result<Sender<RingCommand>> {
        let mut slot = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tx) = slot.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<RingCommand>();

        thread::Builder::new()
            .name("alert-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        RingCommand::Start { tone_hz, volume } => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;
                            match build_sink() {
                                Ok((stream, new_sink)) => {
                                    new_sink.set_volume(volume.clamp(0.0, 1.0));
                                    new_sink.append(AlarmRing::new(tone_hz));
                                    _stream = Some(stream);
                                    sink = Some(new_sink);
                                }
                                Err(err) => error!("could not open audio output: {err:?}"),
                            }
                        }
                        RingCommand::Stop => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;
                        }
                    }
                }
            })
            .context("failed to spawn alert audio thread")?;

        let handle = tx.clone();
        *slot = Some(tx);
        Ok(handle)
    }
}

fn build_sink() -> Result<(OutputStream, Sink)> {
    let (stream, handle) =
        OutputStream::try_default().context("failed to open default audio output")?;
    let sink = Sink::try_new(&handle).context("failed to create audio sink")?;
    Ok((stream, sink))
}

impl AlertSink for RingtoneSink {
    fn start(&self) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(RingCommand::Start {
            tone_hz: self.tone_hz,
            volume: self.volume,
        })
        .map_err(|_| anyhow!("alert audio thread is gone"))
    }

    fn stop(&self) {
        let slot = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tx) = slot.as_ref() {
            let _ = tx.send(RingCommand::Stop);
        }
    }
}

/// Pulsed alarm tone: one-second pulses alternating between the base tone
/// and a tone a third above it, each trailed by a short gap. Loops forever
/// until the sink is stopped.
pub struct AlarmRing {
    tone_hz: f32,
    sample_rate: u32,
    num_sample: usize,
}

impl AlarmRing {
    pub fn new(tone_hz: f32) -> Self {
        Self {
            tone_hz,
            sample_rate: SAMPLE_RATE,
            num_sample: 0,
        }
    }
}

impl Iterator for AlarmRing {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let per_second = self.sample_rate as usize;
        let within = self.num_sample % per_second;
        let beat = (self.num_sample / per_second) % 2;
        self.num_sample = self.num_sample.wrapping_add(1);

        let t = within as f32 / self.sample_rate as f32;
        if t > RING_DUTY {
            return Some(0.0);
        }

        let freq = if beat == 0 {
            self.tone_hz
        } else {
            self.tone_hz * THIRD_UP
        };
        Some((2.0 * PI * freq * t).sin() * RING_GAIN)
    }
}

impl Source for AlarmRing {
    fn current_frame_len(&self) -> Option<usize> {
        None // Infinite stream
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Infinite
    }
}
