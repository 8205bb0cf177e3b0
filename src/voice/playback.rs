//! Speaker playback for the terminal adapter

use std::io::Cursor;
use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::SynthesizedAudio;
use crate::{Error, Result};

/// Decoded mono PCM ready for the output device
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Pcm {
    /// Playback length
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.samples.len() as u64 * 1000 / u64::from(self.sample_rate))
    }
}

/// Plays audio on the default output device
pub struct AudioPlayback {
    device: cpal::Device,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self { device })
    }

    /// Play a reply once
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub async fn play_reply(&self, audio: SynthesizedAudio) -> Result<()> {
        let pcm = decode_mp3(&audio.bytes)?;
        self.play(pcm).await
    }

    /// Play decoded samples, returning when they have finished
    ///
    /// # Errors
    ///
    /// Returns error if no output config matches the sample rate
    #[allow(clippy::unused_async)]
    pub async fn play(&self, pcm: Pcm) -> Result<()> {
        if pcm.samples.is_empty() {
            return Ok(());
        }

        let config = self.output_config(pcm.sample_rate)?;
        let channels = usize::from(config.channels);
        let timeout = pcm.duration() + Duration::from_millis(500);
        let sample_count = pcm.samples.len();

        let (done_tx, done_rx) = mpsc::channel::<()>();
        let mut samples = pcm.samples.into_iter();
        let mut signalled = false;

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.next().unwrap_or_else(|| {
                            if !signalled {
                                signalled = true;
                                let _ = done_tx.send(());
                            }
                            0.0
                        });
                        frame.fill(sample);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // The stream is not Send, so wait here rather than on another task
        tokio::task::block_in_place(|| {
            if done_rx.recv_timeout(timeout).is_err() {
                tracing::warn!("playback did not signal completion before timeout");
            }
            std::thread::sleep(Duration::from_millis(100));
        });

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }

    fn output_config(&self, sample_rate: u32) -> Result<StreamConfig> {
        let rate = SampleRate(sample_rate);
        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .min_by_key(cpal::SupportedStreamConfigRange::channels)
            .ok_or_else(|| {
                Error::Audio(format!("no output config supports {sample_rate} Hz"))
            })?;

        Ok(supported.with_sample_rate(rate).config())
    }
}

/// Decode MP3 bytes to mono f32 samples at the stream's own rate
///
/// # Errors
///
/// Returns error if the data is not decodable MP3
#[allow(clippy::cast_precision_loss)]
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Pcm> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or_default();
                let channels = frame.channels.max(1);
                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    chunk.iter().map(|&s| f32::from(s) / 32768.0).sum::<f32>()
                        / chunk.len() as f32
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(Pcm {
        samples,
        sample_rate,
    })
}
