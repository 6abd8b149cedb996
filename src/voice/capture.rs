//! Local microphone capture via cpal.
//!
//! Opens the configured (or default) input device at its native rate,
//! down-mixes to mono, resamples linearly to the pipeline rate and pushes
//! fixed-size chunks into the ring buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tracing::{error, info};

use super::ring_buffer::{sample_ring_buffer, SampleConsumer, SampleProducer};

/// Chunk size in samples (80 ms at 16 kHz).
const CHUNK_SAMPLES: usize = 1280;

/// A running capture. Dropping it stops the stream.
pub struct MicCapture {
    _stream: Stream,
    consumer: SampleConsumer,
}

impl MicCapture {
    pub fn start(device_name: Option<&str>, target_rate: u32) -> anyhow::Result<Self> {
        let (producer, consumer) = sample_ring_buffer(None);
        let stream = start_stream(producer, device_name, target_rate)?;
        Ok(Self {
            _stream: stream,
            consumer,
        })
    }

    /// Samples captured since the last call.
    pub fn drain(&mut self) -> Vec<f32> {
        self.consumer.drain_all()
    }
}

fn resolve_device(device_name: Option<&str>) -> anyhow::Result<cpal::Device> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow::anyhow!("Input device not found: {name}"))?,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No default input device available"))?,
    };
    info!(device = %device.name().unwrap_or_else(|_| "unknown".into()), "Selected input device");
    Ok(device)
}

fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return input.to_vec();
    }
    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (input.len() as f64 / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx = src.floor() as usize;
            let frac = (src - idx as f64) as f32;
            let s0 = input.get(idx).copied().unwrap_or(0.0);
            let s1 = input.get(idx + 1).copied().unwrap_or(s0);
            s0 + frac * (s1 - s0)
        })
        .collect()
}

fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = usize::from(channels);
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

fn start_stream(
    mut producer: SampleProducer,
    device_name: Option<&str>,
    target_rate: u32,
) -> anyhow::Result<Stream> {
    let device = resolve_device(device_name)?;
    let default_config = device.default_input_config()?;
    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels();
    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(native_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    info!(native_rate, channels, target_rate, "Opening input stream");

    let mut pending: Vec<f32> = Vec::with_capacity(CHUNK_SAMPLES * 2);
    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _info: &cpal::InputCallbackInfo| {
            let mono = to_mono(data, channels);
            pending.extend_from_slice(&resample_linear(&mono, native_rate, target_rate));
            while pending.len() >= CHUNK_SAMPLES {
                // A full buffer drops the newest audio until the loop catches up.
                producer.push_slice(&pending[..CHUNK_SAMPLES]);
                pending.drain(..CHUNK_SAMPLES);
            }
        },
        move |err| error!("Audio input stream error: {}", err),
        None,
    )?;
    stream.play()?;
    info!("Microphone capture started");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_frames() {
        assert_eq!(to_mono(&[0.25, 0.75, -1.0, 1.0], 2), vec![0.5, 0.0]);
        assert_eq!(to_mono(&[0.5, 0.25], 1), vec![0.5, 0.25]);
    }

    #[test]
    fn resample_halves_length() {
        let input: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let out = resample_linear(&input, 32_000, 16_000);
        assert_eq!(out, vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }
}
