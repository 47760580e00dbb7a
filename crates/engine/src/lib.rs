mod playback;
mod recorder;
mod station;
mod target;

pub use playback::{PlaybackStation, PlayerCommand, SharedLoop};
pub use recorder::{ChannelRecorder, RecorderProbe, quantized_stop_beats};
pub use station::CaptureStation;
pub use target::{ActiveTargetCell, RecycleTarget, SampleTarget, TargetKind, TrackTarget};

use std::sync::Arc;

use basedrop::{Collector, Handle};
use cpal::{
    FromSample, Sample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use looper_arena::Pool;
use looper_transport::{Clock, Command, SessionConfig, Status};

/// Control-side handle to the running engine. The capture and playback
/// callbacks own their stations; everything here talks to them through the
/// ring buffers and shared atomics.
pub struct EngineHandle {
    pub commands: rtrb::Producer<Command>,
    pub statuses: rtrb::Consumer<Status>,
    pub players: rtrb::Producer<PlayerCommand>,
    pub clock: Arc<Clock>,
    pub pool: Arc<Pool>,
    pub probes: Vec<RecorderProbe>,
    pub collector: Collector,
    pub handle: Handle,
    _input: cpal::Stream,
    _output: cpal::Stream,
}

pub fn start(config: SessionConfig) -> anyhow::Result<EngineHandle> {
    config.validate()?;
    let pool = Arc::new(Pool::new(config.arena())?);
    let clock = Arc::new(Clock::new(
        config.sample_rate,
        config.channels,
        config.tempo,
        config.beats_per_measure,
    ));

    let collector = Collector::new();
    let handle = collector.handle();

    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(64);
    let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(64);
    let (player_tx, player_rx) = rtrb::RingBuffer::<PlayerCommand>::new(64);

    let station = CaptureStation::new(&config, clock.clone(), pool.clone(), command_rx, status_tx);
    let probes = station.probes();
    let playback = PlaybackStation::new(player_rx);

    let host = cpal::default_host();
    let input_device = host
        .default_input_device()
        .ok_or_else(|| anyhow::anyhow!("no input device found"))?;
    let output_device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let capture_config = cpal::StreamConfig {
        channels: config.channels as u16,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let input = match input_device.default_input_config()?.sample_format() {
        cpal::SampleFormat::F32 => {
            build_capture_stream::<f32>(&input_device, &capture_config, station)?
        }
        cpal::SampleFormat::I16 => {
            build_capture_stream::<i16>(&input_device, &capture_config, station)?
        }
        cpal::SampleFormat::U16 => {
            build_capture_stream::<u16>(&input_device, &capture_config, station)?
        }
        sample_format => anyhow::bail!("unsupported input sample format '{sample_format}'"),
    };

    let output_config = output_device.default_output_config()?;
    let output = match output_config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_playback_stream::<f32>(&output_device, &output_config.into(), playback)?
        }
        sample_format => anyhow::bail!("unsupported output sample format '{sample_format}'"),
    };

    input.play()?;
    output.play()?;

    Ok(EngineHandle {
        commands: command_tx,
        statuses: status_rx,
        players: player_tx,
        clock,
        pool,
        probes,
        collector,
        handle,
        _input: input,
        _output: output,
    })
}

fn build_capture_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut station: CaptureStation,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut converted: Vec<f32> = Vec::with_capacity(16_384);
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            converted.clear();
            converted.extend(data.iter().map(|&value| f32::from_sample(value)));
            station.process_block(&converted);
        },
        |err| eprintln!("input stream error: {err}"),
        None,
    )?;
    Ok(stream)
}

fn build_playback_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut playback: PlaybackStation,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;
    let mut mix: Vec<f32> = vec![0.0; 16_384];
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if data.len() > mix.len() {
                mix.resize(data.len(), 0.0);
            }
            let mix = &mut mix[..data.len()];
            playback.process_block(mix, output_channels);
            for (out, &value) in data.iter_mut().zip(mix.iter()) {
                *out = T::from_sample(value);
            }
        },
        |err| eprintln!("output stream error: {err}"),
        None,
    )?;
    Ok(stream)
}
