// cpal input stream and the capture worker thread
//
// The callback only moves samples into pooled buffers; all DSP happens on
// the worker thread, which slices 20 ms blocks, analyzes both channels and
// replaces the shared snapshot. The worker observes the context stop flag
// once per drain pass, so shutdown latency is bounded by one sleep interval.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{info, warn};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::buffer_pool::{
    BufferPool, CallbackChannels, WorkerChannels, POOL_BUFFER_CAPACITY, POOL_BUFFER_COUNT,
};
use super::spectrum::SpectrumAnalyzer;
use crate::context::EngineContext;
use crate::error::CaptureError;

/// Target duration of one analysis block in milliseconds
pub const BLOCK_MS: u32 = 20;

/// Capture configuration resolved from CLI/settings.
#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    /// Case-insensitive substring selecting an input device; default device if unset
    pub device: Option<String>,
}

/// Running capture: the live stream plus the worker thread.
///
/// The stream must stay alive for the capture lifetime; dropping it stops the
/// callbacks. The worker exits on the shared stop flag.
pub struct CaptureHandle {
    stream: cpal::Stream,
    worker: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Tear down the stream and wait for the worker.
    ///
    /// The caller raises the context stop flag first; this only reaps.
    pub fn join(mut self) {
        drop(self.stream);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Print the available audio input devices.
pub fn list_input_devices() -> Result<(), CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|err| CaptureError::DeviceUnavailable {
            details: format!("enumerate input devices: {}", err),
        })?;

    let mut out = io::stdout();
    let _ = writeln!(out, "Input devices:");
    for device in devices {
        let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        let _ = writeln!(out, "  - {}", name);
    }
    Ok(())
}

/// Open the input stream and spawn the capture worker.
///
/// # Errors
/// Fails when no device matches, the stream cannot be opened or started, or
/// the device only offers a sample format the pipeline does not handle. The
/// caller degrades to a zero spectrum on any of these.
pub fn start_capture(
    ctx: Arc<EngineContext>,
    config: &CaptureConfig,
) -> Result<CaptureHandle, CaptureError> {
    let host = cpal::default_host();
    let device = select_input_device(&host, config.device.as_deref())?;
    let supported = device
        .default_input_config()
        .map_err(|err| CaptureError::StreamOpenFailed {
            reason: format!("query default input config: {}", err),
        })?;

    let sample_rate = supported.sample_rate().0;
    let channel_count = supported.channels() as usize;
    let stream_config: cpal::StreamConfig = supported.clone().into();

    let (mut callback_channels, worker_channels) =
        BufferPool::new(POOL_BUFFER_COUNT, POOL_BUFFER_CAPACITY);

    // Transient stream faults are logged and the stream keeps running.
    let err_fn = |err| warn!("[Capture] input stream error: {}", err);

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    forward_samples(data, &mut callback_channels);
                },
                err_fn,
                None,
            )
            .map_err(|err| CaptureError::StreamOpenFailed {
                reason: format!("{:?}", err),
            })?,
        other => {
            return Err(CaptureError::UnsupportedFormat {
                format: format!("{:?}", other),
            })
        }
    };

    stream.play().map_err(|err| CaptureError::StreamOpenFailed {
        reason: format!("start input stream: {}", err),
    })?;

    info!(
        "[Capture] input stream open: {} Hz, {} channel(s)",
        sample_rate, channel_count
    );

    let worker = thread::spawn(move || {
        capture_worker(ctx, worker_channels, sample_rate, channel_count);
    });

    Ok(CaptureHandle {
        stream,
        worker: Some(worker),
    })
}

fn select_input_device(
    host: &cpal::Host,
    query: Option<&str>,
) -> Result<cpal::Device, CaptureError> {
    if let Some(query) = query {
        let want = query.to_lowercase();
        let devices = host
            .input_devices()
            .map_err(|err| CaptureError::DeviceUnavailable {
                details: format!("enumerate input devices: {}", err),
            })?;
        for device in devices {
            let matched = device
                .name()
                .map(|name| name.to_lowercase().contains(&want))
                .unwrap_or(false);
            if matched {
                return Ok(device);
            }
        }
        return Err(CaptureError::DeviceUnavailable {
            details: format!("no input device matching '{}'", query),
        });
    }

    host.default_input_device()
        .ok_or_else(|| CaptureError::DeviceUnavailable {
            details: "no default input device".to_string(),
        })
}

/// Audio-thread side: copy the callback data into a pooled buffer.
fn forward_samples(data: &[f32], channels: &mut CallbackChannels) {
    if let Ok(mut buffer) = channels.pool_consumer.pop() {
        buffer.clear();
        let take = data.len().min(buffer.capacity());
        buffer.extend_from_slice(&data[..take]);
        let _ = channels.data_producer.push(buffer);
    }
    // Pool exhausted: drop this block, the next one supersedes it.
}

/// Worker thread: accumulate, slice blocks, analyze, publish.
fn capture_worker(
    ctx: Arc<EngineContext>,
    mut channels: WorkerChannels,
    sample_rate: u32,
    channel_count: usize,
) {
    let mut analyzer = SpectrumAnalyzer::new(sample_rate);
    let block_frames = (sample_rate * BLOCK_MS / 1000) as usize;
    let block_samples = block_frames * channel_count;

    let mut pending: Vec<f32> = Vec::with_capacity(block_samples * 2);
    let mut left = vec![0.0f32; block_frames];
    let mut right = vec![0.0f32; block_frames];

    info!(
        "[Capture] worker running: {} frames/block, fft size {}, low bin {}",
        block_frames,
        analyzer.fft_size(),
        analyzer.low_bin()
    );

    while !ctx.should_stop() {
        let mut drained = false;
        while let Ok(buffer) = channels.data_consumer.pop() {
            drained = true;
            pending.extend_from_slice(&buffer);
            let _ = channels.pool_producer.push(buffer);
        }

        while pending.len() >= block_samples {
            for (i, frame) in pending[..block_samples].chunks_exact(channel_count).enumerate() {
                left[i] = frame[0];
                // A mono device feeds both sides.
                right[i] = if channel_count > 1 { frame[1] } else { frame[0] };
            }
            pending.drain(..block_samples);

            let frame = analyzer.analyze(&left, &right);
            ctx.publish_spectrum(frame);
        }

        if !drained {
            thread::sleep(Duration::from_millis(1));
        }
    }

    info!("[Capture] worker stopped");
}
