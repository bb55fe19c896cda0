// Audio module - stereo capture to shared spectrum snapshot
//
// Architecture:
// - cpal callback: pops a pre-allocated buffer from the pool queue, copies
//   the interleaved samples into it, pushes it onto the data queue. No
//   allocation and no lock on the audio thread.
// - capture worker: drains the data queue, slices complete 20 ms blocks,
//   runs the FFT per channel and publishes the finished SpectrumFrame under
//   the snapshot mutex. Buffers circulate back through the pool queue.

pub mod buffer_pool;
pub mod capture;
pub mod spectrum;

pub use capture::{list_input_devices, start_capture, CaptureConfig, CaptureHandle, BLOCK_MS};
pub use spectrum::{SpectrumAnalyzer, SpectrumFrame, BIN_COUNT};
