//! WAV解码后端
//!
//! 基于hound库实现RIFF WAVE的读取。头部解析即内容嗅探：
//! `WavReader::new` 失败即判定非WAV流，交还调度器尝试下一个后端。

use hound::WavReader;
use log::{debug, trace};

use super::{DecoderBackend, DecoderInfo};
use crate::format::{AudioInfo, SampleFormat};
use crate::sample::{Sample, SampleFlags};

static WAV_INFO: DecoderInfo = DecoderInfo {
    name: "WAV",
    extensions: &["wav", "wave"],
    description: "RIFF WAVE PCM音频（hound后端）",
    author: "SampleKit Team",
    url: "https://crates.io/crates/samplekit",
};

/// 逐流解码状态，open成功时存入会话
struct WavState {
    reader: WavReader<crate::stream::StreamHandle>,
    output: SampleFormat,
    /// 整型样本左移位数（24位源对齐到S32满量程）
    shift: u32,
    total_frames: u32,
}

enum ReadOutcome {
    Progress,
    Eof,
    Failed(String),
}

/// hound后端
pub struct WavBackend;

impl WavBackend {
    fn fill(state: &mut WavState, buffer: &mut [u8]) -> (usize, ReadOutcome) {
        let mut written = 0;

        macro_rules! drain_samples {
            ($src:ty, $width:expr, $convert:expr) => {{
                let capacity = buffer.len() / $width;
                // 容量为0时零次迭代会被误报为Progress，解码循环永不推进
                if capacity == 0 {
                    return (
                        0,
                        ReadOutcome::Failed(format!(
                            "缓冲区({}字节)小于单个采样宽度({}字节)",
                            buffer.len(),
                            $width
                        )),
                    );
                }
                let mut iter = state.reader.samples::<$src>();
                for _ in 0..capacity {
                    match iter.next() {
                        Some(Ok(value)) => {
                            let bytes = $convert(value);
                            buffer[written..written + $width].copy_from_slice(&bytes);
                            written += $width;
                        }
                        Some(Err(err)) => {
                            return (written, ReadOutcome::Failed(format!("WAV读取失败: {err}")));
                        }
                        None => return (written, ReadOutcome::Eof),
                    }
                }
                (written, ReadOutcome::Progress)
            }};
        }

        let shift = state.shift;
        match state.output {
            SampleFormat::U8 => drain_samples!(i8, 1, |v: i8| [(v as i16 + 128) as u8]),
            SampleFormat::S16 => drain_samples!(i16, 2, |v: i16| v.to_ne_bytes()),
            SampleFormat::S32 => drain_samples!(i32, 4, |v: i32| (v << shift).to_ne_bytes()),
            SampleFormat::F32 => drain_samples!(f32, 4, |v: f32| v.to_ne_bytes()),
        }
    }
}

impl DecoderBackend for WavBackend {
    fn info(&self) -> &DecoderInfo {
        &WAV_INFO
    }

    fn open(&self, sample: &mut Sample, _ext_hint: Option<&str>) -> bool {
        let reader = match WavReader::new(sample.stream()) {
            Ok(reader) => reader,
            Err(err) => {
                trace!("WAV后端拒绝流: {err}");
                return false;
            }
        };

        let spec = reader.spec();
        let (output, shift) = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, _) => (SampleFormat::F32, 0),
            (hound::SampleFormat::Int, bits) if bits <= 8 => (SampleFormat::U8, 0),
            (hound::SampleFormat::Int, bits) if bits <= 16 => (SampleFormat::S16, 0),
            (hound::SampleFormat::Int, bits) => (SampleFormat::S32, 32 - bits as u32),
        };

        let actual = AudioInfo::new(output, spec.channels, spec.sample_rate);
        if actual.validate().is_err() {
            return false;
        }

        let total_frames = reader.duration();
        let total_time_ms = if spec.sample_rate > 0 {
            (total_frames as u64 * 1000 / spec.sample_rate as u64) as i64
        } else {
            crate::constants::UNKNOWN_DURATION_MS
        };

        debug!(
            "WAV后端接管流: {}Hz {}声道 {}位 {}帧",
            spec.sample_rate, spec.channels, spec.bits_per_sample, total_frames
        );

        sample.set_actual_info(actual);
        sample.set_total_time_ms(total_time_ms);
        sample.insert_flags(SampleFlags::CANSEEK);
        sample.set_codec_state(Box::new(WavState {
            reader,
            output,
            shift,
            total_frames,
        }));
        true
    }

    fn read(&self, sample: &mut Sample) -> usize {
        let Some(mut boxed) = sample.take_codec_state() else {
            sample.insert_flags(SampleFlags::ERROR);
            sample.note_error("WAV后端缺少解码状态");
            return 0;
        };

        let outcome = match boxed.downcast_mut::<WavState>() {
            Some(state) => {
                let access = sample.decode_access();
                Self::fill(state, access.buffer)
            }
            None => (0, ReadOutcome::Failed("WAV后端状态类型不匹配".to_string())),
        };
        sample.set_codec_state(boxed);

        let (written, result) = outcome;
        match result {
            ReadOutcome::Progress => {}
            ReadOutcome::Eof => sample.insert_flags(SampleFlags::EOF),
            ReadOutcome::Failed(msg) => {
                sample.insert_flags(SampleFlags::ERROR);
                sample.note_error(msg);
            }
        }
        written
    }

    fn seek(&self, sample: &mut Sample, ms: u64) -> bool {
        let rate = sample.actual_info().rate;
        let Some(boxed) = sample.codec_state_mut() else {
            return false;
        };
        let Some(state) = boxed.downcast_mut::<WavState>() else {
            return false;
        };

        let frame = (ms * rate as u64 / 1000).min(state.total_frames as u64) as u32;
        state.reader.seek(frame).is_ok()
    }

    fn rewind(&self, sample: &mut Sample) -> bool {
        self.seek(sample, 0)
    }

    fn close(&self, sample: &mut Sample) {
        let _ = sample.take_codec_state();
    }
}
