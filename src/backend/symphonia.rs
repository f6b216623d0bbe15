//! symphonia解码后端
//!
//! 一个后端结构覆盖多个有损/无损格式：每个构造函数绑定一组
//! 扩展名与允许的编解码器类型。探测交给symphonia完成，但探测
//! 出的轨道类型必须落在本后端声明的编解码器集合内，否则拒绝
//! 接管（避免FLAC后端在暴力探测轮里认领MP3流）。

use log::{debug, trace};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_NULL, CODEC_TYPE_VORBIS, CodecType, Decoder,
    DecoderOptions,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use super::{DecoderBackend, DecoderInfo};
use crate::constants::UNKNOWN_DURATION_MS;
use crate::format::{AudioInfo, SampleFormat};
use crate::sample::{Sample, SampleFlags};

static MP3_INFO: DecoderInfo = DecoderInfo {
    name: "MP3",
    extensions: &["mp3"],
    description: "MPEG Audio Layer III（symphonia后端）",
    author: "SampleKit Team",
    url: "https://crates.io/crates/samplekit",
};

static VORBIS_INFO: DecoderInfo = DecoderInfo {
    name: "OGG Vorbis",
    extensions: &["ogg", "oga"],
    description: "OGG容器内的Vorbis音频（symphonia后端）",
    author: "SampleKit Team",
    url: "https://crates.io/crates/samplekit",
};

static FLAC_INFO: DecoderInfo = DecoderInfo {
    name: "FLAC",
    extensions: &["flac"],
    description: "FLAC无损音频（symphonia后端）",
    author: "SampleKit Team",
    url: "https://crates.io/crates/samplekit",
};

/// 逐流解码状态
struct SymphoniaState {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    /// 已解码但尚未交付的交错f32字节
    pending: Vec<u8>,
    pos: usize,
}

enum ReadOutcome {
    Progress,
    Eof,
    Failed(String),
}

/// symphonia多格式后端
pub struct SymphoniaBackend {
    info: &'static DecoderInfo,
    codecs: &'static [CodecType],
}

impl SymphoniaBackend {
    /// MP3后端
    pub fn mp3() -> Self {
        static CODECS: [CodecType; 1] = [CODEC_TYPE_MP3];
        Self {
            info: &MP3_INFO,
            codecs: &CODECS,
        }
    }

    /// OGG Vorbis后端
    pub fn vorbis() -> Self {
        static CODECS: [CodecType; 1] = [CODEC_TYPE_VORBIS];
        Self {
            info: &VORBIS_INFO,
            codecs: &CODECS,
        }
    }

    /// FLAC后端
    pub fn flac() -> Self {
        static CODECS: [CodecType; 1] = [CODEC_TYPE_FLAC];
        Self {
            info: &FLAC_INFO,
            codecs: &CODECS,
        }
    }

    fn fill(state: &mut SymphoniaState, buffer: &mut [u8]) -> (usize, ReadOutcome) {
        loop {
            // 先清空上一包的剩余数据
            let available = state.pending.len() - state.pos;
            if available > 0 {
                let n = available.min(buffer.len());
                buffer[..n].copy_from_slice(&state.pending[state.pos..state.pos + n]);
                state.pos += n;
                if state.pos == state.pending.len() {
                    state.pending.clear();
                    state.pos = 0;
                }
                return (n, ReadOutcome::Progress);
            }

            let packet = match state.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return (0, ReadOutcome::Eof);
                }
                Err(err) => {
                    return (0, ReadOutcome::Failed(format!("读取包失败: {err}")));
                }
            };

            if packet.track_id() != state.track_id {
                continue;
            }

            match state.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let spec = *decoded.spec();
                    let duration = decoded.capacity() as u64;
                    let mut converted = SampleBuffer::<f32>::new(duration, spec);
                    converted.copy_interleaved_ref(decoded);
                    state.pending.reserve(converted.samples().len() * 4);
                    for value in converted.samples() {
                        state.pending.extend_from_slice(&value.to_ne_bytes());
                    }
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    // 跳过损坏的包
                    trace!("跳过损坏包: {err}");
                    continue;
                }
                Err(SymphoniaError::ResetRequired) => {
                    state.decoder.reset();
                    continue;
                }
                Err(err) => {
                    return (0, ReadOutcome::Failed(format!("解码失败: {err}")));
                }
            }
        }
    }

    fn seek_to_ms(state: &mut SymphoniaState, ms: u64) -> bool {
        let time = Time::new(ms / 1000, (ms % 1000) as f64 / 1000.0);
        let result = state.reader.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: Some(state.track_id),
            },
        );
        match result {
            Ok(_) => {
                state.decoder.reset();
                state.pending.clear();
                state.pos = 0;
                true
            }
            Err(err) => {
                trace!("symphonia定位失败: {err}");
                false
            }
        }
    }
}

impl DecoderBackend for SymphoniaBackend {
    fn info(&self) -> &DecoderInfo {
        self.info
    }

    fn open(&self, sample: &mut Sample, ext_hint: Option<&str>) -> bool {
        let mss = MediaSourceStream::new(Box::new(sample.stream()), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = ext_hint {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions::default();
        let metadata_opts = MetadataOptions::default();
        let probed =
            match symphonia::default::get_probe().format(&hint, mss, &format_opts, &metadata_opts) {
                Ok(probed) => probed,
                Err(err) => {
                    trace!("{}后端拒绝流: {err}", self.info.name);
                    return false;
                }
            };

        let reader = probed.format;
        let Some(track) = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        else {
            return false;
        };

        // 轨道类型必须属于本后端声明的编解码器集合
        if !self.codecs.contains(&track.codec_params.codec) {
            trace!(
                "{}后端跳过轨道: 编解码器{:?}不在声明集合内",
                self.info.name, track.codec_params.codec
            );
            return false;
        }

        let params = &track.codec_params;
        let rate = params.sample_rate.unwrap_or(0);
        let channels = params
            .channels
            .map(|layout| layout.count() as u16)
            .unwrap_or(0);
        let actual = AudioInfo::new(SampleFormat::F32, channels, rate);
        if actual.validate().is_err() {
            return false;
        }

        let decoder = match symphonia::default::get_codecs().make(params, &DecoderOptions::default())
        {
            Ok(decoder) => decoder,
            Err(err) => {
                trace!("{}后端创建解码器失败: {err}", self.info.name);
                return false;
            }
        };

        let total_time_ms = params
            .time_base
            .zip(params.n_frames)
            .map(|(base, frames)| {
                let Time { seconds, frac } = base.calc_time(frames);
                (seconds * 1000) as i64 + (frac * 1000.0) as i64
            })
            .unwrap_or(UNKNOWN_DURATION_MS);

        debug!(
            "{}后端接管流: {}Hz {}声道 时长{}ms",
            self.info.name, rate, channels, total_time_ms
        );

        let track_id = track.id;
        sample.set_actual_info(actual);
        sample.set_total_time_ms(total_time_ms);
        sample.insert_flags(SampleFlags::CANSEEK);
        sample.set_codec_state(Box::new(SymphoniaState {
            reader,
            decoder,
            track_id,
            pending: Vec::new(),
            pos: 0,
        }));
        true
    }

    fn read(&self, sample: &mut Sample) -> usize {
        let Some(mut boxed) = sample.take_codec_state() else {
            sample.insert_flags(SampleFlags::ERROR);
            sample.note_error(format!("{}后端缺少解码状态", self.info.name));
            return 0;
        };

        let outcome = match boxed.downcast_mut::<SymphoniaState>() {
            Some(state) => {
                let access = sample.decode_access();
                Self::fill(state, access.buffer)
            }
            None => (
                0,
                ReadOutcome::Failed(format!("{}后端状态类型不匹配", self.info.name)),
            ),
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
        let Some(boxed) = sample.codec_state_mut() else {
            return false;
        };
        let Some(state) = boxed.downcast_mut::<SymphoniaState>() else {
            return false;
        };
        Self::seek_to_ms(state, ms)
    }

    fn rewind(&self, sample: &mut Sample) -> bool {
        self.seek(sample, 0)
    }

    fn close(&self, sample: &mut Sample) {
        let _ = sample.take_codec_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DesiredAudioSpec;
    use crate::stream::StreamHandle;
    use std::io::Cursor;

    #[test]
    fn test_constructors_expose_expected_extensions() {
        assert_eq!(SymphoniaBackend::mp3().info().extensions, &["mp3"]);
        assert_eq!(SymphoniaBackend::vorbis().info().extensions, &["ogg", "oga"]);
        assert_eq!(SymphoniaBackend::flac().info().extensions, &["flac"]);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let stream = StreamHandle::new(Box::new(Cursor::new(vec![0u8; 256])));
        let mut sample = Sample::new(stream, DesiredAudioSpec::default(), 256);
        assert!(!SymphoniaBackend::mp3().open(&mut sample, Some("mp3")));
        assert!(sample.take_codec_state().is_none());
    }

    #[test]
    fn test_open_rejects_wav_stream() {
        // 合法WAV流：symphonia未启用wav特性，且编解码器过滤兜底
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..64 {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let stream = StreamHandle::new(Box::new(Cursor::new(cursor.into_inner())));
        let mut sample = Sample::new(stream, DesiredAudioSpec::default(), 256);
        assert!(!SymphoniaBackend::flac().open(&mut sample, None));
    }
}
