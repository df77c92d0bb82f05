//! Scripted fakes for the NDI runtime, the audio output device and the display

use std::collections::VecDeque;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

use crate::audio::{AudioFormat, AudioSink, OutputDevice, SampleQueue, SinkState, SinkWriter};
use crate::error::{Error, Result};
use crate::ndi::{
    fourcc, AudioFrameV2, FindInstance, FrameFormatType, FrameSyncInstance, FrameType,
    InterleavedDest, NdiRuntime, RecvInstance, RecvSettings, VideoFrameV2,
};
use crate::output::DisplaySink;
use crate::types::Image;

const FIND_HANDLE: usize = 0x1000;
const RECV_HANDLE: usize = 0x2000;
const FRAMESYNC_HANDLE: usize = 0x3000;

#[derive(Debug, Default)]
pub struct Counters {
    pub find_created: AtomicUsize,
    pub find_destroyed: AtomicUsize,
    pub waits: AtomicUsize,
    pub recv_created: AtomicUsize,
    pub recv_destroyed: AtomicUsize,
    pub recv_captures: AtomicUsize,
    pub recv_frees: AtomicUsize,
    pub framesync_created: AtomicUsize,
    pub framesync_destroyed: AtomicUsize,
    pub video_captures: AtomicUsize,
    pub video_frees: AtomicUsize,
    pub audio_captures: AtomicUsize,
    pub audio_frees: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Picture delivered by video captures
#[derive(Debug, Clone)]
pub struct MockPicture {
    pub width: i32,
    pub height: i32,
    pub fourcc: i32,
    pub stride: i32,
    pub data: Vec<u8>,
}

impl MockPicture {
    /// Solid-color picture; `pixel` is in the byte order of `fourcc`
    pub fn solid(width: i32, height: i32, fourcc: i32, pixel: [u8; 4]) -> Self {
        let stride = width * 4;
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take((stride * height) as usize)
            .collect();
        Self {
            width,
            height,
            fourcc,
            stride,
            data,
        }
    }
}

/// Scripted stand-in for the NDI runtime
#[derive(Debug)]
pub struct MockRuntime {
    pub counters: Counters,
    pub fail_find: AtomicBool,
    pub fail_recv: AtomicBool,
    pub fail_framesync: AtomicBool,
    /// Panic inside `recv_create`, standing in for a crash on the playback thread
    pub panic_recv: AtomicBool,
    pub sources: Mutex<Vec<String>>,
    pub recv_settings: Mutex<Vec<RecvSettings>>,
    /// Results of successive receive captures; `None` once exhausted
    pub recv_script: Mutex<VecDeque<FrameType>>,
    pub picture: Mutex<Option<MockPicture>>,
    /// Stream audio format reported by frame-sync; zero channels means no audio
    pub stream_audio: Mutex<(i32, i32)>,
    pub audio_requests: Mutex<Vec<(i32, i32, i32)>>,
    pub interleave_calls: Mutex<Vec<(i32, i32, usize)>>,
    planar: Mutex<Vec<f32>>,
    stop_after: Mutex<Option<(Arc<AtomicBool>, usize)>>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self {
            counters: Counters::default(),
            fail_find: AtomicBool::new(false),
            fail_recv: AtomicBool::new(false),
            fail_framesync: AtomicBool::new(false),
            panic_recv: AtomicBool::new(false),
            sources: Mutex::new(Vec::new()),
            recv_settings: Mutex::new(Vec::new()),
            recv_script: Mutex::new(VecDeque::new()),
            picture: Mutex::new(None),
            stream_audio: Mutex::new((0, 0)),
            audio_requests: Mutex::new(Vec::new()),
            interleave_calls: Mutex::new(Vec::new()),
            planar: Mutex::new(Vec::new()),
            stop_after: Mutex::new(None),
        }
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(self, names: &[&str]) -> Self {
        *self.sources.lock() = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_picture(self, picture: MockPicture) -> Self {
        *self.picture.lock() = Some(picture);
        self
    }

    pub fn with_stream_audio(self, sample_rate: i32, channels: i32) -> Self {
        *self.stream_audio.lock() = (sample_rate, channels);
        self
    }

    pub fn with_recv_script(self, script: &[FrameType]) -> Self {
        *self.recv_script.lock() = script.iter().copied().collect();
        self
    }

    /// Set `flag` once `captures` frame-sync video captures have happened
    pub fn stop_after(&self, flag: Arc<AtomicBool>, captures: usize) {
        *self.stop_after.lock() = Some((flag, captures));
    }

    /// Planar test signal: channel `c`, sample `i` is `c * 1000 + i`
    pub fn planar_value(channel: usize, sample: usize) -> f32 {
        (channel * 1000 + sample) as f32
    }

    fn fill_video(&self, frame: &mut VideoFrameV2) {
        let mut picture = self.picture.lock();
        match picture.as_mut() {
            Some(p) => {
                frame.xres = p.width;
                frame.yres = p.height;
                frame.fourcc = p.fourcc;
                frame.line_stride_in_bytes = p.stride;
                frame.frame_rate_n = 30;
                frame.frame_rate_d = 1;
                frame.p_data = p.data.as_mut_ptr();
            }
            None => *frame = VideoFrameV2::default(),
        }
    }
}

impl NdiRuntime for MockRuntime {
    fn find_create(&self) -> FindInstance {
        if self.fail_find.load(Ordering::SeqCst) {
            return FindInstance::NULL;
        }
        self.counters.find_created.fetch_add(1, Ordering::SeqCst);
        FindInstance(FIND_HANDLE as *mut c_void)
    }

    fn find_destroy(&self, instance: FindInstance) {
        assert_eq!(instance.0 as usize, FIND_HANDLE);
        self.counters.find_destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn find_wait_for_sources(&self, _instance: FindInstance, _timeout_ms: u32) -> bool {
        self.counters.waits.fetch_add(1, Ordering::SeqCst);
        !self.sources.lock().is_empty()
    }

    fn find_current_sources(&self, _instance: FindInstance) -> Vec<String> {
        self.sources.lock().clone()
    }

    fn recv_create(&self, settings: &RecvSettings) -> RecvInstance {
        self.recv_settings.lock().push(settings.clone());
        if self.panic_recv.load(Ordering::SeqCst) {
            panic!("mock receiver crashed");
        }
        if self.fail_recv.load(Ordering::SeqCst) {
            return RecvInstance::NULL;
        }
        self.counters.recv_created.fetch_add(1, Ordering::SeqCst);
        RecvInstance(RECV_HANDLE as *mut c_void)
    }

    fn recv_destroy(&self, instance: RecvInstance) {
        assert_eq!(instance.0 as usize, RECV_HANDLE);
        self.counters.recv_destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn recv_capture_video(
        &self,
        _instance: RecvInstance,
        frame: &mut VideoFrameV2,
        _timeout_ms: u32,
    ) -> FrameType {
        self.counters.recv_captures.fetch_add(1, Ordering::SeqCst);
        let kind = self.recv_script.lock().pop_front().unwrap_or(FrameType::None);
        if kind == FrameType::Video {
            self.fill_video(frame);
        }
        kind
    }

    fn recv_free_video(&self, _instance: RecvInstance, _frame: &VideoFrameV2) {
        self.counters.recv_frees.fetch_add(1, Ordering::SeqCst);
    }

    fn framesync_create(&self, recv: RecvInstance) -> FrameSyncInstance {
        assert_eq!(recv.0 as usize, RECV_HANDLE);
        if self.fail_framesync.load(Ordering::SeqCst) {
            return FrameSyncInstance::NULL;
        }
        self.counters.framesync_created.fetch_add(1, Ordering::SeqCst);
        FrameSyncInstance(FRAMESYNC_HANDLE as *mut c_void)
    }

    fn framesync_destroy(&self, instance: FrameSyncInstance) {
        assert_eq!(instance.0 as usize, FRAMESYNC_HANDLE);
        // The frame-sync must go before the receive session it sits on
        assert!(
            Counters::get(&self.counters.recv_destroyed)
                < Counters::get(&self.counters.recv_created),
            "receive session destroyed before its frame-sync"
        );
        self.counters.framesync_destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn framesync_capture_video(
        &self,
        _instance: FrameSyncInstance,
        frame: &mut VideoFrameV2,
        format: FrameFormatType,
    ) {
        assert_eq!(format, FrameFormatType::Progressive);
        let captures = self.counters.video_captures.fetch_add(1, Ordering::SeqCst) + 1;
        self.fill_video(frame);

        if let Some((flag, after)) = self.stop_after.lock().as_ref() {
            if captures >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }

    fn framesync_free_video(&self, _instance: FrameSyncInstance, _frame: &VideoFrameV2) {
        self.counters.video_frees.fetch_add(1, Ordering::SeqCst);
    }

    fn framesync_capture_audio(
        &self,
        _instance: FrameSyncInstance,
        frame: &mut AudioFrameV2,
        sample_rate: i32,
        channels: i32,
        samples: i32,
    ) {
        self.counters.audio_captures.fetch_add(1, Ordering::SeqCst);
        self.audio_requests
            .lock()
            .push((sample_rate, channels, samples));

        let (stream_rate, stream_channels) = *self.stream_audio.lock();
        if stream_channels == 0 {
            *frame = AudioFrameV2::default();
            return;
        }

        if sample_rate == 0 && channels == 0 && samples == 0 {
            *frame = AudioFrameV2 {
                sample_rate: stream_rate,
                no_channels: stream_channels,
                ..AudioFrameV2::default()
            };
            return;
        }

        let mut planar = self.planar.lock();
        planar.clear();
        for c in 0..channels.max(0) as usize {
            for i in 0..samples.max(0) as usize {
                planar.push(Self::planar_value(c, i));
            }
        }

        *frame = AudioFrameV2 {
            sample_rate,
            no_channels: channels,
            no_samples: samples,
            p_data: planar.as_mut_ptr(),
            channel_stride_in_bytes: samples * 4,
            ..AudioFrameV2::default()
        };
    }

    fn framesync_free_audio(&self, _instance: FrameSyncInstance, _frame: &AudioFrameV2) {
        self.counters.audio_frees.fetch_add(1, Ordering::SeqCst);
    }

    fn audio_to_interleaved_f32(&self, src: &AudioFrameV2, dst: &mut InterleavedDest<'_>) {
        self.interleave_calls
            .lock()
            .push((dst.samples, dst.channels, dst.data.len()));

        if src.p_data.is_null() {
            return;
        }
        let channels = src.no_channels.min(dst.channels).max(0) as usize;
        let samples = src.no_samples.min(dst.samples).max(0) as usize;
        let stride = (src.channel_stride_in_bytes / 4) as usize;
        let planar =
            unsafe { std::slice::from_raw_parts(src.p_data, stride * src.no_channels as usize) };

        for i in 0..samples {
            for c in 0..channels {
                dst.data[i * dst.channels as usize + c] = planar[c * stride + i];
            }
        }
    }
}

/// Audio output device fake; formats equal to `preferred` or in `supported` are accepted
pub struct MockDevice {
    pub name: String,
    pub preferred: AudioFormat,
    pub supported: Mutex<Vec<AudioFormat>>,
    pub queue_capacity: usize,
    pub fail_open: AtomicBool,
    pub opened: Mutex<Vec<AudioFormat>>,
    pub sinks_dropped: Arc<AtomicUsize>,
    queues: Mutex<Vec<Arc<SampleQueue>>>,
}

impl MockDevice {
    pub fn new(preferred: AudioFormat, queue_capacity: usize) -> Self {
        Self {
            name: "Mock Output".to_string(),
            preferred,
            supported: Mutex::new(Vec::new()),
            queue_capacity,
            fail_open: AtomicBool::new(false),
            opened: Mutex::new(Vec::new()),
            sinks_dropped: Arc::new(AtomicUsize::new(0)),
            queues: Mutex::new(Vec::new()),
        }
    }

    pub fn supporting(self, formats: &[AudioFormat]) -> Self {
        self.supported.lock().extend_from_slice(formats);
        self
    }

    /// Queue behind the most recently opened sink
    pub fn last_queue(&self) -> Option<Arc<SampleQueue>> {
        self.queues.lock().last().cloned()
    }

    pub fn dropped(&self) -> usize {
        self.sinks_dropped.load(Ordering::SeqCst)
    }
}

impl OutputDevice for MockDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_format_supported(&self, format: &AudioFormat) -> bool {
        *format == self.preferred || self.supported.lock().contains(format)
    }

    fn preferred_format(&self) -> AudioFormat {
        self.preferred
    }

    fn open_sink(&self, format: AudioFormat) -> Result<Box<dyn AudioSink>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Error::AudioDevice("mock open failure".into()));
        }
        self.opened.lock().push(format);
        let queue = Arc::new(SampleQueue::new(self.queue_capacity));
        self.queues.lock().push(queue.clone());
        Ok(Box::new(MockSink {
            format,
            state: SinkState::Stopped,
            queue,
            dropped: self.sinks_dropped.clone(),
            _not_send: PhantomData,
        }))
    }
}

pub struct MockSink {
    format: AudioFormat,
    state: SinkState,
    queue: Arc<SampleQueue>,
    dropped: Arc<AtomicUsize>,
    _not_send: PhantomData<*const ()>,
}

impl AudioSink for MockSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn start(&mut self) -> Result<SinkWriter> {
        self.state = SinkState::Started;
        Ok(SinkWriter::new(self.queue.clone()))
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Display that keeps every presented image
#[derive(Default)]
pub struct RecordingDisplay {
    pub frames: Mutex<Vec<Image>>,
}

impl RecordingDisplay {
    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl DisplaySink for RecordingDisplay {
    fn present(&self, image: Image) {
        self.frames.lock().push(image);
    }
}

/// 2x2 BGRA test picture with distinct pixels
pub fn bgra_picture() -> MockPicture {
    MockPicture {
        width: 2,
        height: 2,
        fourcc: fourcc::BGRA,
        stride: 8,
        data: vec![
            10, 20, 30, 40, 11, 21, 31, 41, //
            12, 22, 32, 42, 13, 23, 33, 43,
        ],
    }
}

/// Collects formatted log lines written while [`LogCapture::run`] is active
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
