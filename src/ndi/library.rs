//! Dynamically loaded NDI runtime
//!
//! The NDI runtime is redistributed separately from applications, so it is loaded at
//! run time with libloading instead of being linked.
//!
//! Search order:
//! 1. An explicit path from the configuration
//! 2. `NDI_RUNTIME_DIR_V6` / `NDI_RUNTIME_DIR_V5` (set by the NDI runtime installers)
//! 3. Next to the executable
//! 4. System library paths (handled by libloading)

use std::ffi::{c_char, c_void, CStr, CString};
use std::path::{Path, PathBuf};

use libloading::Library;

use super::{
    AudioFrameV2, FindInstance, FrameFormatType, FrameSyncInstance, FrameType, InterleavedDest,
    NdiRuntime, RecvInstance, RecvSettings, VideoFrameV2,
};
use crate::error::{Error, Result};

/// Mirror of `NDIlib_source_t`
#[repr(C)]
struct RawSource {
    p_ndi_name: *const c_char,
    p_url_address: *const c_char,
}

/// Mirror of `NDIlib_recv_create_v3_t`
#[repr(C)]
struct RawRecvCreate {
    source_to_connect_to: RawSource,
    color_format: i32,
    bandwidth: i32,
    allow_video_fields: bool,
    p_ndi_recv_name: *const c_char,
}

/// Mirror of `NDIlib_audio_frame_interleaved_32f_t`
#[repr(C)]
struct RawInterleaved32f {
    sample_rate: i32,
    no_channels: i32,
    no_samples: i32,
    timecode: i64,
    p_data: *mut f32,
}

/// `NDIlib_send_timecode_synthesize`
const TIMECODE_SYNTHESIZE: i64 = i64::MAX;

#[cfg(windows)]
const LIBRARY_NAMES: &[&str] = &["Processing.NDI.Lib.x64.dll"];
#[cfg(target_os = "macos")]
const LIBRARY_NAMES: &[&str] = &["libndi.dylib", "libndi_advanced.dylib"];
#[cfg(all(unix, not(target_os = "macos")))]
const LIBRARY_NAMES: &[&str] = &["libndi.so.6", "libndi.so.5", "libndi.so"];

const RUNTIME_DIR_VARS: &[&str] = &["NDI_RUNTIME_DIR_V6", "NDI_RUNTIME_DIR_V5"];

/// The loaded NDI runtime
pub struct NdiLibrary {
    _lib: Library,
    source: PathBuf,
    initialized: bool,
    destroy: unsafe extern "C" fn(),
    version: unsafe extern "C" fn() -> *const c_char,
    find_create_v2: unsafe extern "C" fn(*const c_void) -> *mut c_void,
    find_destroy: unsafe extern "C" fn(*mut c_void),
    find_wait_for_sources: unsafe extern "C" fn(*mut c_void, u32) -> bool,
    find_get_current_sources: unsafe extern "C" fn(*mut c_void, *mut u32) -> *const RawSource,
    recv_create_v3: unsafe extern "C" fn(*const RawRecvCreate) -> *mut c_void,
    recv_destroy: unsafe extern "C" fn(*mut c_void),
    recv_capture_v2: unsafe extern "C" fn(
        *mut c_void,
        *mut VideoFrameV2,
        *mut c_void,
        *mut c_void,
        u32,
    ) -> i32,
    recv_free_video_v2: unsafe extern "C" fn(*mut c_void, *const VideoFrameV2),
    framesync_create: unsafe extern "C" fn(*mut c_void) -> *mut c_void,
    framesync_destroy: unsafe extern "C" fn(*mut c_void),
    framesync_capture_video: unsafe extern "C" fn(*mut c_void, *mut VideoFrameV2, i32),
    framesync_free_video: unsafe extern "C" fn(*mut c_void, *mut VideoFrameV2),
    framesync_capture_audio: unsafe extern "C" fn(*mut c_void, *mut AudioFrameV2, i32, i32, i32),
    framesync_free_audio: unsafe extern "C" fn(*mut c_void, *mut AudioFrameV2),
    audio_to_interleaved_32f_v2:
        unsafe extern "C" fn(*const AudioFrameV2, *mut RawInterleaved32f),
}

// SAFETY: The library handle and function pointers carry no thread-local state, and the
// NDI SDK documents its entry points as callable from any thread.
unsafe impl Send for NdiLibrary {}
unsafe impl Sync for NdiLibrary {}

/// Resolve one exported symbol; `T` is the function pointer type
unsafe fn symbol<T: Copy>(lib: &Library, name: &str) -> Result<T> {
    lib.get::<T>(name.as_bytes())
        .map(|sym| *sym)
        .map_err(|e| Error::Runtime(format!("Failed to load {}: {}", name, e)))
}

impl NdiLibrary {
    /// Load and initialize the runtime from the given path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        unsafe {
            let lib = Library::new(path).map_err(|e| {
                Error::RuntimeNotFound(format!("{}: {}", path.display(), e))
            })?;

            let initialize: unsafe extern "C" fn() -> bool = symbol(&lib, "NDIlib_initialize")?;

            let mut library = Self {
                destroy: symbol(&lib, "NDIlib_destroy")?,
                version: symbol(&lib, "NDIlib_version")?,
                find_create_v2: symbol(&lib, "NDIlib_find_create_v2")?,
                find_destroy: symbol(&lib, "NDIlib_find_destroy")?,
                find_wait_for_sources: symbol(&lib, "NDIlib_find_wait_for_sources")?,
                find_get_current_sources: symbol(&lib, "NDIlib_find_get_current_sources")?,
                recv_create_v3: symbol(&lib, "NDIlib_recv_create_v3")?,
                recv_destroy: symbol(&lib, "NDIlib_recv_destroy")?,
                recv_capture_v2: symbol(&lib, "NDIlib_recv_capture_v2")?,
                recv_free_video_v2: symbol(&lib, "NDIlib_recv_free_video_v2")?,
                framesync_create: symbol(&lib, "NDIlib_framesync_create")?,
                framesync_destroy: symbol(&lib, "NDIlib_framesync_destroy")?,
                framesync_capture_video: symbol(&lib, "NDIlib_framesync_capture_video")?,
                framesync_free_video: symbol(&lib, "NDIlib_framesync_free_video")?,
                framesync_capture_audio: symbol(&lib, "NDIlib_framesync_capture_audio")?,
                framesync_free_audio: symbol(&lib, "NDIlib_framesync_free_audio")?,
                audio_to_interleaved_32f_v2: symbol(&lib, "NDIlib_util_audio_to_interleaved_32f_v2")?,
                source: path.to_path_buf(),
                initialized: false,
                _lib: lib,
            };

            if !initialize() {
                return Err(Error::RuntimeInit);
            }
            library.initialized = true;

            Ok(library)
        }
    }

    /// Find and load the runtime, preferring `explicit` when given
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let mut candidates: Vec<PathBuf> = Vec::new();
        for var in RUNTIME_DIR_VARS {
            if let Some(dir) = std::env::var_os(var) {
                let dir = PathBuf::from(dir);
                candidates.extend(LIBRARY_NAMES.iter().map(|name| dir.join(name)));
            }
        }
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            candidates.extend(LIBRARY_NAMES.iter().map(|name| exe_dir.join(name)));
        }

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load(path) {
                Ok(lib) => {
                    tracing::info!("Loaded NDI runtime from: {}", path.display());
                    return Ok(lib);
                }
                Err(e) => {
                    tracing::warn!("Failed to load NDI runtime from {}: {}", path.display(), e);
                }
            }
        }

        // Let the system loader search its own paths
        for name in LIBRARY_NAMES {
            match Self::load(name) {
                Ok(lib) => {
                    tracing::info!("Loaded NDI runtime from system path ({})", name);
                    return Ok(lib);
                }
                Err(e) => tracing::debug!("{} not loadable: {}", name, e),
            }
        }

        Err(Error::RuntimeNotFound(format!(
            "none of {:?} found; install the NDI runtime or set NDI_RUNTIME_DIR_V6",
            LIBRARY_NAMES
        )))
    }

    /// Where the runtime was loaded from
    pub fn path(&self) -> &Path {
        &self.source
    }

    /// Runtime version string
    pub fn version(&self) -> String {
        let ptr = unsafe { (self.version)() };
        if ptr.is_null() {
            return String::from("unknown");
        }
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

impl Drop for NdiLibrary {
    fn drop(&mut self) {
        if self.initialized {
            unsafe { (self.destroy)() };
        }
    }
}

impl NdiRuntime for NdiLibrary {
    fn find_create(&self) -> FindInstance {
        FindInstance(unsafe { (self.find_create_v2)(std::ptr::null()) })
    }

    fn find_destroy(&self, instance: FindInstance) {
        unsafe { (self.find_destroy)(instance.0) }
    }

    fn find_wait_for_sources(&self, instance: FindInstance, timeout_ms: u32) -> bool {
        unsafe { (self.find_wait_for_sources)(instance.0, timeout_ms) }
    }

    fn find_current_sources(&self, instance: FindInstance) -> Vec<String> {
        let mut count: u32 = 0;
        let sources = unsafe { (self.find_get_current_sources)(instance.0, &mut count) };
        if sources.is_null() {
            return Vec::new();
        }

        // SAFETY: the runtime owns `count` entries until the next call on this instance
        let sources = unsafe { std::slice::from_raw_parts(sources, count as usize) };
        sources
            .iter()
            .filter(|s| !s.p_ndi_name.is_null())
            .map(|s| {
                unsafe { CStr::from_ptr(s.p_ndi_name) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    fn recv_create(&self, settings: &RecvSettings) -> RecvInstance {
        let name = match CString::new(settings.source_name.as_str()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!("Source name contains NUL: {:?}", settings.source_name);
                return RecvInstance::NULL;
            }
        };

        let create = RawRecvCreate {
            source_to_connect_to: RawSource {
                p_ndi_name: name.as_ptr(),
                p_url_address: std::ptr::null(),
            },
            color_format: settings.color_format.as_raw(),
            bandwidth: settings.bandwidth.as_raw(),
            allow_video_fields: settings.allow_video_fields,
            p_ndi_recv_name: std::ptr::null(),
        };

        // The runtime copies the settings, so `name` only has to outlive this call
        RecvInstance(unsafe { (self.recv_create_v3)(&create) })
    }

    fn recv_destroy(&self, instance: RecvInstance) {
        unsafe { (self.recv_destroy)(instance.0) }
    }

    fn recv_capture_video(
        &self,
        instance: RecvInstance,
        frame: &mut VideoFrameV2,
        timeout_ms: u32,
    ) -> FrameType {
        let raw = unsafe {
            (self.recv_capture_v2)(
                instance.0,
                frame,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                timeout_ms,
            )
        };
        FrameType::from(raw)
    }

    fn recv_free_video(&self, instance: RecvInstance, frame: &VideoFrameV2) {
        unsafe { (self.recv_free_video_v2)(instance.0, frame) }
    }

    fn framesync_create(&self, recv: RecvInstance) -> FrameSyncInstance {
        FrameSyncInstance(unsafe { (self.framesync_create)(recv.0) })
    }

    fn framesync_destroy(&self, instance: FrameSyncInstance) {
        unsafe { (self.framesync_destroy)(instance.0) }
    }

    fn framesync_capture_video(
        &self,
        instance: FrameSyncInstance,
        frame: &mut VideoFrameV2,
        format: FrameFormatType,
    ) {
        unsafe { (self.framesync_capture_video)(instance.0, frame, format.as_raw()) }
    }

    fn framesync_free_video(&self, instance: FrameSyncInstance, frame: &VideoFrameV2) {
        let mut copy = *frame;
        unsafe { (self.framesync_free_video)(instance.0, &mut copy) }
    }

    fn framesync_capture_audio(
        &self,
        instance: FrameSyncInstance,
        frame: &mut AudioFrameV2,
        sample_rate: i32,
        channels: i32,
        samples: i32,
    ) {
        unsafe {
            (self.framesync_capture_audio)(instance.0, frame, sample_rate, channels, samples)
        }
    }

    fn framesync_free_audio(&self, instance: FrameSyncInstance, frame: &AudioFrameV2) {
        let mut copy = *frame;
        unsafe { (self.framesync_free_audio)(instance.0, &mut copy) }
    }

    fn audio_to_interleaved_f32(&self, src: &AudioFrameV2, dst: &mut InterleavedDest<'_>) {
        let needed = dst.samples.max(0) as usize * dst.channels.max(0) as usize;
        if dst.data.len() < needed {
            tracing::error!(
                "Interleave destination too small: {} < {}",
                dst.data.len(),
                needed
            );
            return;
        }

        let mut raw = RawInterleaved32f {
            sample_rate: dst.sample_rate,
            no_channels: dst.channels,
            no_samples: dst.samples,
            timecode: TIMECODE_SYNTHESIZE,
            p_data: dst.data.as_mut_ptr(),
        };
        unsafe { (self.audio_to_interleaved_32f_v2)(src, &mut raw) }
    }
}
