//! Microphone mute — trait + Windows WASAPI and Linux PulseAudio backends.
//!
//! Muting is a side effect of disabling microphone-class devices and is
//! always best effort: the manager logs failures and carries on.

use std::fmt;

#[derive(Debug)]
pub enum AudioError {
    InitFailed(String),
    OperationFailed(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::InitFailed(e) => write!(f, "Audio init failed: {e}"),
            AudioError::OperationFailed(e) => write!(f, "Audio mute failed: {e}"),
        }
    }
}

impl std::error::Error for AudioError {}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Controls the mute state of the default capture device.
pub trait MicMute {
    fn set_muted(&self, muted: bool) -> Result<()>;

    fn mute(&self) -> Result<()> {
        self.set_muted(true)
    }

    fn unmute(&self) -> Result<()> {
        self.set_muted(false)
    }
}

// ── Windows WASAPI implementation ──

#[cfg(windows)]
mod wasapi {
    use super::*;

    use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
    use windows::Win32::Media::Audio::*;
    use windows::Win32::System::Com::*;

    /// Default capture endpoint via `IAudioEndpointVolume`.
    ///
    /// Opens the endpoint per call; devmute mutes at most twice per run.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct WasapiMute;

    impl WasapiMute {
        pub fn new() -> Result<Self> {
            Ok(WasapiMute)
        }
    }

    impl MicMute for WasapiMute {
        fn set_muted(&self, muted: bool) -> Result<()> {
            com_init()?;
            unsafe {
                let enumerator: IMMDeviceEnumerator =
                    CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                        .map_err(|e| AudioError::InitFailed(format!("MMDeviceEnumerator: {e}")))?;

                let device = enumerator
                    .GetDefaultAudioEndpoint(eCapture, eConsole)
                    .map_err(|e| AudioError::InitFailed(format!("GetDefaultAudioEndpoint: {e}")))?;

                let volume: IAudioEndpointVolume = device
                    .Activate(CLSCTX_ALL, None)
                    .map_err(|e| AudioError::InitFailed(format!("IAudioEndpointVolume: {e}")))?;

                volume
                    .SetMute(muted, std::ptr::null())
                    .map_err(|e| AudioError::OperationFailed(format!("SetMute: {e}")))
            }
        }
    }

    /// Initialize COM for the current thread (apartment-threaded).
    ///
    /// Repeated calls on the same thread return `S_FALSE`, which is success.
    fn com_init() -> Result<()> {
        unsafe {
            CoInitializeEx(None, COINIT_APARTMENTTHREADED)
                .ok()
                .map_err(|e| AudioError::InitFailed(format!("CoInitializeEx: {e}")))
        }
    }
}

#[cfg(windows)]
pub use wasapi::WasapiMute;

// ── Linux PulseAudio implementation ──

#[cfg(target_os = "linux")]
mod pulse {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use libpulse_binding::context::{Context, FlagSet as ContextFlagSet, State as ContextState};
    use libpulse_binding::mainloop::threaded::Mainloop;

    const DEFAULT_SOURCE: &str = "@DEFAULT_SOURCE@";

    /// Upper bound for connecting and for the mute operation to complete.
    const PULSE_TIMEOUT: Duration = Duration::from_secs(2);

    /// Default PulseAudio/PipeWire source, one short-lived connection per call.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct PulseMute;

    impl PulseMute {
        pub fn new() -> Result<Self> {
            Ok(PulseMute)
        }
    }

    impl MicMute for PulseMute {
        fn set_muted(&self, muted: bool) -> Result<()> {
            let mut mainloop = Mainloop::new().ok_or_else(|| {
                AudioError::InitFailed("PulseAudio mainloop creation failed".into())
            })?;

            let mut context = Context::new(&mainloop, "devmute").ok_or_else(|| {
                AudioError::InitFailed("PulseAudio context creation failed".into())
            })?;

            context
                .connect(None, ContextFlagSet::NOFLAGS, None)
                .map_err(|e| AudioError::InitFailed(format!("PulseAudio connect: {e}")))?;

            mainloop
                .start()
                .map_err(|e| AudioError::InitFailed(format!("PulseAudio mainloop start: {e}")))?;

            let outcome = wait_ready(&mut mainloop, &context)
                .and_then(|()| set_default_source_mute(&mut mainloop, &context, muted));

            mainloop.lock();
            context.disconnect();
            mainloop.unlock();
            mainloop.stop();
            outcome
        }
    }

    fn wait_ready(mainloop: &mut Mainloop, context: &Context) -> Result<()> {
        let deadline = Instant::now() + PULSE_TIMEOUT;
        loop {
            mainloop.lock();
            let state = context.get_state();
            mainloop.unlock();
            match state {
                ContextState::Ready => return Ok(()),
                ContextState::Failed | ContextState::Terminated => {
                    return Err(AudioError::InitFailed(
                        "PulseAudio context connection failed".into(),
                    ));
                }
                _ if Instant::now() >= deadline => {
                    return Err(AudioError::InitFailed(
                        "PulseAudio context not ready in time".into(),
                    ));
                }
                _ => std::thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    fn set_default_source_mute(
        mainloop: &mut Mainloop,
        context: &Context,
        muted: bool,
    ) -> Result<()> {
        let done: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
        let done_cb = Arc::clone(&done);

        mainloop.lock();
        let mut introspect = context.introspect();
        introspect.set_source_mute_by_name(
            DEFAULT_SOURCE,
            muted,
            Some(Box::new(move |success| {
                if let Ok(mut d) = done_cb.lock() {
                    *d = Some(success);
                }
            })),
        );
        mainloop.unlock();

        let deadline = Instant::now() + PULSE_TIMEOUT;
        while Instant::now() < deadline {
            if let Some(success) = done.lock().ok().and_then(|d| *d) {
                return if success {
                    Ok(())
                } else {
                    Err(AudioError::OperationFailed(format!(
                        "PulseAudio rejected mute={muted} for {DEFAULT_SOURCE}"
                    )))
                };
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Err(AudioError::OperationFailed(
            "PulseAudio mute request timed out".into(),
        ))
    }
}

#[cfg(target_os = "linux")]
pub use pulse::PulseMute;

// ── Unsupported platforms ──

#[cfg(not(any(windows, target_os = "linux")))]
mod unsupported {
    use super::*;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct UnsupportedMute;

    impl UnsupportedMute {
        pub fn new() -> Result<Self> {
            Ok(UnsupportedMute)
        }
    }

    impl MicMute for UnsupportedMute {
        fn set_muted(&self, _muted: bool) -> Result<()> {
            Err(AudioError::InitFailed(
                "Mute control is not yet supported on this platform.".into(),
            ))
        }
    }
}

#[cfg(not(any(windows, target_os = "linux")))]
pub use unsupported::UnsupportedMute;

/// Concrete mute backend for the current platform.
#[cfg(windows)]
pub type PlatformMute = WasapiMute;
#[cfg(target_os = "linux")]
pub type PlatformMute = PulseMute;
#[cfg(not(any(windows, target_os = "linux")))]
pub type PlatformMute = UnsupportedMute;

/// Create the platform-appropriate mute backend.
pub fn platform_mute() -> Result<PlatformMute> {
    PlatformMute::new()
}

// ── Test stub ──

/// Recording [`MicMute`] for unit and integration tests.
pub mod stub {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Debug, Default)]
    pub struct StubMute {
        /// Requested states, in call order.
        pub calls: RefCell<Vec<bool>>,
        /// If true, every call fails (after being recorded).
        pub fail: Cell<bool>,
    }

    impl StubMute {
        pub fn new() -> Self {
            Self::default()
        }

        /// Stub whose every call fails.
        pub fn failing() -> Self {
            let stub = Self::default();
            stub.fail.set(true);
            stub
        }
    }

    impl MicMute for StubMute {
        fn set_muted(&self, muted: bool) -> Result<()> {
            self.calls.borrow_mut().push(muted);
            if self.fail.get() {
                return Err(AudioError::OperationFailed("stub: failure injected".into()));
            }
            Ok(())
        }
    }
}
