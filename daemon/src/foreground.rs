/// Identifies the focused window: its process executable name and title.
///
/// On Windows the foreground window comes from `GetForegroundWindow`; its
/// owning process name is resolved through `sysinfo`, refreshing only that one
/// pid per call.  On other platforms there is never a foreground window.
#[cfg(windows)]
use sysinfo::System;

/// Lowercased process executable name and window title of the focused window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundContext {
    pub process_name: String,
    pub window_title: String,
}

impl ForegroundContext {
    pub fn new(process_name: &str, window_title: &str) -> Self {
        Self {
            process_name: process_name.to_lowercase(),
            window_title: window_title.to_lowercase(),
        }
    }
}

pub trait ForegroundProbe: Send {
    /// `None` when no window has focus or its owner cannot be resolved.
    fn foreground(&mut self) -> Option<ForegroundContext>;
}

pub struct ForegroundWindowProbe {
    #[cfg(windows)]
    sys: System,
}

impl ForegroundWindowProbe {
    pub fn new() -> Self {
        Self {
            #[cfg(windows)]
            sys: System::new(),
        }
    }
}

impl ForegroundProbe for ForegroundWindowProbe {
    #[cfg(windows)]
    fn foreground(&mut self) -> Option<ForegroundContext> {
        use sysinfo::{Pid, ProcessesToUpdate};

        let (pid, title) = imp::foreground_window()?;
        let pid = Pid::from_u32(pid);
        self.sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = self.sys.process(pid)?;
        Some(ForegroundContext::new(&process.name().to_string_lossy(), &title))
    }

    #[cfg(not(windows))]
    fn foreground(&mut self) -> Option<ForegroundContext> {
        None
    }
}

#[cfg(windows)]
mod imp {
    use windows::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowTextW, GetWindowThreadProcessId,
    };

    const TITLE_CAPACITY: usize = 512;

    /// Owning pid and title of the foreground window.
    pub fn foreground_window() -> Option<(u32, String)> {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.is_invalid() {
                return None;
            }
            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
            if pid == 0 {
                return None;
            }
            let mut buf = [0u16; TITLE_CAPACITY];
            let len = GetWindowTextW(hwnd, &mut buf).max(0) as usize;
            Some((pid, String::from_utf16_lossy(&buf[..len.min(TITLE_CAPACITY)])))
        }
    }
}
