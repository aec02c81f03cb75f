/// Save-key polling.
///
/// The daemon checks the save key once per tick rather than hooking the
/// keyboard: a keep request only matters while a staged attempt exists, and
/// the single-consumption latch in the transition engine turns a held key into
/// exactly one save.
///
/// On Windows the key state comes from `GetAsyncKeyState`, which reports the
/// physical key even while a full-screen game has focus.  On other platforms
/// the key is never pressed.
use tracing::warn;

/// Converts a key name (e.g. `"F8"`, `"k"`) to a Windows virtual-key code.
///
/// Supported keys:
/// - Function keys `F1`–`F12` (case-insensitive).
/// - ASCII letters `A`–`Z` (normalised to their uppercase VK values, `0x41`–`0x5A`).
/// - ASCII digits `0`–`9` (VK values `0x30`–`0x39`).
///
/// Returns `None` for any unrecognised name.
pub fn parse_vk(name: &str) -> Option<u32> {
    match name.trim().to_uppercase().as_str() {
        "F1" => Some(0x70),
        "F2" => Some(0x71),
        "F3" => Some(0x72),
        "F4" => Some(0x73),
        "F5" => Some(0x74),
        "F6" => Some(0x75),
        "F7" => Some(0x76),
        "F8" => Some(0x77),
        "F9" => Some(0x78),
        "F10" => Some(0x79),
        "F11" => Some(0x7A),
        "F12" => Some(0x7B),
        s => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                // 'A'=0x41…'Z'=0x5A; '0'=0x30…'9'=0x39 match the VK codes.
                (Some(c), None) if c.is_ascii_alphanumeric() => Some(c.to_ascii_uppercase() as u32),
                _ => None,
            }
        }
    }
}

/// Something that can report whether the save key is held right now.
pub trait KeyState: Send {
    fn is_pressed(&self) -> bool;
}

/// The configured save key, read from the live keyboard state.
#[derive(Debug, Clone, Copy)]
pub struct SaveKey {
    /// `None` disables saving.
    vk: Option<u32>,
}

impl SaveKey {
    pub fn new(name: &str) -> Self {
        let vk = parse_vk(name);
        if vk.is_none() {
            warn!(key = name, "Unrecognised save key, saving is disabled");
        }
        Self { vk }
    }

    pub fn is_enabled(&self) -> bool {
        self.vk.is_some()
    }
}

impl KeyState for SaveKey {
    fn is_pressed(&self) -> bool {
        match self.vk {
            Some(vk) => imp::is_down(vk),
            None => false,
        }
    }
}

#[cfg(windows)]
mod imp {
    use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;

    pub fn is_down(vk: u32) -> bool {
        // High bit set = key currently down.
        let state = unsafe { GetAsyncKeyState(vk as i32) };
        state < 0
    }
}

#[cfg(not(windows))]
mod imp {
    pub fn is_down(_vk: u32) -> bool {
        false
    }
}
