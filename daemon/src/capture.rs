/// Full-screen frame capture for pixel-signature detection.
///
/// On Windows the primary monitor is grabbed with GDI (`BitBlt` into a DIB
/// section readback).  A single synchronous grab per tick is all detection
/// needs, so no capture session is kept alive between calls.
///
/// On non-Windows platforms the public API compiles but `capture` returns an error.
use anyhow::{Context, Result};
use std::path::Path;

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A captured frame as tightly-packed RGBA8 pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA pixels: width × height × 4 bytes.
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Returns the color at `(x, y)`, or `None` when the point lies outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.rgba.get(offset..offset + 3)?;
        Some(Rgb::new(px[0], px[1], px[2]))
    }

    /// Writes the frame to `path` as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let image = image::RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .context("Frame buffer does not match its dimensions")?;
        image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("Failed to write screenshot: {}", path.display()))
    }
}

/// Source of full-screen frames.
pub trait ScreenCapture: Send {
    fn capture(&mut self) -> Result<Frame>;
}

/// Grabs the primary monitor.
#[derive(Debug, Default)]
pub struct ScreenGrabber;

impl ScreenCapture for ScreenGrabber {
    fn capture(&mut self) -> Result<Frame> {
        #[cfg(windows)]
        {
            imp::grab_primary()
        }
        #[cfg(not(windows))]
        {
            anyhow::bail!("Screen capture is only supported on Windows")
        }
    }
}

// ── Windows implementation ────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use anyhow::{bail, Context, Result};
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
        HBITMAP, HDC, SRCCOPY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    use super::Frame;

    /// Releases the screen DC, memory DC and bitmap in reverse creation order.
    struct GdiGuard {
        screen: HDC,
        memory: HDC,
        bitmap: HBITMAP,
    }

    impl Drop for GdiGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = DeleteObject(self.bitmap);
                let _ = DeleteDC(self.memory);
                ReleaseDC(None, self.screen);
            }
        }
    }

    pub fn grab_primary() -> Result<Frame> {
        let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if width <= 0 || height <= 0 {
            bail!("Primary monitor reports an empty size ({width}×{height})");
        }

        unsafe {
            let screen = GetDC(None);
            let memory = CreateCompatibleDC(screen);
            let bitmap = CreateCompatibleBitmap(screen, width, height);
            let guard = GdiGuard { screen, memory, bitmap };

            let previous = SelectObject(guard.memory, guard.bitmap);
            BitBlt(guard.memory, 0, 0, width, height, guard.screen, 0, 0, SRCCOPY)
                .context("BitBlt failed")?;
            SelectObject(guard.memory, previous);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height requests a top-down DIB.
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            let mut bgra = vec![0u8; width as usize * height as usize * 4];
            let rows = GetDIBits(
                guard.memory,
                guard.bitmap,
                0,
                height as u32,
                Some(bgra.as_mut_ptr().cast()),
                &mut info,
                DIB_RGB_COLORS,
            );
            if rows == 0 {
                bail!("GetDIBits returned no rows");
            }

            for px in bgra.chunks_exact_mut(4) {
                px.swap(0, 2);
                px[3] = 0xFF;
            }

            Ok(Frame {
                width: width as u32,
                height: height as u32,
                rgba: bgra,
            })
        }
    }
}
