//! Host console code page handling.
//!
//! The console output code page is process-wide state. [`CodePageGuard`]
//! switches it for the duration of a child process launch and restores the
//! previous value when dropped, including on timeout and early return.
//! Concurrent launches from several threads must be serialized by the caller.

use crate::error::Result;

/// Restores the previous console output code page on drop.
#[derive(Debug)]
pub struct CodePageGuard {
    #[cfg_attr(not(windows), allow(dead_code))]
    previous: u32,
}

impl CodePageGuard {
    /// Switch the console output code page.
    ///
    /// Returns `None` when nothing was changed: no console is attached, the
    /// code page already matches, the switch was refused, or the host is not
    /// Windows.
    pub fn switch_output(code_page: u32) -> Option<Self> {
        #[cfg(windows)]
        {
            win::switch_output(code_page).map(|previous| CodePageGuard { previous })
        }

        #[cfg(not(windows))]
        {
            let _ = code_page;
            None
        }
    }
}

impl Drop for CodePageGuard {
    fn drop(&mut self) {
        #[cfg(windows)]
        win::restore_output(self.previous);
    }
}

/// OEM code page of the host (the console default for console programs).
pub fn oem_code_page() -> Result<u32> {
    #[cfg(windows)]
    {
        Ok(win::oem_code_page())
    }

    #[cfg(not(windows))]
    {
        Err(crate::error::DesignerError::UnsupportedPlatform(
            "console code page detection".to_string(),
        ))
    }
}

#[cfg(windows)]
mod win {
    use windows::Win32::Globalization::GetOEMCP;
    use windows::Win32::System::Console::{GetConsoleOutputCP, SetConsoleOutputCP};

    /// Returns the previous code page when a switch actually happened.
    pub(super) fn switch_output(code_page: u32) -> Option<u32> {
        // SAFETY: no arguments; returns 0 when the process has no console.
        let previous = unsafe { GetConsoleOutputCP() };
        if previous == 0 {
            tracing::debug!("no console attached, output code page left unchanged");
            return None;
        }
        if previous == code_page {
            return None;
        }
        // SAFETY: plain integer argument.
        if let Err(e) = unsafe { SetConsoleOutputCP(code_page) } {
            tracing::warn!(code_page = code_page, error = %e, "failed to switch console output code page");
            return None;
        }
        tracing::trace!(from = previous, to = code_page, "switched console output code page");
        Some(previous)
    }

    pub(super) fn restore_output(previous: u32) {
        // SAFETY: plain integer argument.
        if let Err(e) = unsafe { SetConsoleOutputCP(previous) } {
            tracing::warn!(code_page = previous, error = %e, "failed to restore console output code page");
        }
    }

    pub(super) fn oem_code_page() -> u32 {
        // SAFETY: no arguments, no failure mode.
        unsafe { GetOEMCP() }
    }
}
