//! Restarting one external application after its overlays changed.

use icondetect_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Process discovery and control used by [`restart`].
pub trait ProcessControl {
    /// Full executable path of the first running process named `image`.
    fn image_path(&self, image: &str) -> Result<PathBuf>;

    /// Ask the main window of the process named `image` to close.
    fn request_close(&self, image: &str) -> Result<()>;

    /// Start `path` without waiting for it.
    fn launch_detached(&self, path: &Path) -> Result<()>;
}

/// Close the running `image` and start it again from the same path.
pub fn restart<P: ProcessControl + ?Sized>(control: &P, image: &str) -> Result<PathBuf> {
    let path = control.image_path(image)?;
    control.request_close(image)?;
    control.launch_detached(&path)?;
    log::info!("restarted {} ({})", image, path.display());
    Ok(path)
}

/// Process control for platforms without an implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProcesses;

impl ProcessControl for UnsupportedProcesses {
    fn image_path(&self, image: &str) -> Result<PathBuf> {
        Err(Error::unsupported(format!("cannot look up {} on this platform", image)))
    }

    fn request_close(&self, image: &str) -> Result<()> {
        Err(Error::unsupported(format!("cannot close {} on this platform", image)))
    }

    fn launch_detached(&self, path: &Path) -> Result<()> {
        Err(Error::unsupported(format!(
            "cannot launch {} on this platform",
            path.display()
        )))
    }
}

#[cfg(windows)]
pub use win::WindowsProcesses;

/// Process control for the current platform
#[cfg(windows)]
pub type SystemProcesses = WindowsProcesses;
/// Process control for the current platform
#[cfg(not(windows))]
pub type SystemProcesses = UnsupportedProcesses;

#[cfg(windows)]
mod win {
    use super::ProcessControl;
    use icondetect_core::{Error, Result};
    use std::ffi::OsString;
    use std::io;
    use std::mem;
    use std::os::windows::ffi::OsStringExt;
    use std::os::windows::process::CommandExt;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use std::ptr;
    use windows_sys::Win32::Foundation::{
        CloseHandle, FALSE, HANDLE, HWND, INVALID_HANDLE_VALUE, LPARAM, MAX_PATH, TRUE,
    };
    use windows_sys::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
        TH32CS_SNAPPROCESS,
    };
    use windows_sys::Win32::System::Threading::{
        CREATE_NO_WINDOW, OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
        QueryFullProcessImageNameW,
    };
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowThreadProcessId, SendMessageW, WM_CLOSE,
    };

    /// Closes a handle on drop.
    struct OwnedHandle(HANDLE);

    impl Drop for OwnedHandle {
        fn drop(&mut self) {
            // SAFETY: the handle was returned open by the system and is closed once.
            unsafe { CloseHandle(self.0) };
        }
    }

    fn from_wide(buf: &[u16]) -> String {
        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        OsString::from_wide(&buf[..len]).to_string_lossy().into_owned()
    }

    fn last_error(what: &str) -> Error {
        Error::process(format!("{}: {}", what, io::Error::last_os_error()))
    }

    fn find_pid(image: &str) -> Result<u32> {
        // SAFETY: plain call, the returned handle is checked below.
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) };
        if snapshot == INVALID_HANDLE_VALUE {
            return Err(last_error("process snapshot failed"));
        }
        let snapshot = OwnedHandle(snapshot);

        // SAFETY: PROCESSENTRY32W is plain data; all-zero is a valid value.
        let mut entry: PROCESSENTRY32W = unsafe { mem::zeroed() };
        entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

        // SAFETY: `entry` is a live, correctly sized out parameter.
        let mut more = unsafe { Process32FirstW(snapshot.0, &mut entry) };
        while more != FALSE {
            if from_wide(&entry.szExeFile).eq_ignore_ascii_case(image) {
                return Ok(entry.th32ProcessID);
            }
            // SAFETY: as above.
            more = unsafe { Process32NextW(snapshot.0, &mut entry) };
        }
        Err(Error::process(format!("not found: {}", image)))
    }

    struct WindowSearch {
        pid: u32,
        hwnd: HWND,
    }

    unsafe extern "system" fn match_window(hwnd: HWND, lparam: LPARAM) -> i32 {
        // SAFETY: `lparam` is the `WindowSearch` passed to EnumWindows, alive for the whole call.
        let search = unsafe { &mut *(lparam as *mut WindowSearch) };
        let mut pid = 0u32;
        // SAFETY: `hwnd` comes from EnumWindows and `pid` is a live out parameter.
        unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
        if pid == search.pid {
            search.hwnd = hwnd;
            return FALSE;
        }
        TRUE
    }

    /// Windows implementation over ToolHelp snapshots and window messages
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WindowsProcesses;

    impl ProcessControl for WindowsProcesses {
        fn image_path(&self, image: &str) -> Result<PathBuf> {
            let pid = find_pid(image)?;
            // SAFETY: plain call, the returned handle is checked below.
            let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) };
            if process.is_null() {
                return Err(last_error("open process failed"));
            }
            let process = OwnedHandle(process);

            let mut buf = [0u16; MAX_PATH as usize];
            let mut size = buf.len() as u32;
            // SAFETY: `buf` holds `size` u16s and `size` is a live in/out parameter.
            let ok = unsafe {
                QueryFullProcessImageNameW(process.0, PROCESS_NAME_WIN32, buf.as_mut_ptr(), &mut size)
            };
            if ok == FALSE {
                return Err(last_error("query process image failed"));
            }
            Ok(PathBuf::from(from_wide(&buf[..size as usize])))
        }

        fn request_close(&self, image: &str) -> Result<()> {
            let mut search = WindowSearch {
                pid: find_pid(image)?,
                hwnd: ptr::null_mut(),
            };
            // SAFETY: `search` outlives the enumeration; the callback only touches it
            // through `lparam`. A FALSE return only means the callback stopped early.
            unsafe { EnumWindows(Some(match_window), &mut search as *mut WindowSearch as LPARAM) };
            if search.hwnd.is_null() {
                return Err(Error::process(format!("no window found for process {}", image)));
            }
            // SAFETY: `hwnd` was just returned by EnumWindows.
            unsafe { SendMessageW(search.hwnd, WM_CLOSE, 0, 0) };
            Ok(())
        }

        fn launch_detached(&self, path: &Path) -> Result<()> {
            let status = Command::new("cmd")
                .args(["/C", "start", "", "/MAX"])
                .arg(path)
                .creation_flags(CREATE_NO_WINDOW)
                .status()
                .map_err(|e| Error::process(format!("cannot run cmd: {}", e)))?;
            if !status.success() {
                return Err(Error::process(format!(
                    "start {} exited with {}",
                    path.display(),
                    status
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records calls instead of touching real processes.
    #[derive(Default)]
    struct FakeProcesses {
        running: Option<PathBuf>,
        fail_close: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ProcessControl for FakeProcesses {
        fn image_path(&self, image: &str) -> Result<PathBuf> {
            self.calls.lock().push(format!("lookup {}", image));
            self.running
                .clone()
                .ok_or_else(|| Error::process(format!("not found: {}", image)))
        }

        fn request_close(&self, image: &str) -> Result<()> {
            self.calls.lock().push(format!("close {}", image));
            if self.fail_close {
                return Err(Error::process("no window"));
            }
            Ok(())
        }

        fn launch_detached(&self, path: &Path) -> Result<()> {
            self.calls.lock().push(format!("launch {}", path.display()));
            Ok(())
        }
    }

    #[test]
    fn test_restart_closes_then_launches_same_path() {
        let fake = FakeProcesses {
            running: Some(PathBuf::from("/opt/tc/TOTALCMD64.EXE")),
            ..Default::default()
        };
        let path = restart(&fake, "TOTALCMD64.EXE").unwrap();

        assert_eq!(path, PathBuf::from("/opt/tc/TOTALCMD64.EXE"));
        assert_eq!(
            *fake.calls.lock(),
            vec![
                "lookup TOTALCMD64.EXE",
                "close TOTALCMD64.EXE",
                "launch /opt/tc/TOTALCMD64.EXE"
            ]
        );
    }

    #[test]
    fn test_restart_stops_when_not_running() {
        let fake = FakeProcesses::default();
        assert!(restart(&fake, "TOTALCMD64.EXE").is_err());
        assert_eq!(fake.calls.lock().len(), 1);
    }

    #[test]
    fn test_restart_does_not_launch_when_close_fails() {
        let fake = FakeProcesses {
            running: Some(PathBuf::from("/opt/tc/TOTALCMD64.EXE")),
            fail_close: true,
            ..Default::default()
        };
        assert!(restart(&fake, "TOTALCMD64.EXE").is_err());
        assert!(!fake.calls.lock().iter().any(|c| c.starts_with("launch")));
    }

    #[test]
    fn test_unsupported_platform_reports_error() {
        let err = UnsupportedProcesses.image_path("TOTALCMD64.EXE").unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }
}
