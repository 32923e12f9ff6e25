//! Linux hidraw device access.
//!
//! See <https://www.kernel.org/doc/Documentation/hid/hidraw.txt>.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace};

use super::traits::{DeviceAccess, TransportError};
use crate::shutdown::ShutdownToken;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const HIDRAW_IOCTL_TYPE: u8 = b'H';
const HIDIOC_NR_SET_FEATURE: u8 = 0x06;

/// Largest feature report we are willing to pass to the kernel.
const MAX_FEATURE_REPORT_BYTES: usize = 64;

/// Upper bound on a single `poll(2)` so shutdown is noticed promptly.
const POLL_SLICE: Duration = Duration::from_millis(250);

const fn iorw_len(kind: u8, nr: u8, len: usize) -> libc::c_ulong {
    (((IOC_READ | IOC_WRITE) << IOC_DIRSHIFT)
        | ((kind as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((len as u32) << IOC_SIZESHIFT)) as libc::c_ulong
}

fn hidiocsfeature(len: usize) -> libc::c_ulong {
    iorw_len(HIDRAW_IOCTL_TYPE, HIDIOC_NR_SET_FEATURE, len)
}

/// An open hidraw node.
#[derive(Debug)]
pub struct HidrawHandle {
    file: File,
    path: PathBuf,
}

impl HidrawHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// hidraw-backed device access.
///
/// Reads wait with `poll(2)` in short slices and give up with
/// [`TransportError::Interrupted`] once the shutdown token is cancelled.
#[derive(Debug, Clone, Default)]
pub struct HidrawAccess {
    shutdown: ShutdownToken,
}

impl HidrawAccess {
    pub fn new(shutdown: ShutdownToken) -> Self {
        Self { shutdown }
    }

    /// Wait until the node is readable. `Ok(false)` means the timeout expired.
    ///
    /// A timeout too large to represent never expires.
    fn wait_readable(&self, file: &File, timeout: Duration) -> Result<bool, TransportError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.shutdown.is_cancelled() {
                return Err(TransportError::Interrupted);
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => POLL_SLICE,
            };
            if remaining.is_zero() {
                return Ok(false);
            }

            let slice = remaining.min(POLL_SLICE);
            let mut pfd = libc::pollfd {
                fd: file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let rc = unsafe { libc::poll(&mut pfd, 1, slice.as_millis() as libc::c_int) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Err(TransportError::Interrupted);
                }
                return Err(err.into());
            }
            if rc > 0 {
                // POLLHUP/POLLERR also land here; the read reports the cause.
                trace!(revents = pfd.revents, "Node readable");
                return Ok(true);
            }
        }
    }
}

impl DeviceAccess for HidrawAccess {
    type Handle = HidrawHandle;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    fn open(&mut self, path: &Path) -> Result<HidrawHandle, TransportError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!("Device node opened");
        Ok(HidrawHandle {
            file,
            path: path.to_path_buf(),
        })
    }

    #[instrument(level = "debug", skip(self, handle, report), fields(len = report.len()))]
    fn send_feature_report(
        &mut self,
        handle: &mut HidrawHandle,
        report: &[u8],
    ) -> Result<usize, TransportError> {
        if report.len() > MAX_FEATURE_REPORT_BYTES {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("feature report too large for hidraw: {} bytes", report.len()),
            )));
        }

        let mut buf = [0u8; MAX_FEATURE_REPORT_BYTES];
        buf[..report.len()].copy_from_slice(report);

        let rc = unsafe {
            libc::ioctl(
                handle.file.as_raw_fd(),
                hidiocsfeature(report.len()),
                buf.as_mut_ptr(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }

        debug!(bytes_written = rc, "Feature report sent");
        Ok(rc as usize)
    }

    fn read(
        &mut self,
        handle: &mut HidrawHandle,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        if !self.wait_readable(&handle.file, timeout)? {
            return Err(TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        let mut buf = vec![0u8; max_len];
        let n = handle.file.read(&mut buf)?;
        buf.truncate(n);
        trace!(bytes_read = n, "Read complete");
        Ok(buf)
    }

    fn close(&mut self, handle: HidrawHandle) {
        debug!(path = %handle.path().display(), "Closing device node");
        drop(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_feature_ioctl_number() {
        // _IOC(_IOC_WRITE|_IOC_READ, 'H', 0x06, 9) from <linux/hidraw.h>
        assert_eq!(hidiocsfeature(9), 0xC009_4806);
        assert_eq!(hidiocsfeature(8), 0xC008_4806);
    }

    #[test]
    fn test_wait_readable_accepts_unbounded_timeout() {
        // Regular files always poll readable.
        let file = tempfile::tempfile().unwrap();
        let access = HidrawAccess::default();
        assert!(access.wait_readable(&file, Duration::MAX).unwrap());
        assert!(access.wait_readable(&file, Duration::from_secs(u64::MAX)).unwrap());
    }

    #[test]
    fn test_wait_readable_stops_on_shutdown() {
        let file = tempfile::tempfile().unwrap();
        let shutdown = ShutdownToken::new();
        shutdown.cancel();
        let access = HidrawAccess::new(shutdown);
        let err = access.wait_readable(&file, Duration::MAX).unwrap_err();
        assert!(matches!(err, TransportError::Interrupted));
    }

    #[test]
    fn test_missing_node() {
        let mut access = HidrawAccess::default();
        let path = Path::new("/nonexistent/co2mini-test-node");
        assert!(!access.exists(path));
        let err = access.open(path).unwrap_err();
        assert_eq!(err.class(), crate::transport::ErrorClass::DeviceRemoved);
    }
}
