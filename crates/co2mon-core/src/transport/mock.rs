//! Mock device access for testing.

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::traits::{DeviceAccess, TransportError};

/// Scripted outcome of one mock operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Succeed (open, full-length feature report).
    Ok,
    /// Read returns these bytes.
    Data(Vec<u8>),
    /// Feature report accepted only partially.
    Short(usize),
    /// No report within the timeout.
    Timeout,
    /// Wait interrupted by a signal.
    Interrupted,
    /// Fail with this OS error code.
    Os(i32),
}

impl MockReply {
    fn into_error(self, timeout: Duration) -> TransportError {
        match self {
            MockReply::Timeout => TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            },
            MockReply::Interrupted => TransportError::Interrupted,
            MockReply::Os(code) => TransportError::Io(io::Error::from_raw_os_error(code)),
            other => TransportError::Io(io::Error::other(format!(
                "mock reply {other:?} not valid here"
            ))),
        }
    }
}

/// Operation recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open,
    SendFeatureReport(Vec<u8>),
    Read,
    Close(u32),
}

/// Handle issued by [`MockAccess`].
#[derive(Debug, PartialEq, Eq)]
pub struct MockHandle {
    id: u32,
}

impl MockHandle {
    pub fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, Default)]
struct MockState {
    present: bool,
    /// Present flag flips to false after this many more `exists` calls.
    vanish_after: Option<usize>,
    open_replies: VecDeque<MockReply>,
    arm_replies: VecDeque<MockReply>,
    read_replies: VecDeque<MockReply>,
    calls: Vec<MockCall>,
    next_id: u32,
    open_handles: Vec<u32>,
}

/// Mock device access for exercising the session state machine.
///
/// Clones share state, so a test can keep one clone for scripting and
/// inspection while the session owns another. Empty reply queues mean
/// success for open/arm and a timeout for reads.
#[derive(Debug, Clone, Default)]
pub struct MockAccess {
    state: Arc<Mutex<MockState>>,
}

impl MockAccess {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate the device node appearing or disappearing.
    pub fn set_present(&self, present: bool) {
        let mut s = self.lock();
        s.present = present;
        s.vanish_after = None;
    }

    /// Make the node disappear after `checks` more presence checks.
    pub fn vanish_after(&self, checks: usize) {
        self.lock().vanish_after = Some(checks);
    }

    pub fn queue_open(&self, reply: MockReply) {
        self.lock().open_replies.push_back(reply);
    }

    pub fn queue_arm(&self, reply: MockReply) {
        self.lock().arm_replies.push_back(reply);
    }

    pub fn queue_read(&self, reply: MockReply) {
        self.lock().read_replies.push_back(reply);
    }

    /// Queue a read returning `bytes`.
    pub fn queue_frame(&self, bytes: &[u8]) {
        self.queue_read(MockReply::Data(bytes.to_vec()));
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of feature reports sent.
    pub fn arm_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::SendFeatureReport(_)))
    }

    pub fn read_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Read))
    }

    pub fn close_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Close(_)))
    }

    /// Handles issued and not yet closed.
    pub fn open_handles(&self) -> Vec<u32> {
        self.lock().open_handles.clone()
    }

    fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

impl DeviceAccess for MockAccess {
    type Handle = MockHandle;

    fn exists(&self, _path: &Path) -> bool {
        let mut s = self.lock();
        if let Some(n) = s.vanish_after {
            if n == 0 {
                s.present = false;
                s.vanish_after = None;
            } else {
                s.vanish_after = Some(n - 1);
            }
        }
        s.present
    }

    fn open(&mut self, path: &Path) -> Result<MockHandle, TransportError> {
        let mut s = self.lock();
        s.calls.push(MockCall::Open);
        if !s.present {
            return Err(TransportError::NotFound {
                path: path.to_path_buf(),
            });
        }
        match s.open_replies.pop_front().unwrap_or(MockReply::Ok) {
            MockReply::Ok => {
                s.next_id += 1;
                let id = s.next_id;
                s.open_handles.push(id);
                Ok(MockHandle { id })
            }
            other => Err(other.into_error(Duration::ZERO)),
        }
    }

    fn send_feature_report(
        &mut self,
        _handle: &mut MockHandle,
        report: &[u8],
    ) -> Result<usize, TransportError> {
        let mut s = self.lock();
        s.calls.push(MockCall::SendFeatureReport(report.to_vec()));
        match s.arm_replies.pop_front().unwrap_or(MockReply::Ok) {
            MockReply::Ok => Ok(report.len()),
            MockReply::Short(n) => Ok(n),
            other => Err(other.into_error(Duration::ZERO)),
        }
    }

    fn read(
        &mut self,
        _handle: &mut MockHandle,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let mut s = self.lock();
        s.calls.push(MockCall::Read);
        match s.read_replies.pop_front().unwrap_or(MockReply::Timeout) {
            MockReply::Data(mut bytes) => {
                bytes.truncate(max_len);
                Ok(bytes)
            }
            other => Err(other.into_error(timeout)),
        }
    }

    fn close(&mut self, handle: MockHandle) {
        let mut s = self.lock();
        s.calls.push(MockCall::Close(handle.id));
        s.open_handles.retain(|id| *id != handle.id);
    }
}
