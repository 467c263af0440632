//! Mock devices that count open handles and script serial traffic

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use eoir::capture::{PixelLayout, SourceDescriptor, VideoFrame, VideoSource, VideoStream};
use eoir::error::{DeviceError, SerialError};
use eoir::serial::{SerialChannel, SerialConnector};

/// Video source that records how many streams are open at once
#[derive(Clone, Default)]
pub struct CountingSource {
    pub open_handles: Arc<AtomicUsize>,
    pub max_open: Arc<AtomicUsize>,
    pub opens: Arc<AtomicUsize>,
    pub fail_open: Arc<AtomicBool>,
    /// Next pull on every open stream reports a disconnect
    pub disconnect: Arc<AtomicBool>,
    /// Produce frames whose buffer is too short for their size
    pub corrupt: Arc<AtomicBool>,
    pub pulled: Arc<AtomicU64>,
}

impl CountingSource {
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn pulled(&self) -> u64 {
        self.pulled.load(Ordering::SeqCst)
    }
}

impl VideoSource for CountingSource {
    type Stream = CountingStream;

    fn open(&self, descriptor: &SourceDescriptor) -> Result<CountingStream, DeviceError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(DeviceError::Unavailable {
                descriptor: descriptor.device.clone(),
                reason: "not connected".into(),
            });
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        let now = self.open_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);
        Ok(CountingStream {
            source: self.clone(),
            descriptor: descriptor.clone(),
            sequence: 0,
        })
    }
}

pub struct CountingStream {
    source: CountingSource,
    descriptor: SourceDescriptor,
    sequence: u64,
}

impl VideoStream for CountingStream {
    fn pull(&mut self, _timeout: Duration) -> Result<Option<VideoFrame>, DeviceError> {
        thread::sleep(Duration::from_millis(2));
        if self.source.disconnect.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected(self.descriptor.device.clone()));
        }
        self.sequence += 1;
        self.source.pulled.fetch_add(1, Ordering::SeqCst);

        let (w, h) = (self.descriptor.width, self.descriptor.height);
        let channels = match self.descriptor.layout {
            PixelLayout::Luma8 => 1,
            PixelLayout::Rgb8 => 3,
        };
        let mut len = (w * h) as usize * channels;
        if self.source.corrupt.load(Ordering::SeqCst) {
            len /= 2;
        }
        Ok(Some(VideoFrame::new(
            w,
            h,
            self.descriptor.layout,
            vec![128; len],
            self.sequence,
        )))
    }
}

impl Drop for CountingStream {
    fn drop(&mut self) {
        self.source.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

type Responder = Box<dyn Fn(&[u8]) -> Vec<u8> + Send>;

/// One simulated serial line
#[derive(Default)]
pub struct SerialLine {
    pub written: Mutex<Vec<Vec<u8>>>,
    pending: Mutex<VecDeque<u8>>,
    responder: Mutex<Option<Responder>>,
    pub open: AtomicUsize,
    pub fail_open: AtomicBool,
}

impl SerialLine {
    /// Bytes the device will send next
    pub fn feed(&self, bytes: &[u8]) {
        self.pending.lock().unwrap().extend(bytes.iter().copied());
    }

    /// Reply to every write with `f(written)`
    pub fn respond_with(&self, f: impl Fn(&[u8]) -> Vec<u8> + Send + 'static) {
        *self.responder.lock().unwrap() = Some(Box::new(f));
    }

    pub fn pending_is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Serial connector with one [`SerialLine`] per port name
#[derive(Clone, Default)]
pub struct ScriptedSerial {
    lines: Arc<Mutex<HashMap<String, Arc<SerialLine>>>>,
}

impl ScriptedSerial {
    pub fn line(&self, port: &str) -> Arc<SerialLine> {
        self.lines
            .lock()
            .unwrap()
            .entry(port.to_string())
            .or_default()
            .clone()
    }
}

impl SerialConnector for ScriptedSerial {
    type Channel = ScriptedChannel;

    fn open(&self, port: &str, _baud: u32) -> Result<ScriptedChannel, SerialError> {
        let line = self.line(port);
        if line.fail_open.load(Ordering::SeqCst) {
            return Err(SerialError::Unavailable {
                port: port.to_string(),
                reason: "no such device".into(),
            });
        }
        line.open.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedChannel { line })
    }
}

pub struct ScriptedChannel {
    line: Arc<SerialLine>,
}

impl SerialChannel for ScriptedChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.line.written.lock().unwrap().push(bytes.to_vec());
        let reply = self
            .line
            .responder
            .lock()
            .unwrap()
            .as_ref()
            .map(|f| f(bytes));
        if let Some(reply) = reply {
            self.line.feed(&reply);
        }
        Ok(())
    }

    fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes, SerialError> {
        let chunk: Vec<u8> = {
            let mut pending = self.line.pending.lock().unwrap();
            let n = pending.len().min(max);
            pending.drain(..n).collect()
        };
        if chunk.is_empty() {
            thread::sleep(timeout.min(Duration::from_millis(5)));
        }
        Ok(Bytes::from(chunk))
    }
}

impl Drop for ScriptedChannel {
    fn drop(&mut self) {
        self.line.open.fetch_sub(1, Ordering::SeqCst);
    }
}
