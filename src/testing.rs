//! Test doubles shared by unit tests across the crate

use crate::camera::{FrameSource, SourceOpener};
use crate::detector::{BackgroundModel, Contour, ContourExtractor};
use crate::error::{CameraError, MessengerError, Result, StorageError};
use crate::events::MotionEvent;
use crate::frame::FrameData;
use crate::messenger::{InboundUpdate, Messenger};
use crate::pipeline::{JpegSnapshotEncoder, SnapshotEncoder};

use async_trait::async_trait;
use image::{GrayImage, Luma, Rgb, RgbImage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub const FRAME_WIDTH: u32 = 160;
pub const FRAME_HEIGHT: u32 = 120;

/// Black frame with a centred white square of side `size`
pub fn block_frame(id: u64, width: u32, height: u32, size: u32) -> FrameData {
    let mut image = GrayImage::new(width, height);
    let x0 = (width - size) / 2;
    let y0 = (height - size) / 2;
    for y in y0..y0 + size {
        for x in x0..x0 + size {
            image.put_pixel(x, y, Luma([255]));
        }
    }
    FrameData::from_gray(id, SystemTime::now(), image)
}

/// Frame with an 80x80 bright block
pub fn motion_frame(id: u64) -> FrameData {
    block_frame(id, FRAME_WIDTH, FRAME_HEIGHT, 80)
}

/// All-black frame
pub fn still_frame(id: u64) -> FrameData {
    FrameData::from_gray(id, SystemTime::now(), GrayImage::new(FRAME_WIDTH, FRAME_HEIGHT))
}

/// Event whose image width identifies it
pub fn event_with_width(width: u32) -> MotionEvent {
    MotionEvent::new(width as u64, RgbImage::from_pixel(width, 4, Rgb([120, 60, 30])), 5000.0)
}

/// Treats every frame as pure foreground
pub struct IdentityModel;

impl BackgroundModel for IdentityModel {
    fn apply(&mut self, frame: &GrayImage) -> GrayImage {
        frame.clone()
    }
}

/// Reports the same contour areas for every mask
pub struct FixedAreas {
    areas: Vec<f64>,
}

impl FixedAreas {
    pub fn new(areas: Vec<f64>) -> Self {
        Self { areas }
    }
}

impl ContourExtractor for FixedAreas {
    fn extract(&self, _mask: &GrayImage) -> Vec<Contour> {
        self.areas.iter().copied().map(Contour::with_area).collect()
    }
}

/// JPEG encoder that refuses images of one width
pub struct FailOnWidth {
    width: u32,
    inner: JpegSnapshotEncoder,
}

impl FailOnWidth {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            inner: JpegSnapshotEncoder::new(75),
        }
    }
}

impl SnapshotEncoder for FailOnWidth {
    fn encode(&self, image: &RgbImage) -> std::result::Result<Vec<u8>, StorageError> {
        if image.width() == self.width {
            return Err(StorageError::Encode {
                details: format!("refusing width {}", self.width),
            });
        }
        self.inner.encode(image)
    }
}

/// What a scripted source does after its frames run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEnd {
    EndOfStream,
    ReadError,
    /// Never returns another frame
    Hang,
}

pub struct ScriptedSource {
    frames: VecDeque<FrameData>,
    end: ScriptEnd,
    frame_delay: Duration,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn read(&mut self) -> Result<Option<FrameData>> {
        if !self.frame_delay.is_zero() {
            tokio::time::sleep(self.frame_delay).await;
        }

        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }

        match self.end {
            ScriptEnd::EndOfStream => Ok(None),
            ScriptEnd::ReadError => Err(CameraError::Read {
                details: "scripted failure".to_string(),
            }
            .into()),
            ScriptEnd::Hang => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("scripted source ({} frames left)", self.frames.len())
    }
}

/// Hands out one scripted source, or fails to open
pub struct ScriptedOpener {
    source: Mutex<Option<ScriptedSource>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedOpener {
    pub fn new(frames: Vec<FrameData>, end: ScriptEnd) -> Self {
        Self::with_delay(frames, end, Duration::ZERO)
    }

    pub fn with_delay(frames: Vec<FrameData>, end: ScriptEnd, frame_delay: Duration) -> Self {
        let closed = Arc::new(AtomicBool::new(false));
        Self {
            source: Mutex::new(Some(ScriptedSource {
                frames: frames.into(),
                end,
                frame_delay,
                closed: Arc::clone(&closed),
            })),
            closed,
        }
    }

    pub fn failing() -> Self {
        Self {
            source: Mutex::new(None),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn source_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceOpener for ScriptedOpener {
    async fn open(&self) -> Result<Box<dyn FrameSource>> {
        let source = self.source.lock().take();
        match source {
            Some(source) => Ok(Box::new(source)),
            None => Err(CameraError::DeviceOpen {
                device: 0,
                details: "scripted open failure".to_string(),
            }
            .into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPhoto {
    pub chat_id: i64,
    pub bytes: Vec<u8>,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMenu {
    pub chat_id: i64,
    pub text: String,
    pub options: Vec<String>,
}

/// In-memory messenger that records traffic and replays scripted polls
#[derive(Default)]
pub struct MockMessenger {
    photos: Mutex<Vec<SentPhoto>>,
    menus: Mutex<Vec<SentMenu>>,
    polls: Mutex<VecDeque<std::result::Result<Vec<InboundUpdate>, String>>>,
    offsets: Mutex<Vec<i64>>,
    fail_photos: AtomicBool,
    fail_menus: AtomicBool,
    fail_verify: AtomicBool,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_updates(&self, updates: Vec<InboundUpdate>) {
        self.polls.lock().push_back(Ok(updates));
    }

    pub fn push_poll_error(&self, description: &str) {
        self.polls.lock().push_back(Err(description.to_string()));
    }

    pub fn fail_photos(&self, fail: bool) {
        self.fail_photos.store(fail, Ordering::SeqCst);
    }

    pub fn fail_menus(&self, fail: bool) {
        self.fail_menus.store(fail, Ordering::SeqCst);
    }

    pub fn fail_verify(&self, fail: bool) {
        self.fail_verify.store(fail, Ordering::SeqCst);
    }

    pub fn photos(&self) -> Vec<SentPhoto> {
        self.photos.lock().clone()
    }

    pub fn menus(&self) -> Vec<SentMenu> {
        self.menus.lock().clone()
    }

    pub fn polled_offsets(&self) -> Vec<i64> {
        self.offsets.lock().clone()
    }

    fn api_error(method: &str, description: &str) -> MessengerError {
        MessengerError::Api {
            method: method.to_string(),
            description: description.to_string(),
        }
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn verify(&self) -> std::result::Result<String, MessengerError> {
        if self.fail_verify.load(Ordering::SeqCst) {
            return Err(Self::api_error("getMe", "Unauthorized"));
        }
        Ok("mock_bot".to_string())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: Vec<u8>,
        file_name: &str,
    ) -> std::result::Result<(), MessengerError> {
        if self.fail_photos.load(Ordering::SeqCst) {
            return Err(Self::api_error("sendPhoto", "Bad Request"));
        }
        self.photos.lock().push(SentPhoto {
            chat_id,
            bytes: photo,
            file_name: file_name.to_string(),
        });
        Ok(())
    }

    async fn poll_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> std::result::Result<Vec<InboundUpdate>, MessengerError> {
        self.offsets.lock().push(offset);

        let next = self.polls.lock().pop_front();
        match next {
            Some(Ok(updates)) => Ok(updates),
            Some(Err(description)) => Err(Self::api_error("getUpdates", &description)),
            None => {
                // Behave like an empty long poll, but quickly
                tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_menu(
        &self,
        chat_id: i64,
        text: &str,
        options: &[&str],
    ) -> std::result::Result<(), MessengerError> {
        if self.fail_menus.load(Ordering::SeqCst) {
            return Err(Self::api_error("sendMessage", "Forbidden"));
        }
        self.menus.lock().push(SentMenu {
            chat_id,
            text: text.to_string(),
            options: options.iter().map(|option| option.to_string()).collect(),
        });
        Ok(())
    }
}
