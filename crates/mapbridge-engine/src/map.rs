// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Map instances.
//!
//! A map owns its style, camera and debug state. URL styles are fetched on a
//! background worker through the map's [`FileSource`]; the response is picked
//! up the next time the map is queried ([`Map::is_fully_loaded`]) or rendered.

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::style::ParsedStyle;
use crate::{
    CameraOptions, EngineError, FileSource, MapDebugOptions, MapMode, Resource, ResourceOptions,
    RunLoop, Size, Style, LOG_TARGET,
};

/// Receives map lifecycle notifications.
pub trait MapObserver {
    /// A style finished loading.
    fn on_did_finish_loading_style(&self) {}
    /// Loading a style failed.
    fn on_did_fail_loading_map(&self, _error: &EngineError) {}
    /// A frame was rendered.
    fn on_did_finish_rendering_frame(&self) {}
}

/// Observer that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl MapObserver for NullObserver {}

/// Construction parameters for a [`Map`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapOptions {
    /// Logical size.
    pub size: Size,
    /// Device pixels per logical pixel.
    pub pixel_ratio: f32,
    /// Scheduling mode.
    pub mode: MapMode,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            size: Size::new(512, 512),
            pixel_ratio: 1.0,
            mode: MapMode::Static,
        }
    }
}

impl MapOptions {
    /// Sets the size.
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    /// Sets the pixel ratio.
    pub fn with_pixel_ratio(mut self, pixel_ratio: f32) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    /// Sets the mode.
    pub fn with_mode(mut self, mode: MapMode) -> Self {
        self.mode = mode;
        self
    }
}

type FetchResult = Result<Vec<u8>, EngineError>;

struct PendingStyle {
    url: String,
    rx: Receiver<FetchResult>,
}

/// One map instance.
pub struct Map {
    options: MapOptions,
    resources: ResourceOptions,
    file_source: Arc<dyn FileSource>,
    observer: Box<dyn MapObserver>,
    style: Style,
    camera: CameraOptions,
    debug: MapDebugOptions,
    pending: Option<PendingStyle>,
    load_error: Option<EngineError>,
}

impl Map {
    /// Creates a map. Requires a run loop on the calling thread.
    pub fn new(
        observer: Box<dyn MapObserver>,
        options: MapOptions,
        resources: ResourceOptions,
    ) -> Result<Self, EngineError> {
        RunLoop::require()?;
        let file_source = resources.file_source();
        debug!(target: LOG_TARGET, ?options, ?resources, "map created");
        Ok(Self {
            options,
            resources,
            file_source,
            observer,
            style: Style::default(),
            camera: CameraOptions::default(),
            debug: MapDebugOptions::NO_DEBUG,
            pending: None,
            load_error: None,
        })
    }

    /// Parses `json` as the active style.
    ///
    /// On failure the previous style, if any, stays active.
    pub fn load_style_json(&mut self, json: &str) -> Result<(), EngineError> {
        RunLoop::require()?;
        self.pending = None;
        match ParsedStyle::parse(json) {
            Ok(parsed) => {
                self.style.replace(parsed, None);
                self.load_error = None;
                self.observer.on_did_finish_loading_style();
                Ok(())
            }
            Err(err) => {
                self.observer.on_did_fail_loading_map(&err);
                Err(err)
            }
        }
    }

    /// Starts fetching the style at `url` and returns without waiting.
    pub fn load_style_url(&mut self, url: &str) -> Result<(), EngineError> {
        RunLoop::require()?;
        let resource = Resource::style(self.resources.resolve_url(url));
        let source = Arc::clone(&self.file_source);
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("mapbridge-fetch".into())
            .spawn(move || {
                // Receiver may be gone if the map was dropped or reloaded.
                let _ = tx.send(source.request(&resource));
            })
            .map_err(|err| EngineError::Worker(err.to_string()))?;
        debug!(target: LOG_TARGET, url, "style fetch started");
        self.pending = Some(PendingStyle {
            url: url.to_owned(),
            rx,
        });
        self.load_error = None;
        Ok(())
    }

    /// True once a style is active and no fetch or load error is outstanding.
    pub fn is_fully_loaded(&mut self) -> bool {
        self.poll_pending();
        self.pending.is_none() && self.load_error.is_none() && self.style.is_loaded()
    }

    /// Moves the camera; unset fields keep their current value.
    pub fn jump_to(&mut self, camera: &CameraOptions) {
        self.camera.merge(camera);
    }

    /// Current camera; fields never set are `None`.
    pub fn camera_options(&self) -> CameraOptions {
        self.camera
    }

    /// Resizes the map.
    pub fn set_size(&mut self, size: Size) {
        self.options.size = size;
    }

    /// Current logical size.
    pub fn size(&self) -> Size {
        self.options.size
    }

    /// Replaces the debug flags.
    pub fn set_debug(&mut self, debug: MapDebugOptions) {
        self.debug = debug;
    }

    /// Current debug flags.
    pub fn debug(&self) -> MapDebugOptions {
        self.debug
    }

    /// Scheduling mode.
    pub fn mode(&self) -> MapMode {
        self.options.mode
    }

    /// Pixel ratio the map was created with.
    pub fn pixel_ratio(&self) -> f32 {
        self.options.pixel_ratio
    }

    /// Active style.
    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Active style, mutably (image registration).
    pub fn style_mut(&mut self) -> &mut Style {
        &mut self.style
    }

    pub(crate) fn notify_frame(&self) {
        self.observer.on_did_finish_rendering_frame();
    }

    /// Blocks until any outstanding style fetch resolves, then reports whether
    /// a style is available for rendering.
    pub(crate) fn settle(&mut self) -> Result<(), EngineError> {
        if let Some(pending) = self.pending.take() {
            let timeout = self.resources.fetch_timeout();
            match pending.rx.recv_timeout(timeout) {
                Ok(result) => self.finish_fetch(&pending.url, result),
                Err(RecvTimeoutError::Timeout) => {
                    let err = EngineError::FetchPending(pending.url.clone());
                    warn!(target: LOG_TARGET, error = %err, "render gave up waiting for style");
                    // Keep waiting on the same fetch next time.
                    self.pending = Some(pending);
                    return Err(err);
                }
                Err(RecvTimeoutError::Disconnected) => self.fail_load(EngineError::Worker(
                    format!("fetch worker for {} exited without a response", pending.url),
                )),
            }
        }
        if let Some(err) = &self.load_error {
            return Err(err.clone());
        }
        if self.style.is_loaded() {
            Ok(())
        } else {
            Err(EngineError::StyleNotLoaded)
        }
    }

    fn poll_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match pending.rx.try_recv() {
            Ok(result) => self.finish_fetch(&pending.url, result),
            Err(TryRecvError::Empty) => self.pending = Some(pending),
            Err(TryRecvError::Disconnected) => self.fail_load(EngineError::Worker(format!(
                "fetch worker for {} exited without a response",
                pending.url
            ))),
        }
    }

    fn finish_fetch(&mut self, url: &str, result: FetchResult) {
        let parsed = result.and_then(|bytes| {
            let text = String::from_utf8(bytes).map_err(|err| {
                EngineError::StyleParse(format!("style at {url} is not UTF-8: {err}"))
            })?;
            ParsedStyle::parse(&text)
        });
        match parsed {
            Ok(parsed) => {
                self.style.replace(parsed, Some(url.to_owned()));
                self.load_error = None;
                debug!(target: LOG_TARGET, url, "style fetch finished");
                self.observer.on_did_finish_loading_style();
            }
            Err(err) => self.fail_load(err),
        }
    }

    fn fail_load(&mut self, err: EngineError) {
        warn!(target: LOG_TARGET, error = %err, "style load failed");
        self.observer.on_did_fail_loading_map(&err);
        self.load_error = Some(err);
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("options", &self.options)
            .field("camera", &self.camera)
            .field("debug", &self.debug)
            .field("style_loaded", &self.style.is_loaded())
            .field("pending", &self.pending.as_ref().map(|p| p.url.as_str()))
            .field("load_error", &self.load_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::Mutex;

    struct Fixed(Mutex<Vec<String>>, FetchResult);

    impl FileSource for Fixed {
        fn request(&self, resource: &Resource) -> FetchResult {
            self.0.lock().unwrap().push(resource.url.clone());
            self.1.clone()
        }
    }

    fn with_run_loop(f: impl FnOnce() + Send + 'static) {
        std::thread::spawn(move || {
            let _run_loop = RunLoop::new().unwrap();
            f();
        })
        .join()
        .unwrap();
    }

    fn map_with(source: Arc<dyn FileSource>) -> Map {
        let resources = ResourceOptions::default()
            .with_api_key("k")
            .with_file_source(source);
        Map::new(Box::new(NullObserver), MapOptions::default(), resources).unwrap()
    }

    #[test]
    fn map_requires_run_loop() {
        std::thread::spawn(|| {
            let err = Map::new(
                Box::new(NullObserver),
                MapOptions::default(),
                ResourceOptions::default(),
            )
            .unwrap_err();
            assert_eq!(err, EngineError::NoRunLoop);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn failed_json_load_keeps_previous_style() {
        with_run_loop(|| {
            let mut map = map_with(Arc::new(LocalFileSourceStub));
            map.load_style_json(r#"{"version":8,"name":"first","layers":[]}"#)
                .unwrap();
            assert!(map.load_style_json("{").is_err());
            assert_eq!(map.style().name(), Some("first"));
            assert!(map.is_fully_loaded());
        });
    }

    #[test]
    fn url_style_resolves_through_file_source() {
        with_run_loop(|| {
            let source = Arc::new(Fixed(
                Mutex::new(Vec::new()),
                Ok(br#"{"version":8,"name":"remote","layers":[]}"#.to_vec()),
            ));
            let mut map = map_with(Arc::clone(&source) as Arc<dyn FileSource>);
            map.load_style_url("https://example.test/s.json?key={key}")
                .unwrap();
            map.settle().unwrap();
            assert!(map.is_fully_loaded());
            assert_eq!(map.style().name(), Some("remote"));
            assert_eq!(map.style().url(), Some("https://example.test/s.json?key={key}"));
            assert_eq!(
                source.0.lock().unwrap().as_slice(),
                ["https://example.test/s.json?key=k".to_owned()]
            );
        });
    }

    #[test]
    fn url_fetch_failure_is_sticky_until_next_load() {
        with_run_loop(|| {
            let source = Arc::new(Fixed(
                Mutex::new(Vec::new()),
                Err(EngineError::Timeout("slow".into())),
            ));
            let mut map = map_with(source);
            map.load_style_url("slow").unwrap();
            assert_eq!(map.settle(), Err(EngineError::Timeout("slow".into())));
            assert!(!map.is_fully_loaded());
            map.load_style_json(r#"{"layers":[]}"#).unwrap();
            assert!(map.is_fully_loaded());
        });
    }

    #[test]
    fn jump_to_merges_fields() {
        with_run_loop(|| {
            let mut map = map_with(Arc::new(LocalFileSourceStub));
            assert_eq!(map.camera_options(), CameraOptions::default());
            map.jump_to(&CameraOptions::default().with_zoom(4.0));
            map.jump_to(&CameraOptions::default().with_pitch(10.0));
            assert_eq!(map.camera_options().zoom, Some(4.0));
            assert_eq!(map.camera_options().pitch, Some(10.0));
            assert_eq!(map.camera_options().center, None);
        });
    }

    struct LocalFileSourceStub;

    impl FileSource for LocalFileSourceStub {
        fn request(&self, resource: &Resource) -> FetchResult {
            Err(EngineError::NotFound(resource.url.clone()))
        }
    }
}
