//! GStreamer-based RTSP capture with a generic decodebin fallback

use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tracing::{debug, info, instrument, warn};

use crate::capture::frame::RawFrame;
use crate::capture::session::{Connector, FrameSource};
use crate::error::{RelayError, Result};
use crate::utils::redact_url;
use crate::{CaptureConfig, SourceConfig, VideoCodec};

/// Opens RTSP sessions through GStreamer, asking the pipeline for the
/// capture's target resolution and frame rate
pub struct GstConnector {
    width: u32,
    height: u32,
    fps: u32,
}

impl GstConnector {
    pub fn new(capture: &CaptureConfig) -> Result<Self> {
        gst::init()
            .map_err(|e| RelayError::Config(format!("Failed to initialize GStreamer: {}", e)))?;
        Ok(Self::with_target(capture))
    }

    fn with_target(capture: &CaptureConfig) -> Self {
        Self {
            width: capture.width,
            height: capture.height,
            fps: capture.fps.max(1),
        }
    }

    /// Rate-limit and scale to the target before handing frames to appsink.
    /// `videorate` only drops, so a slower camera keeps its own rate.
    fn output_stage(&self) -> String {
        format!(
            "videorate drop-only=true max-rate={} ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=RGB,width={},height={} ! \
             appsink name=appsink",
            self.fps, self.width, self.height
        )
    }

    /// Depayload, parse and decode the codec named by the hint
    fn primary_pipeline(&self, config: &SourceConfig) -> String {
        let (depay, parse, decode) = match config.codec {
            VideoCodec::H264 => ("rtph264depay", "h264parse", "avdec_h264"),
            VideoCodec::H265 => ("rtph265depay", "h265parse", "avdec_h265"),
        };

        format!(
            "rtspsrc location=\"{}\" latency={} ! \
             {} ! {} ! {} ! \
             queue max-size-buffers={} leaky=downstream ! \
             {}",
            config.url,
            config.latency_ms,
            depay,
            parse,
            decode,
            config.buffer_size,
            self.output_stage()
        )
    }

    /// Let decodebin work out the transport and codec
    fn fallback_pipeline(&self, config: &SourceConfig) -> String {
        format!(
            "uridecodebin uri=\"{}\" ! \
             queue max-size-buffers={} leaky=downstream ! \
             {}",
            config.url,
            config.buffer_size,
            self.output_stage()
        )
    }

    fn launch(pipeline_str: &str, config: &SourceConfig) -> Result<GstSource> {
        let open_error = |reason: String| RelayError::SessionOpen {
            url: redact_url(&config.url),
            reason,
        };

        let pipeline = gst::parse::launch(pipeline_str)
            .map_err(|e| open_error(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| open_error("Failed to create pipeline".into()))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| open_error("Failed to find appsink element".into()))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| open_error("Failed to cast to AppSink".into()))?;

        appsink.set_property("emit-signals", false);
        appsink.set_property("max-buffers", config.buffer_size.max(1));
        appsink.set_property("drop", true); // Drop old buffers if we can't keep up
        appsink.set_property("sync", false); // Don't sync to clock for lowest latency

        // From here on the source's Drop puts the pipeline back to Null
        let source = GstSource {
            pipeline,
            appsink,
            read_timeout: gst::ClockTime::from_mseconds(config.read_timeout_ms),
        };

        source
            .pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| open_error(format!("Failed to start pipeline: {:?}", e)))?;

        let (state_change, _, _) = source
            .pipeline
            .state(Some(gst::ClockTime::from_seconds(5)));

        match state_change {
            Ok(gst::StateChangeSuccess::Success) | Ok(gst::StateChangeSuccess::NoPreroll) => {
                Ok(source)
            }
            Ok(gst::StateChangeSuccess::Async) => {
                info!("Pipeline starting asynchronously");
                Ok(source)
            }
            Err(e) => Err(open_error(format!("Pipeline failed to reach PLAYING: {:?}", e))),
        }
    }
}

impl Connector for GstConnector {
    type Source = GstSource;

    #[instrument(skip_all, fields(url = %redact_url(&config.url)))]
    fn open(&mut self, config: &SourceConfig) -> Result<GstSource> {
        let primary = self.primary_pipeline(config);
        debug!("Primary pipeline: {}", redact_url(&primary));

        match Self::launch(&primary, config) {
            Ok(source) => {
                info!("Opened upstream with {:?} pipeline", config.codec);
                return Ok(source);
            }
            Err(e) => warn!("Primary pipeline failed ({}), falling back to decodebin", e),
        }

        let fallback = self.fallback_pipeline(config);
        debug!("Fallback pipeline: {}", redact_url(&fallback));
        let source = Self::launch(&fallback, config)?;
        info!("Opened upstream with fallback pipeline");
        Ok(source)
    }
}

/// A playing GStreamer pipeline ending in an RGB appsink
pub struct GstSource {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    read_timeout: gst::ClockTime,
}

impl FrameSource for GstSource {
    fn read_frame(&mut self) -> Result<RawFrame> {
        let sample = self.appsink.try_pull_sample(self.read_timeout).ok_or_else(|| {
            if self.appsink.is_eos() {
                RelayError::Read("Upstream reached end of stream".into())
            } else {
                RelayError::Read("Timed out waiting for a sample".into())
            }
        })?;

        let buffer = sample
            .buffer()
            .ok_or_else(|| RelayError::Read("Sample contains no buffer".into()))?;

        let caps = sample
            .caps()
            .ok_or_else(|| RelayError::Read("Sample has no caps".into()))?;

        let video_info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|_| RelayError::Read("Failed to parse video info from caps".into()))?;

        let map = buffer
            .map_readable()
            .map_err(|_| RelayError::Read("Failed to map buffer".into()))?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride().first().copied().unwrap_or_default().max(0) as usize;

        let data = pack_rows(map.as_slice(), width as usize * 3, stride, height as usize)
            .ok_or_else(|| {
                RelayError::MalformedFrame(format!(
                    "{}x{} buffer of {} bytes with stride {}",
                    width,
                    height,
                    map.size(),
                    stride
                ))
            })?;

        Ok(RawFrame::rgb24(width, height, data))
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop pipeline: {:?}", e);
        }
    }
}

/// Strip row padding so the frame is tightly packed
fn pack_rows(src: &[u8], row: usize, stride: usize, height: usize) -> Option<Bytes> {
    if stride == row || stride == 0 {
        return src.get(..row * height).map(Bytes::copy_from_slice);
    }
    if stride < row {
        return None;
    }

    let mut packed = Vec::with_capacity(row * height);
    for y in 0..height {
        let start = y * stride;
        packed.extend_from_slice(src.get(start..start + row)?);
    }
    Some(Bytes::from(packed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_pipeline_follows_codec_hint() {
        let config = SourceConfig {
            url: "rtsp://cam/stream".into(),
            codec: VideoCodec::H265,
            ..SourceConfig::default()
        };
        let connector = GstConnector::with_target(&CaptureConfig::default());
        let pipeline = connector.primary_pipeline(&config);
        assert!(pipeline.starts_with("rtspsrc location=\"rtsp://cam/stream\" latency=0"));
        assert!(pipeline.contains("rtph265depay ! h265parse ! avdec_h265"));
        assert!(pipeline.ends_with("appsink name=appsink"));
    }

    #[test]
    fn fallback_pipeline_uses_decodebin() {
        let connector = GstConnector::with_target(&CaptureConfig::default());
        let pipeline = connector.fallback_pipeline(&SourceConfig::default());
        assert!(pipeline.starts_with("uridecodebin uri="));
        assert!(pipeline.contains("video/x-raw,format=RGB"));
    }

    #[test]
    fn both_pipelines_request_target_rate_and_size() {
        let capture = CaptureConfig {
            width: 640,
            height: 360,
            fps: 15,
            ..CaptureConfig::default()
        };
        let connector = GstConnector::with_target(&capture);
        let source = SourceConfig::default();

        for pipeline in [
            connector.primary_pipeline(&source),
            connector.fallback_pipeline(&source),
        ] {
            assert!(pipeline.contains("videorate drop-only=true max-rate=15"), "{}", pipeline);
            assert!(pipeline.contains("video/x-raw,format=RGB,width=640,height=360"), "{}", pipeline);
        }
    }

    #[test]
    fn packs_padded_rows() {
        // 2x2 RGB with 2 bytes of padding per row
        let src = [1, 1, 1, 2, 2, 2, 0, 0, 3, 3, 3, 4, 4, 4, 0, 0];
        let packed = pack_rows(&src, 6, 8, 2).unwrap();
        assert_eq!(&packed[..], &[1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(pack_rows(&[0u8; 10], 6, 6, 2).is_none());
        assert!(pack_rows(&[0u8; 14], 6, 8, 2).is_none());
    }
}
