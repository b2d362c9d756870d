use ams_mp4::{build_init, build_mpd, build_segment, Error, JsonConfig};
use axum::{
    body::Body,
    http::{header, StatusCode, Uri},
    response::Response,
};
use log::info;
use std::path::{Path, PathBuf};

/// Dispatches every request of the origin:
///
/// - `…/{asset}.mpd`: manifest, composed from `…/{asset}.json`
/// - `…/{asset}.ism/dash/{asset}-{track}={bandwidth}.dash`: init segment
/// - `…/{asset}.ism/dash/{asset}-{track}={bandwidth}-{N}.m4s`: media segment
/// - anything else: static file passthrough
pub async fn handle_request(uri: Uri) -> Response {
    let path = uri.path().to_string();
    info!("[ REQUEST ] {path}");

    if let Some((asset_path, rest)) = path.split_once(".ism") {
        return handle_segment(asset_path, rest).await;
    }
    if let Some(asset_path) = path.strip_suffix(".mpd") {
        return handle_manifest(asset_path).await;
    }

    handle_static(&path).await
}

async fn handle_manifest(asset_path: &str) -> Response {
    let config = match load_config(asset_path).await {
        Ok(config) => config,
        Err(response) => return *response,
    };
    let asset_id = asset_id_of(asset_path);

    match build_mpd(&config, asset_id) {
        Ok(mpd) => ok_response("application/dash+xml", mpd.into_bytes()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn handle_segment(asset_path: &str, rest: &str) -> Response {
    let Some(filename) = rest.strip_prefix("/dash/").map(|r| r.rsplit('/').next().unwrap_or(r))
    else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "format is not supported");
    };

    let config = match load_config(asset_path).await {
        Ok(config) => config,
        Err(response) => return *response,
    };

    if let Some(stem) = filename.strip_suffix(".dash") {
        let Some(segment) = SegmentRef::parse(stem, false) else {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "format is not supported");
        };
        return match lookup(&config, &segment) {
            Ok(track_config) => {
                let result = tokio::task::spawn_blocking(move || build_init(&track_config)).await;
                match result {
                    Ok(Ok(bytes)) => ok_response("video/mp4", bytes),
                    Ok(Err(e)) => {
                        error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
                    }
                    Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
                }
            }
            Err(response) => *response,
        };
    }

    if let Some(stem) = filename.strip_suffix(".m4s") {
        let Some(segment) = SegmentRef::parse(stem, true) else {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "format is not supported");
        };
        let number = segment.number.unwrap_or(0);
        return match lookup_with_file(&config, &segment, asset_path) {
            Ok((track_config, src)) => {
                let duration = config.segment_duration;
                let result = tokio::task::spawn_blocking(move || {
                    build_segment(&track_config, &src, number, duration)
                })
                .await;
                match result {
                    Ok(Ok(bytes)) => ok_response("video/mp4", bytes),
                    Ok(Err(e)) => {
                        error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
                    }
                    Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
                }
            }
            Err(response) => *response,
        };
    }

    error_response(StatusCode::INTERNAL_SERVER_ERROR, "format is not supported")
}

async fn handle_static(path: &str) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => ok_response("application/octet-stream", bytes),
        Err(_) => error_response(StatusCode::NOT_FOUND, "file not found"),
    }
}

/// A `{asset}-{kind}_{lang}={bandwidth}[-{number}]` segment locator.
#[derive(Debug, PartialEq)]
struct SegmentRef {
    kind: &'static str,
    name: String,
    bandwidth: u64,
    number: Option<u32>,
}

impl SegmentRef {
    /// Parses the stem of a segment filename. Asset ids may contain dashes;
    /// the track name never does, so the name starts after the last dash
    /// before the `=`.
    fn parse(stem: &str, with_number: bool) -> Option<Self> {
        let eq = stem.rfind('=')?;
        let left = &stem[..eq];
        let right = &stem[eq + 1..];

        let name = left.rsplit('-').next()?.to_string();
        let kind = match name.split('_').next()? {
            "video" => "video",
            "audio" => "audio",
            _ => return None,
        };

        let (bandwidth, number) = if with_number {
            let (bw, n) = right.split_once('-')?;
            (bw.parse().ok()?, Some(n.parse().ok()?))
        } else {
            (right.parse().ok()?, None)
        };

        Some(Self {
            kind,
            name,
            bandwidth,
            number,
        })
    }
}

fn lookup(
    config: &JsonConfig,
    segment: &SegmentRef,
) -> Result<ams_mp4::DashConfig, Box<Response>> {
    let track = config
        .find_track(segment.kind, &segment.name, segment.bandwidth)
        .ok_or_else(|| unknown_track(segment))?;
    track
        .config
        .clone()
        .ok_or_else(|| unknown_track(segment))
}

fn lookup_with_file(
    config: &JsonConfig,
    segment: &SegmentRef,
    asset_path: &str,
) -> Result<(ams_mp4::DashConfig, PathBuf), Box<Response>> {
    let track = config
        .find_track(segment.kind, &segment.name, segment.bandwidth)
        .ok_or_else(|| unknown_track(segment))?;
    let track_config = track.config.clone().ok_or_else(|| unknown_track(segment))?;

    // Source files are recorded relative to the index's directory.
    let dir = Path::new(asset_path).parent().unwrap_or(Path::new("/"));
    Ok((track_config, dir.join(&track.file)))
}

fn unknown_track(segment: &SegmentRef) -> Box<Response> {
    let e = Error::UnknownTrack {
        name: segment.name.clone(),
        bandwidth: segment.bandwidth,
    };
    Box::new(error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &e.to_string(),
    ))
}

async fn load_config(asset_path: &str) -> Result<JsonConfig, Box<Response>> {
    let index_path = format!("{asset_path}.json");
    let data = tokio::fs::read(&index_path).await.map_err(|e| {
        Box::new(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("cannot open asset index {index_path}: {e}"),
        ))
    })?;
    serde_json::from_slice(&data).map_err(|e| {
        Box::new(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("cannot parse asset index {index_path}: {e}"),
        ))
    })
}

fn asset_id_of(asset_path: &str) -> &str {
    asset_path.rsplit('/').next().unwrap_or(asset_path)
}

fn ok_response(content_type: &str, bytes: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .unwrap()
}

fn error_response(status: StatusCode, reason: &str) -> Response {
    let body = format!("{{ \"status\": \"ERROR\", \"reason\": \"{reason}\" }}");
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_init_segment_names() {
        let segment = SegmentRef::parse("bbb-video_eng=1500000", false).unwrap();
        assert_eq!(segment.kind, "video");
        assert_eq!(segment.name, "video_eng");
        assert_eq!(segment.bandwidth, 1500000);
        assert_eq!(segment.number, None);
    }

    #[test]
    fn parses_media_segment_names() {
        let segment = SegmentRef::parse("bbb-audio_fra=128000-42", true).unwrap();
        assert_eq!(segment.kind, "audio");
        assert_eq!(segment.name, "audio_fra");
        assert_eq!(segment.bandwidth, 128000);
        assert_eq!(segment.number, Some(42));
    }

    #[test]
    fn asset_ids_may_contain_dashes() {
        let segment = SegmentRef::parse("big-buck-bunny-video_eng=900000-3", true).unwrap();
        assert_eq!(segment.name, "video_eng");
        assert_eq!(segment.bandwidth, 900000);
        assert_eq!(segment.number, Some(3));
    }

    #[test]
    fn rejects_subtitle_and_malformed_names() {
        assert_eq!(SegmentRef::parse("bbb-caption_eng=256", false), None);
        assert_eq!(SegmentRef::parse("bbb-video_eng", false), None);
        assert_eq!(SegmentRef::parse("bbb-video_eng=abc", false), None);
        assert_eq!(SegmentRef::parse("bbb-video_eng=1500000", true), None);
    }
}
