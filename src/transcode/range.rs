use thiserror::Error;

/// How a transcode response maps onto the estimated output length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPlan {
    /// Estimated length of the full transcode, in bytes.
    pub total_bytes: u64,
    /// First byte the client asked for.
    pub offset: u64,
    /// Input seek position matching `offset`.
    pub start_secs: u64,
    /// Answer with 206 rather than 200.
    pub partial: bool,
}

impl StreamPlan {
    pub fn content_length(&self) -> u64 {
        self.total_bytes - self.offset
    }

    pub fn content_range(&self) -> Option<String> {
        self.partial.then(|| {
            format!(
                "bytes {}-{}/{}",
                self.offset,
                self.total_bytes.saturating_sub(1),
                self.total_bytes
            )
        })
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("range starting at byte {offset} is beyond the estimated {total_bytes} bytes")]
pub struct RangeNotSatisfiable {
    pub offset: u64,
    pub total_bytes: u64,
}

impl RangeNotSatisfiable {
    pub fn content_range(&self) -> String {
        format!("bytes */{}", self.total_bytes)
    }
}

pub fn estimated_bytes(duration_secs: f64, bitrate_bps: u64) -> u64 {
    (bitrate_bps as f64 / 8.0 * duration_secs.max(0.0)).round() as u64
}

/// First byte of a `Range: bytes=N-` or `bytes=N-M` header. Suffix and
/// multi-range forms are not honored and read as a full request.
pub fn parse_range_start(header: &str) -> Option<u64> {
    let spec = header.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start, _) = spec.split_once('-')?;
    start.trim().parse().ok()
}

pub fn plan_stream(
    duration_secs: f64,
    bitrate_bps: u64,
    offset: Option<u64>,
) -> Result<StreamPlan, RangeNotSatisfiable> {
    let total_bytes = estimated_bytes(duration_secs, bitrate_bps);
    let offset = offset.unwrap_or(0);

    if offset == 0 {
        return Ok(StreamPlan {
            total_bytes,
            offset: 0,
            start_secs: 0,
            partial: false,
        });
    }

    if offset >= total_bytes {
        return Err(RangeNotSatisfiable {
            offset,
            total_bytes,
        });
    }

    let start_secs = (offset as f64 / total_bytes as f64 * duration_secs).round() as u64;
    Ok(StreamPlan {
        total_bytes,
        offset,
        start_secs,
        partial: true,
    })
}
