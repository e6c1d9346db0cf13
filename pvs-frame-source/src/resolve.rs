use std::time::Duration;

use crate::callback::FrameDecoderFactory;
use crate::error::FrameSourceError;
use crate::source::BoxFrameSource;
use crate::test_pattern::TestPatternSource;
use pvs_crypto::{build_rtsp_url, CredentialCipher};
use pvs_types::{backoff_delay, Camera, SourceKind};

/// Process-wide knobs the fallback chain needs but that live outside the
/// `Camera` row: the credential cipher, the configured default demo video,
/// and the §4.1.3 RTSP backoff policy, all process configuration rather
/// than per-camera state.
pub struct SourceResolutionOptions<'a> {
    pub cipher: &'a CredentialCipher,
    pub default_demo_url: Option<&'a str>,
    pub decoder: &'a dyn FrameDecoderFactory,
    /// spec.md §4.1.3: attempts made against the RTSP candidate itself
    /// before cascading to the next fallback tier.
    pub rtsp_max_retries: u32,
    pub rtsp_base_delay: Duration,
    pub rtsp_max_delay: Duration,
}

/// One candidate source URL plus whether it is the RTSP candidate, which
/// alone gets the §4.1.3 backed-off retry loop before the chain moves on
/// (every other tier is a single, already-local fallback: a placeholder
/// file, the demo video, or the test pattern).
struct Candidate {
    url: String,
    rtsp: bool,
}

/// Tries each candidate in the §4.1.1 order, using the first that produces
/// at least one frame. Falls back to the always-available test-pattern
/// source, *except* when the RTSP candidate's credentials fail to decrypt:
/// spec.md §7 treats that as an unrecoverable-source error that must reach
/// the caller, not a reason to cascade past it.
pub async fn resolve_source(
    camera: &Camera,
    opts: &SourceResolutionOptions<'_>,
) -> Result<BoxFrameSource, FrameSourceError> {
    let candidates = candidate_urls(camera, opts.cipher, opts.default_demo_url)?;

    for candidate in candidates {
        let result = if candidate.rtsp {
            try_open_with_retries(
                opts.decoder,
                &candidate.url,
                opts.rtsp_max_retries,
                opts.rtsp_base_delay,
                opts.rtsp_max_delay,
            )
            .await
        } else {
            try_open(opts.decoder, &candidate.url).await
        };

        match result {
            Ok(source) => return Ok(source),
            Err(err) => {
                tracing::warn!(camera_id = %camera.id, url = %redact(&candidate.url), %err, "source candidate failed, trying next");
            }
        }
    }

    tracing::info!(camera_id = %camera.id, "falling back to test pattern source");
    let (w, h) = camera.clamped_inference_size(1920);
    Ok(Box::new(TestPatternSource::new(w.max(320), h.max(240))))
}

fn candidate_urls(
    camera: &Camera,
    cipher: &CredentialCipher,
    default_demo_url: Option<&str>,
) -> Result<Vec<Candidate>, FrameSourceError> {
    let mut urls = Vec::new();

    // 1. placeholder video, if requested.
    if camera.use_placeholder {
        if let Some(url) = &camera.placeholder_video {
            urls.push(Candidate { url: url.clone(), rtsp: false });
        }
    }

    // 2. rtsp, with decrypted credentials injected.
    if camera.source_kind == SourceKind::Rtsp {
        if let Some(base_url) = &camera.rtsp_url {
            match &camera.credentials_encrypted {
                Some(encrypted) => match cipher.decrypt_credentials(encrypted) {
                    Ok((user, pass)) => urls.push(Candidate {
                        url: build_rtsp_url(base_url, &user, &pass),
                        rtsp: true,
                    }),
                    Err(err) => {
                        // spec.md §7: "credential: treated as
                        // unrecoverable-source with a descriptive message"
                        // — surfaced to the caller, never silently skipped.
                        return Err(FrameSourceError::Credential(format!(
                            "failed to decrypt rtsp credentials: {err}"
                        )));
                    }
                },
                None => urls.push(Candidate { url: base_url.clone(), rtsp: true }),
            }
        }
    }

    // 3. file source kind, placeholder field reused as the file/URL.
    if camera.source_kind == SourceKind::File {
        if let Some(url) = &camera.placeholder_video {
            urls.push(Candidate { url: url.clone(), rtsp: false });
        }
    }

    // 4. configured default demo video.
    if let Some(url) = default_demo_url {
        urls.push(Candidate { url: url.to_string(), rtsp: false });
    }

    Ok(urls)
}

async fn try_open(
    decoder: &dyn FrameDecoderFactory,
    url: &str,
) -> Result<BoxFrameSource, FrameSourceError> {
    let mut source = decoder.open(url).await?;
    // "a connect is successful only after one frame is read" (§4.1.3);
    // validate the candidate the same way before accepting it.
    source.read_frame().await?;
    Ok(source)
}

/// The §4.1.3 retry loop for the RTSP candidate specifically: up to
/// `max_retries` attempts against the same URL, backed off by
/// `min(base * 2^attempt, max_delay)` between attempts, before the caller
/// cascades to the next fallback tier.
async fn try_open_with_retries(
    decoder: &dyn FrameDecoderFactory,
    url: &str,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
) -> Result<BoxFrameSource, FrameSourceError> {
    let attempts = max_retries.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match try_open(decoder, url).await {
            Ok(source) => return Ok(source),
            Err(err) => {
                tracing::warn!(url = %redact(url), attempt, %err, "rtsp candidate attempt failed");
                last_err = Some(err);
                if attempt + 1 < attempts {
                    tokio::time::sleep(backoff_delay(attempt, base_delay, max_delay)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| FrameSourceError::Unavailable(url.to_string())))
}

fn redact(url: &str) -> String {
    match url.split_once('@') {
        Some((_userinfo, rest)) => format!("***@{rest}"),
        None => url.to_string(),
    }
}
