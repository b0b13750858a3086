use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::timedtext::parse_timedtext;
use super::{CaptionError, CaptionSegment, CaptionSource, TranscriptTrack};

/// Public YouTube origin
pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid api key regex")
});

static CONSENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="v" value="(.*?)""#).expect("valid consent regex"));

/// Captions provider backed by the YouTube watch page and player API
pub struct YoutubeCaptions {
    client: Client,
    base_url: String,
}

impl YoutubeCaptions {
    /// Create a provider talking to `base_url` (normally [`DEFAULT_BASE_URL`])
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the watch page, accepting the EU consent interstitial once if shown
    async fn fetch_watch_page(&self, video_id: &str) -> Result<String, CaptionError> {
        let url = format!("{}/watch?v={}", self.base_url, urlencoding::encode(video_id));

        let html = self.get_watch_html(&url, None).await?;
        if !html.contains("action=\"https://consent.youtube.com/s\"") {
            return Ok(html);
        }

        let consent = CONSENT_RE
            .captures(&html)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| CaptionError::Malformed("consent form without a value".to_string()))?;

        tracing::debug!(video_id, "Accepting consent interstitial");
        let cookie = format!("CONSENT=YES+{consent}");
        let html = self.get_watch_html(&url, Some(cookie.as_str())).await?;
        if html.contains("action=\"https://consent.youtube.com/s\"") {
            return Err(CaptionError::Request("consent cookie was not accepted".to_string()));
        }

        Ok(html)
    }

    async fn get_watch_html(&self, url: &str, cookie: Option<&str>) -> Result<String, CaptionError> {
        let mut request = self.client.get(url).header(header::ACCEPT_LANGUAGE, "en-US");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await.map_err(request_error)?;
        let html = check_status(response)?.text().await.map_err(request_error)?;

        if html.contains("class=\"g-recaptcha\"") {
            return Err(CaptionError::RateLimited("captcha challenge on watch page".to_string()));
        }

        Ok(html)
    }

    async fn fetch_player(&self, video_id: &str, api_key: &str) -> Result<PlayerResponse, CaptionError> {
        let url = format!("{}/youtubei/v1/player?key={}", self.base_url, urlencoding::encode(api_key));
        let body = json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": video_id,
        });

        let response = self.client.post(&url).json(&body).send().await.map_err(request_error)?;
        check_status(response)?
            .json::<PlayerResponse>()
            .await
            .map_err(|err| CaptionError::Malformed(format!("player response: {err}")))
    }
}

#[async_trait]
impl CaptionSource for YoutubeCaptions {
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<Box<dyn TranscriptTrack>>, CaptionError> {
        tracing::debug!(video_id, "Listing caption tracks");

        let html = self.fetch_watch_page(video_id).await?;
        let api_key = API_KEY_RE
            .captures(&html)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| CaptionError::Malformed("INNERTUBE_API_KEY not found on watch page".to_string()))?;

        let player = self.fetch_player(video_id, &api_key).await?;
        player_tracks(&self.client, player)
    }
}

/// Turn a player response into tracks, mapping playability problems to errors
fn player_tracks(client: &Client, player: PlayerResponse) -> Result<Vec<Box<dyn TranscriptTrack>>, CaptionError> {
    let playability = player.playability_status.unwrap_or_default();
    if playability.status != "OK" {
        let reason = playability.reason.unwrap_or_else(|| playability.status.clone());
        if reason.to_lowercase().contains("not a bot") {
            return Err(CaptionError::RateLimited(reason));
        }
        return Err(CaptionError::VideoUnavailable(reason));
    }

    let renderer = player
        .captions
        .and_then(|captions| captions.player_captions_tracklist_renderer)
        .ok_or(CaptionError::TranscriptsDisabled)?;

    if renderer.caption_tracks.is_empty() {
        return Err(CaptionError::TranscriptsDisabled);
    }

    let translation_languages: Arc<Vec<String>> = Arc::new(
        renderer
            .translation_languages
            .into_iter()
            .map(|language| language.language_code)
            .collect(),
    );

    Ok(renderer
        .caption_tracks
        .into_iter()
        .map(|track| {
            Box::new(YoutubeTrack {
                client: client.clone(),
                url: track.base_url.replace("&fmt=srv3", ""),
                language_code: track.language_code,
                manual: track.kind.as_deref() != Some("asr"),
                translatable: track.is_translatable,
                translation_languages: translation_languages.clone(),
            }) as Box<dyn TranscriptTrack>
        })
        .collect())
}

/// One caption track as exposed by the player API
pub struct YoutubeTrack {
    client: Client,
    url: String,
    language_code: String,
    manual: bool,
    translatable: bool,
    translation_languages: Arc<Vec<String>>,
}

#[async_trait]
impl TranscriptTrack for YoutubeTrack {
    fn language_code(&self) -> &str {
        &self.language_code
    }

    fn is_manual(&self) -> bool {
        self.manual
    }

    fn is_translatable(&self) -> bool {
        self.translatable
    }

    async fn fetch(&self) -> Result<Vec<CaptionSegment>, CaptionError> {
        tracing::debug!(language = %self.language_code, manual = self.manual, "Fetching caption track");

        let response = self.client.get(&self.url).send().await.map_err(request_error)?;
        let xml = check_status(response)?.text().await.map_err(request_error)?;

        parse_timedtext(&xml)
    }

    fn translate(&self, target: &str) -> Result<Box<dyn TranscriptTrack>, CaptionError> {
        if !self.translatable || !self.translation_languages.iter().any(|code| code == target) {
            return Err(CaptionError::NotTranslatable(target.to_string()));
        }

        Ok(Box::new(YoutubeTrack {
            client: self.client.clone(),
            url: format!("{}&tlang={}", self.url, urlencoding::encode(target)),
            language_code: target.to_string(),
            manual: self.manual,
            translatable: false,
            translation_languages: self.translation_languages.clone(),
        }))
    }
}

fn check_status(response: Response) -> Result<Response, CaptionError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(CaptionError::RateLimited(format!("HTTP {status}")));
    }
    if !status.is_success() {
        return Err(CaptionError::Request(format!("HTTP {status} for {}", response.url())));
    }
    Ok(response)
}

fn request_error(err: reqwest::Error) -> CaptionError {
    if err.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        CaptionError::RateLimited(err.to_string())
    } else {
        CaptionError::Request(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<Captions>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayabilityStatus {
    #[serde(default)]
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
    #[serde(default)]
    translation_languages: Vec<TranslationLanguage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    kind: Option<String>,
    #[serde(default)]
    is_translatable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslationLanguage {
    language_code: String,
}
