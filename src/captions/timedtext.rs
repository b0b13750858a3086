//! Parsing of the timedtext XML served for caption tracks.
//!
//! The format is a flat list of `<text start=".." dur="..">..</text>` elements
//! whose bodies are HTML-escaped and may carry inline `<font>`/`<b>` markup.

use std::sync::LazyLock;

use regex::Regex;

use super::{CaptionError, CaptionSegment};

static TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<text\b([^>]*?)(?:/>|>(.*?)</text>)"#).expect("valid text element regex")
});

static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("valid attribute regex"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Parse a timedtext document into ordered segments
pub fn parse_timedtext(xml: &str) -> Result<Vec<CaptionSegment>, CaptionError> {
    if !xml.contains("<transcript") {
        return Err(CaptionError::Malformed("missing <transcript> root".to_string()));
    }

    let mut segments = Vec::new();
    for element in TEXT_RE.captures_iter(xml) {
        let attrs = element.get(1).map_or("", |m| m.as_str());
        let body = element.get(2).map_or("", |m| m.as_str());

        let mut start = 0.0;
        let mut duration = 0.0;
        for attr in ATTR_RE.captures_iter(attrs) {
            match &attr[1] {
                "start" => start = parse_seconds(&attr[2])?,
                "dur" => duration = parse_seconds(&attr[2])?,
                _ => {}
            }
        }

        // Bodies are escaped once inside the XML and once more as HTML
        let text = unescape_html(&unescape_html(body));
        let text = TAG_RE.replace_all(&text, "");

        segments.push(CaptionSegment::new(text.into_owned(), start, duration));
    }

    Ok(segments)
}

fn parse_seconds(value: &str) -> Result<f64, CaptionError> {
    value
        .parse::<f64>()
        .map_err(|_| CaptionError::Malformed(format!("invalid time value '{value}'")))
}

/// Decode the named and numeric character references found in caption bodies
pub fn unescape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            decode_entity(entity).map(|c| (c, end + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
