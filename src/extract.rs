use std::sync::LazyLock;

use regex::Regex;

static HRULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$").unwrap());
static ARXIV_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\((https?://arxiv\.org/[^)\s]+)\)").unwrap());
static ARXIV_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}\.\d{5}").unwrap());

/// Raw section text kept per record for downstream context.
pub const SNIPPET_MAX_CHARS: usize = 2000;

/// One paper reference parsed from a document section.
#[derive(Debug, Clone)]
pub struct ReferenceRecord {
    pub title: String,
    pub arxiv_url: String,
    pub identifier: String,
    pub snippet: String,
}

/// Parse a document into reference records, one per horizontal-rule-delimited
/// section that carries an arXiv link. Sections without a link yield nothing.
pub fn extract_records(text: &str) -> impl Iterator<Item = ReferenceRecord> + '_ {
    HRULE_RE.split(text).filter_map(parse_section)
}

fn parse_section(section: &str) -> Option<ReferenceRecord> {
    let caps = ARXIV_LINK_RE.captures(section)?;
    let title = caps[1].trim().to_string();
    let arxiv_url = caps[2].to_string();
    let identifier = derive_identifier(&arxiv_url);
    let snippet: String = section.trim().chars().take(SNIPPET_MAX_CHARS).collect();
    Some(ReferenceRecord {
        title,
        arxiv_url,
        identifier,
        snippet,
    })
}

/// New-style arXiv id (NNNN.NNNNN) if the URL contains one, else the last
/// path segment. Stable for the same URL, so re-runs dedup against it.
fn derive_identifier(url: &str) -> String {
    if let Some(m) = ARXIV_ID_RE.find(url) {
        return m.as_str().to_string();
    }
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

// ── Tests ──
