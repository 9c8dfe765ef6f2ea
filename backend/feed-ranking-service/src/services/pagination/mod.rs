//! Cursor and offset pagination over ranked lists.
//!
//! A cursor is the `(score, id)` of the last item on the previous page. The
//! score travels with the client so no server-side score cache is needed.
//! Freshness makes scores time-dependent, so a cursor also carries the
//! reference time its paging pass was scored at.

use crate::models::ScoredCandidate;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Id that sorts after any real id; pairs with `+inf` to mean "from the start".
pub const START_SENTINEL_ID: &str = "zzzzzzzzzz";

#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub last_score: f64,
    pub last_id: String,
    /// Scoring time of the pass that produced this cursor. Later pages score
    /// against it so the ordering they page through does not drift.
    pub as_of: Option<DateTime<Utc>>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::start()
    }
}

impl Cursor {
    pub fn new(last_score: f64, last_id: impl Into<String>) -> Self {
        Self {
            last_score,
            last_id: last_id.into(),
            as_of: None,
        }
    }

    pub fn anchored_at(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn start() -> Self {
        Self::new(f64::INFINITY, START_SENTINEL_ID)
    }

    pub fn is_start(&self) -> bool {
        self.last_score == f64::INFINITY
    }

    /// Builds a cursor from raw `last_score`/`last_id`/`as_of` query values.
    /// A missing or unparsable score or id falls back to the start of the
    /// list. An unparsable `as_of` is dropped.
    pub fn from_parts(
        last_score: Option<&str>,
        last_id: Option<&str>,
        as_of: Option<&str>,
    ) -> Self {
        let score = last_score
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|score| !score.is_nan());
        let id = last_id.filter(|id| !id.is_empty());
        match (score, id) {
            (Some(score), Some(id)) => Self {
                as_of: as_of.and_then(parse_as_of),
                ..Self::new(score, id)
            },
            _ => {
                debug!("Incomplete raw cursor, starting from the top");
                Self::start()
            }
        }
    }

    /// True when `(score, id)` sorts strictly after this cursor under
    /// score-descending, id-descending order.
    pub fn admits(&self, score: f64, id: &str) -> bool {
        score < self.last_score || (score == self.last_score && id < self.last_id.as_str())
    }

    /// Opaque token bound to `scope` (viewer and seed of the paging session).
    pub fn encode(&self, scope: &str) -> String {
        let as_of = self
            .as_of
            .map(|t| t.timestamp_millis().to_string())
            .unwrap_or_default();
        let payload = format!(
            "{}:{}:{}:{}",
            self.last_score,
            as_of,
            scope_digest(scope),
            self.last_id
        );
        general_purpose::URL_SAFE_NO_PAD.encode(payload)
    }

    /// Decodes a token produced by [`Cursor::encode`]. A malformed token or one
    /// minted for a different scope restarts from the top.
    pub fn decode(token: &str, scope: &str) -> Self {
        match Self::try_decode(token, scope) {
            Some(cursor) => cursor,
            None => {
                debug!("Ignoring unusable cursor token, starting from the top");
                Self::start()
            }
        }
    }

    fn try_decode(token: &str, scope: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        let bytes = general_purpose::URL_SAFE_NO_PAD.decode(token).ok()?;
        let payload = String::from_utf8(bytes).ok()?;
        let (score_str, rest) = payload.split_once(':')?;
        let (as_of_str, rest) = rest.split_once(':')?;
        let (digest, id) = rest.split_once(':')?;
        if digest != scope_digest(scope) || id.is_empty() {
            return None;
        }
        let score = score_str.parse::<f64>().ok()?;
        if score.is_nan() {
            return None;
        }
        let as_of = if as_of_str.is_empty() {
            None
        } else {
            Some(parse_as_of(as_of_str)?)
        };
        Some(Self {
            as_of,
            ..Self::new(score, id)
        })
    }
}

/// Epoch milliseconds.
fn parse_as_of(raw: &str) -> Option<DateTime<Utc>> {
    let millis = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

fn scope_digest(scope: &str) -> String {
    let hash = Sha256::digest(scope.as_bytes());
    hash[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone, Default)]
pub struct CursorPage {
    pub items: Vec<ScoredCandidate>,
    /// Present only when items remain after the last returned one.
    pub next_cursor: Option<Cursor>,
}

/// Returns up to `limit` items strictly after `cursor`. `ranked` must already
/// be in score-descending, id-descending order.
pub fn paginate_by_cursor(ranked: &[ScoredCandidate], cursor: &Cursor, limit: usize) -> CursorPage {
    let start = ranked.partition_point(|c| !cursor.admits(c.score, c.id()));
    let end = start.saturating_add(limit).min(ranked.len());
    let items = ranked[start..end].to_vec();

    let next_cursor = if end < ranked.len() {
        items.last().map(|last| Cursor::new(last.score, last.id()))
    } else {
        None
    };

    CursorPage { items, next_cursor }
}

/// Slice `[offset, offset + limit)` plus whether anything lies beyond it.
pub fn paginate_by_offset<T: Clone>(items: &[T], offset: usize, limit: usize) -> (Vec<T>, bool) {
    if offset >= items.len() {
        return (Vec::new(), false);
    }
    let end = offset.saturating_add(limit).min(items.len());
    (items[offset..end].to_vec(), end < items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentItem;

    fn scored(id: &str, score: f64) -> ScoredCandidate {
        ScoredCandidate::new(
            ContentItem {
                id: id.to_string(),
                owner_id: "owner".to_string(),
                created_at: Utc::now(),
                tags: Vec::new(),
                likes: 0,
                saves: 0,
                comments: 0,
                views: 0,
            },
            score,
        )
    }

    fn ranked() -> Vec<ScoredCandidate> {
        vec![
            scored("e", 50.0),
            scored("d", 40.0),
            scored("c", 40.0),
            scored("b", 40.0),
            scored("a", 10.0),
        ]
    }

    fn ids(page: &CursorPage) -> Vec<&str> {
        page.items.iter().map(|c| c.id()).collect()
    }

    #[test]
    fn test_start_cursor_selects_from_top() {
        let page = paginate_by_cursor(&ranked(), &Cursor::start(), 2);
        assert_eq!(ids(&page), vec!["e", "d"]);
        assert_eq!(page.next_cursor, Some(Cursor::new(40.0, "d")));
    }

    #[test]
    fn test_ties_split_across_pages_without_loss() {
        let list = ranked();
        let mut cursor = Cursor::start();
        let mut collected = Vec::new();

        loop {
            let page = paginate_by_cursor(&list, &cursor, 2);
            if let Some(last) = page.items.last() {
                // Every item on this page sorts strictly after the previous cursor.
                assert!(page.items.iter().all(|c| cursor.admits(c.score, c.id())));
                assert!(cursor.admits(last.score, last.id()));
            }
            collected.extend(page.items.iter().map(|c| c.id().to_string()));
            match page.next_cursor {
                Some(next) => cursor = next,
                None => break,
            }
        }

        assert_eq!(collected, vec!["e", "d", "c", "b", "a"]);
    }

    #[test]
    fn test_exhausted_list_has_no_next_cursor() {
        let page = paginate_by_cursor(&ranked(), &Cursor::new(10.0, "a"), 5);
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());

        let page = paginate_by_cursor(&ranked(), &Cursor::new(40.0, "b"), 1);
        assert_eq!(ids(&page), vec!["a"]);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_token_round_trip_is_scope_bound() {
        let cursor = Cursor::new(137.25, "item:with:colons");
        let token = cursor.encode("viewer-1/seed-9");

        assert_eq!(Cursor::decode(&token, "viewer-1/seed-9"), cursor);
        assert!(Cursor::decode(&token, "viewer-2/seed-9").is_start());
        assert!(Cursor::decode("not base64 !!", "viewer-1/seed-9").is_start());
        assert!(Cursor::decode("", "viewer-1/seed-9").is_start());
    }

    #[test]
    fn test_token_keeps_scoring_time() {
        let as_of = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let cursor = Cursor::new(42.0, "b").anchored_at(as_of);
        let token = cursor.encode("viewer/seed");

        let decoded = Cursor::decode(&token, "viewer/seed");
        assert_eq!(decoded.as_of, Some(as_of));
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_from_parts_defaults_to_start() {
        assert!(Cursor::from_parts(None, None, None).is_start());
        assert!(Cursor::from_parts(Some("NaN"), Some("x"), None).is_start());
        assert!(Cursor::from_parts(Some("abc"), Some("x"), None).is_start());
        assert!(Cursor::from_parts(Some("12"), Some(""), None).is_start());
        assert_eq!(
            Cursor::from_parts(Some("12"), Some("x"), Some("garbage")),
            Cursor::new(12.0, "x")
        );
        assert_eq!(
            Cursor::from_parts(Some("12.5"), Some("x"), Some("1700000000000")).as_of,
            Utc.timestamp_millis_opt(1_700_000_000_000).single()
        );
    }

    #[test]
    fn test_offset_pages() {
        let items: Vec<u32> = (0..7).collect();
        assert_eq!(paginate_by_offset(&items, 0, 3), (vec![0, 1, 2], true));
        assert_eq!(paginate_by_offset(&items, 6, 3), (vec![6], false));
        assert_eq!(paginate_by_offset(&items, 9, 3), (Vec::new(), false));
    }
}
