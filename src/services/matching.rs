//! Heuristic matching between externally sourced tracks and the local
//! library index. Pure string-normalization and scoring functions, no I/O.

use serde::Serialize;
use std::collections::HashSet;

use crate::db::entities::playlist_entries::MatchStatus;

/// Score at or above which a candidate is accepted automatically.
pub const AUTO_MATCH_SCORE: i32 = 90;
/// Score at or above which a candidate is surfaced for manual review.
pub const REVIEW_SCORE: i32 = 80;

/// Minimum artist similarity for a candidate to be considered at all.
const ARTIST_FLOOR: f64 = 0.7;

/// Version markers that change a track's identity when they conflict.
const VERSION_MARKERS: &[&str] = &[
    "remix",
    "remastered",
    "remaster",
    "live",
    "acoustic",
    "demo",
    "instrumental",
    "radio edit",
    "extended",
];

/// The comparable projection of a track, local or external.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: Option<i32>,
}

/// Outcome of evaluating one candidate against a wanted track.
#[derive(Debug, Clone, Serialize)]
pub struct MatchVerdict {
    pub score: i32,
    pub status: MatchStatus,
}

/// Lowercase, strip punctuation to spaces, drop apostrophes, collapse
/// whitespace, and strip a leading "the ".
pub fn normalize(s: &str) -> String {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else if c == '\'' {
                '\0'
            } else {
                ' '
            }
        })
        .filter(|&c| c != '\0')
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .strip_prefix("the ")
        .map(str::to_string)
        .unwrap_or(collapsed)
}

/// Remove parenthetical and bracketed segments from a title, returning the
/// bare title and any version marker found inside the removed segments.
fn strip_parentheticals(title: &str) -> (String, Option<String>) {
    let mut bare = String::new();
    let mut removed = String::new();
    let mut depth = 0u32;

    for c in title.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' if depth > 0 => depth -= 1,
            _ if depth > 0 => removed.push(c),
            _ => bare.push(c),
        }
    }

    let removed_lower = removed.to_lowercase();
    let marker = VERSION_MARKERS
        .iter()
        .find(|m| removed_lower.contains(*m))
        .map(|m| m.to_string());

    (bare.trim().to_string(), marker)
}

/// Cut featuring credits out of a title ("Song feat. Guest" -> "Song").
fn strip_featuring(title: &str) -> String {
    let lower = title.to_lowercase();
    for pattern in ["feat.", "feat ", "ft.", "ft ", "featuring"] {
        if let Some(idx) = lower.find(pattern) {
            return title[..idx].trim().to_string();
        }
    }
    title.to_string()
}

/// Normalized title ready for comparison, plus its version marker.
pub fn comparable_title(title: &str) -> (String, Option<String>) {
    let (bare, marker) = strip_parentheticals(title);
    (normalize(&strip_featuring(&bare)), marker)
}

fn jaro(s1: &[char], s2: &[char]) -> f64 {
    let (len1, len2) = (s1.len(), s2.len());
    if len1 == 0 && len2 == 0 {
        return 1.0;
    }
    if len1 == 0 || len2 == 0 {
        return 0.0;
    }

    let window = (len1.max(len2) / 2).saturating_sub(1);
    let mut matched1 = vec![false; len1];
    let mut matched2 = vec![false; len2];
    let mut matches = 0usize;

    for i in 0..len1 {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(len2);
        for j in start..end {
            if matched2[j] || s1[i] != s2[j] {
                continue;
            }
            matched1[i] = true;
            matched2[j] = true;
            matches += 1;
            break;
        }
    }

    if matches == 0 {
        return 0.0;
    }

    let mut transpositions = 0usize;
    let mut k = 0usize;
    for i in 0..len1 {
        if !matched1[i] {
            continue;
        }
        while !matched2[k] {
            k += 1;
        }
        if s1[i] != s2[k] {
            transpositions += 1;
        }
        k += 1;
    }

    let m = matches as f64;
    (m / len1 as f64 + m / len2 as f64 + (m - (transpositions / 2) as f64) / m) / 3.0
}

/// Jaro-Winkler similarity over already-normalized strings.
pub fn jaro_winkler(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    let c1: Vec<char> = s1.chars().collect();
    let c2: Vec<char> = s2.chars().collect();
    let base = jaro(&c1, &c2);

    let prefix = c1
        .iter()
        .zip(c2.iter())
        .take(4)
        .take_while(|(a, b)| a == b)
        .count();

    base + 0.1 * prefix as f64 * (1.0 - base)
}

/// Token-set overlap; tolerant of word reordering ("Fox, The Quick").
pub fn token_overlap(s1: &str, s2: &str) -> f64 {
    let t1: HashSet<&str> = s1.split_whitespace().collect();
    let t2: HashSet<&str> = s2.split_whitespace().collect();

    if t1.is_empty() && t2.is_empty() {
        return 1.0;
    }
    if t1.is_empty() || t2.is_empty() {
        return 0.0;
    }

    t1.intersection(&t2).count() as f64 / t1.union(&t2).count() as f64
}

fn similarity(s1: &str, s2: &str) -> f64 {
    jaro_winkler(s1, s2).max(token_overlap(s1, s2) * 0.95)
}

/// Whether two optional durations disagree beyond max(15s, 8%).
fn duration_conflict(a: Option<i32>, b: Option<i32>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if a > 0 && b > 0 => {
            let shorter = a.min(b) as f64;
            let diff = (a - b).abs() as f64;
            diff > (15_000.0_f64).max(shorter * 0.08)
        }
        _ => false,
    }
}

/// Score two tracks on a 0-100 scale.
pub fn score(wanted: &TrackInfo, candidate: &TrackInfo) -> i32 {
    let (title_a, marker_a) = comparable_title(&wanted.title);
    let (title_b, marker_b) = comparable_title(&candidate.title);

    let title_sim = similarity(&title_a, &title_b);
    let artist_sim = similarity(&normalize(&wanted.artist), &normalize(&candidate.artist));

    let mut raw = title_sim * 0.5 + artist_sim * 0.4;

    if let (Some(a), Some(b)) = (&wanted.album, &candidate.album) {
        let album_sim = similarity(&normalize(a), &normalize(b));
        if album_sim > 0.8 {
            raw += album_sim * 0.1;
        }
    }

    // Conflicting markers ("live" vs none / vs "remix") identify a
    // different recording of the same song.
    raw *= match (&marker_a, &marker_b) {
        (None, None) => 1.0,
        (Some(a), Some(b)) if a == b => 1.0,
        (Some(_), Some(_)) => 0.6,
        _ => 0.9,
    };

    (raw.clamp(0.0, 1.0) * 100.0).round() as i32
}

/// Evaluate a single candidate: score it, then classify against the
/// auto-match and review thresholds. A duration conflict downgrades a
/// would-be auto-match to manual review.
pub fn evaluate(wanted: &TrackInfo, candidate: &TrackInfo) -> MatchVerdict {
    let score = score(wanted, candidate);

    let status = if score >= AUTO_MATCH_SCORE {
        if duration_conflict(wanted.duration_ms, candidate.duration_ms) {
            MatchStatus::ManualReview
        } else {
            MatchStatus::Matched
        }
    } else if score >= REVIEW_SCORE {
        MatchStatus::ManualReview
    } else {
        MatchStatus::NoMatch
    };

    MatchVerdict { score, status }
}

/// Pick the best candidate for a wanted track. Candidates whose artist
/// similarity is below the floor are never considered.
pub fn find_best_match<'a, T>(
    wanted: &TrackInfo,
    candidates: impl IntoIterator<Item = (&'a T, TrackInfo)>,
) -> Option<(&'a T, MatchVerdict)> {
    let wanted_artist = normalize(&wanted.artist);

    candidates
        .into_iter()
        .filter(|(_, info)| similarity(&wanted_artist, &normalize(&info.artist)) >= ARTIST_FLOOR)
        .map(|(item, info)| (item, evaluate(wanted, &info)))
        .filter(|(_, verdict)| verdict.status != MatchStatus::NoMatch)
        .max_by_key(|(_, verdict)| verdict.score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn info(title: &str, artist: &str) -> TrackInfo {
        TrackInfo {
            title: title.to_string(),
            artist: artist.to_string(),
            album: None,
            duration_ms: None,
        }
    }

    #[test]
    fn normalize_strips_punctuation_and_articles() {
        assert_eq!(normalize("Don't Stop Me Now!"), "dont stop me now");
        assert_eq!(normalize("The Beatles"), "beatles");
        assert_eq!(normalize("  Multiple   Spaces "), "multiple spaces");
    }

    #[test]
    fn comparable_title_removes_markers_and_credits() {
        let (title, marker) = comparable_title("Song Title (Live) [2011 Remaster]");
        assert_eq!(title, "song title");
        assert!(marker.is_some());

        let (title, marker) = comparable_title("Duet feat. Guest Artist");
        assert_eq!(title, "duet");
        assert_eq!(marker, None);
    }

    #[test]
    fn jaro_winkler_bounds() {
        assert!((jaro_winkler("hello", "hello") - 1.0).abs() < f64::EPSILON);
        assert!(jaro_winkler("hello", "hallo") > 0.8);
        assert!(jaro_winkler("hello", "world") < 0.6);
    }

    #[test]
    fn token_overlap_ignores_order() {
        assert!((token_overlap("quick brown fox", "fox quick brown") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn identical_tracks_auto_match() {
        let verdict = evaluate(
            &info("Bohemian Rhapsody", "Queen"),
            &info("Bohemian Rhapsody", "Queen"),
        );
        assert!(verdict.score >= AUTO_MATCH_SCORE);
        assert_eq!(verdict.status, MatchStatus::Matched);
    }

    #[test]
    fn remaster_suffix_still_matches() {
        let verdict = evaluate(
            &info("Bohemian Rhapsody", "Queen"),
            &info("Bohemian Rhapsody (2011 Remaster)", "Queen"),
        );
        // One-sided marker dampens but should stay in review range or above.
        assert!(verdict.score >= REVIEW_SCORE);
    }

    #[test]
    fn conflicting_versions_score_down() {
        let studio = evaluate(
            &info("Song (Live)", "Artist"),
            &info("Song (Remix)", "Artist"),
        );
        assert_eq!(studio.status, MatchStatus::NoMatch);
    }

    #[test]
    fn duration_conflict_downgrades_to_review() {
        let wanted = TrackInfo {
            duration_ms: Some(180_000),
            ..info("Song", "Artist")
        };
        let candidate = TrackInfo {
            duration_ms: Some(260_000),
            ..info("Song", "Artist")
        };
        let verdict = evaluate(&wanted, &candidate);
        assert!(verdict.score >= AUTO_MATCH_SCORE);
        assert_eq!(verdict.status, MatchStatus::ManualReview);
    }

    #[test]
    fn different_artist_is_filtered_out() {
        let ids = [1];
        let best = find_best_match(
            &info("Yesterday", "The Beatles"),
            ids.iter().map(|id| (id, info("Yesterday", "Boyz II Men"))),
        );
        assert!(best.is_none());
    }

    #[test]
    fn best_candidate_wins() {
        let candidates = vec![
            (1, info("Yesterday (Live at Wembley)", "The Beatles")),
            (2, info("Yesterday", "The Beatles")),
        ];
        let (id, verdict) = find_best_match(
            &info("Yesterday", "Beatles"),
            candidates.iter().map(|(id, info)| (id, info.clone())),
        )
        .expect("should match");
        assert_eq!(*id, 2);
        assert_eq!(verdict.status, MatchStatus::Matched);
    }
}
