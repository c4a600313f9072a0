// src/specs/clans.rs
//! Page reader for the clan leaderboard.
//!
//! The page lists one clan per line as `rank,name,points`. Only well-formed
//! lines count; anything else (headers, banners, markup noise) is skipped.
//!
//! A line is valid when:
//! - it has exactly three comma-separated fields,
//! - the rank is all ASCII digits and at least 1,
//! - the name is non-empty after trimming,
//! - the points are digits with at most one `.` or `-`, and read as a
//!   finite, non-negative number.
//!
//! Ranks already seen in the same document are skipped so a batch never
//! carries the same rank twice.

use tracing::debug;

use crate::core::html::text_lines;
use crate::data::RankedEntry;
use crate::error::ParseError;

/// First `max` valid entries of `doc`, in page order.
pub fn parse(doc: &str, max: usize) -> Result<Vec<RankedEntry>, ParseError> {
    let lines = text_lines(doc);
    let mut out: Vec<RankedEntry> = Vec::with_capacity(max.min(lines.len()));

    for line in &lines {
        if out.len() >= max {
            break;
        }
        let Some(entry) = parse_line(line) else { continue };
        if out.iter().any(|e| e.rank == entry.rank) {
            debug!(rank = entry.rank, name = %entry.name, "duplicate rank skipped");
            continue;
        }
        out.push(entry);
    }

    if out.is_empty() {
        return Err(ParseError::NoEntries { lines: lines.len() });
    }
    Ok(out)
}

pub fn parse_line(line: &str) -> Option<RankedEntry> {
    let mut parts = line.split(',');
    let (rank, name, points) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let rank = parse_rank(rank.trim())?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let points = parse_points(points.trim())?;

    Some(RankedEntry { rank, name: name.to_string(), points })
}

fn parse_rank(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok().filter(|&r| r >= 1)
}

fn parse_points(s: &str) -> Option<f64> {
    let mut marks = 0usize;
    let mut digits = 0usize;
    for b in s.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' | b'-' => marks += 1,
            _ => return None,
        }
    }
    if digits == 0 || marks > 1 {
        return None;
    }
    let v: f64 = s.parse().ok()?;
    // `-0` reads as negative zero; fold it into plain zero.
    (v.is_finite() && v >= 0.0).then_some(v + 0.0)
}
