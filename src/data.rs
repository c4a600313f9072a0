// src/data.rs
//
// Canonical observation data.
//
// - RankedEntry: one parsed leaderboard line, not yet tied to a point in time.
// - Observation: a RankedEntry stamped with its cycle timestamp. This is also
//                the on-disk record shape.
// - ObservationSet: append-only sequence owned by the store.
//
// Numeric fields written as strings by older collectors are normalized here,
// once, on deserialize. Everything downstream sees typed values.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::config::consts::TIMESTAMP_FORMAT;

/// Current local wall-clock time at second resolution.
pub fn now_stamp() -> NaiveDateTime {
    truncate_to_secs(Local::now().naive_local())
}

pub fn truncate_to_secs(t: NaiveDateTime) -> NaiveDateTime {
    t.with_nanosecond(0).unwrap_or(t)
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankedEntry {
    pub rank: u32,
    pub name: String,
    pub points: f64,
}

impl RankedEntry {
    pub fn stamp(self, at: NaiveDateTime) -> Observation {
        Observation::new(self.rank, self.name, self.points, at)
    }
}

/// Stamp a whole batch with the single cycle timestamp.
pub fn stamp_batch(entries: Vec<RankedEntry>, at: NaiveDateTime) -> Vec<Observation> {
    let at = truncate_to_secs(at);
    entries.into_iter().map(|e| e.stamp(at)).collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(deserialize_with = "de_rank")]
    pub rank: u32,
    pub name: String,
    #[serde(rename = "points", deserialize_with = "de_points")]
    pub score: f64,
    #[serde(serialize_with = "ser_stamp", deserialize_with = "de_stamp")]
    pub timestamp: NaiveDateTime,
}

impl Observation {
    pub fn new(rank: u32, name: impl Into<String>, score: f64, timestamp: NaiveDateTime) -> Self {
        Self {
            rank,
            name: name.into(),
            score,
            timestamp: truncate_to_secs(timestamp),
        }
    }
}

/// Append-only, insertion-ordered observation history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationSet {
    observations: Vec<Observation>,
}

impl ObservationSet {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.observations.len() }
    pub fn is_empty(&self) -> bool { self.observations.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> { self.observations.iter() }
    pub fn as_slice(&self) -> &[Observation] { &self.observations }

    /// New set holding `self` followed by `batch`. `self` is left untouched.
    pub fn append(&self, batch: &[Observation]) -> ObservationSet {
        let mut observations = Vec::with_capacity(self.observations.len() + batch.len());
        observations.extend_from_slice(&self.observations);
        observations.extend_from_slice(batch);
        ObservationSet { observations }
    }
}

impl From<Vec<Observation>> for ObservationSet {
    fn from(observations: Vec<Observation>) -> Self { Self { observations } }
}

impl<'a> IntoIterator for &'a ObservationSet {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;
    fn into_iter(self) -> Self::IntoIter { self.observations.iter() }
}

/* ---------------- Field normalization ---------------- */

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrText {
    Num(f64),
    Text(String),
}

impl NumOrText {
    fn into_f64<E: de::Error>(self) -> Result<f64, E> {
        match self {
            NumOrText::Num(n) => Ok(n),
            NumOrText::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("not a number: {s:?}"))),
        }
    }
}

fn de_rank<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let n = NumOrText::deserialize(d)?.into_f64::<D::Error>()?;
    if n.fract() != 0.0 || n < 1.0 || n > u32::MAX as f64 {
        return Err(de::Error::custom(format!("rank must be a positive integer, got {n}")));
    }
    Ok(n as u32)
}

fn de_points<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let n = NumOrText::deserialize(d)?.into_f64::<D::Error>()?;
    if !n.is_finite() {
        return Err(de::Error::custom("points must be finite"));
    }
    Ok(n)
}

fn ser_stamp<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&t.format(TIMESTAMP_FORMAT))
}

fn de_stamp<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
    let s = String::deserialize(d)?;
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| de::Error::custom(format!("bad timestamp {s:?}: {e}")))
}
