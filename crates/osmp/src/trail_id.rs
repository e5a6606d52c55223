//! Trail identifiers.
//!
//! OSMP trail segments carry a `SEGMENTID` of the form `ddd-ddd-ddd`: the
//! trail number followed by the starting and ending junction ids. Trails
//! in adjacent jurisdictions only have a `GlobalID` GUID.

use std::fmt;

use arcgis_mapserver::LayerId;

use crate::service::OsmpService;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentId {
    pub trail_number: u16,
    pub start_junction: u16,
    pub end_junction: u16,
}

impl SegmentId {
    /// Parse `ddd-ddd-ddd`, exactly three ASCII digits per part.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('-');
        let trail_number = parse_part(parts.next()?)?;
        let start_junction = parse_part(parts.next()?)?;
        let end_junction = parse_part(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            trail_number,
            start_junction,
            end_junction,
        })
    }
}

fn parse_part(part: &str) -> Option<u16> {
    if part.len() != 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}-{:03}-{:03}",
            self.trail_number, self.start_junction, self.end_junction
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrailId {
    Segment(SegmentId),
    Global(String),
}

impl TrailId {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match SegmentId::parse(s) {
            Some(segment) => Self::Segment(segment),
            None => Self::Global(s.to_string()),
        }
    }

    /// Service, layer and field the trail is looked up in.
    pub fn location(&self) -> (OsmpService, LayerId, &'static str) {
        match self {
            Self::Segment(_) => (OsmpService::Trails, LayerId::new(4), "SEGMENTID"),
            Self::Global(_) => (OsmpService::TrailsNew, LayerId::new(7), "GlobalID"),
        }
    }
}

impl From<&str> for TrailId {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for TrailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segment(segment) => segment.fmt(f),
            Self::Global(id) => f.write_str(id),
        }
    }
}
