//! The OSMP MapServer catalog.

use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Directory holding every OSMP MapServer.
pub const DEFAULT_ROOT: &str = "https://maps.bouldercolorado.gov/arcgis2/rest/services/osmp/";

/// A MapServer published under the OSMP directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum OsmpService {
    Trails,
    #[strum(serialize = "TrailsNEW")]
    TrailsNew,
    TrailJunctions,
    DogRegs,
    TrailheadsAccessPoints,
    AllWildlifeClosures,
    UndesignatedTrails,
}

impl OsmpService {
    /// `{root}{name}/MapServer/`. A missing trailing slash on `root` is added.
    pub fn url(self, root: &str) -> String {
        let separator = if root.ends_with('/') { "" } else { "/" };
        format!("{root}{separator}{}/MapServer/", self.as_ref())
    }
}
