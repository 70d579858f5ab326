use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    pub adult: bool,
    pub p2p: bool,
    pub bingeable: bool,
    pub configurable: bool,
    pub configuration_required: bool,
}

/// What a media-center client reads when the addon is installed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: &'static str,
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub catalogs: &'static [&'static str],
    pub resources: &'static [&'static str],
    pub types: &'static [&'static str],
    pub id_prefixes: &'static [&'static str],
    pub behavior_hints: BehaviorHints,
}

pub const MANIFEST: Manifest = Manifest {
    id: "community.wizdom.subs",
    version: env!("CARGO_PKG_VERSION"),
    name: "Wizdom Subtitles (HEB)",
    description: "Hebrew subtitles from wizdom.xyz",
    catalogs: &[],
    resources: &["subtitles"],
    types: &["movie", "series"],
    id_prefixes: &["tt"],
    behavior_hints: BehaviorHints {
        adult: false,
        p2p: false,
        bingeable: false,
        configurable: true,
        configuration_required: false,
    },
};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn manifest() -> Json<Manifest> {
    Json(MANIFEST)
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "OK" })
}
