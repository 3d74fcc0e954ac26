use anyhow::Result;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RecommendError;

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A point of interest loaded from the corpus file.
///
/// Category membership is a set of labels rather than per-category boolean
/// columns, so the in-memory model is independent of the flat-file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poi {
    pub id: u64,
    pub name: String,
    pub address: String,
    /// None when the source row had missing or unparseable coordinates;
    /// such POIs are kept for diagnostics but excluded from scoring.
    pub coords: Option<Coordinates>,
    pub categories: HashSet<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub intro: Option<String>,
}

impl Poi {
    /// Whether this POI can participate in distance scoring
    pub fn is_scorable(&self) -> bool {
        self.coords.is_some()
    }
}

/// Immutable corpus snapshot shared by in-flight requests
#[derive(Debug)]
pub struct CorpusSnapshot {
    pois: Vec<Poi>,
    /// Category columns seen in the source file, with member counts
    category_census: BTreeMap<String, usize>,
    loaded_at: chrono::DateTime<chrono::Utc>,
}

impl CorpusSnapshot {
    fn empty() -> Self {
        Self {
            pois: Vec::new(),
            category_census: BTreeMap::new(),
            loaded_at: chrono::Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }

    pub fn loaded_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.loaded_at
    }

    /// Category labels present in this snapshot
    pub fn categories(&self) -> impl Iterator<Item = (&str, usize)> {
        self.category_census.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Independent copies of every scorable POI carrying the given label.
    /// Pure with respect to the snapshot: repeated calls return equal results.
    pub fn filter_by_category(&self, label: &str) -> Vec<Poi> {
        self.pois
            .iter()
            .filter(|poi| poi.is_scorable() && poi.categories.contains(label))
            .cloned()
            .collect()
    }
}

/// Columns with a fixed meaning; every other header is a category flag
const FIXED_COLUMNS: &[&str] = &["name", "address", "lat", "lng", "phone", "website", "intro"];

/// In-memory POI table with atomic replace-then-publish reloads.
///
/// Readers grab a snapshot and keep it for the whole request, so a reload
/// never mixes old and new rows inside one ranking.
pub struct CorpusStore {
    current: ArcSwap<CorpusSnapshot>,
}

impl CorpusStore {
    /// Create an empty store; callers load or reload before serving
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(CorpusSnapshot::empty()),
        }
    }

    /// Create a store populated from a CSV file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RecommendError> {
        let store = Self::new();
        store.reload_from_file(path)?;
        Ok(store)
    }

    /// Pin the current snapshot for the duration of a request
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        self.current.load_full()
    }

    /// Number of POIs in the current snapshot
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Convenience passthrough to the current snapshot
    pub fn filter_by_category(&self, label: &str) -> Vec<Poi> {
        self.current.load().filter_by_category(label)
    }

    /// Re-read the corpus file and atomically replace the snapshot.
    /// In-flight requests holding the old snapshot are unaffected.
    pub fn reload_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RecommendError> {
        let path_display = path.as_ref().display().to_string();
        let file = std::fs::File::open(&path)
            .map_err(|e| RecommendError::corpus_load(&path_display, e.to_string()))?;

        let snapshot = parse_corpus(file)
            .map_err(|e| RecommendError::corpus_load(&path_display, e.to_string()))?;

        info!(
            "Corpus loaded: {} POIs, {} category columns from {}",
            snapshot.len(),
            snapshot.category_census.len(),
            path_display
        );

        self.current.store(Arc::new(snapshot));
        Ok(())
    }

    /// Replace the snapshot from any reader (used by tests and tooling)
    pub fn reload_from_reader<R: Read>(&self, rdr: R) -> Result<(), RecommendError> {
        let snapshot = parse_corpus(rdr)
            .map_err(|e| RecommendError::corpus_load("<reader>", e.to_string()))?;
        self.current.store(Arc::new(snapshot));
        Ok(())
    }
}

impl Default for CorpusStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the flat POI file. Rows with missing or malformed coordinates are
/// kept but flagged non-scorable; only a structurally broken file aborts.
fn parse_corpus<R: Read>(rdr: R) -> Result<CorpusSnapshot> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(rdr);

    let headers = reader.headers()?.clone();
    let category_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.is_empty() && !FIXED_COLUMNS.contains(&h.to_lowercase().as_str()))
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let column_index = |name: &str| -> Option<usize> {
        headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    };

    let name_idx = column_index("name")
        .ok_or_else(|| anyhow::anyhow!("corpus file has no 'name' column"))?;
    let address_idx = column_index("address");
    let lat_idx = column_index("lat");
    let lng_idx = column_index("lng");
    let phone_idx = column_index("phone");
    let website_idx = column_index("website");
    let intro_idx = column_index("intro");

    let mut pois = Vec::new();
    let mut census: BTreeMap<String, usize> = BTreeMap::new();
    let mut unscorable = 0usize;

    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable corpus row {}: {}", row, e);
                continue;
            }
        };

        let field = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let name = match field(Some(name_idx)) {
            Some(n) => n,
            None => {
                debug!("Skipping corpus row {} with empty name", row);
                continue;
            }
        };

        let coords = parse_coordinates(field(lat_idx).as_deref(), field(lng_idx).as_deref());
        if coords.is_none() {
            unscorable += 1;
            debug!("Corpus row {} ({}) has invalid coordinates", row, name);
        }

        let mut categories = HashSet::new();
        for (idx, label) in &category_columns {
            let flagged = record
                .get(*idx)
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false);
            if flagged {
                categories.insert(label.clone());
                *census.entry(label.clone()).or_insert(0) += 1;
            }
        }

        pois.push(Poi {
            id: pois.len() as u64,
            name,
            address: field(address_idx).unwrap_or_default(),
            coords,
            categories,
            phone: field(phone_idx),
            website: field(website_idx),
            intro: field(intro_idx),
        });
    }

    if unscorable > 0 {
        warn!("{} corpus rows have missing or invalid coordinates", unscorable);
    }

    Ok(CorpusSnapshot {
        pois,
        category_census: census,
        loaded_at: chrono::Utc::now(),
    })
}

fn parse_coordinates(lat: Option<&str>, lng: Option<&str>) -> Option<Coordinates> {
    let lat: f64 = lat?.parse().ok()?;
    let lng: f64 = lng?.parse().ok()?;
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some(Coordinates { lat, lng })
}
