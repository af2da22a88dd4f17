//! Records exchanged with the annotation service and produced by the classifier.

use serde::Deserialize;

/// The biotype reported for genes whose lookup record does not carry one.
pub const MISSING_BIOTYPE: &str = "NA";

fn missing_biotype() -> String {
    String::from(MISSING_BIOTYPE)
}

/// A top level region of an assembly whose coordinate system is `chromosome`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChromosomeDescriptor {
    pub name: String,
    pub length: u64,
    pub coordinate_system: String,
}

/// Minimal handle returned by an overlap query. Only the id is kept; the
/// service returns a good deal more per feature but none of it is used.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct GeneStub {
    pub id: String,
}

impl GeneStub {
    pub fn new<T: ToString>(id: T) -> GeneStub {
        GeneStub { id: id.to_string() }
    }
}

/// A transcript as inlined by an expanded lookup. Exons are kept opaque: only
/// their number matters.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TranscriptRecord {
    #[serde(rename = "Exon", default)]
    pub exons: Vec<serde_json::Value>,
}

impl TranscriptRecord {
    /// A transcript is intronless iff it is made of exactly one exon.
    pub fn is_intronless(&self) -> bool {
        self.exons.len() == 1
    }
}

/// Detailed gene record resolved by a batch lookup with `expand` set.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GeneRecord {
    pub id: String,
    pub start: i64,
    pub end: i64,
    #[serde(rename = "seq_region_name")]
    pub chromosome: String,
    #[serde(default = "missing_biotype", deserialize_with = "null_as_missing_biotype")]
    pub biotype: String,
    #[serde(rename = "Transcript", default)]
    pub transcripts: Vec<TranscriptRecord>,
}

fn null_as_missing_biotype<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v: Option<String> = Option::deserialize(deserializer)?;
    Ok(v.unwrap_or_else(missing_biotype))
}

impl GeneRecord {
    /// `true` if any transcript of the gene has a single exon.
    pub fn has_intronless_transcript(&self) -> bool {
        self.transcripts.iter().any(TranscriptRecord::is_intronless)
    }
}

/// The two labels a gene can end up with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeneCategory {
    Intronless,
    MultiExonic,
}

impl GeneCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneCategory::Intronless => "intronless",
            GeneCategory::MultiExonic => "multi-exonic",
        }
    }
}

impl std::fmt::Display for GeneCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GeneCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<GeneCategory> {
        match s {
            "intronless" => Ok(GeneCategory::Intronless),
            "multi-exonic" => Ok(GeneCategory::MultiExonic),
            _ => anyhow::bail!("Cannot parse the gene category {:?}.", s),
        }
    }
}

/// One row of the final table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedGene {
    pub id: String,
    pub start: i64,
    pub end: i64,
    pub chromosome: String,
    pub biotype: String,
    pub length: i64,
    pub category: GeneCategory,
}
