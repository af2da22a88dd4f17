use crate::client::AnnotationService;
use crate::igfinder_utils::natural_chromosome_order;
use crate::options::ChromosomeFilter;
use crate::records::ChromosomeDescriptor;
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

/// The coordinate system of the top level regions kept by [chromosomes_info].
pub const CHROMOSOME_COORD_SYSTEM: &str = "chromosome";

#[derive(Deserialize)]
struct AssemblyInfo {
    #[serde(default)]
    top_level_region: Vec<TopLevelRegion>,
}

#[derive(Deserialize)]
struct TopLevelRegion {
    name: String,
    length: u64,
    #[serde(default)]
    coord_system: Option<String>,
}

/// Retrieves the assembly metadata of `species` and keeps the top level regions whose
/// coordinate system is `chromosome`; scaffolds, contigs and patches are discarded.
///
/// No numeric subset is applied here, see [select_chromosomes].
///
/// ### Returns
///
/// The chromosomes keyed by name, together with the raw response.
///
/// ### Errors
///
/// A non-success status from the service is fatal, and so is a response that does not
/// look like assembly metadata.
pub fn chromosomes_info<S: AnnotationService + ?Sized>(
    service: &S,
    species: &str,
) -> anyhow::Result<(HashMap<String, ChromosomeDescriptor>, Value)> {
    info!("Retrieving the assembly information of {}", species);
    let endpoint = format!("/info/assembly/{}", species);
    let raw = service
        .get(&endpoint, &[])
        .with_context(|| format!("Could not retrieve the assembly of {}", species))?;

    let assembly = AssemblyInfo::deserialize(&raw)
        .with_context(|| format!("Unexpected assembly information for {}", species))?;

    let total = assembly.top_level_region.len();
    let chromosomes: HashMap<String, ChromosomeDescriptor> = assembly
        .top_level_region
        .into_iter()
        .filter(|r| r.coord_system.as_deref() == Some(CHROMOSOME_COORD_SYSTEM))
        .map(|r| {
            (
                r.name.clone(),
                ChromosomeDescriptor {
                    name: r.name,
                    length: r.length,
                    coordinate_system: String::from(CHROMOSOME_COORD_SYSTEM),
                },
            )
        })
        .collect();

    info!(
        "Found {} chromosomes among {} top level regions",
        chromosomes.len(),
        total
    );
    Ok((chromosomes, raw))
}

/// Restricts the chromosomes returned by [chromosomes_info] to the ones requested by
/// `filter`, in scan order. Requested names missing from the assembly are reported and skipped.
pub fn select_chromosomes(
    chromosomes: &HashMap<String, ChromosomeDescriptor>,
    filter: &ChromosomeFilter,
) -> Vec<ChromosomeDescriptor> {
    match filter.names() {
        Some(names) => names
            .iter()
            .filter_map(|n| {
                let c = chromosomes.get(n);
                if c.is_none() {
                    warn!("Chromosome {} is not part of the assembly; skipping it.", n);
                }
                c.cloned()
            })
            .collect(),
        None => {
            let mut all: Vec<ChromosomeDescriptor> = chromosomes.values().cloned().collect();
            all.sort_by(|a, b| natural_chromosome_order(&a.name, &b.name));
            all
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fake::FakeService;
    use serde_json::json;

    fn assembly() -> Value {
        json!({
            "assembly_name": "GRCh38.p14",
            "top_level_region": [
                {"name": "1", "length": 248956422, "coord_system": "chromosome"},
                {"name": "KI270728.1", "length": 1872759, "coord_system": "scaffold"},
                {"name": "X", "length": 156040895, "coord_system": "chromosome"},
                {"name": "2", "length": 242193529, "coord_system": "chromosome"},
                {"name": "HSCHR6_MHC_COX_CTG1", "length": 4795265},
                {"name": "10", "length": 133797422, "coord_system": "chromosome"}
            ]
        })
    }

    #[test]
    fn test_chromosomes_info_keeps_only_chromosomes() {
        let svc = FakeService::new(|_| Ok(assembly()), |_| Ok(json!({})));
        let (chroms, raw) = chromosomes_info(&svc, "homo_sapiens").unwrap();

        assert_eq!(svc.gets.borrow().as_slice(), ["/info/assembly/homo_sapiens"]);
        assert_eq!(raw, assembly());
        assert_eq!(chroms.len(), 4);
        assert_eq!(chroms["X"].length, 156040895);
        assert_eq!(chroms["1"].coordinate_system, "chromosome");
        assert!(!chroms.contains_key("KI270728.1"));
        assert!(!chroms.contains_key("HSCHR6_MHC_COX_CTG1"));
    }

    #[test]
    fn test_chromosomes_info_fails_on_http_error() {
        let svc = FakeService::new(
            |url| Err(FakeService::http_error(400, url)),
            |_| Ok(json!({})),
        );
        let err = chromosomes_info(&svc, "no_such_species").unwrap_err();
        let service_err = err.downcast_ref::<crate::error::ServiceError>().unwrap();
        assert_eq!(service_err.status(), Some(400));
    }

    #[test]
    fn test_select_chromosomes() {
        let svc = FakeService::new(|_| Ok(assembly()), |_| Ok(json!({})));
        let (chroms, _) = chromosomes_info(&svc, "homo_sapiens").unwrap();

        // autosomes present in the assembly, in numeric order
        let auto = select_chromosomes(&chroms, &ChromosomeFilter::Autosomes);
        let names: Vec<&str> = auto.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2", "10"]);

        let named = select_chromosomes(
            &chroms,
            &ChromosomeFilter::Named(vec!["X".to_string(), "Y".to_string(), "2".to_string()]),
        );
        let names: Vec<&str> = named.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["X", "2"]);

        let all = select_chromosomes(&chroms, &ChromosomeFilter::All);
        let names: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2", "10", "X"]);
    }
}
