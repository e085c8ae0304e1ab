//! Save and load functions, populations, environments and island systems.
//!
//! Every file is one pretty-printed JSON record:
//!
//! ```text
//! { "format": "cgpevo", "version": 1, "kind": "population", "body": { ... } }
//! ```
//!
//! Field order is fixed by the record types, so saving the same structure
//! twice produces identical text. Every body field is optional on the way
//! in; a missing or inconsistent value becomes a specific [`LoadError`]
//! instead of a parse failure wherever possible.

// Gene fields are floats that encode integer codes
#![allow(clippy::cast_possible_truncation)]

use crate::cgp::{
    Function, GENE_HEADER, InstructionSet, Layout, MAX_NODES, ModuleGenome, Opcode, field_index,
};
use crate::error::LoadError;
use crate::evolution::{
    BusBinding, Environment, EnvironmentConfig, History, Individual, IslandConfig, IslandSystem,
    Mating, Population, PopulationConfig,
};
use crate::rng::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// Format tag written to every record.
pub const FORMAT: &str = "cgpevo";

/// Current format version.
pub const VERSION: u32 = 1;

const KIND_FUNCTION: &str = "function";
const KIND_POPULATION: &str = "population";
const KIND_ENVIRONMENT: &str = "environment";
const KIND_ISLANDS: &str = "islands";

/// Structure held by a saved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A single function.
    Function,
    /// A generational population.
    Population,
    /// A steady-state environment.
    Environment,
    /// An island system.
    Islands,
}

/// Read only the header of a record.
///
/// # Errors
///
/// Returns a [`LoadError`] if the header is malformed or names an unknown
/// kind.
pub fn record_kind<R: Read>(reader: R) -> Result<RecordKind, LoadError> {
    let (kind, _) = read_envelope(reader)?;
    match kind.as_str() {
        KIND_FUNCTION => Ok(RecordKind::Function),
        KIND_POPULATION => Ok(RecordKind::Population),
        KIND_ENVIRONMENT => Ok(RecordKind::Environment),
        KIND_ISLANDS => Ok(RecordKind::Islands),
        _ => Err(LoadError::WrongKind {
            expected: "known",
            found: kind,
        }),
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    format: &'a str,
    version: u32,
    kind: &'a str,
    body: T,
}

#[derive(Deserialize)]
struct RawEnvelope {
    format: Option<String>,
    version: Option<u32>,
    kind: Option<String>,
    body: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct ModuleRecord {
    layout: Option<Layout>,
    genes: Option<Vec<f32>>,
    used: Option<Vec<bool>>,
    state: Option<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct FunctionRecord {
    random_seed: Option<u32>,
    modules: Option<Vec<ModuleRecord>>,
}

#[derive(Serialize, Deserialize)]
struct IndividualRecord {
    fitness: Option<f32>,
    binding: Option<BusBinding>,
    function: Option<FunctionRecord>,
}

#[derive(Serialize, Deserialize)]
struct PopulationRecord {
    config: Option<PopulationConfig>,
    instruction_set: Option<InstructionSet>,
    rng: Option<Rng>,
    history: Option<History>,
    size: Option<usize>,
    individuals: Option<Vec<IndividualRecord>>,
}

#[derive(Serialize, Deserialize)]
struct EnvironmentRecord {
    config: Option<EnvironmentConfig>,
    mating: Option<Vec<Mating>>,
    population: Option<PopulationRecord>,
}

#[derive(Serialize, Deserialize)]
struct IslandsRecord {
    config: Option<IslandConfig>,
    migration_tick: Option<usize>,
    count: Option<usize>,
    fitness: Option<Vec<f32>>,
    islands: Option<Vec<PopulationRecord>>,
}

/// Save a function.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_function<W: Write>(function: &Function, writer: W) -> io::Result<()> {
    write_record(writer, KIND_FUNCTION, function_record(function))
}

/// Load a function.
///
/// # Errors
///
/// Returns a [`LoadError`] describing the first defect found.
pub fn load_function<R: Read>(reader: R) -> Result<Function, LoadError> {
    read_record(reader, KIND_FUNCTION).and_then(function_from)
}

/// Save a population.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_population<W: Write>(population: &Population, writer: W) -> io::Result<()> {
    write_record(writer, KIND_POPULATION, population_record(population))
}

/// Load a population.
///
/// # Errors
///
/// Returns a [`LoadError`] describing the first defect found.
pub fn load_population<R: Read>(reader: R) -> Result<Population, LoadError> {
    read_record(reader, KIND_POPULATION).and_then(|r| population_from(r, None))
}

/// Save an environment.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_environment<W: Write>(environment: &Environment, writer: W) -> io::Result<()> {
    let record = EnvironmentRecord {
        config: Some(*environment.config()),
        mating: Some(environment.mating().iter().copied().collect()),
        population: Some(population_record(environment.population())),
    };
    write_record(writer, KIND_ENVIRONMENT, record)
}

/// Load an environment.
///
/// # Errors
///
/// Returns a [`LoadError`] describing the first defect found; mating log
/// entries must refer to live individuals.
pub fn load_environment<R: Read>(reader: R) -> Result<Environment, LoadError> {
    let record: EnvironmentRecord = read_record(reader, KIND_ENVIRONMENT)?;
    let config = record.config.ok_or(LoadError::MissingField("config"))?;
    let mating = record.mating.ok_or(LoadError::MissingField("mating"))?;
    let population = record
        .population
        .ok_or(LoadError::MissingField("population"))
        .and_then(|r| population_from(r, None))?;

    let size = population.len();
    for m in &mating {
        if let Some(&parent) = [m.parent1, m.parent2].iter().find(|&&p| p >= size) {
            return Err(LoadError::ParentNotFound(parent));
        }
        if m.child >= size {
            return Err(LoadError::ChildNotFound(m.child));
        }
    }
    Ok(Environment::from_parts(
        population,
        config,
        VecDeque::from(mating),
    ))
}

/// Save an island system.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_islands<W: Write>(system: &IslandSystem, writer: W) -> io::Result<()> {
    let record = IslandsRecord {
        config: Some(*system.config()),
        migration_tick: Some(system.migration_tick()),
        count: Some(system.islands().len()),
        fitness: Some(system.fitness().to_vec()),
        islands: Some(system.islands().iter().map(population_record).collect()),
    };
    write_record(writer, KIND_ISLANDS, record)
}

/// Load an island system. Islands with equal instruction sets share one.
///
/// # Errors
///
/// Returns a [`LoadError`] describing the first defect found.
pub fn load_islands<R: Read>(reader: R) -> Result<IslandSystem, LoadError> {
    let record: IslandsRecord = read_record(reader, KIND_ISLANDS)?;
    let config = record.config.ok_or(LoadError::MissingField("config"))?;
    let migration_tick = record
        .migration_tick
        .ok_or(LoadError::MissingField("migration_tick"))?;
    let declared = record.count.ok_or(LoadError::MissingField("count"))?;
    let fitness = record.fitness.ok_or(LoadError::MissingField("fitness"))?;
    let records = record.islands.ok_or(LoadError::MissingField("islands"))?;

    if records.len() != declared || fitness.len() != declared {
        return Err(LoadError::IslandCountMismatch {
            declared,
            read: records.len().min(fitness.len()),
        });
    }

    let mut shared: Option<Arc<InstructionSet>> = None;
    let mut islands = Vec::with_capacity(records.len());
    for r in records {
        let island = population_from(r, shared.as_ref())?;
        shared = Some(Arc::clone(island.set()));
        islands.push(island);
    }
    Ok(IslandSystem::from_parts(config, islands, fitness, migration_tick))
}

fn write_record<W: Write, T: Serialize>(mut writer: W, kind: &str, body: T) -> io::Result<()> {
    let envelope = Envelope {
        format: FORMAT,
        version: VERSION,
        kind,
        body,
    };
    serde_json::to_writer_pretty(&mut writer, &envelope)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

fn read_envelope<R: Read>(reader: R) -> Result<(String, serde_json::Value), LoadError> {
    let raw: RawEnvelope = serde_json::from_reader(reader)?;
    let format = raw.format.ok_or(LoadError::MissingField("format"))?;
    if format != FORMAT {
        return Err(LoadError::WrongKind {
            expected: FORMAT,
            found: format,
        });
    }
    let version = raw.version.ok_or(LoadError::MissingField("version"))?;
    if version != VERSION {
        return Err(LoadError::UnsupportedVersion(version));
    }
    let kind = raw.kind.ok_or(LoadError::MissingField("kind"))?;
    let body = raw.body.ok_or(LoadError::MissingField("body"))?;
    Ok((kind, body))
}

fn read_record<R: Read, T: DeserializeOwned>(reader: R, expected: &'static str) -> Result<T, LoadError> {
    let (kind, body) = read_envelope(reader)?;
    if kind != expected {
        return Err(LoadError::WrongKind {
            expected,
            found: kind,
        });
    }
    serde_json::from_value(body)
        .map_err(LoadError::from)
        .inspect_err(|e| log::warn!("failed to load {expected} record: {e}"))
}

fn function_record(function: &Function) -> FunctionRecord {
    FunctionRecord {
        random_seed: Some(function.random_seed()),
        modules: Some(
            function
                .modules()
                .iter()
                .map(|m| ModuleRecord {
                    layout: Some(*m.layout()),
                    genes: Some(m.genes().to_vec()),
                    used: Some(m.used().to_vec()),
                    state: Some(m.state().to_vec()),
                })
                .collect(),
        ),
    }
}

fn function_from(record: FunctionRecord) -> Result<Function, LoadError> {
    let seed = record
        .random_seed
        .ok_or(LoadError::MissingField("random_seed"))?;
    let modules = record
        .modules
        .ok_or(LoadError::MissingField("modules"))?
        .into_iter()
        .enumerate()
        .map(|(m, r)| module_from(m, r))
        .collect::<Result<Vec<_>, _>>()?;
    if modules.is_empty() {
        return Err(LoadError::MissingField("modules"));
    }
    Ok(Function::from_parts(modules, seed))
}

fn module_from(m: usize, record: ModuleRecord) -> Result<ModuleGenome, LoadError> {
    let layout = record.layout.ok_or(LoadError::MissingField("layout"))?;
    let nodes = layout.rows.saturating_mul(layout.columns);
    let widest = nodes
        .max(layout.sensors)
        .max(layout.actuators)
        .max(layout.connections_per_gene);
    if widest > MAX_NODES {
        return Err(LoadError::MaxNodesExceeded {
            nodes: widest,
            max: MAX_NODES,
        });
    }
    let genes = record.genes.ok_or(LoadError::MissingField("genes"))?;
    let used = record.used.ok_or(LoadError::MissingField("used"))?;
    let state = record.state.ok_or(LoadError::MissingField("state"))?;

    for (expected, found) in [
        (layout.genome_len(), genes.len()),
        (layout.state_len(), used.len()),
        (layout.state_len(), state.len()),
    ] {
        if expected != found {
            return Err(LoadError::NodeNotFound {
                module: m,
                expected,
                found,
            });
        }
    }

    let in_range = |field: f32| field_index(field).is_some_and(|i| i < layout.source_bound());
    for cell in 0..layout.cells() {
        let offset = layout.gene_offset(cell);
        let op = genes[offset];
        if op.is_nan() || (op >= 0.0 && Opcode::from_gene(op).is_none()) {
            return Err(LoadError::FunctionTypeNotFound {
                module: m,
                cell,
                code: if op.is_nan() { i32::MIN } else { op as i32 },
            });
        }
        let links = offset + GENE_HEADER..offset + layout.gene_size();
        if let Some(field) = links.into_iter().find(|&f| !in_range(genes[f])) {
            return Err(LoadError::LinkNotFound { module: m, field });
        }
    }
    for a in 0..layout.actuators {
        let field = layout.actuator_offset(a);
        if !in_range(genes[field]) {
            return Err(LoadError::LinkNotFound { module: m, field });
        }
    }

    Ok(ModuleGenome::from_parts(layout, genes, used, state))
}

fn population_record(population: &Population) -> PopulationRecord {
    PopulationRecord {
        config: Some(*population.config()),
        instruction_set: Some(population.set().as_ref().clone()),
        rng: Some(population.rng()),
        history: Some(population.history().clone()),
        size: Some(population.len()),
        individuals: Some(
            population
                .individuals()
                .iter()
                .map(|ind| IndividualRecord {
                    fitness: Some(ind.fitness),
                    binding: ind.binding.clone(),
                    function: Some(function_record(&ind.function)),
                })
                .collect(),
        ),
    }
}

fn population_from(
    record: PopulationRecord,
    shared: Option<&Arc<InstructionSet>>,
) -> Result<Population, LoadError> {
    let config = record.config.ok_or(LoadError::MissingField("config"))?;
    let stored = record
        .instruction_set
        .ok_or(LoadError::MissingField("instruction_set"))?;
    let stored = InstructionSet::new(stored.opcodes());
    let set = match shared {
        Some(set) if **set == stored => Arc::clone(set),
        _ => Arc::new(stored),
    };
    let rng = record.rng.ok_or(LoadError::MissingField("rng"))?;
    let history = record.history.ok_or(LoadError::MissingField("history"))?;
    let declared = record.size.ok_or(LoadError::MissingField("size"))?;
    let records = record
        .individuals
        .ok_or(LoadError::MissingField("individuals"))?;

    if records.len() != declared {
        return Err(LoadError::PopulationSizeMismatch {
            declared,
            read: records.len(),
        });
    }

    let individuals = records
        .into_iter()
        .map(|r| {
            Ok(Individual {
                fitness: r.fitness.ok_or(LoadError::MissingField("fitness"))?,
                binding: r.binding,
                function: r
                    .function
                    .ok_or(LoadError::MissingField("function"))
                    .and_then(function_from)?,
            })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    Ok(Population::from_parts(config, set, individuals, history, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgp::FunctionShape;

    fn function() -> Function {
        let shape = FunctionShape {
            sensors: 2,
            adf_modules: 1,
            ..FunctionShape::default()
        };
        Function::random(&shape, &InstructionSet::with_adf(), &mut Rng::new(4))
    }

    fn saved(f: &Function) -> serde_json::Value {
        let mut buf = Vec::new();
        save_function(f, &mut buf).unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    fn load_value(value: &serde_json::Value) -> Result<Function, LoadError> {
        load_function(value.to_string().as_bytes())
    }

    #[test]
    fn test_function_roundtrip() {
        let f = function();
        let mut buf = Vec::new();
        save_function(&f, &mut buf).unwrap();
        let loaded = load_function(buf.as_slice()).unwrap();
        assert_eq!(f.differences(&loaded), 0);

        let mut again = Vec::new();
        save_function(&loaded, &mut again).unwrap();
        assert_eq!(buf, again);
    }

    #[test]
    fn test_wrong_kind_and_version() {
        let mut value = saved(&function());
        value["kind"] = "population".into();
        assert!(matches!(load_value(&value), Err(LoadError::WrongKind { .. })));

        let mut value = saved(&function());
        value["version"] = 99.into();
        assert!(matches!(load_value(&value), Err(LoadError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_missing_field() {
        let mut value = saved(&function());
        value["body"]["random_seed"] = serde_json::Value::Null;
        assert!(matches!(
            load_value(&value),
            Err(LoadError::MissingField("random_seed"))
        ));
    }

    #[test]
    fn test_bad_opcode_and_link() {
        let mut value = saved(&function());
        value["body"]["modules"][0]["genes"][0] = 99.0.into();
        assert!(matches!(
            load_value(&value),
            Err(LoadError::FunctionTypeNotFound { code: 99, .. })
        ));

        let mut value = saved(&function());
        value["body"]["modules"][0]["genes"][0] = 3.7.into();
        assert!(matches!(
            load_value(&value),
            Err(LoadError::FunctionTypeNotFound { module: 0, cell: 0, code: 3 })
        ));

        let mut value = saved(&function());
        value["body"]["modules"][0]["genes"][2] = 100_000.0.into();
        assert!(matches!(
            load_value(&value),
            Err(LoadError::LinkNotFound { module: 0, field: 2 })
        ));
    }

    #[test]
    fn test_short_genes_and_max_nodes() {
        let mut value = saved(&function());
        if let Some(genes) = value["body"]["modules"][1]["genes"].as_array_mut() {
            genes.pop();
        }
        assert!(matches!(
            load_value(&value),
            Err(LoadError::NodeNotFound { module: 1, .. })
        ));

        let mut value = saved(&function());
        value["body"]["modules"][0]["layout"]["rows"] = 100_000.into();
        assert!(matches!(
            load_value(&value),
            Err(LoadError::MaxNodesExceeded { .. })
        ));
    }

    #[test]
    fn test_record_kind() {
        let mut buf = Vec::new();
        save_function(&function(), &mut buf).unwrap();
        assert_eq!(record_kind(buf.as_slice()).unwrap(), RecordKind::Function);

        let mut value = saved(&function());
        value["kind"] = "genome".into();
        assert!(record_kind(value.to_string().as_bytes()).is_err());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = load_function("not json".as_bytes()).unwrap_err();
        assert_eq!(err.code(), 2);
    }
}
