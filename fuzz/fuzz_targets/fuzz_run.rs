#![no_main]

use arbitrary::Arbitrary;
use cgpevo::cgp::{
    Function, FunctionShape, InstructionSet, MutationConfig, RunOptions, mutate,
};
use cgpevo::rng::Rng;
use libfuzzer_sys::fuzz_target;

/// Structured input for interpreter fuzzing.
#[derive(Arbitrary, Debug)]
struct RunInput {
    /// Construction seed.
    seed: u32,
    /// Main grid sensors.
    sensors: u8,
    /// Main grid rows.
    rows: u8,
    /// Main grid columns.
    columns: u8,
    /// Connections per gene.
    connections: u8,
    /// ADF submodules.
    adf_modules: u8,
    /// Sensor values fed on every step.
    values: Vec<f32>,
    /// Interpreter steps.
    steps: u8,
    /// Dropout probability.
    dropout: f32,
}

fuzz_target!(|input: RunInput| {
    // Cap sizes to keep runs short
    let shape = FunctionShape {
        sensors: usize::from(input.sensors % 8) + 1,
        actuators: 2,
        rows: usize::from(input.rows % 8) + 1,
        columns: usize::from(input.columns % 16) + 1,
        connections_per_gene: usize::from(input.connections % 6) + 1,
        adf_modules: usize::from(input.adf_modules % 5),
        ..FunctionShape::default()
    };
    let set = InstructionSet::with_adf();
    let mut rng = Rng::new(input.seed);
    let mut f = Function::random(&shape, &set, &mut rng);
    let options = RunOptions {
        dropout_rate: if input.dropout.is_finite() { input.dropout.clamp(0.0, 1.0) } else { 0.0 },
    };

    for _ in 0..input.steps % 16 {
        let out = f.run(&input.values, &set, options);
        assert!(out.iter().all(|v| v.is_finite()));
        mutate(&mut f, &set, &MutationConfig::default(), &mut rng);
    }
    assert!(f.validate(&set).is_ok());
});
