//! Compiles a sweep into command scripts for the engine.
//!
//! This is pure: it validates the sweep, enumerates its coordinates, and asks
//! the [StatsLayout] where each one should be exported. Nothing is spawned or
//! written until the scripts are handed to an [Engine](crate::engine::Engine).

use crate::command::{Command, CommandScript};
use crate::error::{Error, Result};
use crate::naming::{Coordinate, StatsLayout};
use crate::spec::{Advance, SweepKind, SweepSpec};
use serde::{Deserialize, Serialize};

/// How a sweep is divided between engine processes.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sharding {
    /// One engine process runs the whole sweep.
    #[default]
    Single,

    /// One engine process per independent run: per trial and variant for
    /// time-series sweeps, per trial and cell for grid sweeps. The shards
    /// export to disjoint files and can run concurrently.
    PerTrial,
}

/// Build the command scripts for a sweep.
///
/// Returns exactly one script for [Sharding::Single]. Every script begins by
/// configuring the engine and ends with `exit`.
pub fn build(kind: &SweepKind, layout: &StatsLayout, sharding: Sharding) -> Result<Vec<CommandScript>> {
    kind.validate()?;
    check_dir(layout)?;
    let mode = kind.advance();
    let mut shards = Shards::new(sharding);
    match kind {
        SweepKind::Series { variants, .. } => {
            // Settings which a variant leaves unset carry over from the
            // variants before it, in every shard alike.
            let mut inherited: (Option<bool>, Option<f64>) = (None, None);
            for variant in variants {
                let spec = SweepSpec {
                    optmem: variant.spec.optmem.or(inherited.0),
                    mutation_rate: variant.spec.mutation_rate.or(inherited.1),
                    ..variant.spec.clone()
                };
                inherited = (spec.optmem, spec.mutation_rate);
                let checkpoints = spec.generations.checkpoints();
                for trial in 0..spec.trials {
                    let script = shards.next(&spec, true);
                    script.push(Command::New(spec.population_size));
                    let mut generation = 0;
                    for &checkpoint in &checkpoints {
                        script.advance(checkpoint - generation, mode);
                        generation = checkpoint;
                        script.export(
                            layout,
                            Coordinate::Series {
                                variant: variant.name.clone(),
                                trial,
                                generation,
                            },
                        );
                    }
                }
            }
        }
        SweepKind::Grid { spec, axes, .. } => {
            let generations = spec.generations.last();
            for trial in 0..spec.trials {
                for mutation in axes.mutation.values() {
                    for size in axes.size.values() {
                        let script = shards.next(spec, false);
                        script.push(Command::New(Some(size)));
                        script.push(Command::Mut(mutation));
                        script.advance(generations, mode);
                        script.export(layout, Coordinate::Grid { mutation, size, trial });
                    }
                }
            }
        }
        SweepKind::Distribution { spec, .. } => {
            for trial in 0..spec.trials {
                let script = shards.next(spec, false);
                script.push(Command::New(spec.population_size));
                if let Some(percent) = spec.mutation_rate {
                    script.push(Command::Mut(percent));
                }
                script.advance(spec.generations.last(), mode);
                script.export(layout, Coordinate::Final { trial });
            }
        }
    }
    Ok(shards.finish())
}

/// The export path is sent as the rest of a protocol line, so it has to be
/// printable as-is on a single line.
fn check_dir(layout: &StatsLayout) -> Result<()> {
    match layout.dir().to_str() {
        None => Err(Error::invalid(format!("output directory {:?} is not valid UTF-8", layout.dir()))),
        Some(dir) if dir.contains(['\n', '\r']) => {
            Err(Error::invalid(format!("output directory {dir:?} contains a line break")))
        }
        Some(_) => Ok(()),
    }
}

/// The engine settings which persist from one run to the next.
type Settings = (Option<bool>, String, Option<f64>);

#[derive(Default)]
struct ScriptBuilder {
    commands: Vec<Command>,
    settings: Option<Settings>,
}

impl ScriptBuilder {
    fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Send the settings which persist across runs, unless they're already in effect.
    fn configure(&mut self, spec: &SweepSpec, with_mutation: bool) {
        let mutation = spec.mutation_rate.filter(|_| with_mutation);
        let settings = (spec.optmem, spec.goal.clone(), mutation);
        if self.settings.as_ref() == Some(&settings) {
            return;
        }
        if let Some(optmem) = spec.optmem {
            self.push(Command::OptMem(optmem));
        }
        self.push(Command::Goal(spec.goal.clone()));
        if let Some(percent) = mutation {
            self.push(Command::Mut(percent));
        }
        self.settings = Some(settings);
    }

    fn advance(&mut self, generations: u64, mode: Advance) {
        match mode {
            Advance::Stepwise => {
                for _ in 0..generations {
                    self.push(Command::Next(1));
                }
            }
            Advance::Bulk => {
                if generations > 0 {
                    self.push(Command::Next(generations));
                }
            }
        }
    }

    fn export(&mut self, layout: &StatsLayout, coordinate: Coordinate) {
        self.push(Command::ExportStats(layout.path(&coordinate)));
    }

    fn finish(mut self) -> CommandScript {
        self.push(Command::Exit);
        CommandScript::new(self.commands)
    }
}

/// Hands out the script that the next independent run should be appended to.
struct Shards {
    sharding: Sharding,
    done: Vec<ScriptBuilder>,
    current: Option<ScriptBuilder>,
}

impl Shards {
    fn new(sharding: Sharding) -> Self {
        Self {
            sharding,
            done: vec![],
            current: None,
        }
    }

    fn next(&mut self, spec: &SweepSpec, with_mutation: bool) -> &mut ScriptBuilder {
        if self.sharding == Sharding::PerTrial {
            self.done.extend(self.current.take());
        }
        let script = self.current.get_or_insert_with(ScriptBuilder::default);
        script.configure(spec, with_mutation);
        script
    }

    fn finish(mut self) -> Vec<CommandScript> {
        self.done.extend(self.current.take());
        self.done.into_iter().map(ScriptBuilder::finish).collect()
    }
}
